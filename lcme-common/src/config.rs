//! Configuration loading and ledger path resolution
//!
//! Resolution follows the same priority everywhere:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing config file is never fatal; a config file named explicitly on
//! the command line or in `LCME_CONFIG` must exist and parse.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "LCME_CONFIG";

/// Environment variable naming the curation ledger file
pub const LEDGER_ENV_VAR: &str = "LCME_LEDGER";

/// Ledger file name used when nothing else is configured
pub const DEFAULT_LEDGER_FILE: &str = "curations.yml";

/// Scanner name recorded in merge provenance when none is configured
pub const DEFAULT_SCANNER_TOOL: &str = "ScanCode";

/// Logging section of the TOML config
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log filter (`error`, `warn`, `info`, `debug`, `trace` or an
    /// `EnvFilter` directive). `RUST_LOG` overrides it.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Contents of `config.toml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Curation ledger location
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ledger_path: Option<PathBuf>,

    /// Default repair mode for dangling references (`stub` or `prune`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix_mode: Option<String>,

    /// Name of the file-level scanner recorded in merge provenance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scanner_tool: Option<String>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl TomlConfig {
    /// Scanner name, falling back to [`DEFAULT_SCANNER_TOOL`]
    pub fn scanner_tool(&self) -> &str {
        self.scanner_tool
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(DEFAULT_SCANNER_TOOL)
    }
}

/// Locate the config file
///
/// Priority: CLI argument, `LCME_CONFIG`, user config dir, `/etc/lcme`.
/// Returns `None` when nothing is configured and no default file exists.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    default_config_locations().into_iter().find(|p| p.exists())
}

/// Platform config file candidates, most specific first
fn default_config_locations() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(dir) = dirs::config_dir() {
        candidates.push(dir.join("lcme").join("config.toml"));
    }
    if cfg!(unix) {
        candidates.push(PathBuf::from("/etc/lcme/config.toml"));
    }
    candidates
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Read config {} failed: {}", path.display(), e))
    })?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse config {} failed: {}", path.display(), e)))
}

/// Load the effective configuration
///
/// An explicitly requested file (CLI or environment) must load; otherwise a
/// missing or unreadable default file degrades to compiled defaults with a
/// warning.
pub fn load_config(cli_arg: Option<&Path>) -> Result<TomlConfig> {
    let explicit = cli_arg.is_some() || std::env::var(CONFIG_ENV_VAR).is_ok();

    let Some(path) = resolve_config_path(cli_arg) else {
        debug!("No config file found, using compiled defaults");
        return Ok(TomlConfig::default());
    };

    match load_toml_config(&path) {
        Ok(config) => {
            debug!(path = %path.display(), "Loaded config");
            Ok(config)
        }
        Err(e) if explicit => Err(e),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Ignoring unreadable config, using defaults");
            Ok(TomlConfig::default())
        }
    }
}

/// Resolve the curation ledger location
///
/// Priority: CLI argument, `LCME_LEDGER`, `ledger_path` in TOML,
/// `./curations.yml`.
pub fn resolve_ledger_path(cli_arg: Option<&Path>, config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(LEDGER_ENV_VAR) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &config.ledger_path {
        return path.clone();
    }

    PathBuf::from(DEFAULT_LEDGER_FILE)
}
