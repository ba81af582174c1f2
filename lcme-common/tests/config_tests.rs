//! Tests for configuration resolution and graceful degradation
//!
//! Uses serial_test to prevent ENV variable race conditions: tests that
//! touch LCME_CONFIG or LCME_LEDGER are marked #[serial].

use lcme_common::config::{
    load_config, load_toml_config, resolve_config_path, resolve_ledger_path, LoggingConfig,
    TomlConfig, CONFIG_ENV_VAR, DEFAULT_LEDGER_FILE, DEFAULT_SCANNER_TOOL, LEDGER_ENV_VAR,
};
use serial_test::serial;
use std::env;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write_config(config: &TomlConfig, path: &Path) {
    std::fs::write(path, toml::to_string_pretty(config).unwrap()).unwrap();
}

fn sample_config() -> TomlConfig {
    TomlConfig {
        ledger_path: Some(PathBuf::from("/srv/compliance/curations.yml")),
        fix_mode: Some("prune".to_string()),
        scanner_tool: Some("ScanCode 32.0".to_string()),
        logging: LoggingConfig {
            level: "debug".to_string(),
        },
    }
}

#[test]
fn test_defaults() {
    let config = TomlConfig::default();
    assert!(config.ledger_path.is_none());
    assert!(config.fix_mode.is_none());
    assert_eq!(config.logging.level, "info");
    assert_eq!(config.scanner_tool(), DEFAULT_SCANNER_TOOL);
}

#[test]
fn test_write_then_load_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");

    write_config(&sample_config(), &path);
    let loaded = load_toml_config(&path).unwrap();

    assert_eq!(loaded, sample_config());
}

#[test]
fn test_partial_file_fills_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "fix_mode = \"stub\"\n").unwrap();

    let loaded = load_toml_config(&path).unwrap();
    assert_eq!(loaded.fix_mode.as_deref(), Some("stub"));
    assert_eq!(loaded.logging, LoggingConfig::default());
}

#[test]
fn test_blank_scanner_tool_falls_back() {
    let config = TomlConfig {
        scanner_tool: Some("  ".to_string()),
        ..TomlConfig::default()
    };
    assert_eq!(config.scanner_tool(), DEFAULT_SCANNER_TOOL);
}

#[test]
#[serial]
fn test_cli_config_path_wins_over_env() {
    env::set_var(CONFIG_ENV_VAR, "/from/env.toml");
    let resolved = resolve_config_path(Some(Path::new("/from/cli.toml")));
    env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(resolved, Some(PathBuf::from("/from/cli.toml")));
}

#[test]
#[serial]
fn test_env_config_path_used_without_cli() {
    env::set_var(CONFIG_ENV_VAR, "/from/env.toml");
    let resolved = resolve_config_path(None);
    env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(resolved, Some(PathBuf::from("/from/env.toml")));
}

#[test]
#[serial]
fn test_explicit_missing_config_is_an_error() {
    env::remove_var(CONFIG_ENV_VAR);
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope.toml");

    assert!(load_config(Some(&missing)).is_err());
}

#[test]
#[serial]
fn test_explicit_config_loads() {
    env::remove_var(CONFIG_ENV_VAR);
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    write_config(&sample_config(), &path);

    let loaded = load_config(Some(&path)).unwrap();
    assert_eq!(loaded.fix_mode.as_deref(), Some("prune"));
}

#[test]
#[serial]
fn test_ledger_path_priority() {
    env::remove_var(LEDGER_ENV_VAR);
    let config = sample_config();

    // Priority 1: CLI
    assert_eq!(
        resolve_ledger_path(Some(Path::new("cli.yml")), &config),
        PathBuf::from("cli.yml")
    );

    // Priority 2: environment
    env::set_var(LEDGER_ENV_VAR, "env.yml");
    assert_eq!(resolve_ledger_path(None, &config), PathBuf::from("env.yml"));
    env::remove_var(LEDGER_ENV_VAR);

    // Priority 3: TOML
    assert_eq!(
        resolve_ledger_path(None, &config),
        PathBuf::from("/srv/compliance/curations.yml")
    );

    // Priority 4: compiled default
    assert_eq!(
        resolve_ledger_path(None, &TomlConfig::default()),
        PathBuf::from(DEFAULT_LEDGER_FILE)
    );
}
