//! Command handler layer
//!
//! Parses CLI inputs, delegates to the library, writes outputs and picks
//! the exit code.
//!
//! ## Files
//! - `document.rs`: validate / fix / extract-uncertain
//! - `merge.rs`: the full merge pipeline
//! - `ledger.rs`: curation ledger management
//! - `output.rs`: text / JSON printing

mod document;
mod ledger;
mod merge;
mod output;

use crate::cli::{Cli, Commands};
use anyhow::{anyhow, Context as _};
use chrono::NaiveDate;
use lcme_common::config::TomlConfig;
use lcme_engine::{Format, RepairMode};
use std::path::Path;
use std::process::ExitCode;

/// Exit code for a completed run that found defects
pub const EXIT_DEFECTS: u8 = 1;

/// Exit code for a fatal error
pub const EXIT_FATAL: u8 = 2;

/// Settings every handler needs
pub struct Context<'a> {
    pub json: bool,
    pub config: &'a TomlConfig,
}

pub fn run(cli: &Cli, config: &TomlConfig) -> anyhow::Result<ExitCode> {
    let ctx = Context {
        json: cli.json,
        config,
    };

    match &cli.command {
        Commands::Validate { input, format } => document::validate(&ctx, input, *format),
        Commands::Fix {
            input,
            mode,
            output,
            format,
            output_format,
        } => document::fix(&ctx, input, *mode, output, *format, *output_format),
        Commands::ExtractUncertain {
            input,
            output_dir,
            format,
        } => document::extract_uncertain(&ctx, input, output_dir, *format),
        Commands::Merge {
            input,
            evidence_dir,
            output,
            ledger,
            no_ledger,
            report,
            suggestions,
            mode,
            format,
            output_format,
        } => merge::run(
            &ctx,
            merge::MergeArgs {
                input,
                evidence_dir,
                output,
                ledger: ledger.as_deref(),
                no_ledger: *no_ledger,
                report: report.as_deref(),
                suggestions: suggestions.as_deref(),
                mode: *mode,
                format: *format,
                output_format: *output_format,
            },
        ),
        Commands::Ledger { ledger, command } => ledger::run(&ctx, ledger.as_deref(), command),
    }
}

/// CLI flag, then `fix_mode` from config, then `stub`
fn repair_mode(cli_mode: Option<RepairMode>, config: &TomlConfig) -> anyhow::Result<RepairMode> {
    if let Some(mode) = cli_mode {
        return Ok(mode);
    }
    match config.fix_mode.as_deref() {
        Some(raw) => raw
            .parse()
            .map_err(|e: String| anyhow!(e))
            .context("Invalid fix_mode in config"),
        None => Ok(RepairMode::Stub),
    }
}

/// Explicit flag, then output extension, then the input's format
fn output_format(output: &Path, explicit: Option<Format>, input_format: Format) -> Format {
    explicit
        .or_else(|| Format::from_path(output))
        .unwrap_or(input_format)
}

/// `YYYY-MM-DD`, or today when absent
fn curation_date(raw: Option<&str>) -> anyhow::Result<NaiveDate> {
    match raw {
        Some(raw) => lcme_common::time::parse_date(raw)
            .ok_or_else(|| anyhow!("Invalid date '{}' (expected YYYY-MM-DD)", raw)),
        None => Ok(lcme_common::time::today()),
    }
}

fn exit_code(clean: bool) -> ExitCode {
    if clean {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_DEFECTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repair_mode_priority() {
        let mut config = TomlConfig::default();
        assert_eq!(repair_mode(None, &config).unwrap(), RepairMode::Stub);

        config.fix_mode = Some("prune".into());
        assert_eq!(repair_mode(None, &config).unwrap(), RepairMode::Prune);
        assert_eq!(
            repair_mode(Some(RepairMode::Stub), &config).unwrap(),
            RepairMode::Stub
        );

        config.fix_mode = Some("delete".into());
        assert!(repair_mode(None, &config).is_err());
    }

    #[test]
    fn test_output_format_resolution() {
        assert_eq!(
            output_format(Path::new("out.json"), None, Format::Yaml),
            Format::Json
        );
        assert_eq!(
            output_format(Path::new("out"), None, Format::Yaml),
            Format::Yaml
        );
        assert_eq!(
            output_format(Path::new("out.json"), Some(Format::Yaml), Format::Json),
            Format::Yaml
        );
    }

    #[test]
    fn test_curation_date() {
        assert_eq!(
            curation_date(Some("2024-02-29")).unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
        assert!(curation_date(Some("29/02/2024")).is_err());
        assert!(curation_date(None).is_ok());
    }
}
