//! Command-line definition

use clap::{ArgAction, Parser, Subcommand};
use lcme_engine::ledger::ExportFormat;
use lcme_engine::{Format, RepairMode};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "lcme",
    version,
    about = "SPDX BOM integrity checks and multi-source license merge"
)]
pub struct Cli {
    /// Config file (overrides LCME_CONFIG and the default locations)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Output machine-readable JSON")]
    pub json: bool,

    /// Raise log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Report structural and naming defects (exit 1 unless clean)
    Validate {
        input: PathBuf,
        /// Input format (default: from extension)
        #[arg(long)]
        format: Option<Format>,
    },

    /// Repair dangling references and invalid identifiers
    Fix {
        input: PathBuf,
        #[arg(long, value_enum)]
        mode: Option<RepairMode>,
        #[arg(short, long)]
        output: PathBuf,
        #[arg(long)]
        format: Option<Format>,
        /// Output format (default: from output extension, else input format)
        #[arg(long)]
        output_format: Option<Format>,
    },

    /// Export packages whose license attribution is uncertain
    ExtractUncertain {
        input: PathBuf,
        #[arg(long)]
        output_dir: PathBuf,
        #[arg(long)]
        format: Option<Format>,
    },

    /// Merge scanner evidence and curations into the document
    Merge {
        input: PathBuf,
        #[arg(long)]
        evidence_dir: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// Curation ledger (overrides LCME_LEDGER and config)
        #[arg(long)]
        ledger: Option<PathBuf>,
        /// Skip curation ledger application
        #[arg(long, conflicts_with = "ledger")]
        no_ledger: bool,
        /// Merge report; `.md` renders Markdown, anything else JSON
        #[arg(long)]
        report: Option<PathBuf>,
        /// Ledger-format suggestions for every upgrade, for human review
        #[arg(long)]
        suggestions: Option<PathBuf>,
        #[arg(long, value_enum)]
        mode: Option<RepairMode>,
        #[arg(long)]
        format: Option<Format>,
        #[arg(long)]
        output_format: Option<Format>,
    },

    /// Manage the curation ledger
    Ledger {
        /// Ledger file (overrides LCME_LEDGER and config)
        #[arg(long, global = true)]
        ledger: Option<PathBuf>,
        #[command(subcommand)]
        command: LedgerCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum LedgerCommands {
    /// Add or replace a curation
    Add {
        /// External package identifier, e.g. NPM::left-pad:1.3.0
        id: String,
        #[arg(long)]
        license: String,
        #[arg(long)]
        comment: String,
        #[arg(long)]
        original_license: Option<String>,
        #[arg(long)]
        homepage: Option<String>,
        /// Curation date, YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<String>,
    },

    /// Remove a curation
    Remove { id: String },

    /// List curations
    List,

    /// Check the ledger file (exit 1 on non-advisory issues)
    Validate,

    /// Curate every id listed in a file (one per line) with one license
    Import {
        ids_file: PathBuf,
        #[arg(long)]
        license: String,
        #[arg(long)]
        comment: String,
        #[arg(long)]
        date: Option<String>,
    },

    /// Export the ledger
    Export {
        #[arg(long, value_enum, default_value_t = ExportFormat::Yaml)]
        format: ExportFormat,
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}
