//! lcme - SPDX BOM integrity checks and multi-source license merge
//!
//! Exit codes: 0 success, 1 defects found, 2 fatal error.

mod cli;
mod commands;

use clap::Parser;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use cli::Cli;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match lcme_common::config::load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::from(commands::EXIT_FATAL);
        }
    };

    init_tracing(cli.verbose, &config.logging.level);
    debug!(version = env!("CARGO_PKG_VERSION"), "lcme starting");

    match commands::run(&cli, &config) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::from(commands::EXIT_FATAL)
        }
    }
}

/// `RUST_LOG`, else `-v`/`-vv`, else the configured level; logs go to stderr
fn init_tracing(verbose: u8, configured: &str) {
    let fallback = match verbose {
        0 => configured.to_string(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&fallback))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("warning: logging disabled: {}", e);
    }
}
