//! ledger add / remove / list / validate / import / export handlers
//!
//! Mutating commands hold `<ledger>.lock` from load to save.

use super::output::{print_one, print_out};
use super::{curation_date, exit_code, Context};
use crate::cli::LedgerCommands;
use anyhow::Context as _;
use lcme_common::config::resolve_ledger_path;
use lcme_common::file_utils::{write_atomic, FileLock};
use lcme_common::time::format_date;
use lcme_engine::ledger::{CurationEntry, CurationLedger, ImportSummary, LedgerIssue};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;

pub fn run(ctx: &Context, ledger: Option<&Path>, command: &LedgerCommands) -> anyhow::Result<ExitCode> {
    let path = resolve_ledger_path(ledger, ctx.config);

    match command {
        LedgerCommands::Add {
            id,
            license,
            comment,
            original_license,
            homepage,
            date,
        } => {
            let mut entry = CurationEntry::new(id, license, comment, curation_date(date.as_deref())?);
            entry.original_license = original_license.clone();
            entry.homepage = homepage.clone();
            add(ctx, &path, entry)
        }
        LedgerCommands::Remove { id } => remove(ctx, &path, id),
        LedgerCommands::List => list(ctx, &path),
        LedgerCommands::Validate => validate(ctx, &path),
        LedgerCommands::Import {
            ids_file,
            license,
            comment,
            date,
        } => import(ctx, &path, ids_file, license, comment, date.as_deref()),
        LedgerCommands::Export { format, output } => {
            let ledger = CurationLedger::load(&path)?;
            let rendered = ledger.export(*format)?;
            match output {
                Some(out) => {
                    write_atomic(out, rendered.as_bytes())?;
                    info!(output = %out.display(), entries = ledger.len(), "Ledger exported");
                }
                None => print!("{}", rendered),
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

#[derive(Serialize)]
struct Change {
    ledger: PathBuf,
    id: String,
    action: &'static str,
}

fn add(ctx: &Context, path: &Path, entry: CurationEntry) -> anyhow::Result<ExitCode> {
    let _lock = FileLock::acquire(path)?;
    let mut ledger = CurationLedger::load(path)?;
    let id = entry.id.clone();
    let action = match ledger.add(entry)? {
        Some(_) => "replaced",
        None => "added",
    };
    ledger.save(path)?;

    let data = Change {
        ledger: path.to_path_buf(),
        id,
        action,
    };
    print_one(ctx.json, true, data, |d| {
        format!("{} {} in {}", d.action, d.id, d.ledger.display())
    })?;
    Ok(ExitCode::SUCCESS)
}

fn remove(ctx: &Context, path: &Path, id: &str) -> anyhow::Result<ExitCode> {
    let _lock = FileLock::acquire(path)?;
    let mut ledger = CurationLedger::load(path)?;
    let removed = ledger.remove(id)?;
    if removed.is_some() {
        ledger.save(path)?;
    }

    let found = removed.is_some();
    let data = Change {
        ledger: path.to_path_buf(),
        id: id.to_string(),
        action: if found { "removed" } else { "not_found" },
    };
    print_one(ctx.json, found, data, |d| {
        if found {
            format!("removed {} from {}", d.id, d.ledger.display())
        } else {
            format!("no entry for {} in {}", d.id, d.ledger.display())
        }
    })?;
    Ok(exit_code(found))
}

fn list(ctx: &Context, path: &Path) -> anyhow::Result<ExitCode> {
    let ledger = CurationLedger::load(path)?;
    print_out(ctx.json, ledger.entries(), |e| {
        format!(
            "{}\t{}\t{}\t{}",
            e.id,
            e.license,
            format_date(e.date),
            e.comment
        )
    })?;
    Ok(ExitCode::SUCCESS)
}

#[derive(Serialize)]
struct ValidateOutput {
    ledger: PathBuf,
    entries: usize,
    issues: Vec<LedgerIssue>,
}

fn validate(ctx: &Context, path: &Path) -> anyhow::Result<ExitCode> {
    let ledger = CurationLedger::load(path)?;
    let issues = ledger.validate();
    let ok = issues.iter().all(LedgerIssue::is_advisory);

    let data = ValidateOutput {
        ledger: path.to_path_buf(),
        entries: ledger.len(),
        issues,
    };
    print_one(ctx.json, ok, data, |d| {
        let mut text = format!("{} entries in {}\n", d.entries, d.ledger.display());
        for issue in &d.issues {
            let level = if issue.is_advisory() { "warning" } else { "error" };
            text.push_str(&format!("{}: {}\n", level, issue));
        }
        text
    })?;
    Ok(exit_code(ok))
}

#[derive(Serialize)]
struct ImportOutput {
    ledger: PathBuf,
    #[serde(flatten)]
    summary: ImportSummary,
}

fn import(
    ctx: &Context,
    path: &Path,
    ids_file: &Path,
    license: &str,
    comment: &str,
    date: Option<&str>,
) -> anyhow::Result<ExitCode> {
    let date = curation_date(date)?;
    let text = std::fs::read_to_string(ids_file)
        .with_context(|| format!("Failed to read {}", ids_file.display()))?;
    let ids = parse_id_list(&text);

    let _lock = FileLock::acquire(path)?;
    let mut ledger = CurationLedger::load(path)?;
    let summary = ledger.import_uncertain(&ids, license, comment, date)?;
    ledger.save(path)?;

    let data = ImportOutput {
        ledger: path.to_path_buf(),
        summary,
    };
    print_one(ctx.json, true, data, |d| {
        format!(
            "imported into {}: {} added, {} replaced",
            d.ledger.display(),
            d.summary.added,
            d.summary.replaced
        )
    })?;
    Ok(ExitCode::SUCCESS)
}

/// One id per line; blank lines and `#` comments are skipped
fn parse_id_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect()
}
