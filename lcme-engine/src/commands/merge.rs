//! merge handler

use super::output::print_one;
use super::{output_format, repair_mode, Context};
use anyhow::Context as _;
use lcme_common::config::resolve_ledger_path;
use lcme_common::file_utils::write_atomic;
use lcme_engine::model::{self, Format};
use lcme_engine::outcome::{RunStatus, Warning};
use lcme_engine::pipeline::{run_merge, MergeOptions};
use lcme_engine::{CurationLedger, RepairMode};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info};

pub struct MergeArgs<'a> {
    pub input: &'a Path,
    pub evidence_dir: &'a Path,
    pub output: &'a Path,
    pub ledger: Option<&'a Path>,
    pub no_ledger: bool,
    pub report: Option<&'a Path>,
    pub suggestions: Option<&'a Path>,
    pub mode: Option<RepairMode>,
    pub format: Option<Format>,
    pub output_format: Option<Format>,
}

#[derive(Serialize)]
struct MergeOutput {
    status: RunStatus,
    output: PathBuf,
    repaired: bool,
    upgraded: usize,
    still_uncertain: usize,
    unmatched_groups: usize,
    curations_applied: usize,
    ledger: Option<PathBuf>,
    report: Option<PathBuf>,
    suggestions: Option<PathBuf>,
    warnings: Vec<Warning>,
}

pub fn run(ctx: &Context, args: MergeArgs) -> anyhow::Result<ExitCode> {
    let repair_mode = repair_mode(args.mode, ctx.config)?;

    let ledger_path = if args.no_ledger {
        None
    } else {
        Some(resolve_ledger_path(args.ledger, ctx.config))
    };
    let ledger = match &ledger_path {
        Some(path) => {
            debug!(path = %path.display(), "Loading curation ledger");
            let ledger = CurationLedger::load(path)
                .with_context(|| format!("Failed to load ledger {}", path.display()))?;
            Some(ledger)
        }
        None => None,
    };

    let options = MergeOptions {
        input: args.input.to_path_buf(),
        format: args.format,
        evidence_dir: args.evidence_dir.to_path_buf(),
        repair_mode,
        tool: ctx.config.scanner_tool().to_string(),
    };
    let (run, warnings) = run_merge(&options, ledger.as_ref())?.into_parts();

    let out_format = output_format(args.output, args.output_format, run.format);
    model::save_file(&run.document, args.output, out_format)?;
    info!(output = %args.output.display(), format = %out_format, "Enhanced document written");

    if let Some(path) = args.report {
        let rendered = if is_markdown(path) {
            run.merge.to_markdown()
        } else {
            run.merge.to_json()?
        };
        write_atomic(path, rendered.as_bytes())?;
        info!(report = %path.display(), "Merge report written");
    }

    if let Some(path) = args.suggestions {
        let entries = run.merge.curation_suggestions(lcme_common::time::today());
        let yaml = serde_yaml::to_string(&entries).context("Failed to serialize suggestions")?;
        write_atomic(path, yaml.as_bytes())?;
        info!(
            suggestions = %path.display(),
            count = entries.len(),
            "Curation suggestions written"
        );
    }

    let data = MergeOutput {
        status: run.status(),
        output: args.output.to_path_buf(),
        repaired: !run.fix.is_noop(),
        upgraded: run.merge.summary.upgraded,
        still_uncertain: run.merge.summary.still_uncertain,
        unmatched_groups: run.merge.summary.unmatched_groups,
        curations_applied: run.curation.as_ref().map_or(0, |c| c.applied.len()),
        ledger: ledger_path,
        report: args.report.map(Path::to_path_buf),
        suggestions: args.suggestions.map(Path::to_path_buf),
        warnings,
    };
    print_one(ctx.json, true, data, render)?;
    Ok(ExitCode::SUCCESS)
}

fn is_markdown(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("md"))
}

fn render(d: &MergeOutput) -> String {
    let mut text = format!(
        "status: {}\nupgraded: {}\nstill uncertain: {}\nunmatched evidence groups: {}\ncurations applied: {}\n",
        d.status, d.upgraded, d.still_uncertain, d.unmatched_groups, d.curations_applied
    );
    if d.repaired {
        text.push_str("input repaired before merge\n");
    }
    for warning in &d.warnings {
        text.push_str(&format!("warning: {}\n", warning));
    }
    text.push_str(&format!("wrote {}\n", d.output.display()));
    for path in [&d.report, &d.suggestions].into_iter().flatten() {
        text.push_str(&format!("wrote {}\n", path.display()));
    }
    text
}
