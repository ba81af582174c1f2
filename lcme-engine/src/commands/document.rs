//! validate / fix / extract-uncertain handlers

use super::output::print_one;
use super::{exit_code, output_format, repair_mode, Context};
use lcme_engine::model::{self, Format};
use lcme_engine::outcome::{RunStatus, Warning};
use lcme_engine::{validate as validate_document, Fixer, RepairMode, UncertaintyReport};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;

pub fn validate(ctx: &Context, input: &Path, format: Option<Format>) -> anyhow::Result<ExitCode> {
    let (document, _) = model::load_file(input, format)?;
    let report = validate_document(&document);
    info!(
        input = %input.display(),
        status = %report.status,
        defects = report.defects.len(),
        "Validation complete"
    );

    let clean = report.is_clean();
    print_one(ctx.json, clean, report, |r| r.render_text())?;
    Ok(exit_code(clean))
}

#[derive(Serialize)]
struct FixOutput {
    status: RunStatus,
    output: PathBuf,
    report: lcme_engine::FixReport,
    warnings: Vec<Warning>,
}

pub fn fix(
    ctx: &Context,
    input: &Path,
    mode: Option<RepairMode>,
    output: &Path,
    format: Option<Format>,
    explicit_output_format: Option<Format>,
) -> anyhow::Result<ExitCode> {
    let mode = repair_mode(mode, ctx.config)?;
    let (mut document, input_format) = model::load_file(input, format)?;
    let initial = validate_document(&document);

    let outcome = Fixer::new(mode).apply(&mut document, &initial)?;
    let status = outcome.status();
    let (report, warnings) = outcome.into_parts();

    let out_format = output_format(output, explicit_output_format, input_format);
    model::save_file(&document, output, out_format)?;
    info!(
        output = %output.display(),
        format = %out_format,
        mode = %mode,
        "Repaired document written"
    );

    let data = FixOutput {
        status,
        output: output.to_path_buf(),
        report,
        warnings,
    };
    print_one(ctx.json, true, data, |d| {
        let mut text = d.report.render_text();
        for warning in &d.warnings {
            text.push_str(&format!("warning: {}\n", warning));
        }
        text.push_str(&format!("wrote {}\n", d.output.display()));
        text
    })?;
    Ok(ExitCode::SUCCESS)
}

#[derive(Serialize)]
struct ExtractOutput {
    total_packages: usize,
    uncertain_count: usize,
    uncertain_ratio: f64,
    files: Vec<PathBuf>,
}

pub fn extract_uncertain(
    ctx: &Context,
    input: &Path,
    output_dir: &Path,
    format: Option<Format>,
) -> anyhow::Result<ExitCode> {
    let (document, _) = model::load_file(input, format)?;
    let report = UncertaintyReport::from_document(&document);
    let files = report.write_exports(output_dir)?;
    info!(
        uncertain = report.uncertain_count,
        total = report.total_packages,
        dir = %output_dir.display(),
        "Uncertain packages exported"
    );

    let data = ExtractOutput {
        total_packages: report.total_packages,
        uncertain_count: report.uncertain_count,
        uncertain_ratio: report.uncertain_ratio,
        files,
    };
    print_one(ctx.json, true, data, |d| {
        let mut text = format!(
            "{} of {} packages uncertain ({:.1}%)\n",
            d.uncertain_count,
            d.total_packages,
            d.uncertain_ratio * 100.0
        );
        for file in &d.files {
            text.push_str(&format!("wrote {}\n", file.display()));
        }
        text
    })?;
    Ok(ExitCode::SUCCESS)
}
