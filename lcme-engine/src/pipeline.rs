//! End-to-end merge pipeline
//!
//! load → validate → fix → load evidence → merge → apply ledger →
//! re-validate. Each stage's warnings are accumulated into one `Outcome`;
//! any fatal error stops the run before an output exists.

use crate::error::{EngineError, EngineResult};
use crate::evidence;
use crate::fixer::{FixReport, Fixer, RepairMode};
use crate::ledger::{ApplyReport, CurationLedger};
use crate::merge::{InputFingerprint, MergeEngine, MergeReport};
use crate::model::{self, Document, Format};
use crate::outcome::{Outcome, RunStatus, Warning};
use crate::validator::{validate, ValidationReport};
use lcme_common::file_utils::sha256_hex;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Warning code for ledger entries that could not be applied
pub const CURATION_REJECTED: &str = "CURATION_REJECTED";

/// Inputs of one merge run
#[derive(Debug, Clone)]
pub struct MergeOptions {
    pub input: PathBuf,
    /// Detected from the extension when `None`
    pub format: Option<Format>,
    pub evidence_dir: PathBuf,
    pub repair_mode: RepairMode,
    pub tool: String,
}

/// Everything a merge run produced
#[derive(Debug, Clone)]
pub struct MergeRun {
    pub document: Document,
    pub format: Format,
    pub initial_validation: ValidationReport,
    pub fix: FixReport,
    pub merge: MergeReport,
    pub curation: Option<ApplyReport>,
    pub final_validation: ValidationReport,
}

impl MergeRun {
    /// Worst status across the run's reports
    pub fn status(&self) -> RunStatus {
        let curation = match &self.curation {
            Some(report) if !report.rejected_entries.is_empty() => RunStatus::Advisory,
            _ => RunStatus::Clean,
        };
        self.merge
            .status
            .max(self.final_validation.status)
            .max(curation)
    }
}

/// Run the whole pipeline
///
/// # Arguments
/// * `options` - Input document, evidence directory, repair mode and tool name
/// * `ledger` - Curations applied after the merge; `None` skips the stage
///
/// # Returns
/// The enhanced document, re-validated free of structural defects, with
/// every stage report. Nothing is written to disk.
pub fn run_merge(
    options: &MergeOptions,
    ledger: Option<&CurationLedger>,
) -> EngineResult<Outcome<MergeRun>> {
    let mut warnings: Vec<Warning> = Vec::new();

    let (mut document, format, fingerprint) = load_with_fingerprint(&options.input, options.format)?;

    let initial_validation = validate(&document);
    let fix = Fixer::new(options.repair_mode).apply(&mut document, &initial_validation)?;
    let (fix, fix_warnings) = fix.into_parts();
    warnings.extend(fix_warnings);

    let (evidence, evidence_warnings) = evidence::load_dir(&options.evidence_dir)?.into_parts();
    warnings.extend(evidence_warnings);

    let (mut merge, merge_warnings) = MergeEngine::new(options.tool.clone())
        .merge(&mut document, &evidence)?
        .into_parts();
    warnings.extend(merge_warnings);
    merge.fingerprints.insert(
        0,
        InputFingerprint {
            path: options.input.display().to_string(),
            sha256: fingerprint,
        },
    );

    let curation = ledger.map(|ledger| ledger.apply(&mut document));
    if let Some(report) = &curation {
        warnings.extend(report.rejected_entries.iter().map(|rejected| {
            Warning::new(
                CURATION_REJECTED,
                format!("curation for {} not applied: {}", rejected.id, rejected.reason),
            )
        }));
    }

    let final_validation = validate(&document);
    if final_validation.has_structural_defects() {
        let defects: Vec<String> = final_validation
            .structural_defects()
            .map(|d| d.to_string())
            .collect();
        return Err(EngineError::UnresolvableConflict(format!(
            "enhanced document failed re-validation: {}",
            defects.join("; ")
        )));
    }

    let run = MergeRun {
        document,
        format,
        initial_validation,
        fix,
        merge,
        curation,
        final_validation,
    };

    if !warnings.is_empty() {
        warn!(warnings = warnings.len(), "Merge completed with warnings");
    }
    info!(
        status = %run.status(),
        upgraded = run.merge.summary.upgraded,
        curated = run.curation.as_ref().map_or(0, |c| c.applied.len()),
        "Merge pipeline complete"
    );
    Ok(Outcome::with_warnings(run, warnings))
}

/// Read and decode a document, returning the SHA-256 of its raw bytes
pub fn load_with_fingerprint(
    path: &Path,
    format: Option<Format>,
) -> EngineResult<(Document, Format, String)> {
    let format = Format::resolve(path, format)?;
    let bytes = std::fs::read(path)?;
    let document = model::load(&bytes, format)?;
    Ok((document, format, sha256_hex(&bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const INPUT: &str = r#"
spdxVersion: SPDX-2.3
SPDXID: SPDXRef-DOCUMENT
documentNamespace: https://example.org/app
packages:
  - SPDXID: SPDXRef-app
    name: app
    licenseConcluded: MIT
  - SPDXID: SPDXRef-left-pad
    externalIdentifier: "NPM::left-pad:1.3.0"
    name: left-pad
    licenseDeclared: NOASSERTION
    licenseConcluded: NOASSERTION
relationships:
  - spdxElementId: SPDXRef-DOCUMENT
    relationshipType: DESCRIBES
    relatedSpdxElement: SPDXRef-app
  - spdxElementId: SPDXRef-app
    relationshipType: DEPENDS_ON
    relatedSpdxElement: SPDXRef-left-pad
  - spdxElementId: SPDXRef-app
    relationshipType: DEPENDS_ON
    relatedSpdxElement: SPDXRef-ghost
"#;

    fn setup() -> (TempDir, MergeOptions) {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("bom.yml");
        fs::write(&input, INPUT).unwrap();
        let evidence_dir = dir.path().join("evidence");
        fs::create_dir(&evidence_dir).unwrap();
        fs::write(
            evidence_dir.join("left-pad.json"),
            r#"{"files": [{"path": "left-pad-1.3.0/LICENSE", "licenses": [{"license_expression": "MIT", "score": 97}]}]}"#,
        )
        .unwrap();

        let options = MergeOptions {
            input,
            format: None,
            evidence_dir,
            repair_mode: RepairMode::Stub,
            tool: "ScanCode".into(),
        };
        (dir, options)
    }

    #[test]
    fn test_run_merge_repairs_merges_and_fingerprints() {
        let (_dir, options) = setup();
        let outcome = run_merge(&options, None).unwrap();
        let run = outcome.value();

        assert_eq!(run.format, Format::Yaml);
        assert_eq!(run.fix.stubs, vec!["SPDXRef-ghost".to_string()]);
        assert_eq!(
            run.document
                .package("SPDXRef-left-pad")
                .unwrap()
                .license_concluded
                .as_deref(),
            Some("MIT")
        );
        assert!(!run.final_validation.has_structural_defects());
        assert_eq!(run.merge.fingerprints.len(), 2);
        assert!(run.merge.fingerprints[0].path.ends_with("bom.yml"));
    }

    #[test]
    fn test_ledger_applied_after_merge() {
        let (_dir, options) = setup();
        let mut ledger = CurationLedger::new();
        ledger
            .add(crate::ledger::CurationEntry::new(
                "NPM::left-pad:1.3.0",
                "BSD-3-Clause",
                "Upstream relicensed",
                chrono::NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            ))
            .unwrap();

        let run = run_merge(&options, Some(&ledger)).unwrap().into_parts().0;
        let pkg = run.document.package("SPDXRef-left-pad").unwrap();
        assert_eq!(pkg.license_concluded.as_deref(), Some("BSD-3-Clause"));
        assert_eq!(pkg.license_comments.as_deref(), Some("Upstream relicensed"));
        assert_eq!(run.merge.upgraded[0].adopted, "MIT");
    }

    #[test]
    fn test_unparsable_curation_becomes_warning() {
        let (dir, options) = setup();
        let path = dir.path().join("curations.yml");
        fs::write(
            &path,
            "- id: NPM::left-pad:1.3.0\n  license: BSD 3-Clause\n  comment: typo\n  date: 2024-05-01\n",
        )
        .unwrap();
        let ledger = CurationLedger::load(&path).unwrap();

        let (run, warnings) = run_merge(&options, Some(&ledger)).unwrap().into_parts();
        let pkg = run.document.package("SPDXRef-left-pad").unwrap();
        assert_eq!(pkg.license_concluded.as_deref(), Some("MIT"));

        let curation = run.curation.as_ref().unwrap();
        assert_eq!(curation.rejected_entries.len(), 1);
        let rejected: Vec<_> = warnings.iter().filter(|w| w.code == CURATION_REJECTED).collect();
        assert_eq!(rejected.len(), 1);
        assert!(rejected[0].message.contains("NPM::left-pad:1.3.0"));
        assert_eq!(run.status(), RunStatus::Advisory);
    }

    #[test]
    fn test_unknown_extension_needs_format() {
        let (dir, mut options) = setup();
        let input = dir.path().join("bom.txt");
        fs::write(&input, INPUT).unwrap();
        options.input = input;
        assert!(matches!(
            run_merge(&options, None),
            Err(EngineError::MalformedDocument(_))
        ));

        options.format = Some(Format::Yaml);
        assert!(run_merge(&options, None).is_ok());
    }

    #[test]
    fn test_duplicate_ids_abort_before_merge() {
        let (dir, mut options) = setup();
        let dup = INPUT.replace("SPDXRef-left-pad\n    externalIdentifier", "SPDXRef-app\n    externalIdentifier");
        let input = dir.path().join("dup.yml");
        fs::write(&input, dup).unwrap();
        options.input = input;

        assert!(matches!(
            run_merge(&options, None),
            Err(EngineError::UnresolvableConflict(_))
        ));
    }
}
