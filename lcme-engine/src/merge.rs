//! Merge Engine
//!
//! Folds file-level scanner evidence into packages whose license is
//! uncertain.
//!
//! # Policy
//! - Evidence groups are attributed to packages through the identity
//!   resolver, by path prefix and then by evidence file name;
//!   unattributable groups are reported, never guessed.
//! - Evidence for a package that already carries a license claim is skipped:
//!   a confident package is never modified.
//! - Records scoring below [`HIGH_CONFIDENCE_SCORE`], with a score outside
//!   0..=100, with an unparsable expression, or naming no license are
//!   discarded.
//! - Among the remaining records the expression with the highest aggregate
//!   score wins; ties go to the expression seen in more records, then to the
//!   lexicographically smallest expression.
//!
//! Confidence never decreases: the only mutation is uncertain → concluded.

use crate::error::{EngineError, EngineResult};
use crate::evidence::{EvidenceRecord, EvidenceSet};
use crate::identity::{IdentityResolver, NoMatchReason, Resolution};
use crate::ledger::CurationEntry;
use crate::license_expr;
use crate::model::{Document, DocumentIndex};
use crate::outcome::{Outcome, RunStatus, Warning};
use crate::uncertainty::{is_uncertain, is_uncertain_value};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

/// Minimum scanner score for a record to count
pub const HIGH_CONFIDENCE_SCORE: f64 = 80.0;

/// Scanner score upper bound
pub const MAX_SCORE: f64 = 100.0;

/// Why a record did not count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscardReason {
    LowConfidence,
    ScoreOutOfRange,
    UnparsableExpression,
    /// `NOASSERTION`, `NONE` and friends
    NoLicenseClaim,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscardedRecord {
    pub spdx_id: String,
    pub path: String,
    pub license_expression: String,
    pub score: f64,
    pub reason: DiscardReason,
}

/// One upgrade: previous value → adopted expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub spdx_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    pub previous: Option<String>,
    pub adopted: String,
    pub aggregate_score: f64,
    pub file_count: usize,
    pub tool: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedReason {
    /// No evidence was attributed to the package
    NoEvidence,
    /// Evidence exists but every record was discarded
    NoQualifyingEvidence,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnresolvedPackage {
    pub spdx_id: String,
    pub label: String,
    pub reason: UnresolvedReason,
}

/// Evidence group the resolver could not attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnmatchedGroup {
    pub prefix: String,
    pub record_count: usize,
    pub reason: NoMatchReason,
    pub best_score: f64,
}

/// Evidence ignored because its package is already confident
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedGroup {
    pub prefix: String,
    pub spdx_id: String,
    pub record_count: usize,
}

/// SHA-256 of one input artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputFingerprint {
    pub path: String,
    pub sha256: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeSummary {
    pub evidence_records: usize,
    pub upgraded: usize,
    pub still_uncertain: usize,
    pub discarded_low_confidence: usize,
    pub discarded_other: usize,
    pub unmatched_groups: usize,
    pub skipped_confident: usize,
}

/// Complete merge outcome, rendered as JSON and Markdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeReport {
    pub status: RunStatus,
    pub tool: String,
    pub threshold: f64,
    pub summary: MergeSummary,
    pub upgraded: Vec<AuditEntry>,
    pub still_uncertain: Vec<UnresolvedPackage>,
    pub discarded: Vec<DiscardedRecord>,
    pub unmatched: Vec<UnmatchedGroup>,
    pub skipped_confident: Vec<SkippedGroup>,
    pub fingerprints: Vec<InputFingerprint>,
}

impl MergeReport {
    pub fn to_json(&self) -> EngineResult<String> {
        serde_json::to_string_pretty(self)
            .map(|json| json + "\n")
            .map_err(|e| EngineError::Serialization(format!("merge report: {}", e)))
    }

    pub fn to_markdown(&self) -> String {
        let s = &self.summary;
        let mut out = String::from("# License Merge Report\n\n");
        out.push_str(&format!("Status: **{}**  \n", self.status));
        out.push_str(&format!(
            "Evidence tool: {} (threshold {})\n\n",
            self.tool, self.threshold
        ));
        out.push_str("| Metric | Count |\n|---|---|\n");
        out.push_str(&format!("| Evidence records | {} |\n", s.evidence_records));
        out.push_str(&format!("| Packages upgraded | {} |\n", s.upgraded));
        out.push_str(&format!("| Still uncertain | {} |\n", s.still_uncertain));
        out.push_str(&format!(
            "| Discarded (low confidence) | {} |\n",
            s.discarded_low_confidence
        ));
        out.push_str(&format!("| Discarded (other) | {} |\n", s.discarded_other));
        out.push_str(&format!("| Unmatched evidence groups | {} |\n", s.unmatched_groups));
        out.push_str(&format!(
            "| Skipped (package already confident) | {} |\n",
            s.skipped_confident
        ));

        if !self.upgraded.is_empty() {
            out.push_str("\n## Upgrades\n\n| Package | Previous | Adopted | Aggregate score | Files |\n|---|---|---|---|---|\n");
            for a in &self.upgraded {
                out.push_str(&format!(
                    "| {} | {} | {} | {:.1} | {} |\n",
                    a.external_id.as_deref().unwrap_or(&a.spdx_id),
                    a.previous.as_deref().unwrap_or("(absent)"),
                    a.adopted,
                    a.aggregate_score,
                    a.file_count
                ));
            }
        }

        if !self.still_uncertain.is_empty() {
            out.push_str("\n## Still uncertain\n\n");
            for p in &self.still_uncertain {
                let reason = match p.reason {
                    UnresolvedReason::NoEvidence => "no evidence",
                    UnresolvedReason::NoQualifyingEvidence => "no qualifying evidence",
                };
                out.push_str(&format!("- {} ({})\n", p.label, reason));
            }
        }

        if !self.unmatched.is_empty() {
            out.push_str("\n## Unmatched evidence\n\n");
            for g in &self.unmatched {
                out.push_str(&format!(
                    "- `{}`: {} record(s), best score {:.3}\n",
                    g.prefix, g.record_count, g.best_score
                ));
            }
        }

        if !self.fingerprints.is_empty() {
            out.push_str("\n## Inputs\n\n");
            for f in &self.fingerprints {
                out.push_str(&format!("- `{}` sha256:{}\n", f.path, f.sha256));
            }
        }
        out
    }

    /// Ledger-format suggestions for every upgrade with an external id
    ///
    /// Merge results are automated findings; each suggestion is marked for
    /// review before it is promoted into the ledger.
    pub fn curation_suggestions(&self, date: NaiveDate) -> Vec<CurationEntry> {
        self.upgraded
            .iter()
            .filter_map(|a| {
                let id = a.external_id.as_ref()?;
                let mut entry = CurationEntry::new(
                    id.clone(),
                    a.adopted.clone(),
                    format!(
                        "Concluded from {} evidence (aggregate score {:.1} across {} file(s)). REVIEW REQUIRED: verify against the source repository before applying.",
                        a.tool, a.aggregate_score, a.file_count
                    ),
                    date,
                );
                entry.original_license = a.previous.clone();
                Some(entry)
            })
            .collect()
    }
}

#[derive(Debug, Default)]
struct Tally {
    aggregate: f64,
    count: usize,
}

/// Evidence-to-document merge
#[derive(Debug, Clone)]
pub struct MergeEngine {
    tool: String,
}

impl MergeEngine {
    /// # Arguments
    /// * `tool` - Scanner name recorded in comments and audit entries
    pub fn new(tool: impl Into<String>) -> Self {
        Self { tool: tool.into() }
    }

    pub fn tool(&self) -> &str {
        &self.tool
    }

    /// Merge `evidence` into the uncertain packages of `document`
    ///
    /// Unmatched evidence groups are returned as `NO_MATCH` warnings
    /// (`PartialOk`); they never fail the merge.
    pub fn merge(
        &self,
        document: &mut Document,
        evidence: &EvidenceSet,
    ) -> EngineResult<Outcome<MergeReport>> {
        let resolver = IdentityResolver::from_document(document);
        let index = DocumentIndex::build(document);
        let mut warnings = Vec::new();
        let mut unmatched = Vec::new();
        let mut skipped_confident = Vec::new();
        let mut attributed: HashMap<String, Vec<EvidenceRecord>> = HashMap::new();

        for group in evidence.groups() {
            let resolution = match resolver.resolve(&group.prefix) {
                Resolution::NoMatch { reason, best_score } => {
                    match group.fallback.as_deref().map(|stem| resolver.resolve(stem)) {
                        Some(matched @ Resolution::Matched { .. }) => {
                            debug!(prefix = %group.prefix, fallback = ?group.fallback, "Attributed by evidence file name");
                            matched
                        }
                        _ => Resolution::NoMatch { reason, best_score },
                    }
                }
                matched => matched,
            };
            match resolution {
                Resolution::Matched { spdx_id, kind, score } => {
                    let confident = index
                        .package(&spdx_id)
                        .is_some_and(|p| !is_uncertain(p));
                    if confident {
                        debug!(prefix = %group.prefix, spdx_id = %spdx_id, "Skipping evidence for confident package");
                        skipped_confident.push(SkippedGroup {
                            prefix: group.prefix,
                            spdx_id,
                            record_count: group.records.len(),
                        });
                        continue;
                    }
                    debug!(prefix = %group.prefix, spdx_id = %spdx_id, kind = ?kind, score, "Attributed evidence");
                    attributed.entry(spdx_id).or_default().extend(group.records);
                }
                Resolution::NoMatch { reason, best_score } => {
                    let err = EngineError::NoMatch {
                        fragment: group.prefix.clone(),
                        best_score,
                    };
                    warnings.push(Warning::new(err.code(), err.to_string()));
                    unmatched.push(UnmatchedGroup {
                        prefix: group.prefix,
                        record_count: group.records.len(),
                        reason,
                        best_score,
                    });
                }
            }
        }

        let mut work = document.clone();
        let mut upgraded = Vec::new();
        let mut still_uncertain = Vec::new();
        let mut discarded = Vec::new();

        for package in work.packages.iter_mut() {
            if !is_uncertain(package) {
                continue;
            }
            let label = package.display_name().to_string();

            let Some(records) = attributed.get(&package.spdx_id) else {
                still_uncertain.push(UnresolvedPackage {
                    spdx_id: package.spdx_id.clone(),
                    label,
                    reason: UnresolvedReason::NoEvidence,
                });
                continue;
            };

            let mut tallies: BTreeMap<String, Tally> = BTreeMap::new();
            for record in records {
                match qualify(record) {
                    Ok(expression) => {
                        let tally = tallies.entry(expression).or_default();
                        tally.aggregate += record.score;
                        tally.count += 1;
                    }
                    Err(reason) => discarded.push(DiscardedRecord {
                        spdx_id: package.spdx_id.clone(),
                        path: record.path.clone(),
                        license_expression: record.license_expression.clone(),
                        score: record.score,
                        reason,
                    }),
                }
            }

            let Some((adopted, tally)) = choose(&tallies) else {
                still_uncertain.push(UnresolvedPackage {
                    spdx_id: package.spdx_id.clone(),
                    label,
                    reason: UnresolvedReason::NoQualifyingEvidence,
                });
                continue;
            };

            let audit = AuditEntry {
                spdx_id: package.spdx_id.clone(),
                external_id: package.external_identifier.clone(),
                previous: package.license_concluded.clone(),
                adopted: adopted.to_string(),
                aggregate_score: tally.aggregate,
                file_count: tally.count,
                tool: self.tool.clone(),
            };
            package.license_concluded = Some(audit.adopted.clone());
            package.license_comments = Some(format!(
                "Concluded from {} evidence: aggregate score {:.1} across {} file(s)",
                self.tool, tally.aggregate, tally.count
            ));
            info!(
                package = %label,
                adopted = %audit.adopted,
                aggregate = audit.aggregate_score,
                files = audit.file_count,
                "Upgraded uncertain license"
            );
            upgraded.push(audit);
        }

        let summary = MergeSummary {
            evidence_records: evidence.record_count(),
            upgraded: upgraded.len(),
            still_uncertain: still_uncertain.len(),
            discarded_low_confidence: discarded
                .iter()
                .filter(|d| d.reason == DiscardReason::LowConfidence)
                .count(),
            discarded_other: discarded
                .iter()
                .filter(|d| d.reason != DiscardReason::LowConfidence)
                .count(),
            unmatched_groups: unmatched.len(),
            skipped_confident: skipped_confident.len(),
        };
        let status = if still_uncertain.is_empty() && unmatched.is_empty() {
            RunStatus::Clean
        } else {
            RunStatus::Advisory
        };

        let report = MergeReport {
            status,
            tool: self.tool.clone(),
            threshold: HIGH_CONFIDENCE_SCORE,
            summary,
            upgraded,
            still_uncertain,
            discarded,
            unmatched,
            skipped_confident,
            fingerprints: evidence
                .fingerprints()
                .into_iter()
                .map(|(path, sha256)| InputFingerprint { path, sha256 })
                .collect(),
        };

        info!(
            upgraded = summary.upgraded,
            still_uncertain = summary.still_uncertain,
            unmatched = summary.unmatched_groups,
            "Merge complete"
        );

        *document = work;
        Ok(Outcome::with_warnings(report, warnings))
    }
}

/// Canonical expression of a qualifying record, or why it does not qualify
///
/// Every finite score under the threshold counts as low confidence, whatever
/// the expression says.
fn qualify(record: &EvidenceRecord) -> Result<String, DiscardReason> {
    if !record.score.is_finite() {
        return Err(DiscardReason::ScoreOutOfRange);
    }
    if record.score < HIGH_CONFIDENCE_SCORE {
        return Err(DiscardReason::LowConfidence);
    }
    if record.score > MAX_SCORE {
        return Err(DiscardReason::ScoreOutOfRange);
    }
    if is_uncertain_value(Some(&record.license_expression)) {
        return Err(DiscardReason::NoLicenseClaim);
    }
    license_expr::canonicalize(&record.license_expression).ok_or(DiscardReason::UnparsableExpression)
}

/// Highest aggregate, then most records, then smallest expression
fn choose(tallies: &BTreeMap<String, Tally>) -> Option<(&str, &Tally)> {
    tallies
        .iter()
        .max_by(|(ea, a), (eb, b)| {
            a.aggregate
                .partial_cmp(&b.aggregate)
                .unwrap_or(Ordering::Equal)
                .then(a.count.cmp(&b.count))
                .then_with(|| eb.cmp(ea))
        })
        .map(|(expr, tally)| (expr.as_str(), tally))
}
