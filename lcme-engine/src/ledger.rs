//! Curation Ledger
//!
//! Persisted manual license overrides, keyed by normalized external package
//! identifier. Curations are human decisions: [`CurationLedger::apply`] runs
//! after every automated stage, so an entry always wins over evidence.
//!
//! The ledger is an explicit store passed by argument; the merge pipeline
//! reads it and never writes it. Mutations are validated at this boundary and
//! leave the ledger unchanged on error.

use crate::error::{EngineError, EngineResult};
use crate::identity::{normalize_identifier, ExternalId};
use crate::license_expr;
use crate::model::{Document, DocumentIndex};
use chrono::NaiveDate;
use lcme_common::file_utils::write_atomic;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;
use tracing::{debug, info, warn};

/// One manual override
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurationEntry {
    /// External package identifier (`TYPE:NAMESPACE:NAME:VERSION`)
    pub id: String,
    /// License expression to conclude
    pub license: String,
    /// Justification, written to `licenseComments` on apply
    pub comment: String,
    /// Concluded value before curation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_license: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    pub date: NaiveDate,
}

impl CurationEntry {
    pub fn new(
        id: impl Into<String>,
        license: impl Into<String>,
        comment: impl Into<String>,
        date: NaiveDate,
    ) -> Self {
        Self {
            id: id.into(),
            license: license.into(),
            comment: comment.into(),
            original_license: None,
            homepage: None,
            date,
        }
    }

    /// Normalized identifier and canonical license, or why the entry is rejected
    fn checked(&self) -> EngineResult<(String, String)> {
        let key = normalize_identifier(&self.id)
            .map_err(|e| EngineError::InvalidEntry(format!("'{}': {}", self.id, e)))?;
        if self.license.trim().is_empty() {
            return Err(EngineError::InvalidEntry(format!(
                "'{}': license is empty",
                self.id
            )));
        }
        let license = license_expr::canonicalize(&self.license).ok_or_else(|| {
            EngineError::InvalidEntry(format!(
                "'{}': '{}' is not a valid license expression",
                self.id, self.license
            ))
        })?;
        Ok((key, license))
    }
}

/// Ledger problems found by [`CurationLedger::validate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerIssueKind {
    UnparsableLicense,
    InvalidIdentifier,
    /// Package type outside the known set; advisory only
    UnknownEcosystem,
    DuplicateIdentifier,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerIssue {
    pub id: String,
    pub kind: LedgerIssueKind,
    pub message: String,
}

impl LedgerIssue {
    pub fn is_advisory(&self) -> bool {
        self.kind == LedgerIssueKind::UnknownEcosystem
    }
}

impl fmt::Display for LedgerIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.id, self.message)
    }
}

/// One curation that changed a package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedCuration {
    pub spdx_id: String,
    pub id: String,
    pub previous: Option<String>,
    pub license: String,
}

/// Entry that could not be applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedCuration {
    pub id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyReport {
    pub applied: Vec<AppliedCuration>,
    /// Ledger ids that matched no package of the document
    pub unmatched_entries: Vec<String>,
    /// Entries with an invalid id or license, in ledger order
    pub rejected_entries: Vec<RejectedCuration>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub added: usize,
    pub replaced: usize,
}

/// Export shapes for `ledger export`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Ledger entries as YAML
    Yaml,
    /// Ledger entries as JSON
    Json,
    /// `[{id, curations: {comment, concluded_license}}]` YAML
    Ort,
}

#[derive(Serialize)]
struct OrtCuration<'a> {
    id: &'a str,
    curations: OrtCurationBody<'a>,
}

#[derive(Serialize)]
struct OrtCurationBody<'a> {
    comment: &'a str,
    concluded_license: &'a str,
}

/// Ordered set of curation entries
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CurationLedger {
    entries: Vec<CurationEntry>,
}

impl CurationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from YAML; a missing or empty file is an empty ledger
    ///
    /// Entries are kept as written, including duplicates and invalid ids, so
    /// [`validate`](Self::validate) can report them. Later duplicates win.
    pub fn load(path: &Path) -> EngineResult<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Ledger file not found, starting empty");
                return Ok(Self::new());
            }
            Err(e) => return Err(e.into()),
        };

        if text.trim().is_empty() {
            return Ok(Self::new());
        }

        let entries: Vec<CurationEntry> = serde_yaml::from_str(&text).map_err(|e| {
            EngineError::InvalidEntry(format!("ledger {}: {}", path.display(), e))
        })?;
        debug!(path = %path.display(), entries = entries.len(), "Loaded ledger");
        Ok(Self { entries })
    }

    /// Write atomically as YAML
    pub fn save(&self, path: &Path) -> EngineResult<()> {
        let yaml = self.to_yaml()?;
        write_atomic(path, yaml.as_bytes())?;
        info!(path = %path.display(), entries = self.entries.len(), "Saved ledger");
        Ok(())
    }

    pub fn entries(&self) -> &[CurationEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Active entry for an identifier (normalized comparison)
    pub fn get(&self, id: &str) -> Option<&CurationEntry> {
        let key = normalize_identifier(id).ok()?;
        self.entries
            .iter()
            .rev()
            .find(|e| normalize_identifier(&e.id).ok().as_deref() == Some(key.as_str()))
    }

    /// Add or replace the entry for `entry.id`
    ///
    /// # Returns
    /// The replaced entry, if any. The stored license is canonicalized.
    pub fn add(&mut self, mut entry: CurationEntry) -> EngineResult<Option<CurationEntry>> {
        let (key, license) = entry.checked()?;
        entry.license = license;
        let replaced = self.take(&key);
        debug!(id = %entry.id, license = %entry.license, replaced = replaced.is_some(), "Ledger entry added");
        self.entries.push(entry);
        Ok(replaced)
    }

    /// Remove the entry for `id`
    pub fn remove(&mut self, id: &str) -> EngineResult<Option<CurationEntry>> {
        let key = normalize_identifier(id)
            .map_err(|e| EngineError::InvalidEntry(format!("'{}': {}", id, e)))?;
        Ok(self.take(&key))
    }

    /// Drop every entry normalizing to `key`, returning the active one
    fn take(&mut self, key: &str) -> Option<CurationEntry> {
        let mut removed = None;
        self.entries.retain(|e| {
            if normalize_identifier(&e.id).ok().as_deref() == Some(key) {
                removed = Some(e.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    /// Curate every id with one license; all-or-nothing
    pub fn import_uncertain(
        &mut self,
        ids: &[String],
        license: &str,
        comment: &str,
        date: NaiveDate,
    ) -> EngineResult<ImportSummary> {
        let entries: Vec<CurationEntry> = ids
            .iter()
            .map(|id| CurationEntry::new(id.trim(), license, comment, date))
            .collect();

        let mut errors = Vec::new();
        for entry in &entries {
            if let Err(e) = entry.checked() {
                errors.push(e.to_string());
            }
        }
        if !errors.is_empty() {
            return Err(EngineError::InvalidEntry(format!(
                "import rejected, ledger unchanged: {}",
                errors.join("; ")
            )));
        }

        let mut staged = self.clone();
        let mut summary = ImportSummary::default();
        for entry in entries {
            match staged.add(entry)? {
                Some(_) => summary.replaced += 1,
                None => summary.added += 1,
            }
        }
        *self = staged;

        info!(added = summary.added, replaced = summary.replaced, "Imported curations");
        Ok(summary)
    }

    /// Check the ledger without a document
    pub fn validate(&self) -> Vec<LedgerIssue> {
        let mut issues = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut reported: HashSet<String> = HashSet::new();

        for entry in &self.entries {
            match ExternalId::parse(&entry.id) {
                Ok(parsed) => {
                    if !parsed.is_known_ecosystem() {
                        issues.push(LedgerIssue {
                            id: entry.id.clone(),
                            kind: LedgerIssueKind::UnknownEcosystem,
                            message: format!("unknown package type '{}'", parsed.ecosystem),
                        });
                    }
                    let key = parsed.normalized();
                    if !seen.insert(key.clone()) && reported.insert(key) {
                        issues.push(LedgerIssue {
                            id: entry.id.clone(),
                            kind: LedgerIssueKind::DuplicateIdentifier,
                            message: "identifier appears more than once; the last entry wins"
                                .to_string(),
                        });
                    }
                }
                Err(e) => issues.push(LedgerIssue {
                    id: entry.id.clone(),
                    kind: LedgerIssueKind::InvalidIdentifier,
                    message: e.to_string(),
                }),
            }

            if !license_expr::is_valid(&entry.license) {
                issues.push(LedgerIssue {
                    id: entry.id.clone(),
                    kind: LedgerIssueKind::UnparsableLicense,
                    message: format!("'{}' is not a valid license expression", entry.license),
                });
            }
        }
        issues
    }

    /// Overwrite concluded licenses of every curated package
    ///
    /// Entries with an invalid id or license cannot be applied; they are
    /// listed in [`ApplyReport::rejected_entries`], never dropped.
    pub fn apply(&self, document: &mut Document) -> ApplyReport {
        let mut report = ApplyReport::default();
        let mut active: HashMap<String, (&CurationEntry, String)> = HashMap::new();
        for entry in &self.entries {
            match entry.checked() {
                Ok((key, license)) => {
                    active.insert(key, (entry, license));
                }
                Err(e) => {
                    warn!(id = %entry.id, error = %e, "Ledger entry cannot be applied");
                    report.rejected_entries.push(RejectedCuration {
                        id: entry.id.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        let index = DocumentIndex::build(document);
        let mut plan: Vec<(usize, &CurationEntry, &str)> = Vec::new();
        let mut unmatched: Vec<String> = Vec::new();
        for (key, (entry, license)) in &active {
            let positions = index.external_id_positions(key);
            if positions.is_empty() {
                unmatched.push(entry.id.clone());
            }
            plan.extend(positions.iter().map(|&i| (i, *entry, license.as_str())));
        }
        plan.sort_by_key(|(i, _, _)| *i);

        for (i, entry, license) in plan {
            let package = &mut document.packages[i];
            report.applied.push(AppliedCuration {
                spdx_id: package.spdx_id.clone(),
                id: entry.id.clone(),
                previous: package.license_concluded.clone(),
                license: license.to_string(),
            });
            package.license_concluded = Some(license.to_string());
            package.license_comments = Some(entry.comment.clone());
            debug!(spdx_id = %package.spdx_id, license = %license, "Applied curation");
        }

        unmatched.sort();
        if !unmatched.is_empty() {
            warn!(count = unmatched.len(), "Ledger entries matched no package");
        }
        report.unmatched_entries = unmatched;

        info!(
            applied = report.applied.len(),
            rejected = report.rejected_entries.len(),
            "Ledger applied"
        );
        report
    }

    pub fn to_yaml(&self) -> EngineResult<String> {
        serde_yaml::to_string(&self.entries)
            .map_err(|e| EngineError::Serialization(format!("ledger: {}", e)))
    }

    pub fn export(&self, format: ExportFormat) -> EngineResult<String> {
        match format {
            ExportFormat::Yaml => self.to_yaml(),
            ExportFormat::Json => serde_json::to_string_pretty(&self.entries)
                .map(|json| json + "\n")
                .map_err(|e| EngineError::Serialization(format!("ledger: {}", e))),
            ExportFormat::Ort => {
                let curations: Vec<OrtCuration<'_>> = self
                    .entries
                    .iter()
                    .map(|e| OrtCuration {
                        id: &e.id,
                        curations: OrtCurationBody {
                            comment: &e.comment,
                            concluded_license: &e.license,
                        },
                    })
                    .collect();
                serde_yaml::to_string(&curations)
                    .map_err(|e| EngineError::Serialization(format!("ledger: {}", e)))
            }
        }
    }
}
