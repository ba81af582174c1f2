//! Validator
//!
//! Walks the document and reports every referential or naming defect. Pure
//! and idempotent: the same document always yields the same report, in the
//! same order (packages in document order, then relationships).
//!
//! # Defect kinds
//! - `DanglingReference`: relationship endpoint naming no package or root
//! - `InvalidIdentifier`: SPDX id violating the identifier grammar
//! - `DuplicateIdentifier`: several packages share one SPDX id
//! - `MissingLicenseFields`: declared and concluded license both absent
//!
//! Duplicates cannot be repaired automatically and make the report fatal;
//! every other defect is advisory.

use crate::model::{is_valid_spdx_id, normalize_spdx_id, Document, DocumentIndex, Endpoint};
use crate::outcome::RunStatus;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::debug;

/// One structural or naming defect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Defect {
    DanglingReference {
        /// Position in `document.relationships`
        relationship: usize,
        endpoint: Endpoint,
        spdx_id: String,
    },
    InvalidIdentifier {
        spdx_id: String,
        /// Identifier the fixer would rewrite it to
        suggested: String,
        /// Packages and relationship endpoints carrying it
        occurrences: usize,
    },
    DuplicateIdentifier {
        spdx_id: String,
        count: usize,
    },
    MissingLicenseFields {
        spdx_id: String,
    },
}

impl Defect {
    /// Dangling, invalid or duplicate (the fixer's responsibility)
    pub fn is_structural(&self) -> bool {
        !matches!(self, Defect::MissingLicenseFields { .. })
    }

    pub fn code(&self) -> &'static str {
        match self {
            Defect::DanglingReference { .. } => "DANGLING_REFERENCE",
            Defect::InvalidIdentifier { .. } => "INVALID_IDENTIFIER",
            Defect::DuplicateIdentifier { .. } => "DUPLICATE_IDENTIFIER",
            Defect::MissingLicenseFields { .. } => "MISSING_LICENSE_FIELDS",
        }
    }
}

impl fmt::Display for Defect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Defect::DanglingReference {
                relationship,
                endpoint,
                spdx_id,
            } => write!(
                f,
                "relationship #{} {} '{}' does not resolve to a package",
                relationship,
                match endpoint {
                    Endpoint::Source => "source",
                    Endpoint::Target => "target",
                },
                spdx_id
            ),
            Defect::InvalidIdentifier {
                spdx_id,
                suggested,
                occurrences,
            } => write!(
                f,
                "'{}' is not a valid SPDX identifier ({} occurrence(s), suggested '{}')",
                spdx_id, occurrences, suggested
            ),
            Defect::DuplicateIdentifier { spdx_id, count } => {
                write!(f, "'{}' is used by {} packages", spdx_id, count)
            }
            Defect::MissingLicenseFields { spdx_id } => write!(
                f,
                "'{}' has neither licenseDeclared nor licenseConcluded",
                spdx_id
            ),
        }
    }
}

/// Per-kind defect counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefectCounts {
    pub dangling_references: usize,
    pub invalid_identifiers: usize,
    pub duplicate_identifiers: usize,
    pub missing_license_fields: usize,
}

/// Complete validator output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub status: RunStatus,
    pub package_count: usize,
    pub relationship_count: usize,
    pub counts: DefectCounts,
    pub defects: Vec<Defect>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.defects.is_empty()
    }

    pub fn has_structural_defects(&self) -> bool {
        self.defects.iter().any(Defect::is_structural)
    }

    pub fn structural_defects(&self) -> impl Iterator<Item = &Defect> {
        self.defects.iter().filter(|d| d.is_structural())
    }

    pub fn duplicates(&self) -> impl Iterator<Item = &Defect> {
        self.defects
            .iter()
            .filter(|d| matches!(d, Defect::DuplicateIdentifier { .. }))
    }

    /// Human-readable multi-line summary
    pub fn render_text(&self) -> String {
        let mut out = format!(
            "status: {}\npackages: {}\nrelationships: {}\ndangling references: {}\ninvalid identifiers: {}\nduplicate identifiers: {}\nmissing license fields: {}\n",
            self.status,
            self.package_count,
            self.relationship_count,
            self.counts.dangling_references,
            self.counts.invalid_identifiers,
            self.counts.duplicate_identifiers,
            self.counts.missing_license_fields,
        );
        for defect in &self.defects {
            out.push_str(&format!("  [{}] {}\n", defect.code(), defect));
        }
        out
    }
}

/// Validate a document without mutating it
pub fn validate(document: &Document) -> ValidationReport {
    let index = DocumentIndex::build(document);
    let mut defects = Vec::new();

    collect_duplicates(document, &mut defects);
    collect_invalid_identifiers(document, &mut defects);
    collect_missing_license_fields(document, &mut defects);
    collect_dangling_references(&index, &mut defects);

    let counts = count(&defects);
    let status = if counts.duplicate_identifiers > 0 {
        RunStatus::Fatal
    } else if defects.is_empty() {
        RunStatus::Clean
    } else {
        RunStatus::Advisory
    };

    debug!(
        status = %status,
        dangling = counts.dangling_references,
        invalid = counts.invalid_identifiers,
        duplicate = counts.duplicate_identifiers,
        missing_license = counts.missing_license_fields,
        "Validation complete"
    );

    ValidationReport {
        status,
        package_count: document.packages.len(),
        relationship_count: document.relationships.len(),
        counts,
        defects,
    }
}

fn collect_duplicates(document: &Document, defects: &mut Vec<Defect>) {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();
    for package in &document.packages {
        let count = counts.entry(package.spdx_id.as_str()).or_insert(0);
        if *count == 0 {
            order.push(&package.spdx_id);
        }
        *count += 1;
    }

    for spdx_id in order {
        let count = counts[spdx_id];
        if count > 1 {
            defects.push(Defect::DuplicateIdentifier {
                spdx_id: spdx_id.to_string(),
                count,
            });
        }
    }
}

fn collect_invalid_identifiers(document: &Document, defects: &mut Vec<Defect>) {
    let package_ids = document.packages.iter().map(|p| p.spdx_id.as_str());
    let endpoint_ids = document
        .relationships
        .iter()
        .flat_map(|r| [r.spdx_element_id.as_str(), r.related_spdx_element.as_str()]);

    let mut occurrences: HashMap<&str, usize> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();
    for spdx_id in package_ids.chain(endpoint_ids) {
        if spdx_id == document.spdx_id || is_valid_spdx_id(spdx_id) {
            continue;
        }
        let seen = occurrences.entry(spdx_id).or_insert(0);
        if *seen == 0 {
            order.push(spdx_id);
        }
        *seen += 1;
    }

    for spdx_id in order {
        defects.push(Defect::InvalidIdentifier {
            spdx_id: spdx_id.to_string(),
            suggested: normalize_spdx_id(spdx_id),
            occurrences: occurrences[spdx_id],
        });
    }
}

fn collect_missing_license_fields(document: &Document, defects: &mut Vec<Defect>) {
    let mut reported: HashSet<&str> = HashSet::new();
    for package in &document.packages {
        if package.lacks_license_fields() && reported.insert(&package.spdx_id) {
            defects.push(Defect::MissingLicenseFields {
                spdx_id: package.spdx_id.clone(),
            });
        }
    }
}

fn collect_dangling_references(index: &DocumentIndex<'_>, defects: &mut Vec<Defect>) {
    for (i, relationship) in index.document().relationships.iter().enumerate() {
        for endpoint in [Endpoint::Source, Endpoint::Target] {
            let spdx_id = endpoint.of(relationship);
            if !index.resolves(spdx_id) {
                defects.push(Defect::DanglingReference {
                    relationship: i,
                    endpoint,
                    spdx_id: spdx_id.to_string(),
                });
            }
        }
    }
}

fn count(defects: &[Defect]) -> DefectCounts {
    let mut counts = DefectCounts::default();
    for defect in defects {
        match defect {
            Defect::DanglingReference { .. } => counts.dangling_references += 1,
            Defect::InvalidIdentifier { .. } => counts.invalid_identifiers += 1,
            Defect::DuplicateIdentifier { .. } => counts.duplicate_identifiers += 1,
            Defect::MissingLicenseFields { .. } => counts.missing_license_fields += 1,
        }
    }
    counts
}
