//! Fixer
//!
//! Repairs the structural defects found by the validator so the document
//! satisfies referential integrity. Works on a private copy and replaces the
//! caller's document only when the repaired copy re-validates without
//! dangling, invalid or duplicate defects.
//!
//! # Repair order
//! 1. Duplicate identifiers: refused (`UnresolvableConflict`)
//! 2. Invalid identifiers: rewritten together with every relationship endpoint
//! 3. Dangling references: pruned or stubbed, per [`RepairMode`]
//! 4. Missing license fields: not repaired, reported as warnings

use crate::error::{EngineError, EngineResult};
use crate::model::{slug_of, Document, DocumentIndex, Endpoint, Package, Relationship, NOASSERTION};
use crate::outcome::{Outcome, Warning};
use crate::validator::{validate, Defect, ValidationReport};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

/// Prefix of the `licenseComments` written on synthesized packages
pub const STUB_COMMENT_PREFIX: &str = "Auto-generated placeholder for dangling reference";

/// How dangling references are repaired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RepairMode {
    /// Remove the relationship
    Prune,
    /// Keep the relationship and synthesize the missing package
    Stub,
}

impl RepairMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepairMode::Prune => "prune",
            RepairMode::Stub => "stub",
        }
    }
}

impl fmt::Display for RepairMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RepairMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "prune" => Ok(RepairMode::Prune),
            "stub" => Ok(RepairMode::Stub),
            other => Err(format!("unknown repair mode '{}' (expected prune or stub)", other)),
        }
    }
}

/// One identifier rewrite
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdRewrite {
    pub from: String,
    pub to: String,
}

/// What the fixer changed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixReport {
    pub mode: RepairMode,
    pub rewrites: Vec<IdRewrite>,
    pub removed_relationships: Vec<Relationship>,
    pub stubs: Vec<String>,
}

impl FixReport {
    fn new(mode: RepairMode) -> Self {
        Self {
            mode,
            rewrites: Vec::new(),
            removed_relationships: Vec::new(),
            stubs: Vec::new(),
        }
    }

    /// No change was necessary
    pub fn is_noop(&self) -> bool {
        self.rewrites.is_empty() && self.removed_relationships.is_empty() && self.stubs.is_empty()
    }

    pub fn render_text(&self) -> String {
        let mut out = format!(
            "mode: {}\nidentifiers rewritten: {}\nrelationships removed: {}\nstub packages created: {}\n",
            self.mode,
            self.rewrites.len(),
            self.removed_relationships.len(),
            self.stubs.len()
        );
        for rewrite in &self.rewrites {
            out.push_str(&format!("  rewrite {} -> {}\n", rewrite.from, rewrite.to));
        }
        for rel in &self.removed_relationships {
            out.push_str(&format!(
                "  removed {} {} {}\n",
                rel.spdx_element_id, rel.relationship_type, rel.related_spdx_element
            ));
        }
        for stub in &self.stubs {
            out.push_str(&format!("  stub {}\n", stub));
        }
        out
    }
}

/// Placeholder package for an identifier nothing defines
pub fn stub_package(spdx_id: &str) -> Package {
    let mut package = Package::new(spdx_id);
    package.name = Some(slug_of(spdx_id).to_string());
    package.license_concluded = Some(NOASSERTION.to_string());
    package.license_declared = Some(NOASSERTION.to_string());
    package.license_comments = Some(format!("{} {}", STUB_COMMENT_PREFIX, spdx_id));
    package
}

/// Structural repair pass
#[derive(Debug, Clone, Copy)]
pub struct Fixer {
    mode: RepairMode,
}

impl Fixer {
    pub fn new(mode: RepairMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> RepairMode {
        self.mode
    }

    /// Repair `document` according to `report`
    ///
    /// # Arguments
    /// * `document` - Replaced only if the whole repair succeeds
    /// * `report` - Validator output for `document`
    ///
    /// # Returns
    /// `PartialOk` when packages still lack license fields, `Ok` otherwise.
    /// `UnresolvableConflict` on duplicate identifiers, colliding rewrites, or
    /// a repair that does not re-validate; `document` is untouched then.
    pub fn apply(
        &self,
        document: &mut Document,
        report: &ValidationReport,
    ) -> EngineResult<Outcome<FixReport>> {
        let duplicates: Vec<String> = report
            .duplicates()
            .map(|d| d.to_string())
            .collect();
        if !duplicates.is_empty() {
            return Err(EngineError::UnresolvableConflict(format!(
                "duplicate identifiers need manual resolution: {}",
                duplicates.join("; ")
            )));
        }

        let mut work = document.clone();
        let mut fix = FixReport::new(self.mode);

        fix.rewrites = rewrite_identifiers(&mut work, report)?;

        match self.mode {
            RepairMode::Prune => fix.removed_relationships = prune_dangling(&mut work),
            RepairMode::Stub => fix.stubs = stub_dangling(&mut work),
        }

        let after = validate(&work);
        let remaining: Vec<String> = after.structural_defects().map(|d| d.to_string()).collect();
        if !remaining.is_empty() {
            return Err(EngineError::UnresolvableConflict(format!(
                "repair did not converge: {}",
                remaining.join("; ")
            )));
        }

        let warnings: Vec<Warning> = after
            .defects
            .iter()
            .filter(|d| matches!(d, Defect::MissingLicenseFields { .. }))
            .map(|d| Warning::new(d.code(), d.to_string()))
            .collect();

        info!(
            mode = %self.mode,
            rewrites = fix.rewrites.len(),
            removed = fix.removed_relationships.len(),
            stubs = fix.stubs.len(),
            warnings = warnings.len(),
            "Structural repair complete"
        );

        *document = work;
        Ok(Outcome::with_warnings(fix, warnings))
    }
}

/// Validate then repair in one call
pub fn fix(document: &mut Document, mode: RepairMode) -> EngineResult<Outcome<FixReport>> {
    let report = validate(document);
    Fixer::new(mode).apply(document, &report)
}

/// Rewrite every invalid identifier; fails if two packages end up sharing one
fn rewrite_identifiers(
    work: &mut Document,
    report: &ValidationReport,
) -> EngineResult<Vec<IdRewrite>> {
    let mut mapping: HashMap<String, String> = HashMap::new();
    let mut rewrites = Vec::new();
    for defect in &report.defects {
        if let Defect::InvalidIdentifier {
            spdx_id, suggested, ..
        } = defect
        {
            if mapping.insert(spdx_id.clone(), suggested.clone()).is_none() {
                rewrites.push(IdRewrite {
                    from: spdx_id.clone(),
                    to: suggested.clone(),
                });
            }
        }
    }
    if mapping.is_empty() {
        return Ok(rewrites);
    }

    // Final package id -> original ids that map onto it
    let mut owners: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for package in &work.packages {
        let original = package.spdx_id.as_str();
        let target = mapping.get(original).map(String::as_str).unwrap_or(original);
        owners.entry(target).or_default().push(original);
    }
    let collisions: Vec<String> = owners
        .iter()
        .filter(|(_, sources)| sources.len() > 1)
        .map(|(target, sources)| format!("{} <- {}", target, sources.join(", ")))
        .collect();
    if !collisions.is_empty() {
        return Err(EngineError::UnresolvableConflict(format!(
            "identifier rewrite collides: {}",
            collisions.join("; ")
        )));
    }

    for package in &mut work.packages {
        if let Some(target) = mapping.get(&package.spdx_id) {
            package.spdx_id = target.clone();
        }
    }
    for rel in &mut work.relationships {
        if let Some(target) = mapping.get(&rel.spdx_element_id) {
            rel.spdx_element_id = target.clone();
        }
        if let Some(target) = mapping.get(&rel.related_spdx_element) {
            rel.related_spdx_element = target.clone();
        }
    }

    for rewrite in &rewrites {
        debug!(from = %rewrite.from, to = %rewrite.to, "Rewrote SPDX identifier");
    }
    Ok(rewrites)
}

fn dangling_positions(work: &Document) -> Vec<(usize, Vec<String>)> {
    let index = DocumentIndex::build(work);
    work.relationships
        .iter()
        .enumerate()
        .filter_map(|(i, rel)| {
            let missing: Vec<String> = [Endpoint::Source, Endpoint::Target]
                .iter()
                .map(|e| e.of(rel))
                .filter(|id| !index.resolves(id))
                .map(str::to_string)
                .collect();
            (!missing.is_empty()).then_some((i, missing))
        })
        .collect()
}

fn prune_dangling(work: &mut Document) -> Vec<Relationship> {
    let doomed: HashSet<usize> = dangling_positions(work).into_iter().map(|(i, _)| i).collect();
    if doomed.is_empty() {
        return Vec::new();
    }

    let mut removed = Vec::with_capacity(doomed.len());
    let mut kept = Vec::with_capacity(work.relationships.len() - doomed.len());
    for (i, rel) in std::mem::take(&mut work.relationships).into_iter().enumerate() {
        if doomed.contains(&i) {
            debug!(
                source = %rel.spdx_element_id,
                target = %rel.related_spdx_element,
                "Pruned dangling relationship"
            );
            removed.push(rel);
        } else {
            kept.push(rel);
        }
    }
    work.relationships = kept;
    removed
}

fn stub_dangling(work: &mut Document) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut stubs = Vec::new();
    for (_, missing) in dangling_positions(work) {
        for spdx_id in missing {
            if seen.insert(spdx_id.clone()) {
                stubs.push(spdx_id);
            }
        }
    }

    for spdx_id in &stubs {
        debug!(spdx_id = %spdx_id, "Synthesized stub package");
        work.packages.push(stub_package(spdx_id));
    }
    stubs
}
