//! Uncertainty Extractor
//!
//! Lists packages whose license attribution is uncertain: neither the
//! concluded nor the declared license carries a real expression. The report
//! is a view recomputed on demand and never stored on the document.
//!
//! Exports are deterministic (no timestamps) so they diff cleanly between
//! runs.

use crate::error::{EngineError, EngineResult};
use crate::identity::ExternalId;
use crate::model::{Document, Package};
use lcme_common::file_utils::write_atomic;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

/// License values that make no claim
pub const UNCERTAIN_VALUES: &[&str] = &["NOASSERTION", "UNKNOWN", "NONE", ""];

/// Ecosystem label for packages without a parsable external identifier
pub const UNKNOWN_ECOSYSTEM: &str = "unknown";

pub const ID_LIST_FILE: &str = "uncertain-packages.txt";
pub const JSON_FILE: &str = "uncertain-packages.json";
pub const CSV_FILE: &str = "uncertain-packages.csv";
pub const MARKDOWN_FILE: &str = "uncertain-packages-report.md";
pub const STATS_FILE: &str = "uncertain-stats.txt";

/// Absent, empty or a no-claim sentinel (case-insensitive, trimmed)
pub fn is_uncertain_value(value: Option<&str>) -> bool {
    match value {
        None => true,
        Some(raw) => {
            let trimmed = raw.trim();
            UNCERTAIN_VALUES
                .iter()
                .any(|sentinel| trimmed.eq_ignore_ascii_case(sentinel))
        }
    }
}

/// Both license fields make no claim
pub fn is_uncertain(package: &Package) -> bool {
    is_uncertain_value(package.license_concluded.as_deref())
        && is_uncertain_value(package.license_declared.as_deref())
}

/// Uncertain package with its identifier decomposed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UncertainPackage {
    pub spdx_id: String,
    pub external_id: Option<String>,
    pub ecosystem: String,
    pub name: Option<String>,
    pub version: Option<String>,
    pub license_declared: Option<String>,
    pub license_concluded: Option<String>,
}

impl UncertainPackage {
    fn from_package(package: &Package) -> Self {
        let parsed = package
            .external_identifier
            .as_deref()
            .and_then(|raw| ExternalId::parse(raw).ok());

        let (ecosystem, name, version) = match parsed {
            Some(id) => (id.ecosystem, Some(id.name), Some(id.version)),
            None => (
                UNKNOWN_ECOSYSTEM.to_string(),
                package.name.clone(),
                package.version_info.clone(),
            ),
        };

        Self {
            spdx_id: package.spdx_id.clone(),
            external_id: package.external_identifier.clone(),
            ecosystem,
            name,
            version,
            license_declared: package.license_declared.clone(),
            license_concluded: package.license_concluded.clone(),
        }
    }

    /// External identifier when known, SPDX id otherwise
    pub fn label(&self) -> &str {
        self.external_id.as_deref().unwrap_or(&self.spdx_id)
    }
}

/// Uncertain packages of one document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UncertaintyReport {
    pub total_packages: usize,
    pub uncertain_count: usize,
    /// uncertain / total, 0 for an empty document
    pub uncertain_ratio: f64,
    pub by_ecosystem: BTreeMap<String, usize>,
    pub packages: Vec<UncertainPackage>,
}

impl UncertaintyReport {
    pub fn from_document(document: &Document) -> Self {
        let packages: Vec<UncertainPackage> = document
            .packages
            .iter()
            .filter(|p| is_uncertain(p))
            .map(UncertainPackage::from_package)
            .collect();

        let mut by_ecosystem = BTreeMap::new();
        for package in &packages {
            *by_ecosystem.entry(package.ecosystem.clone()).or_insert(0) += 1;
        }

        let total_packages = document.packages.len();
        let uncertain_ratio = if total_packages == 0 {
            0.0
        } else {
            packages.len() as f64 / total_packages as f64
        };

        Self {
            total_packages,
            uncertain_count: packages.len(),
            uncertain_ratio,
            by_ecosystem,
            packages,
        }
    }

    pub fn confident_count(&self) -> usize {
        self.total_packages - self.uncertain_count
    }

    /// One identifier per line (external id when known)
    pub fn to_id_list(&self) -> String {
        self.packages
            .iter()
            .map(|p| format!("{}\n", p.label()))
            .collect()
    }

    pub fn to_json(&self) -> EngineResult<String> {
        serde_json::to_string_pretty(self)
            .map(|json| json + "\n")
            .map_err(|e| EngineError::Serialization(format!("uncertainty report: {}", e)))
    }

    pub fn to_csv(&self) -> String {
        let mut out = String::from(
            "spdx_id,external_id,ecosystem,name,version,license_declared,license_concluded\n",
        );
        for p in &self.packages {
            let row = [
                Some(p.spdx_id.as_str()),
                p.external_id.as_deref(),
                Some(p.ecosystem.as_str()),
                p.name.as_deref(),
                p.version.as_deref(),
                p.license_declared.as_deref(),
                p.license_concluded.as_deref(),
            ];
            let fields: Vec<String> = row.iter().map(|f| csv_field(f.unwrap_or(""))).collect();
            out.push_str(&fields.join(","));
            out.push('\n');
        }
        out
    }

    pub fn to_markdown(&self) -> String {
        let mut out = String::from("# Uncertain License Report\n\n");
        out.push_str("| Metric | Value |\n|---|---|\n");
        out.push_str(&format!("| Total packages | {} |\n", self.total_packages));
        out.push_str(&format!("| Uncertain packages | {} |\n", self.uncertain_count));
        out.push_str(&format!(
            "| Uncertain ratio | {:.1}% |\n",
            self.uncertain_ratio * 100.0
        ));

        if self.packages.is_empty() {
            out.push_str("\nEvery package carries a license claim.\n");
            return out;
        }

        for (ecosystem, count) in &self.by_ecosystem {
            out.push_str(&format!("\n## {} ({})\n\n", ecosystem, count));
            out.push_str("| Package | Version | Declared | Concluded |\n|---|---|---|---|\n");
            for p in self.packages.iter().filter(|p| &p.ecosystem == ecosystem) {
                out.push_str(&format!(
                    "| {} | {} | {} | {} |\n",
                    md_cell(p.name.as_deref().unwrap_or(&p.spdx_id)),
                    md_cell(p.version.as_deref().unwrap_or("")),
                    md_cell(p.license_declared.as_deref().unwrap_or("(absent)")),
                    md_cell(p.license_concluded.as_deref().unwrap_or("(absent)")),
                ));
            }
        }
        out
    }

    pub fn to_stats(&self) -> String {
        let mut out = String::from("Uncertain License Statistics\n");
        out.push_str(&"=".repeat(50));
        out.push_str("\n\n");
        out.push_str(&format!("Total packages: {}\n", self.total_packages));
        out.push_str(&format!("Confident packages: {}\n", self.confident_count()));
        out.push_str(&format!("Uncertain packages: {}\n", self.uncertain_count));
        out.push_str(&format!(
            "Uncertain ratio: {:.1}%\n",
            self.uncertain_ratio * 100.0
        ));
        if !self.by_ecosystem.is_empty() {
            out.push_str("\nBy ecosystem:\n");
            for (ecosystem, count) in &self.by_ecosystem {
                out.push_str(&format!("  {}: {}\n", ecosystem, count));
            }
        }
        out
    }

    /// Write every export into `dir`, returning the written paths
    pub fn write_exports(&self, dir: &Path) -> EngineResult<Vec<PathBuf>> {
        let exports = [
            (ID_LIST_FILE, self.to_id_list()),
            (JSON_FILE, self.to_json()?),
            (CSV_FILE, self.to_csv()),
            (MARKDOWN_FILE, self.to_markdown()),
            (STATS_FILE, self.to_stats()),
        ];

        let mut written = Vec::with_capacity(exports.len());
        for (name, contents) in exports {
            let path = dir.join(name);
            write_atomic(&path, contents.as_bytes())?;
            written.push(path);
        }

        info!(
            dir = %dir.display(),
            uncertain = self.uncertain_count,
            total = self.total_packages,
            "Wrote uncertainty exports"
        );
        Ok(written)
    }
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn md_cell(value: &str) -> String {
    value.replace('|', "\\|")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NOASSERTION;
    use tempfile::TempDir;

    fn package(id: &str, ext: Option<&str>, declared: Option<&str>, concluded: Option<&str>) -> Package {
        let mut p = Package::new(id);
        p.external_identifier = ext.map(str::to_string);
        p.license_declared = declared.map(str::to_string);
        p.license_concluded = concluded.map(str::to_string);
        p
    }

    fn sample() -> Document {
        let mut doc = Document::new("https://example.org/uncertain");
        doc.packages.push(package(
            "SPDXRef-left-pad",
            Some("NPM::left-pad:1.3.0"),
            Some(NOASSERTION),
            Some(NOASSERTION),
        ));
        doc.packages.push(package(
            "SPDXRef-lodash",
            Some("NPM::lodash:4.17.21"),
            Some("MIT"),
            Some(NOASSERTION),
        ));
        doc.packages.push(package(
            "SPDXRef-coverage",
            Some("PyPI::coverage:7.2.0"),
            Some(" unknown "),
            None,
        ));
        doc.packages.push(package("SPDXRef-bare", None, None, None));
        doc
    }

    #[test]
    fn test_is_uncertain_requires_both_fields() {
        assert!(is_uncertain(&package("SPDXRef-a", None, None, None)));
        assert!(is_uncertain(&package("SPDXRef-a", None, Some("none"), Some(""))));
        assert!(!is_uncertain(&package("SPDXRef-a", None, Some("MIT"), Some(NOASSERTION))));
        assert!(!is_uncertain(&package("SPDXRef-a", None, None, Some("Apache-2.0"))));
    }

    #[test]
    fn test_report_groups_by_ecosystem() {
        let report = UncertaintyReport::from_document(&sample());
        assert_eq!(report.total_packages, 4);
        assert_eq!(report.uncertain_count, 3);
        assert_eq!(report.confident_count(), 1);
        assert_eq!(report.by_ecosystem.get("NPM"), Some(&1));
        assert_eq!(report.by_ecosystem.get("PyPI"), Some(&1));
        assert_eq!(report.by_ecosystem.get(UNKNOWN_ECOSYSTEM), Some(&1));
        assert!((report.uncertain_ratio - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_document_ratio_is_zero() {
        let report = UncertaintyReport::from_document(&Document::new("https://example.org/e"));
        assert_eq!(report.uncertain_ratio, 0.0);
        assert!(report.to_id_list().is_empty());
    }

    #[test]
    fn test_id_list_prefers_external_id() {
        let list = UncertaintyReport::from_document(&sample()).to_id_list();
        assert_eq!(list, "NPM::left-pad:1.3.0\nPyPI::coverage:7.2.0\nSPDXRef-bare\n");
    }

    #[test]
    fn test_csv_escapes_fields() {
        let mut doc = Document::new("https://example.org/csv");
        let mut p = package("SPDXRef-x", None, Some("NOASSERTION"), None);
        p.name = Some("odd, \"name\"".into());
        doc.packages.push(p);

        let csv = UncertaintyReport::from_document(&doc).to_csv();
        let row = csv.lines().nth(1).unwrap();
        assert_eq!(row, "SPDXRef-x,,unknown,\"odd, \"\"name\"\"\",,NOASSERTION,");
    }

    #[test]
    fn test_stats_and_markdown_mention_counts() {
        let report = UncertaintyReport::from_document(&sample());
        let stats = report.to_stats();
        assert!(stats.contains("Uncertain packages: 3"));
        assert!(stats.contains("Uncertain ratio: 75.0%"));
        let md = report.to_markdown();
        assert!(md.contains("## NPM (1)"));
        assert!(md.contains("| left-pad | 1.3.0 |"));
    }

    #[test]
    fn test_write_exports_creates_all_files() {
        let dir = TempDir::new().unwrap();
        let written = UncertaintyReport::from_document(&sample())
            .write_exports(dir.path())
            .unwrap();
        assert_eq!(written.len(), 5);
        for name in [ID_LIST_FILE, JSON_FILE, CSV_FILE, MARKDOWN_FILE, STATS_FILE] {
            assert!(dir.path().join(name).exists(), "{name} missing");
        }
    }

    #[test]
    fn test_exports_are_deterministic() {
        let a = UncertaintyReport::from_document(&sample());
        let b = UncertaintyReport::from_document(&sample());
        assert_eq!(a.to_json().unwrap(), b.to_json().unwrap());
        assert_eq!(a.to_markdown(), b.to_markdown());
    }
}
