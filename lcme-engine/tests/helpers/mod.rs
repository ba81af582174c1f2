//! Test Helper Utilities
//!
//! Document and evidence fixtures shared by the integration tests

#![allow(dead_code)]

use lcme_engine::model::{Document, Package, Relationship, NOASSERTION};
use std::fs;
use std::path::{Path, PathBuf};

pub const NAMESPACE: &str = "https://example.org/spdx/app-1.0";

/// Package with both license fields set to `NOASSERTION`
pub fn uncertain_package(spdx_id: &str, external_id: &str) -> Package {
    let mut package = Package::new(spdx_id);
    package.external_identifier = Some(external_id.to_string());
    package.license_declared = Some(NOASSERTION.to_string());
    package.license_concluded = Some(NOASSERTION.to_string());
    package
}

pub fn licensed_package(spdx_id: &str, name: &str, license: &str) -> Package {
    let mut package = Package::new(spdx_id);
    package.name = Some(name.to_string());
    package.license_declared = Some(license.to_string());
    package.license_concluded = Some(license.to_string());
    package
}

/// Root describing `SPDXRef-A`, which depends on `SPDXRef-ghost` (absent)
pub fn ghost_document() -> Document {
    let mut doc = Document::new(NAMESPACE);
    doc.packages.push(licensed_package("SPDXRef-A", "a", "MIT"));
    doc.relationships
        .push(Relationship::new("SPDXRef-DOCUMENT", "DESCRIBES", "SPDXRef-A"));
    doc.relationships
        .push(Relationship::new("SPDXRef-A", "DEPENDS_ON", "SPDXRef-ghost"));
    doc
}

/// Application depending on an uncertain `NPM::left-pad:1.3.0`
pub fn left_pad_document() -> Document {
    let mut doc = Document::new(NAMESPACE);
    doc.packages.push(licensed_package("SPDXRef-app", "app", "Apache-2.0"));
    doc.packages
        .push(uncertain_package("SPDXRef-left-pad", "NPM::left-pad:1.3.0"));
    doc.relationships
        .push(Relationship::new("SPDXRef-DOCUMENT", "DESCRIBES", "SPDXRef-app"));
    doc.relationships
        .push(Relationship::new("SPDXRef-app", "DEPENDS_ON", "SPDXRef-left-pad"));
    doc
}

/// Scanner output with one detection per `(path, expression, score)`
pub fn scan_json(detections: &[(&str, &str, f64)]) -> String {
    let files: Vec<serde_json::Value> = detections
        .iter()
        .map(|(path, expression, score)| {
            serde_json::json!({
                "path": path,
                "licenses": [{ "license_expression": expression, "score": score }],
            })
        })
        .collect();
    serde_json::to_string_pretty(&serde_json::json!({ "files": files }))
        .expect("scan fixture serializes")
}

/// Write one scanner output into `dir/<name>`
pub fn write_scan(dir: &Path, name: &str, detections: &[(&str, &str, f64)]) -> PathBuf {
    fs::create_dir_all(dir).expect("create evidence dir");
    let path = dir.join(name);
    fs::write(&path, scan_json(detections)).expect("write scan fixture");
    path
}

/// Evidence for the left-pad scenario: MIT at 95, Apache-2.0 at 40
pub fn write_left_pad_evidence(dir: &Path) -> PathBuf {
    write_scan(
        dir,
        "left-pad.json",
        &[
            ("left-pad/index.js", "MIT", 95.0),
            ("left-pad/index.js", "Apache-2.0", 40.0),
        ],
    )
}
