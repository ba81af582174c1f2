//! Scanner evidence loading
//!
//! Evidence is untrusted, lower-precision input: a directory of scanner JSON
//! files, each listing file paths with the license expressions detected in
//! them. Unreadable or malformed files are skipped with a warning; they never
//! abort a merge.

use crate::error::{EngineError, EngineResult};
use crate::outcome::{Outcome, Warning};
use lcme_common::file_utils::sha256_hex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Warning code for skipped evidence files
pub const EVIDENCE_UNREADABLE: &str = "EVIDENCE_UNREADABLE";

#[derive(Debug, Deserialize)]
struct ScanFile {
    #[serde(default)]
    files: Vec<ScannedPath>,
}

#[derive(Debug, Deserialize)]
struct ScannedPath {
    path: String,
    #[serde(default)]
    licenses: Vec<Detection>,
}

#[derive(Debug, Deserialize)]
struct Detection {
    license_expression: String,
    score: f64,
}

/// One license detection in one scanned file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceRecord {
    /// Scanned file path as the scanner reported it
    pub path: String,
    pub license_expression: String,
    /// Scanner confidence, nominally 0..=100
    pub score: f64,
}

/// Parsed content of one evidence file
#[derive(Debug, Clone, PartialEq)]
pub struct EvidenceFile {
    pub source: PathBuf,
    /// SHA-256 of the raw file
    pub fingerprint: String,
    pub records: Vec<EvidenceRecord>,
}

impl EvidenceFile {
    /// Parse one scanner output
    pub fn parse(source: &Path, bytes: &[u8]) -> EngineResult<Self> {
        let scan: ScanFile = serde_json::from_slice(bytes).map_err(|e| {
            EngineError::Serialization(format!("{}: {}", source.display(), e))
        })?;

        let records = scan
            .files
            .into_iter()
            .flat_map(|file| {
                let path = file.path;
                file.licenses.into_iter().map(move |d| EvidenceRecord {
                    path: path.clone(),
                    license_expression: d.license_expression,
                    score: d.score,
                })
            })
            .collect();

        Ok(Self {
            source: source.to_path_buf(),
            fingerprint: sha256_hex(bytes),
            records,
        })
    }

    /// Package fragment a record is attributed to
    ///
    /// First component of the record path; for single-component paths the
    /// evidence file's stem (scanners run once per package directory).
    pub fn prefix_of(&self, record: &EvidenceRecord) -> String {
        match first_of_nested(&record.path) {
            Some(first) => first.to_string(),
            None => self.stem().to_string(),
        }
    }

    /// Second choice for a nested record: the evidence file's stem
    ///
    /// A per-package scan lists paths relative to the package root, so
    /// `lib/index.js` in `left-pad.json` belongs to `left-pad`, not `lib`.
    pub fn fallback_of(&self, record: &EvidenceRecord) -> Option<String> {
        let first = first_of_nested(&record.path)?;
        let stem = self.stem();
        (!stem.is_empty() && stem != first).then(|| stem.to_string())
    }

    fn stem(&self) -> &str {
        self.source
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
    }
}

/// First component of a path with at least two components
fn first_of_nested(path: &str) -> Option<&str> {
    let mut components = Path::new(path).components().filter_map(|c| match c {
        Component::Normal(part) => part.to_str(),
        _ => None,
    });
    match (components.next(), components.next()) {
        (Some(first), Some(_)) => Some(first),
        _ => None,
    }
}

/// Every readable evidence file of a directory
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvidenceSet {
    pub files: Vec<EvidenceFile>,
}

/// Records sharing one path prefix
#[derive(Debug, Clone, PartialEq)]
pub struct EvidenceGroup {
    pub prefix: String,
    /// Evidence file stem to try when `prefix` attributes to nothing
    pub fallback: Option<String>,
    pub records: Vec<EvidenceRecord>,
}

impl EvidenceSet {
    pub fn record_count(&self) -> usize {
        self.files.iter().map(|f| f.records.len()).sum()
    }

    /// Group records by attributed prefix and fallback, ordered by both
    pub fn groups(&self) -> Vec<EvidenceGroup> {
        let mut grouped: BTreeMap<(String, Option<String>), Vec<EvidenceRecord>> = BTreeMap::new();
        for file in &self.files {
            for record in &file.records {
                grouped
                    .entry((file.prefix_of(record), file.fallback_of(record)))
                    .or_default()
                    .push(record.clone());
            }
        }
        grouped
            .into_iter()
            .filter(|((prefix, _), _)| !prefix.is_empty())
            .map(|((prefix, fallback), records)| EvidenceGroup {
                prefix,
                fallback,
                records,
            })
            .collect()
    }

    /// `(file, sha256)` pairs in load order
    pub fn fingerprints(&self) -> Vec<(String, String)> {
        self.files
            .iter()
            .map(|f| (f.source.display().to_string(), f.fingerprint.clone()))
            .collect()
    }
}

/// Load every `*.json` file under `dir`, in sorted path order
///
/// # Returns
/// `PartialOk` with one `EVIDENCE_UNREADABLE` warning per skipped file.
/// Fails only when `dir` itself is missing or not a directory.
pub fn load_dir(dir: &Path) -> EngineResult<Outcome<EvidenceSet>> {
    if !dir.is_dir() {
        return Err(EngineError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("evidence directory not found: {}", dir.display()),
        )));
    }

    let mut set = EvidenceSet::default();
    let mut warnings = Vec::new();

    let walker = WalkDir::new(dir)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Error accessing evidence entry");
                warnings.push(Warning::new(EVIDENCE_UNREADABLE, e.to_string()));
                continue;
            }
        };

        let path = entry.path();
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        if !entry.file_type().is_file() || !is_json {
            continue;
        }

        let parsed = std::fs::read(path)
            .map_err(EngineError::from)
            .and_then(|bytes| EvidenceFile::parse(path, &bytes));
        match parsed {
            Ok(file) => {
                debug!(file = %path.display(), records = file.records.len(), "Loaded evidence file");
                set.files.push(file);
            }
            Err(e) => {
                warn!(file = %path.display(), error = %e, "Skipping unreadable evidence file");
                warnings.push(Warning::new(
                    EVIDENCE_UNREADABLE,
                    format!("{}: {}", path.display(), e),
                ));
            }
        }
    }

    debug!(
        dir = %dir.display(),
        files = set.files.len(),
        records = set.record_count(),
        skipped = warnings.len(),
        "Evidence directory loaded"
    );
    Ok(Outcome::with_warnings(set, warnings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const LEFT_PAD_SCAN: &str = r#"{
        "headers": [{"tool_name": "scancode"}],
        "files": [
            {"path": "left-pad-1.3.0/index.js", "licenses": [
                {"license_expression": "MIT", "score": 95.0, "matched_rule": "mit_1"}
            ]},
            {"path": "left-pad-1.3.0/LICENSE", "licenses": [
                {"license_expression": "MIT", "score": 100.0}
            ]},
            {"path": "left-pad-1.3.0/README.md", "licenses": []}
        ]
    }"#;

    #[test]
    fn test_parse_ignores_unknown_fields() {
        let file = EvidenceFile::parse(Path::new("scan.json"), LEFT_PAD_SCAN.as_bytes()).unwrap();
        assert_eq!(file.records.len(), 2);
        assert_eq!(file.records[0].license_expression, "MIT");
        assert_eq!(file.fingerprint.len(), 64);
    }

    #[test]
    fn test_prefix_first_component_or_file_stem() {
        let file = EvidenceFile {
            source: PathBuf::from("/evidence/lodash-4.17.21.json"),
            fingerprint: String::new(),
            records: Vec::new(),
        };
        let nested = EvidenceRecord {
            path: "./left-pad-1.3.0/lib/index.js".into(),
            license_expression: "MIT".into(),
            score: 90.0,
        };
        let flat = EvidenceRecord {
            path: "LICENSE".into(),
            ..nested.clone()
        };
        assert_eq!(file.prefix_of(&nested), "left-pad-1.3.0");
        assert_eq!(file.prefix_of(&flat), "lodash-4.17.21");
        assert_eq!(file.fallback_of(&nested).as_deref(), Some("lodash-4.17.21"));
        assert_eq!(file.fallback_of(&flat), None);
    }

    #[test]
    fn test_per_package_file_groups_keep_stem_fallback() {
        let scan = r#"{"files": [
            {"path": "lib/index.js", "licenses": [{"license_expression": "MIT", "score": 90}]},
            {"path": "package.json", "licenses": [{"license_expression": "MIT", "score": 95}]}
        ]}"#;
        let file = EvidenceFile::parse(Path::new("/scans/left-pad.json"), scan.as_bytes()).unwrap();
        let groups = EvidenceSet { files: vec![file] }.groups();

        let keys: Vec<_> = groups
            .iter()
            .map(|g| (g.prefix.as_str(), g.fallback.as_deref()))
            .collect();
        assert_eq!(keys, vec![("left-pad", None), ("lib", Some("left-pad"))]);
    }

    #[test]
    fn test_load_dir_skips_malformed_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a-left-pad.json"), LEFT_PAD_SCAN).unwrap();
        fs::write(dir.path().join("b-broken.json"), "{ not json").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let outcome = load_dir(dir.path()).unwrap();
        assert!(outcome.is_degraded());
        assert_eq!(outcome.warnings()[0].code, EVIDENCE_UNREADABLE);
        assert_eq!(outcome.value().files.len(), 1);
        assert_eq!(outcome.value().record_count(), 2);
    }

    #[test]
    fn test_load_dir_walks_subdirectories_in_order() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("z.json"), LEFT_PAD_SCAN).unwrap();
        fs::write(dir.path().join("a.json"), r#"{"files": []}"#).unwrap();

        let outcome = load_dir(dir.path()).unwrap();
        assert!(!outcome.is_degraded());
        let sources: Vec<_> = outcome
            .value()
            .files
            .iter()
            .map(|f| f.source.file_name().unwrap().to_owned())
            .collect();
        assert_eq!(sources, vec!["a.json", "z.json"]);
    }

    #[test]
    fn test_groups_by_prefix() {
        let file = EvidenceFile::parse(Path::new("scan.json"), LEFT_PAD_SCAN.as_bytes()).unwrap();
        let set = EvidenceSet { files: vec![file] };
        let groups = set.groups();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].prefix, "left-pad-1.3.0");
        assert_eq!(groups[0].fallback.as_deref(), Some("scan"));
        assert_eq!(groups[0].records.len(), 2);
    }

    #[test]
    fn test_missing_dir_is_error() {
        let dir = TempDir::new().unwrap();
        assert!(load_dir(&dir.path().join("absent")).is_err());
    }
}
