//! Interchangeable YAML / JSON codecs for [`Document`]
//!
//! The rest of the engine never looks at the wire format: it calls
//! [`load`] / [`serialize`] with a [`Format`] and gets a typed document.

use crate::error::{EngineError, EngineResult};
use crate::model::document::Document;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Encoding of an input or output document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Yaml,
    Json,
}

impl Format {
    /// Detect from file extension (`.yml`, `.yaml`, `.json`)
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "yml" | "yaml" => Some(Format::Yaml),
            "json" => Some(Format::Json),
            _ => None,
        }
    }

    /// Explicit format, else the one implied by the file extension
    pub fn resolve(path: &Path, explicit: Option<Format>) -> EngineResult<Self> {
        explicit.or_else(|| Self::from_path(path)).ok_or_else(|| {
            EngineError::MalformedDocument(format!(
                "cannot infer format of {} (use .json, .yml or .yaml, or pass --format)",
                path.display()
            ))
        })
    }

    pub fn codec(self) -> &'static dyn DocumentCodec {
        match self {
            Format::Yaml => &YamlCodec,
            Format::Json => &JsonCodec,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Yaml => "yaml",
            Format::Json => "json",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Ok(Format::Yaml),
            "json" => Ok(Format::Json),
            other => Err(format!("unknown format '{}' (expected yaml or json)", other)),
        }
    }
}

/// Decode/encode capability of a wire format
pub trait DocumentCodec: Send + Sync {
    fn format(&self) -> Format;

    /// Parse raw bytes into a document (structure is checked by [`load`])
    fn decode(&self, bytes: &[u8]) -> EngineResult<Document>;

    fn encode(&self, document: &Document) -> EngineResult<Vec<u8>>;
}

/// SPDX JSON
pub struct JsonCodec;

impl DocumentCodec for JsonCodec {
    fn format(&self) -> Format {
        Format::Json
    }

    fn decode(&self, bytes: &[u8]) -> EngineResult<Document> {
        serde_json::from_slice(bytes)
            .map_err(|e| EngineError::MalformedDocument(format!("JSON decode failed: {}", e)))
    }

    fn encode(&self, document: &Document) -> EngineResult<Vec<u8>> {
        let mut bytes = serde_json::to_vec_pretty(document)
            .map_err(|e| EngineError::Serialization(format!("JSON encode failed: {}", e)))?;
        bytes.push(b'\n');
        Ok(bytes)
    }
}

/// SPDX YAML
pub struct YamlCodec;

impl DocumentCodec for YamlCodec {
    fn format(&self) -> Format {
        Format::Yaml
    }

    fn decode(&self, bytes: &[u8]) -> EngineResult<Document> {
        serde_yaml::from_slice(bytes)
            .map_err(|e| EngineError::MalformedDocument(format!("YAML decode failed: {}", e)))
    }

    fn encode(&self, document: &Document) -> EngineResult<Vec<u8>> {
        serde_yaml::to_string(document)
            .map(String::into_bytes)
            .map_err(|e| EngineError::Serialization(format!("YAML encode failed: {}", e)))
    }
}

/// Decode and check required top-level structure
///
/// Fails with `MalformedDocument` when `packages`, `relationships` or
/// `documentNamespace` are absent, unparsable, or the namespace is blank.
pub fn load(bytes: &[u8], format: Format) -> EngineResult<Document> {
    let document = format.codec().decode(bytes)?;

    if document.document_namespace.trim().is_empty() {
        return Err(EngineError::MalformedDocument(
            "documentNamespace is empty".to_string(),
        ));
    }

    tracing::debug!(
        format = %format,
        packages = document.packages.len(),
        relationships = document.relationships.len(),
        "Loaded document"
    );

    Ok(document)
}

/// Encode a document; `load(serialize(d)) == d`
pub fn serialize(document: &Document, format: Format) -> EngineResult<Vec<u8>> {
    format.codec().encode(document)
}

/// Read and load a document, detecting the format from the extension
/// unless one is given
pub fn load_file(path: &Path, format: Option<Format>) -> EngineResult<(Document, Format)> {
    let format = Format::resolve(path, format)?;
    let bytes = std::fs::read(path)?;
    let document = load(&bytes, format)?;
    Ok((document, format))
}

/// Serialize and write a document atomically
pub fn save_file(document: &Document, path: &Path, format: Format) -> EngineResult<()> {
    let bytes = serialize(document, format)?;
    lcme_common::file_utils::write_atomic(path, &bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::document::{Package, Relationship};

    const MINIMAL_JSON: &str = r#"{
        "spdxVersion": "SPDX-2.2",
        "SPDXID": "SPDXRef-DOCUMENT",
        "name": "demo",
        "documentNamespace": "https://example.org/demo",
        "creationInfo": {"created": "2024-01-01T00:00:00Z", "creators": ["Tool: ort"]},
        "packages": [
            {
                "SPDXID": "SPDXRef-Package-NPM-left-pad-1.3.0",
                "name": "left-pad",
                "versionInfo": "1.3.0",
                "externalIdentifier": "NPM::left-pad:1.3.0",
                "licenseDeclared": "NOASSERTION",
                "licenseConcluded": "NOASSERTION",
                "downloadLocation": "https://registry.npmjs.org/left-pad/-/left-pad-1.3.0.tgz"
            }
        ],
        "relationships": [
            {"spdxElementId": "SPDXRef-DOCUMENT", "relationshipType": "DESCRIBES",
             "relatedSpdxElement": "SPDXRef-Package-NPM-left-pad-1.3.0"}
        ]
    }"#;

    const MINIMAL_YAML: &str = "\
spdxVersion: SPDX-2.2
SPDXID: SPDXRef-DOCUMENT
documentNamespace: https://example.org/demo
packages:
  - SPDXID: SPDXRef-a
    licenseDeclared: MIT
relationships: []
";

    fn sample() -> Document {
        let mut doc = Document::new("https://example.org/sample");
        let mut pkg = Package::new("SPDXRef-a");
        pkg.license_declared = Some("MIT".into());
        pkg.extra.insert("downloadLocation".into(), serde_json::json!("NONE"));
        doc.packages.push(pkg);
        doc.relationships
            .push(Relationship::new("SPDXRef-DOCUMENT", "DESCRIBES", "SPDXRef-a"));
        doc
    }

    #[test]
    fn test_load_json_keeps_unknown_fields() {
        let doc = load(MINIMAL_JSON.as_bytes(), Format::Json).unwrap();
        assert_eq!(doc.packages.len(), 1);
        let pkg = &doc.packages[0];
        assert_eq!(pkg.external_identifier.as_deref(), Some("NPM::left-pad:1.3.0"));
        assert!(pkg.extra.contains_key("downloadLocation"));
        assert!(doc.creation_info.is_some());
    }

    #[test]
    fn test_load_yaml() {
        let doc = load(MINIMAL_YAML.as_bytes(), Format::Yaml).unwrap();
        assert_eq!(doc.spdx_id, "SPDXRef-DOCUMENT");
        assert_eq!(doc.packages[0].license_declared.as_deref(), Some("MIT"));
        assert!(doc.relationships.is_empty());
    }

    #[test]
    fn test_missing_packages_is_malformed() {
        let raw = r#"{"documentNamespace": "x", "relationships": []}"#;
        let err = load(raw.as_bytes(), Format::Json).unwrap_err();
        assert!(matches!(err, EngineError::MalformedDocument(_)));
    }

    #[test]
    fn test_missing_relationships_is_malformed() {
        let raw = "documentNamespace: x\npackages: []\n";
        let err = load(raw.as_bytes(), Format::Yaml).unwrap_err();
        assert!(matches!(err, EngineError::MalformedDocument(_)));
    }

    #[test]
    fn test_blank_namespace_is_malformed() {
        let raw = r#"{"documentNamespace": "  ", "packages": [], "relationships": []}"#;
        let err = load(raw.as_bytes(), Format::Json).unwrap_err();
        assert!(matches!(err, EngineError::MalformedDocument(_)));
    }

    #[test]
    fn test_garbage_is_malformed() {
        let err = load(b"{not json", Format::Json).unwrap_err();
        assert!(matches!(err, EngineError::MalformedDocument(_)));
    }

    #[test]
    fn test_round_trip_json_and_yaml() {
        let doc = sample();
        for format in [Format::Json, Format::Yaml] {
            let bytes = serialize(&doc, format).unwrap();
            let back = load(&bytes, format).unwrap();
            assert_eq!(back, doc, "round trip through {format} changed the document");
        }
    }

    #[test]
    fn test_cross_format_conversion() {
        let from_json = load(MINIMAL_JSON.as_bytes(), Format::Json).unwrap();
        let yaml = serialize(&from_json, Format::Yaml).unwrap();
        let from_yaml = load(&yaml, Format::Yaml).unwrap();
        assert_eq!(from_yaml, from_json);
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(Format::from_path(Path::new("bom.spdx.yml")), Some(Format::Yaml));
        assert_eq!(Format::from_path(Path::new("bom.YAML")), Some(Format::Yaml));
        assert_eq!(Format::from_path(Path::new("bom.spdx.json")), Some(Format::Json));
        assert_eq!(Format::from_path(Path::new("bom.txt")), None);
        assert_eq!("yml".parse::<Format>(), Ok(Format::Yaml));
        assert!("xml".parse::<Format>().is_err());
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("out.spdx.yml");
        save_file(&sample(), &path, Format::Yaml).unwrap();
        let (doc, format) = load_file(&path, None).unwrap();
        assert_eq!(format, Format::Yaml);
        assert_eq!(doc, sample());
    }
}
