//! SPDX document graph: packages, relationships, document metadata
//!
//! Field names follow SPDX 2.x JSON/YAML. Unknown fields are kept in
//! `extra` maps so a load/serialize cycle does not drop analyzer data.

use crate::model::spdx_id::DEFAULT_DOCUMENT_ID;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// SPDX sentinel: no claim made
pub const NOASSERTION: &str = "NOASSERTION";

/// Opaque passthrough fields
pub type ExtraFields = BTreeMap<String, serde_json::Value>;

/// Package node
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    #[serde(rename = "SPDXID")]
    pub spdx_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_info: Option<String>,

    /// External package identifier (`TYPE:NAMESPACE:NAME:VERSION`)
    #[serde(default, alias = "id", skip_serializing_if = "Option::is_none")]
    pub external_identifier: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_declared: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_concluded: Option<String>,

    /// Provenance of the concluded license
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_comments: Option<String>,

    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl Package {
    /// Minimal package with only an identifier
    pub fn new(spdx_id: impl Into<String>) -> Self {
        Self {
            spdx_id: spdx_id.into(),
            ..Self::default()
        }
    }

    /// Both license fields structurally absent (not merely `NOASSERTION`)
    pub fn lacks_license_fields(&self) -> bool {
        self.license_declared.is_none() && self.license_concluded.is_none()
    }

    /// Label for logs and reports: external id, then name, then SPDX id
    pub fn display_name(&self) -> &str {
        self.external_identifier
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or(&self.spdx_id)
    }
}

/// Directed edge between two SPDX elements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    pub spdx_element_id: String,
    pub relationship_type: String,
    pub related_spdx_element: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl Relationship {
    pub fn new(
        source: impl Into<String>,
        relationship_type: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            spdx_element_id: source.into(),
            relationship_type: relationship_type.into(),
            related_spdx_element: target.into(),
            comment: None,
        }
    }
}

/// Which end of a relationship
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endpoint {
    Source,
    Target,
}

impl Endpoint {
    pub fn of<'a>(&self, relationship: &'a Relationship) -> &'a str {
        match self {
            Endpoint::Source => &relationship.spdx_element_id,
            Endpoint::Target => &relationship.related_spdx_element,
        }
    }
}

fn default_spdx_version() -> String {
    "SPDX-2.3".to_string()
}

fn default_document_id() -> String {
    DEFAULT_DOCUMENT_ID.to_string()
}

/// Bill-of-materials document
///
/// `documentNamespace`, `packages` and `relationships` are required; the
/// codecs reject input without them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(default = "default_spdx_version")]
    pub spdx_version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_license: Option<String>,

    #[serde(rename = "SPDXID", default = "default_document_id")]
    pub spdx_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    pub document_namespace: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_info: Option<serde_json::Value>,

    pub packages: Vec<Package>,

    pub relationships: Vec<Relationship>,

    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl Document {
    /// Empty document with the given namespace
    pub fn new(document_namespace: impl Into<String>) -> Self {
        Self {
            spdx_version: default_spdx_version(),
            data_license: Some("CC0-1.0".to_string()),
            spdx_id: default_document_id(),
            name: None,
            document_namespace: document_namespace.into(),
            creation_info: None,
            packages: Vec::new(),
            relationships: Vec::new(),
            extra: ExtraFields::new(),
        }
    }

    /// Linear lookup; use [`crate::model::DocumentIndex`] for repeated queries
    pub fn package(&self, spdx_id: &str) -> Option<&Package> {
        self.packages.iter().find(|p| p.spdx_id == spdx_id)
    }

    pub fn package_mut(&mut self, spdx_id: &str) -> Option<&mut Package> {
        self.packages.iter_mut().find(|p| p.spdx_id == spdx_id)
    }
}
