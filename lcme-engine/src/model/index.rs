//! Lookup tables over a borrowed document
//!
//! Built in one pass; rebuild after mutating the document. On duplicate SPDX
//! identifiers the first package wins (duplicates are reported by the
//! validator, never silently resolved).

use crate::identity::normalize_identifier;
use crate::model::document::{Document, Package};
use std::collections::HashMap;

/// O(1) package lookups
#[derive(Debug)]
pub struct DocumentIndex<'a> {
    document: &'a Document,
    by_spdx_id: HashMap<&'a str, usize>,
    by_external_id: HashMap<String, Vec<usize>>,
}

impl<'a> DocumentIndex<'a> {
    pub fn build(document: &'a Document) -> Self {
        let mut by_spdx_id = HashMap::with_capacity(document.packages.len());
        let mut by_external_id: HashMap<String, Vec<usize>> =
            HashMap::with_capacity(document.packages.len());

        for (i, package) in document.packages.iter().enumerate() {
            by_spdx_id.entry(package.spdx_id.as_str()).or_insert(i);
            if let Some(raw) = &package.external_identifier {
                by_external_id.entry(external_key(raw)).or_default().push(i);
            }
        }

        Self {
            document,
            by_spdx_id,
            by_external_id,
        }
    }

    pub fn document(&self) -> &'a Document {
        self.document
    }

    pub fn package(&self, spdx_id: &str) -> Option<&'a Package> {
        self.by_spdx_id
            .get(spdx_id)
            .map(|&i| &self.document.packages[i])
    }

    /// Positions in `document.packages` of every package carrying the
    /// external identifier (case- and separator-insensitive), in document order
    pub fn external_id_positions(&self, raw: &str) -> &[usize] {
        self.by_external_id
            .get(&external_key(raw))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// True when `spdx_id` names a package or the document itself
    pub fn resolves(&self, spdx_id: &str) -> bool {
        spdx_id == self.document.spdx_id || self.by_spdx_id.contains_key(spdx_id)
    }
}

fn external_key(raw: &str) -> String {
    normalize_identifier(raw).unwrap_or_else(|_| raw.trim().to_lowercase())
}
