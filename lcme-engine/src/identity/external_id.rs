//! External package identifiers (`TYPE:NAMESPACE:NAME:VERSION`)
//!
//! The namespace may be empty (`NPM::lodash:4.17.21`) and the name may itself
//! contain `:`; the version is always the last segment.

use crate::error::{EngineError, EngineResult};
use crate::identity::normalize::canonical_key;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Package managers the upstream analyzer is known to emit (lowercase)
pub const KNOWN_ECOSYSTEMS: &[&str] = &[
    "bower", "bundler", "cargo", "carthage", "cocoapods", "composer", "conan", "crate", "gem",
    "go", "godep", "gomod", "gradle", "hackage", "maven", "npm", "nuget", "pnpm", "pub", "pypi",
    "sbt", "spdxdocumentfile", "spm", "stack", "swift", "unmanaged", "yarn",
];

/// Parsed external identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExternalId {
    pub ecosystem: String,
    pub namespace: String,
    pub name: String,
    pub version: String,
}

impl ExternalId {
    /// Split `TYPE:NAMESPACE:NAME:VERSION`
    pub fn parse(raw: &str) -> EngineResult<Self> {
        let trimmed = raw.trim();
        let parts: Vec<&str> = trimmed.split(':').collect();
        if parts.len() < 4 {
            return Err(EngineError::InvalidIdentifier(format!(
                "'{}' does not follow TYPE:NAMESPACE:NAME:VERSION",
                trimmed
            )));
        }

        let ecosystem = parts[0].trim();
        let namespace = parts[1].trim();
        let name = parts[2..parts.len() - 1].join(":");
        let version = parts[parts.len() - 1].trim();

        if ecosystem.is_empty() {
            return Err(EngineError::InvalidIdentifier(format!(
                "'{}' has an empty package type",
                trimmed
            )));
        }
        if name.trim().is_empty() {
            return Err(EngineError::InvalidIdentifier(format!(
                "'{}' has an empty package name",
                trimmed
            )));
        }
        if version.is_empty() {
            return Err(EngineError::InvalidIdentifier(format!(
                "'{}' has an empty version",
                trimmed
            )));
        }

        Ok(Self {
            ecosystem: ecosystem.to_string(),
            namespace: namespace.to_string(),
            name: name.trim().to_string(),
            version: version.to_string(),
        })
    }

    /// Case- and separator-normalized form, used as the lookup key
    pub fn normalized(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.ecosystem.to_lowercase(),
            canonical_key(&self.namespace),
            canonical_key(&self.name),
            canonical_key(&self.version)
        )
    }

    /// Canonical key of the bare name
    pub fn name_key(&self) -> String {
        canonical_key(&self.name)
    }

    /// Canonical key of `name-version`, the shape scanner directories use
    pub fn name_version_key(&self) -> String {
        canonical_key(&format!("{}-{}", self.name, self.version))
    }

    pub fn is_known_ecosystem(&self) -> bool {
        KNOWN_ECOSYSTEMS.contains(&self.ecosystem.to_lowercase().as_str())
    }
}

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.ecosystem, self.namespace, self.name, self.version
        )
    }
}

/// Normalize an external identifier for exact-match lookups
///
/// Idempotent; fails with `InvalidIdentifier` on malformed input.
pub fn normalize_identifier(raw: &str) -> EngineResult<String> {
    ExternalId::parse(raw).map(|id| id.normalized())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_empty_namespace() {
        let id = ExternalId::parse("NPM::lodash:4.17.21").unwrap();
        assert_eq!(id.ecosystem, "NPM");
        assert_eq!(id.namespace, "");
        assert_eq!(id.name, "lodash");
        assert_eq!(id.version, "4.17.21");
        assert_eq!(id.to_string(), "NPM::lodash:4.17.21");
    }

    #[test]
    fn test_parse_maven() {
        let id = ExternalId::parse("Maven:org.apache.commons:commons-lang3:3.12.0").unwrap();
        assert_eq!(id.namespace, "org.apache.commons");
        assert_eq!(id.name, "commons-lang3");
        assert!(id.is_known_ecosystem());
    }

    #[test]
    fn test_name_may_contain_colons() {
        let id = ExternalId::parse("Unmanaged::weird:name:1.0").unwrap();
        assert_eq!(id.name, "weird:name");
        assert_eq!(id.version, "1.0");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for raw in ["lodash", "NPM:lodash:1.0", ":ns:name:1.0", "NPM:::1.0", "NPM::name:", ""] {
            assert!(
                matches!(ExternalId::parse(raw), Err(EngineError::InvalidIdentifier(_))),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn test_normalized_is_case_and_separator_insensitive() {
        let a = normalize_identifier("PyPI::coverage.toml:7.2.0").unwrap();
        let b = normalize_identifier("pypi::Coverage_TOML:7-2-0").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, "pypi::coverage-toml:7-2-0");
    }

    #[test]
    fn test_normalize_identifier_idempotent() {
        for raw in [
            "NPM::left-pad:1.3.0",
            "Maven:org.apache:commons_io:2.11.0",
            "Unmanaged::weird:Name:1.0",
        ] {
            let once = normalize_identifier(raw).unwrap();
            assert_eq!(normalize_identifier(&once).unwrap(), once);
        }
    }

    #[test]
    fn test_keys() {
        let id = ExternalId::parse("NPM::left-pad:1.3.0").unwrap();
        assert_eq!(id.name_key(), "left-pad");
        assert_eq!(id.name_version_key(), "left-pad-1-3-0");
    }

    #[test]
    fn test_unknown_ecosystem() {
        let id = ExternalId::parse("Floppy::thing:1.0").unwrap();
        assert!(!id.is_known_ecosystem());
    }
}
