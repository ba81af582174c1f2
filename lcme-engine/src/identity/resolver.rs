//! Identity Resolver
//!
//! Maps a scanner path fragment to exactly one document package, or to
//! nothing.
//!
//! # Matching policy
//! 1. **Exact**: the fragment key equals a candidate's `name-version` key,
//!    or equals a candidate's `name` key as is, or does so once trailing
//!    version segments are dropped one at a time (longest prefix first, so
//!    `crc-32` never falls through to `crc`). The first step with any hit
//!    decides: a unique hit is authoritative, several hits (same name,
//!    several versions) are ambiguous.
//! 2. **Fuzzy**: normalized Levenshtein similarity between the fragment key
//!    (or its best version-stripped form) and every candidate `name` key. The best candidate is
//!    accepted only if its score exceeds [`ACCEPT_THRESHOLD`] and no other
//!    candidate scores within [`MARGIN`] of it.
//!
//! Ambiguity always yields `NoMatch`; the resolver never guesses.

use crate::identity::external_id::ExternalId;
use crate::identity::normalize::{canonical_key, version_strip_steps};
use crate::model::{Document, Package};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Fuzzy matches must score strictly above this
pub const ACCEPT_THRESHOLD: f64 = 0.85;

/// Runner-up within this distance of the best score makes the match ambiguous
pub const MARGIN: f64 = 0.05;

/// Similarity of two canonical keys in [0, 1]
pub fn similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(a, b)
}

/// A package as seen by the resolver
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub spdx_id: String,
    pub name_key: String,
    pub name_version_key: Option<String>,
}

impl Candidate {
    /// Derive keys from the external identifier, falling back to
    /// `name`/`versionInfo`. Packages with neither are not candidates.
    pub fn from_package(package: &Package) -> Option<Self> {
        if let Some(id) = package
            .external_identifier
            .as_deref()
            .and_then(|raw| ExternalId::parse(raw).ok())
        {
            return Some(Self {
                spdx_id: package.spdx_id.clone(),
                name_key: id.name_key(),
                name_version_key: Some(id.name_version_key()),
            });
        }

        let name = package.name.as_deref().filter(|n| !n.trim().is_empty())?;
        Some(Self {
            spdx_id: package.spdx_id.clone(),
            name_key: canonical_key(name),
            name_version_key: package
                .version_info
                .as_deref()
                .map(|v| canonical_key(&format!("{}-{}", name, v))),
        })
    }
}

/// How a match was established
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    /// Fragment equals `name-version`
    Exact,
    /// Fragment equals `name`
    ExactName,
    /// Fragment minus its version equals `name`
    ExactUnversioned,
    Fuzzy,
}

/// Why no package was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoMatchReason {
    NoCandidates,
    BelowThreshold,
    Ambiguous,
}

/// Result of resolving one fragment
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Matched {
        spdx_id: String,
        kind: MatchKind,
        score: f64,
    },
    NoMatch {
        reason: NoMatchReason,
        best_score: f64,
    },
}

impl Resolution {
    pub fn spdx_id(&self) -> Option<&str> {
        match self {
            Resolution::Matched { spdx_id, .. } => Some(spdx_id),
            Resolution::NoMatch { .. } => None,
        }
    }
}

/// Resolves scanner fragments against a fixed candidate set
#[derive(Debug, Clone, Default)]
pub struct IdentityResolver {
    candidates: Vec<Candidate>,
}

impl IdentityResolver {
    pub fn new(candidates: Vec<Candidate>) -> Self {
        Self { candidates }
    }

    /// Every package of the document that has a usable name
    pub fn from_document(document: &Document) -> Self {
        Self::new(
            document
                .packages
                .iter()
                .filter_map(Candidate::from_package)
                .collect(),
        )
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn resolve(&self, fragment: &str) -> Resolution {
        let key = canonical_key(fragment);
        if key.is_empty() || self.candidates.is_empty() {
            return Resolution::NoMatch {
                reason: NoMatchReason::NoCandidates,
                best_score: 0.0,
            };
        }

        let mut name_keys = vec![key.clone()];
        name_keys.extend(version_strip_steps(&key));

        if let Some(resolution) = self.resolve_exact(&key, &name_keys) {
            debug!(fragment = %fragment, resolution = ?resolution, "Exact identity resolution");
            return resolution;
        }

        let resolution = self.resolve_fuzzy(&name_keys);
        debug!(fragment = %fragment, resolution = ?resolution, "Fuzzy identity resolution");
        resolution
    }

    /// `name_keys` is the fragment key followed by its version-stripped forms
    fn resolve_exact(&self, key: &str, name_keys: &[String]) -> Option<Resolution> {
        let versioned: Vec<&Candidate> = self
            .candidates
            .iter()
            .filter(|c| c.name_version_key.as_deref() == Some(key))
            .collect();
        if let Some(resolution) = Self::unique(&versioned, MatchKind::Exact) {
            return Some(resolution);
        }

        for (step, name_key) in name_keys.iter().enumerate() {
            let hits: Vec<&Candidate> = self
                .candidates
                .iter()
                .filter(|c| &c.name_key == name_key)
                .collect();
            let kind = if step == 0 {
                MatchKind::ExactName
            } else {
                MatchKind::ExactUnversioned
            };
            if let Some(resolution) = Self::unique(&hits, kind) {
                return Some(resolution);
            }
        }
        None
    }

    fn unique(hits: &[&Candidate], kind: MatchKind) -> Option<Resolution> {
        match hits {
            [] => None,
            [only] => Some(Resolution::Matched {
                spdx_id: only.spdx_id.clone(),
                kind,
                score: 1.0,
            }),
            _ => Some(Resolution::NoMatch {
                reason: NoMatchReason::Ambiguous,
                best_score: 1.0,
            }),
        }
    }

    fn resolve_fuzzy(&self, name_keys: &[String]) -> Resolution {
        let mut scored: Vec<(f64, &Candidate)> = self
            .candidates
            .iter()
            .map(|c| {
                let score = name_keys
                    .iter()
                    .map(|k| similarity(k, &c.name_key))
                    .fold(0.0, f64::max);
                (score, c)
            })
            .collect();
        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.1.spdx_id.cmp(&b.1.spdx_id))
        });

        let (best_score, best) = scored[0];
        if best_score <= ACCEPT_THRESHOLD {
            return Resolution::NoMatch {
                reason: NoMatchReason::BelowThreshold,
                best_score,
            };
        }

        let contested = scored
            .iter()
            .skip(1)
            .any(|(score, _)| best_score - score < MARGIN);
        if contested {
            return Resolution::NoMatch {
                reason: NoMatchReason::Ambiguous,
                best_score,
            };
        }

        Resolution::Matched {
            spdx_id: best.spdx_id.clone(),
            kind: MatchKind::Fuzzy,
            score: best_score,
        }
    }
}
