//! Identity Resolver
//!
//! Normalizes package names coming from three naming conventions (analyzer
//! ids, scanner path fragments, curation keys) and decides whether two of
//! them denote the same package.

pub mod external_id;
pub mod normalize;
pub mod resolver;

pub use external_id::{normalize_identifier, ExternalId, KNOWN_ECOSYSTEMS};
pub use normalize::{canonical_key, strip_version_suffix, version_strip_steps};
pub use resolver::{
    similarity, Candidate, IdentityResolver, MatchKind, NoMatchReason, Resolution,
    ACCEPT_THRESHOLD, MARGIN,
};
