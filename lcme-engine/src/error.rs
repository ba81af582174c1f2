//! Error types for lcme-engine
//!
//! Fatal kinds abort the run and block output; advisory kinds are recorded
//! in reports and the run continues.

use thiserror::Error;

/// Engine error type
#[derive(Debug, Error)]
pub enum EngineError {
    /// Input graph is unparsable or lacks required top-level structure
    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    /// Duplicate or colliding SPDX identifiers that need manual resolution
    #[error("Unresolvable conflict: {0}")]
    UnresolvableConflict(String),

    /// Evidence could not be attributed to exactly one package
    #[error("No match for '{fragment}' (best score {best_score:.3})")]
    NoMatch { fragment: String, best_score: f64 },

    /// Ledger entry rejected at the ledger boundary
    #[error("Invalid ledger entry: {0}")]
    InvalidEntry(String),

    /// External package identifier does not follow TYPE:NAMESPACE:NAME:VERSION
    #[error("Invalid package identifier: {0}")]
    InvalidIdentifier(String),

    /// Encoding an artifact failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// lcme-common error
    #[error("Common error: {0}")]
    Common(#[from] lcme_common::Error),
}

impl EngineError {
    /// Whether this error must abort the run
    ///
    /// `NoMatch` is the only advisory kind: it is recorded as unresolved
    /// evidence and the merge continues.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, EngineError::NoMatch { .. })
    }

    /// Stable machine-readable code for reports and JSON output
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::MalformedDocument(_) => "MALFORMED_DOCUMENT",
            EngineError::UnresolvableConflict(_) => "UNRESOLVABLE_CONFLICT",
            EngineError::NoMatch { .. } => "NO_MATCH",
            EngineError::InvalidEntry(_) => "INVALID_ENTRY",
            EngineError::InvalidIdentifier(_) => "INVALID_IDENTIFIER",
            EngineError::Serialization(_) => "SERIALIZATION_ERROR",
            EngineError::Io(_) => "IO_ERROR",
            EngineError::Common(_) => "COMMON_ERROR",
        }
    }
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
