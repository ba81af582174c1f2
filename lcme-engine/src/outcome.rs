//! Per-operation result envelope
//!
//! Every pipeline stage returns `Result<Outcome<T>, EngineError>`:
//! - `Err(kind)`: fatal to this run
//! - `Outcome::Ok(value)`: completed, nothing to report
//! - `Outcome::PartialOk(value, warnings)`: completed with degraded coverage
//!
//! The caller decides whether a degraded result is acceptable.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Advisory finding attached to a completed operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    /// Stable code (e.g. `MISSING_LICENSE_FIELDS`, `EVIDENCE_UNREADABLE`)
    pub code: String,
    /// Human-readable message
    pub message: String,
}

impl Warning {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// Successful operation result, possibly degraded
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Ok(T),
    PartialOk(T, Vec<Warning>),
}

impl<T> Outcome<T> {
    /// Build `Ok` when `warnings` is empty, `PartialOk` otherwise
    pub fn with_warnings(value: T, warnings: Vec<Warning>) -> Self {
        if warnings.is_empty() {
            Outcome::Ok(value)
        } else {
            Outcome::PartialOk(value, warnings)
        }
    }

    pub fn value(&self) -> &T {
        match self {
            Outcome::Ok(value) | Outcome::PartialOk(value, _) => value,
        }
    }

    pub fn warnings(&self) -> &[Warning] {
        match self {
            Outcome::Ok(_) => &[],
            Outcome::PartialOk(_, warnings) => warnings,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Outcome::PartialOk(_, _))
    }

    pub fn status(&self) -> RunStatus {
        if self.is_degraded() {
            RunStatus::Advisory
        } else {
            RunStatus::Clean
        }
    }

    pub fn into_parts(self) -> (T, Vec<Warning>) {
        match self {
            Outcome::Ok(value) => (value, Vec::new()),
            Outcome::PartialOk(value, warnings) => (value, warnings),
        }
    }
}

/// Status stamped on every emitted report
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Nothing to report
    Clean,
    /// Completed; findings are advisory and the caller may continue
    Advisory,
    /// The run cannot produce a trustworthy output
    Fatal,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Clean => "clean",
            RunStatus::Advisory => "advisory",
            RunStatus::Fatal => "fatal",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
