//! lcme-engine library interface
//!
//! SPDX bill-of-materials integrity checks and multi-source license merge.
//! The `lcme` binary is a thin CLI over these modules; integration tests
//! drive them directly.

pub mod error;
pub mod evidence;
pub mod fixer;
pub mod identity;
pub mod ledger;
pub mod license_expr;
pub mod merge;
pub mod model;
pub mod outcome;
pub mod pipeline;
pub mod uncertainty;
pub mod validator;

pub use crate::error::{EngineError, EngineResult};
pub use crate::fixer::{fix, FixReport, Fixer, RepairMode};
pub use crate::ledger::{CurationEntry, CurationLedger};
pub use crate::merge::{MergeEngine, MergeReport, HIGH_CONFIDENCE_SCORE};
pub use crate::model::{Document, Format, Package, Relationship};
pub use crate::outcome::{Outcome, RunStatus, Warning};
pub use crate::uncertainty::UncertaintyReport;
pub use crate::validator::{validate, Defect, ValidationReport};
