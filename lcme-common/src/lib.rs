//! # LCME Common Library
//!
//! Shared code for the License Curation & Merge Engine including:
//! - Error types
//! - Configuration loading (CLI → ENV → TOML → defaults)
//! - Atomic file writes, content fingerprints and single-writer locks
//! - Timestamp helpers

pub mod config;
pub mod error;
pub mod file_utils;
pub mod time;

pub use error::{Error, Result};
