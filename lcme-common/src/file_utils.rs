//! File helpers shared by the engine and the CLI
//!
//! - Atomic writes (temp file + rename) so an output is either fully
//!   rewritten or left untouched
//! - SHA-256 content fingerprints for audit reports
//! - A lock file guarding single-writer stores (the curation ledger)

use crate::{Error, Result};
use sha2::{Digest, Sha256};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Write `contents` to `path` atomically
///
/// The data is written to `<path>.tmp`, flushed, then renamed over the
/// target. Parent directories are created when missing.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let temp_path = temp_path_for(path);
    {
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(contents)?;
        file.sync_all()?;
    }

    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(Error::Io(e));
    }

    debug!(path = %path.display(), bytes = contents.len(), "Wrote file atomically");
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Lowercase hex SHA-256 of a byte slice
pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Exclusive lock held for the lifetime of the guard
///
/// Acquired by creating `<path>.lock` with `create_new`; a second writer
/// fails immediately with [`Error::Locked`] instead of waiting. The lock file
/// is removed when the guard is dropped.
#[derive(Debug)]
pub struct FileLock {
    lock_path: PathBuf,
}

impl FileLock {
    /// Acquire the lock guarding `path`
    pub fn acquire(path: &Path) -> Result<Self> {
        let mut name = path
            .file_name()
            .map(|n| n.to_os_string())
            .ok_or_else(|| Error::InvalidInput(format!("Not a file path: {}", path.display())))?;
        name.push(".lock");
        let lock_path = path.with_file_name(name);

        if let Some(parent) = lock_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        match OpenOptions::new().write(true).create_new(true).open(&lock_path) {
            Ok(mut file) => {
                let _ = writeln!(file, "{}", std::process::id());
                debug!(lock = %lock_path.display(), "Acquired lock");
                Ok(Self { lock_path })
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Err(Error::Locked(format!(
                "{} is held by another writer (remove it if that process is gone)",
                lock_path.display()
            ))),
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Path of the lock file
    pub fn path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.lock_path) {
            warn!(lock = %self.lock_path.display(), error = %e, "Failed to release lock");
        }
    }
}
