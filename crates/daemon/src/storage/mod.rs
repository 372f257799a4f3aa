// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable state files: atomic JSON writes, the proxy snapshot, and
//! per-project scheduler mirrors.
//!
//! Persistence failures are logged and non-fatal - in-memory state is
//! authoritative and the next successful write reconciles the disk.

mod snapshot;
mod tasks;

pub use snapshot::{SnapshotProxy, StateStore, ProxySnapshot, SNAPSHOT_VERSION};
pub use tasks::TaskStore;

use std::io::Write;
use std::path::Path;
use thiserror::Error;

/// Errors from state persistence.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Write `value` as pretty JSON via tempfile + rename.
///
/// The tempfile lives in the target's directory so the rename never
/// crosses filesystems.
pub fn atomic_write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), StorageError> {
    let bytes = serde_json::to_vec_pretty(value)?;
    atomic_write(path, &bytes)
}

/// Write raw bytes via tempfile + rename + fsync.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;

    let tmp_name = format!(
        ".{}.tmp-{}",
        path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default(),
        std::process::id()
    );
    let tmp_path = dir.join(tmp_name);

    let mut file = std::fs::File::create(&tmp_path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    drop(file);

    if let Err(e) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e.into());
    }
    Ok(())
}

/// Load a JSON file, `None` when absent.
pub fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>, StorageError> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
