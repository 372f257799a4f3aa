// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Proxy snapshot for restart recovery.
//!
//! Updated on every proxy create/stop and overlay-endpoint change.
//! On startup, each persisted proxy is recreated; entries that fail to
//! listen are dropped with a logged error.

use super::{atomic_write_json, load_json, StorageError};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Current snapshot schema version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// One persisted proxy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotProxy {
    pub id: String,
    pub target_url: String,
    /// Listener port at the time of the snapshot; re-used on restore.
    pub port: u16,
    pub max_log_size: usize,
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
}

/// Version-tagged snapshot file contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxySnapshot {
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlay_endpoint: Option<String>,
    #[serde(default)]
    pub proxies: Vec<SnapshotProxy>,
    pub updated_at: DateTime<Utc>,
}

/// Guards the {in-memory snapshot, disk write} pair with one mutex.
pub struct StateStore {
    path: PathBuf,
    current: Mutex<ProxySnapshot>,
}

impl StateStore {
    /// Open the store, loading the existing snapshot when present.
    pub fn open(path: PathBuf) -> Self {
        let current = match load_json::<ProxySnapshot>(&path) {
            Ok(Some(snapshot)) if snapshot.version == SNAPSHOT_VERSION => snapshot,
            Ok(Some(snapshot)) => {
                warn!(version = snapshot.version, "ignoring snapshot with unknown version");
                ProxySnapshot::empty()
            }
            Ok(None) => ProxySnapshot::empty(),
            Err(e) => {
                warn!(error = %e, path = %path.display(), "failed to load snapshot, starting empty");
                ProxySnapshot::empty()
            }
        };
        Self { path, current: Mutex::new(current) }
    }

    /// Proxies recorded by the previous daemon.
    pub fn restore_list(&self) -> Vec<SnapshotProxy> {
        self.current.lock().proxies.clone()
    }

    /// Overlay endpoint recorded by the previous daemon.
    pub fn restore_overlay(&self) -> Option<String> {
        self.current.lock().overlay_endpoint.clone()
    }

    /// Replace the proxy list and write through.
    pub fn save_proxies(&self, proxies: Vec<SnapshotProxy>, now: DateTime<Utc>) {
        let mut current = self.current.lock();
        current.proxies = proxies;
        current.updated_at = now;
        self.write_locked(&current);
    }

    /// Replace the overlay endpoint and write through.
    pub fn save_overlay(&self, endpoint: Option<String>, now: DateTime<Utc>) {
        let mut current = self.current.lock();
        current.overlay_endpoint = endpoint;
        current.updated_at = now;
        self.write_locked(&current);
    }

    fn write_locked(&self, snapshot: &ProxySnapshot) {
        let started = std::time::Instant::now();
        if let Err(e) = atomic_write_json(&self.path, snapshot) {
            warn!(error = %e, path = %self.path.display(), "snapshot write failed");
        }
        let deadline = crate::env::persist_timeout();
        if started.elapsed() > deadline {
            warn!(
                elapsed_ms = started.elapsed().as_millis() as u64,
                "snapshot write exceeded its deadline"
            );
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ProxySnapshot {
    fn empty() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            overlay_endpoint: None,
            proxies: Vec::new(),
            updated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
