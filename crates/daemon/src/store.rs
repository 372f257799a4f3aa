// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon key-value store backing the `STORE` verbs.
//!
//! A flat string→JSON map shared by all clients, persisted through the
//! storage layer so values survive daemon restarts.

use crate::storage::{atomic_write_json, load_json};
use chrono::{DateTime, Utc};
use devtool_core::DaemonError;
use devtool_wire::StoreEntry;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::warn;

pub struct KvStore {
    path: Option<PathBuf>,
    entries: Mutex<BTreeMap<String, StoreEntry>>,
}

impl KvStore {
    /// In-memory store (tests).
    pub fn ephemeral() -> Self {
        Self { path: None, entries: Mutex::new(BTreeMap::new()) }
    }

    /// Open a persisted store, loading existing entries when present.
    pub fn open(path: PathBuf) -> Self {
        let entries = match load_json::<Vec<StoreEntry>>(&path) {
            Ok(Some(loaded)) => loaded.into_iter().map(|e| (e.key.clone(), e)).collect(),
            Ok(None) => BTreeMap::new(),
            Err(e) => {
                warn!(error = %e, path = %path.display(), "unreadable store file, starting empty");
                BTreeMap::new()
            }
        };
        Self { path: Some(path), entries: Mutex::new(entries) }
    }

    pub fn get(&self, key: &str) -> Result<StoreEntry, DaemonError> {
        self.entries
            .lock()
            .get(key)
            .cloned()
            .ok_or_else(|| DaemonError::not_found(format!("no store key {key:?}")))
    }

    pub fn set(&self, key: String, value: serde_json::Value, now: DateTime<Utc>) {
        {
            let mut entries = self.entries.lock();
            entries.insert(key.clone(), StoreEntry { key, value, updated_at: now });
        }
        self.persist();
    }

    pub fn delete(&self, key: &str) -> Result<(), DaemonError> {
        let removed = self.entries.lock().remove(key);
        if removed.is_none() {
            return Err(DaemonError::not_found(format!("no store key {key:?}")));
        }
        self.persist();
        Ok(())
    }

    /// Sorted key list.
    pub fn keys(&self) -> Vec<String> {
        self.entries.lock().keys().cloned().collect()
    }

    /// Every entry, sorted by key.
    pub fn all(&self) -> Vec<StoreEntry> {
        self.entries.lock().values().cloned().collect()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
        self.persist();
    }

    fn persist(&self) {
        let Some(path) = &self.path else { return };
        let entries: Vec<StoreEntry> = self.entries.lock().values().cloned().collect();
        if let Err(e) = atomic_write_json(path, &entries) {
            warn!(error = %e, "store write failed");
        }
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
