// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Proxy registry with component-wise fuzzy lookup.

use super::ProxyServer;
use crate::storage::SnapshotProxy;
use devtool_core::{DaemonError, ProxyId};
use devtool_wire::ProxySummary;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
pub struct ProxyManager {
    proxies: RwLock<HashMap<ProxyId, Arc<ProxyServer>>>,
}

impl ProxyManager {
    /// Register a proxy. The id must be free.
    pub fn insert(&self, proxy: Arc<ProxyServer>) -> Result<(), DaemonError> {
        let mut proxies = self.proxies.write();
        if proxies.contains_key(&proxy.id) {
            return Err(DaemonError::exists(format!("proxy {} already exists", proxy.id)));
        }
        proxies.insert(proxy.id.clone(), proxy);
        Ok(())
    }

    pub fn get(&self, id: &ProxyId) -> Option<Arc<ProxyServer>> {
        self.proxies.read().get(id).cloned()
    }

    pub fn contains(&self, id: &ProxyId) -> bool {
        self.proxies.read().contains_key(id)
    }

    pub fn remove(&self, id: &ProxyId) -> Option<Arc<ProxyServer>> {
        self.proxies.write().remove(id)
    }

    pub fn count(&self) -> usize {
        self.proxies.read().len()
    }

    /// Resolve a query to one proxy.
    ///
    /// Exact id matches bypass every filter. Otherwise the query is
    /// compared against each `:`-component; with a session path the
    /// candidates are first narrowed to that project, and only then is
    /// ambiguity judged.
    pub fn resolve(
        &self,
        query: &str,
        session_path: Option<&Path>,
    ) -> Result<Arc<ProxyServer>, DaemonError> {
        let proxies = self.proxies.read();

        if let Some(exact) = proxies.get(query) {
            return Ok(Arc::clone(exact));
        }

        let mut candidates: Vec<&Arc<ProxyServer>> =
            proxies.values().filter(|p| p.id.matches(query)).collect();

        if let Some(path) = session_path {
            candidates.retain(|p| p.project_path == path);
        }

        match candidates.len() {
            0 => Err(DaemonError::not_found(format!("no proxy matching {query:?}"))),
            1 => Ok(Arc::clone(candidates[0])),
            n => Err(DaemonError::ambiguous(format!("{query:?} matches {n} proxies"))),
        }
    }

    /// Summaries sorted by id.
    pub fn list(&self, path: Option<&Path>) -> Vec<ProxySummary> {
        let mut summaries: Vec<ProxySummary> = self
            .proxies
            .read()
            .values()
            .filter(|p| path.is_none_or(|d| p.project_path == d))
            .map(|p| p.summary())
            .collect();
        summaries.sort_by(|a, b| a.id.cmp(&b.id));
        summaries
    }

    /// All live proxies for a project path.
    pub fn by_project_path(&self, path: &Path) -> Vec<Arc<ProxyServer>> {
        self.proxies
            .read()
            .values()
            .filter(|p| p.project_path == path)
            .cloned()
            .collect()
    }

    /// Snapshot entries for persistence.
    pub fn snapshot_list(&self) -> Vec<SnapshotProxy> {
        let mut entries: Vec<SnapshotProxy> = self
            .proxies
            .read()
            .values()
            .map(|p| SnapshotProxy {
                id: p.id.to_string(),
                target_url: p.target_url.clone(),
                port: p.listen_addr().map(|a| a.port()).unwrap_or(0),
                max_log_size: p.max_log_size,
                path: p.project_path.clone(),
                created_at: p.created_at,
            })
            .collect();
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        entries
    }

    /// Stop every proxy in parallel, bounded by `timeout`.
    pub async fn stop_all(&self, timeout: Duration) {
        let proxies: Vec<Arc<ProxyServer>> = self.proxies.read().values().cloned().collect();
        let stops = proxies.into_iter().map(|p| async move {
            p.stop();
        });
        let _ = tokio::time::timeout(timeout, futures_util::future::join_all(stops)).await;
        self.proxies.write().clear();
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
