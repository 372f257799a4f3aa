// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine: the single consumer of the event bus, owning all proxy
//! wiring.
//!
//! Script↔proxy relationships are two keyed maps - `script → [proxy
//! id]` here and `id → proxy` in the manager - so neither side owns the
//! other.

use crate::adapters::ProjectConfigSource;
use crate::event_bus::EventReader;
use crate::overlay::OverlayEndpoint;
use crate::proxy::{ProxyManager, ProxyOptions, ProxyServer, DEFAULT_MAX_LOG_SIZE};
use crate::session::SessionRegistry;
use crate::storage::StateStore;
use devtool_core::{
    compose_proxy_id, split_script_id, Clock, DaemonError, Event, ProxyConfigEntry, ProxyId,
    ScriptId,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Auto-created proxies per script.
pub const MAX_PROXIES_PER_SCRIPT: usize = 5;

pub struct Engine<C: Clock> {
    clock: C,
    manager: Arc<ProxyManager>,
    sessions: Arc<SessionRegistry<C>>,
    config: Arc<dyn ProjectConfigSource>,
    overlay: Arc<OverlayEndpoint>,
    state: Option<Arc<StateStore>>,
    assoc: RwLock<HashMap<ScriptId, Vec<ProxyId>>>,
}

impl<C: Clock> Engine<C> {
    pub fn new(
        clock: C,
        manager: Arc<ProxyManager>,
        sessions: Arc<SessionRegistry<C>>,
        config: Arc<dyn ProjectConfigSource>,
        overlay: Arc<OverlayEndpoint>,
        state: Option<Arc<StateStore>>,
    ) -> Self {
        Self {
            clock,
            manager,
            sessions,
            config,
            overlay,
            state,
            assoc: RwLock::new(HashMap::new()),
        }
    }

    pub fn manager(&self) -> &Arc<ProxyManager> {
        &self.manager
    }

    /// Consume bus events until cancellation.
    pub async fn run(self: Arc<Self>, mut reader: EventReader, token: CancellationToken) {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                event = reader.recv() => {
                    match event {
                        Some(event) => self.handle_event(event).await,
                        None => break,
                    }
                }
            }
        }
    }

    pub async fn handle_event(&self, event: Event) {
        info!(event = %event.log_summary(), "engine event");
        match event {
            Event::UrlDetected { script_id, url, path } => {
                self.handle_url_detected(&script_id, &url, &path).await;
            }
            Event::ExplicitStart { proxy_id, config, path } => {
                let id = (!proxy_id.is_empty()).then(|| ProxyId::new(proxy_id));
                if let Err(e) = self.start_from_config(id, &config, &path).await {
                    warn!(error = %e, "explicit proxy start failed");
                }
            }
            Event::ScriptStopped { script_id } => {
                self.handle_script_stopped(&script_id).await;
            }
        }
    }

    /// `URLDetected` → create the configured proxies for that script.
    async fn handle_url_detected(&self, script_id: &ScriptId, url: &str, path: &Path) {
        let Some((_, logical_name)) = split_script_id(script_id) else {
            warn!(script = %script_id, "unqualified script id, skipping auto-proxy");
            return;
        };

        let config = match self.config.load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "config load failed");
                return;
            }
        };

        let entries: Vec<ProxyConfigEntry> = config
            .proxies
            .into_iter()
            .filter(|p| p.script.as_deref() == Some(logical_name))
            .collect();

        for entry in entries {
            let id = match compose_proxy_id(path, &entry.name, url) {
                Ok(id) => id,
                Err(e) => {
                    warn!(url, error = %e, "cannot derive proxy id");
                    continue;
                }
            };
            if self.manager.contains(&id) {
                continue;
            }
            if self.assoc.read().get(script_id).map(Vec::len).unwrap_or(0)
                >= MAX_PROXIES_PER_SCRIPT
            {
                warn!(script = %script_id, "proxy cap reached, skipping {id}");
                continue;
            }

            match self
                .create_proxy(
                    id.clone(),
                    url.to_string(),
                    path.to_path_buf(),
                    entry.max_log_size.unwrap_or(DEFAULT_MAX_LOG_SIZE),
                    entry.listen_port,
                )
                .await
            {
                Ok(_) => {
                    self.assoc.write().entry(script_id.clone()).or_default().push(id);
                }
                Err(e) => warn!(proxy = %id, error = %e, "auto-proxy creation failed"),
            }
        }
    }

    /// `ScriptStopped` → stop every proxy recorded for that script.
    async fn handle_script_stopped(&self, script_id: &ScriptId) {
        let ids = self.assoc.write().remove(script_id).unwrap_or_default();
        for id in ids {
            if let Some(proxy) = self.manager.remove(&id) {
                proxy.stop();
                info!(proxy = %id, script = %script_id, "stopped proxy for ended script");
            }
        }
        self.persist_snapshot();
    }

    /// Explicit start: derive the target from the config entry
    /// (url > port > target) and create the proxy.
    pub async fn start_from_config(
        &self,
        id: Option<ProxyId>,
        entry: &ProxyConfigEntry,
        path: &Path,
    ) -> Result<Arc<ProxyServer>, DaemonError> {
        let (target_url, warning) = entry.resolve_target_url()?;
        if let Some(warning) = warning {
            warn!(%warning, "proxy target precedence applied");
        }

        let id = match id {
            Some(id) => id,
            None => compose_proxy_id(path, &entry.name, &target_url)?,
        };

        self.create_proxy(
            id,
            target_url,
            path.to_path_buf(),
            entry.max_log_size.unwrap_or(DEFAULT_MAX_LOG_SIZE),
            entry.listen_port,
        )
        .await
    }

    /// Create, start, register, persist.
    pub async fn create_proxy(
        &self,
        id: ProxyId,
        target_url: String,
        project_path: PathBuf,
        max_log_size: usize,
        listen_port: Option<u16>,
    ) -> Result<Arc<ProxyServer>, DaemonError> {
        if self.manager.contains(&id) {
            return Err(DaemonError::exists(format!("proxy {id} already exists")));
        }

        let overlay_socket = self
            .sessions
            .find_by_path(&project_path)
            .map(|s| s.overlay_socket)
            .or_else(|| self.overlay.get());

        let proxy = ProxyServer::new(ProxyOptions {
            id,
            target_url,
            project_path,
            max_log_size,
            overlay_socket,
        })?;
        proxy.start(listen_port).await?;
        self.manager.insert(Arc::clone(&proxy))?;
        self.persist_snapshot();
        Ok(proxy)
    }

    /// Stop one proxy by resolved reference.
    pub fn stop_proxy(&self, proxy: &Arc<ProxyServer>) {
        proxy.stop();
        self.manager.remove(&proxy.id);
        let mut assoc = self.assoc.write();
        for ids in assoc.values_mut() {
            ids.retain(|id| id != &proxy.id);
        }
        drop(assoc);
        self.persist_snapshot();
    }

    /// Restart a proxy in place: same id, same target, fresh listener.
    pub async fn restart_proxy(
        &self,
        proxy: &Arc<ProxyServer>,
    ) -> Result<Arc<ProxyServer>, DaemonError> {
        let port = proxy.listen_addr().map(|a| a.port());
        let options = ProxyOptions {
            id: proxy.id.clone(),
            target_url: proxy.target_url.clone(),
            project_path: proxy.project_path.clone(),
            max_log_size: proxy.max_log_size,
            overlay_socket: proxy.overlay_socket(),
        };

        proxy.stop();
        self.manager.remove(&proxy.id);

        let fresh = ProxyServer::new(options)?;
        if let Err(first) = fresh.start(port).await {
            // The old listener may not have released the port yet.
            warn!(proxy = %fresh.id, error = %first, "preferred port unavailable, rebinding");
            fresh.start(None).await?;
        }
        self.manager.insert(Arc::clone(&fresh))?;
        self.persist_snapshot();
        Ok(fresh)
    }

    /// Stop every proxy belonging to a project. Session cleanup path.
    pub fn stop_by_project_path(&self, path: &Path) -> Vec<ProxyId> {
        let mut stopped = Vec::new();
        for proxy in self.manager.by_project_path(path) {
            proxy.stop();
            self.manager.remove(&proxy.id);
            stopped.push(proxy.id.clone());
        }
        if !stopped.is_empty() {
            let mut assoc = self.assoc.write();
            for ids in assoc.values_mut() {
                ids.retain(|id| !stopped.contains(id));
            }
            drop(assoc);
            self.persist_snapshot();
        }
        stopped
    }

    /// Recreate proxies persisted by the previous daemon. Entries that
    /// fail to listen are dropped with a logged error.
    pub async fn restore_from_snapshot(&self) -> usize {
        let Some(state) = &self.state else { return 0 };
        let mut restored = 0;
        for entry in state.restore_list() {
            let port = (entry.port != 0).then_some(entry.port);
            let result = self
                .create_proxy(
                    ProxyId::new(entry.id.clone()),
                    entry.target_url.clone(),
                    entry.path.clone(),
                    entry.max_log_size,
                    port,
                )
                .await;
            match result {
                Ok(_) => restored += 1,
                Err(e) => {
                    warn!(proxy = %entry.id, error = %e, "persisted proxy failed to restore");
                }
            }
        }
        restored
    }

    pub fn associations(&self, script_id: &ScriptId) -> Vec<ProxyId> {
        self.assoc.read().get(script_id).cloned().unwrap_or_default()
    }

    fn persist_snapshot(&self) {
        if let Some(state) = &self.state {
            state.save_proxies(self.manager.snapshot_list(), self.clock.now_utc());
        }
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
