// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-proxy reverse HTTP server with instrumentation injection, a
//! bounded traffic log, an agent WebSocket hub, and rate-limited
//! automatic restart.

mod handler;
mod inject;
mod manager;
mod pages;
mod ws;

pub use inject::{inject_into_html, is_html_content_type, AGENT_SCRIPT, METRICS_PATH};
pub use manager::ProxyManager;
pub use pages::PageRegistry;
pub use ws::{AgentHub, ExecOutcome};

use axum::routing::get;
use axum::Router;
use chrono::{DateTime, Utc};
use devtool_core::{DaemonError, ProxyId, TrafficLog};
use devtool_wire::ProxySummary;
use parking_lot::{Mutex, RwLock};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Default traffic log capacity.
pub const DEFAULT_MAX_LOG_SIZE: usize = 1000;

/// Rolling window for restart rate limiting.
const RESTART_WINDOW: Duration = Duration::from_secs(10);

/// Restarts tolerated inside the window before giving up.
const MAX_RESTARTS: usize = 3;

/// Construction parameters for a proxy.
#[derive(Debug, Clone)]
pub struct ProxyOptions {
    pub id: ProxyId,
    pub target_url: String,
    pub project_path: PathBuf,
    pub max_log_size: usize,
    /// Overlay socket this proxy reports to (session-bound or global).
    pub overlay_socket: Option<PathBuf>,
}

#[derive(Debug)]
struct ListenState {
    running: bool,
    listen_addr: Option<SocketAddr>,
    restart_history: Vec<Instant>,
    last_error: Option<String>,
    auto_restart: bool,
}

/// One reverse proxy instance.
#[derive(Debug)]
pub struct ProxyServer {
    pub id: ProxyId,
    pub target_url: String,
    pub project_path: PathBuf,
    pub created_at: DateTime<Utc>,
    pub max_log_size: usize,
    pub log: TrafficLog,
    pub hub: AgentHub,
    pub pages: PageRegistry,
    overlay_socket: RwLock<Option<PathBuf>>,
    client: reqwest::Client,
    state: Mutex<ListenState>,
    shutdown: CancellationToken,
}

impl ProxyServer {
    pub fn new(options: ProxyOptions) -> Result<Arc<Self>, DaemonError> {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| DaemonError::internal(format!("proxy http client: {e}")))?;

        Ok(Arc::new(Self {
            log: TrafficLog::new(options.max_log_size),
            hub: AgentHub::default(),
            pages: PageRegistry::default(),
            overlay_socket: RwLock::new(options.overlay_socket),
            client,
            state: Mutex::new(ListenState {
                running: false,
                listen_addr: None,
                restart_history: Vec::new(),
                last_error: None,
                auto_restart: true,
            }),
            shutdown: CancellationToken::new(),
            created_at: Utc::now(),
            id: options.id,
            target_url: options.target_url,
            project_path: options.project_path,
            max_log_size: options.max_log_size,
        }))
    }

    /// Bind the listener (OS-assigned port unless overridden) and start
    /// serving. Returns the bound address.
    pub async fn start(self: &Arc<Self>, port: Option<u16>) -> Result<SocketAddr, DaemonError> {
        let listener = TcpListener::bind(("127.0.0.1", port.unwrap_or(0)))
            .await
            .map_err(|e| {
                DaemonError::unavailable(format!(
                    "proxy {} failed to listen on port {}: {e}",
                    self.id,
                    port.unwrap_or(0)
                ))
            })?;
        let addr = listener
            .local_addr()
            .map_err(|e| DaemonError::internal(format!("local_addr: {e}")))?;

        {
            let mut state = self.state.lock();
            state.running = true;
            state.listen_addr = Some(addr);
        }

        info!(proxy = %self.id, addr = %addr, target = %self.target_url, "proxy listening");
        tokio::spawn(Arc::clone(self).run(listener));
        Ok(addr)
    }

    fn router(self: &Arc<Self>) -> Router {
        Router::new()
            .route(METRICS_PATH, get(ws::metrics_ws_handler))
            .fallback(handler::forward_handler)
            .with_state(Arc::clone(self))
    }

    /// Serve loop with the restart policy around it.
    async fn run(self: Arc<Self>, listener: TcpListener) {
        let mut listener = listener;
        loop {
            let app = self.router();
            let shutdown = self.shutdown.clone();
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await;

            if self.shutdown.is_cancelled() {
                self.state.lock().running = false;
                info!(proxy = %self.id, "proxy stopped");
                return;
            }

            let error = match result {
                Ok(()) => "listener exited unexpectedly".to_string(),
                Err(e) => e.to_string(),
            };
            warn!(proxy = %self.id, error = %error, "proxy server exited");

            if !self.note_restart(Instant::now(), &error) {
                return;
            }

            // Relisten on the same port.
            let port = self.state.lock().listen_addr.map(|a| a.port()).unwrap_or(0);
            match TcpListener::bind(("127.0.0.1", port)).await {
                Ok(fresh) => {
                    info!(proxy = %self.id, port, "proxy relistening");
                    listener = fresh;
                }
                Err(e) => {
                    let error = format!("rebind failed: {e}");
                    if !self.note_restart(Instant::now(), &error) {
                        return;
                    }
                    tokio::time::sleep(Duration::from_millis(250)).await;
                    // One more bind attempt next loop iteration.
                    match TcpListener::bind(("127.0.0.1", port)).await {
                        Ok(fresh) => listener = fresh,
                        Err(e) => {
                            self.mark_failed(format!("rebind failed: {e}"));
                            return;
                        }
                    }
                }
            }
        }
    }

    /// Record a restart attempt at `now`; false when the rolling-window
    /// budget is exhausted (the proxy is then permanently stopped).
    fn note_restart(&self, now: Instant, error: &str) -> bool {
        let mut state = self.state.lock();
        state.last_error = Some(error.to_string());
        state.restart_history.push(now);
        let cutoff = now.checked_sub(RESTART_WINDOW);
        if let Some(cutoff) = cutoff {
            state.restart_history.retain(|t| *t > cutoff);
        }
        if state.restart_history.len() > MAX_RESTARTS {
            state.running = false;
            state.auto_restart = false;
            warn!(proxy = %self.id, error, "restart budget exhausted, proxy failed");
            false
        } else {
            true
        }
    }

    fn mark_failed(&self, error: String) {
        let mut state = self.state.lock();
        state.running = false;
        state.auto_restart = false;
        state.last_error = Some(error);
    }

    /// Stop serving. Idempotent.
    pub fn stop(&self) {
        self.shutdown.cancel();
        self.state.lock().running = false;
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    pub fn listen_addr(&self) -> Option<SocketAddr> {
        self.state.lock().listen_addr
    }

    pub fn restart_count(&self) -> usize {
        self.state.lock().restart_history.len()
    }

    pub fn last_error(&self) -> Option<String> {
        self.state.lock().last_error.clone()
    }

    pub fn overlay_socket(&self) -> Option<PathBuf> {
        self.overlay_socket.read().clone()
    }

    pub fn set_overlay_socket(&self, socket: Option<PathBuf>) {
        *self.overlay_socket.write() = socket;
    }

    pub(crate) fn http_client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Broadcast an outbound frame (`execute`, `activity`,
    /// `output_preview`, `toast`) to every attached agent.
    pub fn broadcast(&self, kind: &str, data: serde_json::Value) -> usize {
        self.hub.broadcast(&serde_json::json!({ "type": kind, "data": data }))
    }

    /// Run JS in the attached browsers; waits for the correlated
    /// `execution` reply from the first agent that answers.
    pub async fn exec(&self, code: &str, timeout: Duration) -> Result<ExecOutcome, DaemonError> {
        if self.hub.count() == 0 {
            return Err(DaemonError::unavailable(format!(
                "proxy {} has no connected agents",
                self.id
            )));
        }

        let exec_id = nanoid::nanoid!(10);
        let reply = self.hub.register_exec(&exec_id);
        self.broadcast("execute", serde_json::json!({ "id": exec_id, "code": code }));

        match tokio::time::timeout(timeout, reply).await {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(_)) => {
                self.hub.abandon_exec(&exec_id);
                Err(DaemonError::internal("exec reply channel dropped"))
            }
            Err(_) => {
                self.hub.abandon_exec(&exec_id);
                Err(DaemonError::timeout(format!("no execution reply within {timeout:?}")))
            }
        }
    }

    pub fn summary(&self) -> ProxySummary {
        let state = self.state.lock();
        ProxySummary {
            id: self.id.to_string(),
            target_url: self.target_url.clone(),
            listen_addr: state.listen_addr.map(|a| a.to_string()),
            path: self.project_path.clone(),
            running: state.running,
            created_at: self.created_at,
            restart_count: state.restart_history.len(),
            last_error: state.last_error.clone(),
            log: self.log.stats(),
            agents: self.hub.count(),
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
