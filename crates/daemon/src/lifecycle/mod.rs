// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup, shutdown, recovery.

mod startup;

pub use startup::{startup, StartupResult};

use crate::env;
use crate::listener::ListenCtx;
use crate::supervisor::PidTracker;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Root state directory (e.g. ~/.local/state/devtool)
    pub state_dir: PathBuf,
    /// Path to the Unix socket
    pub socket_path: PathBuf,
    /// Sibling PID file
    pub pid_path: PathBuf,
    /// Path to the daemon debug log
    pub log_path: PathBuf,
    /// Path to the proxy snapshot
    pub snapshot_path: PathBuf,
    /// Path to the PID-tracker file
    pub tracker_path: PathBuf,
    /// Directory of per-project scheduler mirrors
    pub tasks_dir: PathBuf,
    /// Path to the key-value store file
    pub store_path: PathBuf,
}

impl Config {
    /// Load configuration from the environment.
    ///
    /// One daemon serves all projects for a user.
    pub fn load() -> Result<Self, LifecycleError> {
        let state_dir = env::state_dir().ok_or(LifecycleError::NoStateDir)?;
        let socket_path = env::socket_path();
        let pid_path = env::pid_path(&socket_path);

        Ok(Self {
            log_path: state_dir.join("daemon.log"),
            snapshot_path: state_dir.join("state.json"),
            tracker_path: state_dir.join("pids.json"),
            tasks_dir: state_dir.join("tasks"),
            store_path: state_dir.join("store.json"),
            state_dir,
            socket_path,
            pid_path,
        })
    }
}

/// Daemon state during operation.
pub struct DaemonState {
    pub config: Config,
    pub ctx: Arc<ListenCtx>,
    pub tracker: Arc<PidTracker>,
    /// Root cancellation for every background task.
    pub token: CancellationToken,
    // NOTE(lifetime): Held to maintain the exclusive PID-file lock;
    // released on drop
    #[allow(dead_code)]
    lock_file: std::fs::File,
}

impl DaemonState {
    /// Shutdown the daemon gracefully. Idempotent.
    pub async fn shutdown(&self) {
        info!("Shutting down daemon...");

        // 1. Stop accepting and cancel background tasks.
        self.token.cancel();

        // 2. Stop proxies and processes in parallel, bounded.
        let timeout = env::shutdown_timeout();
        tokio::join!(
            self.ctx.engine.manager().stop_all(timeout),
            self.ctx.supervisor.stop_all(timeout),
        );

        // 3. Clear PID tracking - the clean-shutdown signal.
        self.tracker.clear();

        // 4. Remove socket and PID file.
        for path in [&self.config.socket_path, &self.config.pid_path] {
            if path.exists() {
                if let Err(e) = std::fs::remove_file(path) {
                    warn!(path = %path.display(), error = %e, "cleanup failed");
                }
            }
        }

        info!("Daemon shutdown complete");
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Could not determine state directory")]
    NoStateDir,

    #[error("Another daemon (pid {0}) owns the socket")]
    SocketInUse(u32),

    #[error("Failed to bind socket at {0}: {1}")]
    BindFailed(PathBuf, std::io::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
