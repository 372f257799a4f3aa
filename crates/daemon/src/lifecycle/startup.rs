// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon startup and initialization logic.

use super::{Config, DaemonState, LifecycleError};
use crate::adapters::{
    JsonConfigSource, NullChaosAdapter, NullDetector, NullTunnelAdapter, ProjectConfigSource,
};
use crate::engine::Engine;
use crate::env;
use crate::event_bus::EventBus;
use crate::listener::{ListenCtx, Listener};
use crate::overlay::OverlayEndpoint;
use crate::proxy::ProxyManager;
use crate::scheduler::Scheduler;
use crate::session::SessionRegistry;
use crate::storage::{StateStore, TaskStore};
use crate::store::KvStore;
use crate::supervisor::{PidTracker, Supervisor};
use crate::urltrack::UrlTracker;
use devtool_core::SystemClock;
use fs2::FileExt;
use std::fs::File;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Result of daemon startup.
pub struct StartupResult {
    /// The daemon state for shutdown handling
    pub daemon: DaemonState,
    /// The socket listener to spawn as a task
    pub listener: Listener,
}

/// Start the daemon per the documented sequence: claim the socket,
/// reap orphans, restore proxies, reload tasks, start the scan and
/// sweep tasks, then hand back the accept loop.
pub async fn startup(config: &Config) -> Result<StartupResult, LifecycleError> {
    std::fs::create_dir_all(&config.state_dir)?;

    // 1. Claim the socket (or refuse if a live daemon owns it).
    let (unix_listener, lock_file) = claim_socket(config).await?;

    // 2. Kill zombie daemons that reference this socket but cannot be
    // reached through it.
    sweep_zombies(&config.socket_path);

    // 3. Orphan cleanup via the PID tracker; record our pid.
    let (tracker, reaped) =
        PidTracker::open(config.tracker_path.clone(), std::process::id());
    if reaped > 0 {
        warn!(reaped, "reaped orphaned process groups from a previous daemon");
    }
    let tracker = Arc::new(tracker);

    // 4. Build subsystems.
    let token = CancellationToken::new();
    let supervisor = Arc::new(Supervisor::new(Arc::clone(&tracker), env::grace_timeout()));
    let sessions = Arc::new(SessionRegistry::new(SystemClock));
    let state = Arc::new(StateStore::open(config.snapshot_path.clone()));
    let overlay = Arc::new(OverlayEndpoint::new(
        state.restore_overlay().map(PathBuf::from),
    ));
    let manager = Arc::new(ProxyManager::default());
    let config_source: Arc<dyn ProjectConfigSource> = Arc::new(JsonConfigSource);
    let engine = Arc::new(Engine::new(
        SystemClock,
        manager,
        Arc::clone(&sessions),
        Arc::clone(&config_source),
        Arc::clone(&overlay),
        Some(Arc::clone(&state)),
    ));

    // 5. Restore proxies from the snapshot; failures are dropped.
    let restored = engine.restore_from_snapshot().await;
    if restored > 0 {
        info!(restored, "restored proxies from snapshot");
    }

    // 6. Scheduler with persisted pending tasks.
    let tasks = Arc::new(TaskStore::new(config.tasks_dir.clone()));
    let scheduler = Arc::new(Scheduler::new(SystemClock, Arc::clone(&sessions), Some(tasks)));
    let reloaded = scheduler.load_persisted();
    if reloaded > 0 {
        info!(reloaded, "reloaded pending scheduled tasks");
    }
    tokio::spawn(Arc::clone(&scheduler).run(token.clone(), env::tick_interval()));

    // 7. Event bus + engine consumer + URL tracker + session sweeper.
    let (bus, reader) = EventBus::new();
    tokio::spawn(Arc::clone(&engine).run(reader, token.clone()));

    let url_tracker = Arc::new(UrlTracker::new(Arc::clone(&supervisor), bus.clone()));
    tokio::spawn(url_tracker.run(token.clone(), env::scan_interval()));

    tokio::spawn(Arc::clone(&sessions).run_sweeper(
        token.clone(),
        env::sweep_interval(),
        env::heartbeat_timeout(),
    ));

    let ctx = Arc::new(ListenCtx {
        supervisor,
        engine,
        sessions,
        scheduler,
        kv: Arc::new(KvStore::open(config.store_path.clone())),
        overlay,
        state: Some(state),
        bus,
        tunnels: Arc::new(NullTunnelAdapter),
        chaos: Arc::new(NullChaosAdapter),
        detector: Arc::new(NullDetector),
        config: config_source,
        socket_path: config.socket_path.clone(),
        start_time: Instant::now(),
        shutdown: Arc::new(Notify::new()),
    });

    info!(socket = %config.socket_path.display(), "daemon started");

    Ok(StartupResult {
        listener: Listener::new(unix_listener, Arc::clone(&ctx)),
        daemon: DaemonState { config: config.clone(), ctx, tracker, token, lock_file },
    })
}

/// Take ownership of the socket path.
///
/// An existing PID file only blocks startup when all three hold: the
/// process is alive, its command line matches the daemon signature, and
/// the socket answers a connect. Anything less is stale state. An
/// exclusive flock on the PID file backs the check against races
/// between two daemons starting at once.
async fn claim_socket(config: &Config) -> Result<(UnixListener, File), LifecycleError> {
    if let Some(existing_pid) = read_pid_file(&config.pid_path) {
        let alive = process_alive(existing_pid);
        let is_daemon = cmdline(existing_pid)
            .map(|c| c.contains(env::DAEMON_SIGNATURE))
            .unwrap_or(false);
        if alive && is_daemon && UnixStream::connect(&config.socket_path).await.is_ok() {
            return Err(LifecycleError::SocketInUse(existing_pid));
        }
        info!(pid = existing_pid, "removing stale daemon socket and pid file");
    }

    let _ = std::fs::remove_file(&config.socket_path);

    if let Some(parent) = config.socket_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Lock first, without truncating - truncating before holding the
    // lock would wipe a live daemon's PID.
    let mut lock_file = std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&config.pid_path)?;
    if lock_file.try_lock_exclusive().is_err() {
        let pid = read_pid_file(&config.pid_path).unwrap_or(0);
        return Err(LifecycleError::SocketInUse(pid));
    }
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;

    let listener = UnixListener::bind(&config.socket_path)
        .map_err(|e| LifecycleError::BindFailed(config.socket_path.clone(), e))?;
    std::fs::set_permissions(&config.socket_path, std::fs::Permissions::from_mode(0o600))?;

    Ok((listener, lock_file))
}

fn read_pid_file(path: &Path) -> Option<u32> {
    std::fs::read_to_string(path).ok()?.trim().parse().ok()
}

fn process_alive(pid: u32) -> bool {
    nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid as i32), None).is_ok()
}

/// `/proc/<pid>/cmdline` with NULs flattened to spaces.
fn cmdline(pid: u32) -> Option<String> {
    let raw = std::fs::read(format!("/proc/{pid}/cmdline")).ok()?;
    Some(String::from_utf8_lossy(&raw).replace('\0', " "))
}

/// Kill daemon processes that reference our socket path but are not us.
///
/// Runs after the socket is claimed, so any such process is by
/// definition unreachable through the socket it advertises.
fn sweep_zombies(socket_path: &Path) {
    let own_pid = std::process::id();
    let socket_str = socket_path.to_string_lossy();

    let Ok(entries) = std::fs::read_dir("/proc") else { return };
    for entry in entries.flatten() {
        let Some(pid) = entry.file_name().to_str().and_then(|n| n.parse::<u32>().ok())
        else {
            continue;
        };
        if pid == own_pid {
            continue;
        }
        let Some(cmd) = cmdline(pid) else { continue };
        if cmd.contains(env::DAEMON_SIGNATURE) && cmd.contains(socket_str.as_ref()) {
            warn!(pid, "killing zombie daemon referencing our socket");
            let _ = nix::sys::signal::kill(
                nix::unistd::Pid::from_raw(pid as i32),
                nix::sys::signal::Signal::SIGKILL,
            );
        }
    }
}

#[cfg(test)]
#[path = "startup_tests.rs"]
mod tests;
