// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Environment-derived configuration: socket location and tunables.
//!
//! Every timing knob has a `DEVTOOL_*` override so the spec suite can
//! run at test speed.

use std::path::PathBuf;
use std::time::Duration;

/// Socket filename under `$XDG_RUNTIME_DIR`.
const SOCKET_NAME: &str = "devtool-mcp.sock";

/// Resolve the daemon socket path.
///
/// `${XDG_RUNTIME_DIR}/devtool-mcp.sock` when the runtime dir is set,
/// `/tmp/devtool-mcp-<uid>.sock` otherwise. `DEVTOOL_SOCKET` overrides
/// both (used by tests and nested daemons).
pub fn socket_path() -> PathBuf {
    if let Ok(path) = std::env::var("DEVTOOL_SOCKET") {
        return PathBuf::from(path);
    }
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        if !runtime_dir.is_empty() {
            return PathBuf::from(runtime_dir).join(SOCKET_NAME);
        }
    }
    let uid = nix::unistd::Uid::effective().as_raw();
    PathBuf::from(format!("/tmp/devtool-mcp-{uid}.sock"))
}

/// Sibling PID file for a socket path.
pub fn pid_path(socket: &std::path::Path) -> PathBuf {
    let mut os = socket.as_os_str().to_os_string();
    os.push(".pid");
    PathBuf::from(os)
}

/// State directory for persisted files (snapshot, PID tracker, tasks).
///
/// `DEVTOOL_STATE_DIR` override, else `$XDG_STATE_HOME/devtool`, else
/// `~/.local/state/devtool`.
pub fn state_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("DEVTOOL_STATE_DIR") {
        return Some(PathBuf::from(dir));
    }
    if let Ok(dir) = std::env::var("XDG_STATE_HOME") {
        if !dir.is_empty() {
            return Some(PathBuf::from(dir).join("devtool"));
        }
    }
    dirs::home_dir().map(|home| home.join(".local").join("state").join("devtool"))
}

/// Whether verbose logging was requested via `AGNT_DEBUG`.
pub fn debug_enabled() -> bool {
    std::env::var("AGNT_DEBUG").map(|v| v == "1" || v == "true").unwrap_or(false)
}

fn duration_ms(var: &str, default_ms: u64) -> Duration {
    std::env::var(var)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_millis(default_ms))
}

/// Grace period between TERM and KILL when stopping a process group.
pub fn grace_timeout() -> Duration {
    duration_ms("DEVTOOL_GRACE_MS", 5_000)
}

/// URL tracker scan interval.
pub fn scan_interval() -> Duration {
    duration_ms("DEVTOOL_SCAN_MS", 500)
}

/// Session heartbeat staleness threshold.
pub fn heartbeat_timeout() -> Duration {
    duration_ms("DEVTOOL_HEARTBEAT_MS", 30_000)
}

/// Sweep interval for the session registry.
pub fn sweep_interval() -> Duration {
    duration_ms("DEVTOOL_SWEEP_MS", 5_000)
}

/// Scheduler tick interval.
pub fn tick_interval() -> Duration {
    duration_ms("DEVTOOL_TICK_MS", 1_000)
}

/// Bounded wait for a correlated browser `execution` reply.
pub fn exec_timeout() -> Duration {
    duration_ms("DEVTOOL_EXEC_MS", 5_000)
}

/// Deadline for state snapshot writes.
pub fn persist_timeout() -> Duration {
    duration_ms("DEVTOOL_PERSIST_MS", 2_000)
}

/// Bound on parallel subsystem shutdown.
pub fn shutdown_timeout() -> Duration {
    duration_ms("DEVTOOL_SHUTDOWN_MS", 5_000)
}

/// Command-line signature identifying a daemon process.
pub const DAEMON_SIGNATURE: &str = "devtoold";

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
