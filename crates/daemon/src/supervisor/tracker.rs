// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistent PID tracking for orphan reaping.
//!
//! Every supervised process group is recorded here before its first
//! wait. If the daemon is SIGKILLed, the next daemon finds a tracker
//! file written by a different pid, kills every recorded group, and
//! resets the file - children never outlive two daemon generations.

use crate::storage::{atomic_write_json, load_json};
use chrono::{DateTime, Utc};
use devtool_core::ScriptId;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// One tracked process group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedProcess {
    pub id: ScriptId,
    pub pid: u32,
    pub pgid: u32,
    pub project_path: PathBuf,
    pub created_at: DateTime<Utc>,
}

/// On-disk tracker contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerState {
    pub daemon_pid: u32,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub processes: Vec<TrackedProcess>,
}

/// Durable `(id) → (pid, pgid)` map.
pub struct PidTracker {
    path: PathBuf,
    state: Mutex<TrackerState>,
}

impl PidTracker {
    /// Open the tracker for the current daemon, reaping orphans left by
    /// a previous daemon that died uncleanly.
    ///
    /// Returns the tracker and the number of groups reaped.
    pub fn open(path: PathBuf, daemon_pid: u32) -> (Self, usize) {
        let mut reaped = 0;
        match load_json::<TrackerState>(&path) {
            Ok(Some(previous)) if previous.daemon_pid != daemon_pid => {
                for tracked in &previous.processes {
                    info!(
                        id = %tracked.id,
                        pgid = tracked.pgid,
                        "reaping orphaned process group from previous daemon"
                    );
                    if kill_group(tracked.pgid, Signal::SIGKILL) {
                        reaped += 1;
                    }
                }
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, path = %path.display(), "unreadable PID tracker, resetting");
            }
        }

        let tracker = Self {
            path,
            state: Mutex::new(TrackerState {
                daemon_pid,
                updated_at: Utc::now(),
                processes: Vec::new(),
            }),
        };
        tracker.persist();
        (tracker, reaped)
    }

    /// Record a freshly spawned process group.
    pub fn track(&self, id: ScriptId, pid: u32, pgid: u32, project_path: PathBuf) {
        {
            let mut state = self.state.lock();
            state.processes.retain(|p| p.id != id);
            state.processes.push(TrackedProcess {
                id,
                pid,
                pgid,
                project_path,
                created_at: Utc::now(),
            });
            state.updated_at = Utc::now();
        }
        self.persist();
    }

    /// Drop a process that has stopped.
    pub fn untrack(&self, id: &ScriptId) {
        {
            let mut state = self.state.lock();
            state.processes.retain(|p| &p.id != id);
            state.updated_at = Utc::now();
        }
        self.persist();
    }

    /// Clear all entries - called on clean daemon shutdown.
    pub fn clear(&self) {
        {
            let mut state = self.state.lock();
            state.processes.clear();
            state.updated_at = Utc::now();
        }
        self.persist();
    }

    pub fn tracked(&self) -> Vec<TrackedProcess> {
        self.state.lock().processes.clone()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) {
        let state = self.state.lock().clone();
        if let Err(e) = atomic_write_json(&self.path, &state) {
            warn!(error = %e, "PID tracker write failed");
        }
    }
}

/// Signal a whole process group; true when the signal was delivered.
pub(crate) fn kill_group(pgid: u32, signal: Signal) -> bool {
    match killpg(Pid::from_raw(pgid as i32), signal) {
        Ok(()) => true,
        Err(nix::errno::Errno::ESRCH) => false,
        Err(e) => {
            warn!(pgid, error = %e, "killpg failed");
            false
        }
    }
}

#[cfg(test)]
#[path = "tracker_tests.rs"]
mod tests;
