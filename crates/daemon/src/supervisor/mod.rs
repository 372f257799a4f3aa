// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process supervisor: spawns children in their own process groups,
//! pumps their output into bounded ring buffers, and stops them by
//! signalling the whole group.

mod tracker;

pub use tracker::{PidTracker, TrackedProcess, TrackerState};

use chrono::{DateTime, Utc};
use devtool_core::{
    DaemonError, OutputFrame, ProcessState, RingBuffer, ScriptId, StreamKind,
};
use devtool_wire::ProcessSummary;
use nix::sys::signal::Signal;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

/// Output ring capacity in frames.
const OUTPUT_CAPACITY: usize = 2048;

/// Maximum detected URLs retained per process.
pub const MAX_URLS: usize = 5;

/// Poll step while waiting out the grace period.
const STOP_POLL: Duration = Duration::from_millis(50);

/// What to spawn.
#[derive(Debug, Clone, PartialEq)]
pub struct StartConfig {
    pub id: ScriptId,
    pub project_path: PathBuf,
    pub command: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    /// Substring matchers for URL-bearing output lines; empty scans all.
    pub line_matchers: Vec<String>,
}

/// Filters for [`Supervisor::output`].
#[derive(Debug, Clone, Default)]
pub struct OutputQuery {
    pub stream: Option<StreamKind>,
    pub grep: Option<String>,
    pub head: Option<usize>,
    pub tail: Option<usize>,
}

/// URL-scan cursor, advanced by the URL tracker.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanState {
    /// Lifetime ring offset of the next unscanned frame.
    pub frame_cursor: u64,
    /// Bytes scanned since process start; scanning stops at the cap.
    pub bytes_scanned: u64,
}

#[derive(Debug)]
struct RuntimeState {
    state: ProcessState,
    pid: Option<u32>,
    pgid: Option<u32>,
    exit_code: Option<i32>,
}

/// A supervised process record.
///
/// Records stay queryable after the process stops; a restart installs a
/// fresh record under the same id.
#[derive(Debug)]
pub struct ProcessEntry {
    pub id: ScriptId,
    pub config: StartConfig,
    pub started_at: DateTime<Utc>,
    pub output: RingBuffer<OutputFrame>,
    runtime: Mutex<RuntimeState>,
    urls: Mutex<Vec<String>>,
    pub scan: Mutex<ScanState>,
    stop_requested: AtomicBool,
}

impl ProcessEntry {
    pub fn state(&self) -> ProcessState {
        self.runtime.lock().state
    }

    pub fn pid(&self) -> Option<u32> {
        self.runtime.lock().pid
    }

    pub fn pgid(&self) -> Option<u32> {
        self.runtime.lock().pgid
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.runtime.lock().exit_code
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().clone()
    }

    /// Record a detected URL; false when already known or at capacity.
    pub fn push_url(&self, url: &str) -> bool {
        let mut urls = self.urls.lock();
        if urls.len() >= MAX_URLS || urls.iter().any(|u| u == url) {
            return false;
        }
        urls.push(url.to_string());
        true
    }

    pub fn summary(&self) -> ProcessSummary {
        let runtime = self.runtime.lock();
        ProcessSummary {
            id: self.id.to_string(),
            state: runtime.state,
            pid: runtime.pid,
            command: self.config.command.clone(),
            args: self.config.args.clone(),
            project_path: self.config.project_path.clone(),
            started_at: self.started_at,
            exit_code: runtime.exit_code,
            urls: self.urls.lock().clone(),
            output: self.output.stats(),
        }
    }

    fn mark_exited(&self, exit_code: Option<i32>) {
        let mut runtime = self.runtime.lock();
        if runtime.state.is_terminal() {
            return;
        }
        let clean = exit_code == Some(0) || self.stop_requested.load(Ordering::SeqCst);
        runtime.state = if clean { ProcessState::Stopped } else { ProcessState::Failed };
        runtime.exit_code = exit_code;
    }
}

/// Owns every supervised process.
pub struct Supervisor {
    tracker: Arc<PidTracker>,
    processes: Mutex<HashMap<ScriptId, Arc<ProcessEntry>>>,
    grace: Duration,
}

impl Supervisor {
    pub fn new(tracker: Arc<PidTracker>, grace: Duration) -> Self {
        Self { tracker, processes: Mutex::new(HashMap::new()), grace }
    }

    /// Spawn a process, or return the live record with the same id.
    pub async fn start_or_reuse(
        &self,
        config: StartConfig,
    ) -> Result<Arc<ProcessEntry>, DaemonError> {
        if let Some(existing) = self.get(&config.id) {
            if !existing.state().is_terminal() {
                debug!(id = %config.id, "reusing running process");
                return Ok(existing);
            }
        }
        let entry = self.spawn(config)?;
        self.processes.lock().insert(entry.id.clone(), Arc::clone(&entry));
        Ok(entry)
    }

    fn spawn(&self, config: StartConfig) -> Result<Arc<ProcessEntry>, DaemonError> {
        let mut cmd = tokio::process::Command::new(&config.command);
        cmd.args(&config.args)
            .current_dir(&config.project_path)
            .envs(&config.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(false);

        let mut child = cmd.spawn().map_err(|e| {
            DaemonError::internal(format!("failed to spawn {:?}: {e}", config.command))
        })?;

        let pid = child
            .id()
            .ok_or_else(|| DaemonError::internal("child exited before pid was read"))?;
        // process_group(0) makes the child its own group leader.
        let pgid = pid;

        self.tracker.track(config.id.clone(), pid, pgid, config.project_path.clone());

        let entry = Arc::new(ProcessEntry {
            id: config.id.clone(),
            started_at: Utc::now(),
            output: RingBuffer::new(OUTPUT_CAPACITY),
            runtime: Mutex::new(RuntimeState {
                state: ProcessState::Running,
                pid: Some(pid),
                pgid: Some(pgid),
                exit_code: None,
            }),
            urls: Mutex::new(Vec::new()),
            scan: Mutex::new(ScanState::default()),
            stop_requested: AtomicBool::new(false),
            config,
        });

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(pump(stdout, StreamKind::Stdout, Arc::clone(&entry)));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(pump(stderr, StreamKind::Stderr, Arc::clone(&entry)));
        }

        // Reaper: waits for exit, records the status, untracks the pid.
        let waiter_entry = Arc::clone(&entry);
        let tracker = Arc::clone(&self.tracker);
        tokio::spawn(async move {
            let mut child = child;
            match child.wait().await {
                Ok(status) => {
                    let code = status.code();
                    waiter_entry.mark_exited(code);
                    info!(id = %waiter_entry.id, ?code, "process exited");
                }
                Err(e) => {
                    waiter_entry.mark_exited(None);
                    warn!(id = %waiter_entry.id, error = %e, "wait failed");
                }
            }
            tracker.untrack(&waiter_entry.id);
        });

        info!(id = %entry.id, pid, "process started");
        Ok(entry)
    }

    /// Stop a process: TERM the group, wait out the grace period, KILL.
    /// `force` skips straight to KILL.
    pub async fn stop(&self, id: &ScriptId, force: bool) -> Result<(), DaemonError> {
        let entry = self
            .get(id)
            .ok_or_else(|| DaemonError::not_found(format!("no process {id}")))?;

        if entry.state().is_terminal() {
            return Ok(());
        }
        entry.stop_requested.store(true, Ordering::SeqCst);

        let Some(pgid) = entry.pgid() else {
            entry.mark_exited(None);
            return Ok(());
        };

        if !force {
            tracker::kill_group(pgid, Signal::SIGTERM);
            let deadline = tokio::time::Instant::now() + self.grace;
            while tokio::time::Instant::now() < deadline {
                if entry.state().is_terminal() {
                    return Ok(());
                }
                tokio::time::sleep(STOP_POLL).await;
            }
        }

        tracker::kill_group(pgid, Signal::SIGKILL);

        // Give the reaper a moment to observe the exit; mark it ourselves
        // if the wait is somehow wedged.
        let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
        while tokio::time::Instant::now() < deadline {
            if entry.state().is_terminal() {
                return Ok(());
            }
            tokio::time::sleep(STOP_POLL).await;
        }
        entry.mark_exited(None);
        self.tracker.untrack(id);
        Ok(())
    }

    /// Stop and start a fresh record with the same configuration.
    pub async fn restart(&self, id: &ScriptId) -> Result<Arc<ProcessEntry>, DaemonError> {
        let entry = self
            .get(id)
            .ok_or_else(|| DaemonError::not_found(format!("no process {id}")))?;
        let config = entry.config.clone();
        self.stop(id, false).await?;
        let fresh = self.spawn(config)?;
        self.processes.lock().insert(fresh.id.clone(), Arc::clone(&fresh));
        Ok(fresh)
    }

    pub fn get(&self, id: &ScriptId) -> Option<Arc<ProcessEntry>> {
        self.processes.lock().get(id).cloned()
    }

    pub fn status(&self, id: &ScriptId) -> Result<ProcessSummary, DaemonError> {
        self.get(id)
            .map(|e| e.summary())
            .ok_or_else(|| DaemonError::not_found(format!("no process {id}")))
    }

    /// Query captured output. Never blocks on process liveness.
    pub fn output(
        &self,
        id: &ScriptId,
        query: &OutputQuery,
    ) -> Result<Vec<OutputFrame>, DaemonError> {
        let entry = self
            .get(id)
            .ok_or_else(|| DaemonError::not_found(format!("no process {id}")))?;

        let mut frames: Vec<OutputFrame> = entry
            .output
            .snapshot()
            .into_iter()
            .filter(|f| query.stream.is_none_or(|s| f.stream == s))
            .filter(|f| query.grep.as_ref().is_none_or(|g| f.text.contains(g.as_str())))
            .collect();

        if let Some(head) = query.head {
            frames.truncate(head);
        }
        if let Some(tail) = query.tail {
            if frames.len() > tail {
                frames.drain(..frames.len() - tail);
            }
        }
        Ok(frames)
    }

    /// All records, optionally restricted to one project directory.
    pub fn list(&self, directory: Option<&Path>) -> Vec<ProcessSummary> {
        let mut summaries: Vec<ProcessSummary> = self
            .processes
            .lock()
            .values()
            .filter(|e| directory.is_none_or(|d| e.config.project_path == d))
            .map(|e| e.summary())
            .collect();
        summaries.sort_by(|a, b| a.id.cmp(&b.id));
        summaries
    }

    /// Records with live processes, for the URL tracker.
    pub fn running(&self) -> Vec<Arc<ProcessEntry>> {
        self.processes
            .lock()
            .values()
            .filter(|e| !e.state().is_terminal())
            .cloned()
            .collect()
    }

    /// All ids currently in the table, terminal or not.
    pub fn ids(&self) -> Vec<ScriptId> {
        self.processes.lock().keys().cloned().collect()
    }

    pub fn count(&self) -> usize {
        self.processes.lock().len()
    }

    /// Stop every supervised process whose detected URLs use `port`.
    pub async fn cleanup_port(&self, port: u16) -> Vec<ScriptId> {
        let needle = format!(":{port}");
        let targets: Vec<ScriptId> = self
            .processes
            .lock()
            .values()
            .filter(|e| !e.state().is_terminal())
            .filter(|e| e.urls().iter().any(|u| u.contains(&needle)))
            .map(|e| e.id.clone())
            .collect();

        let mut stopped = Vec::new();
        for id in targets {
            if self.stop(&id, false).await.is_ok() {
                stopped.push(id);
            }
        }
        stopped
    }

    /// Stop every process belonging to a project. Used for session cleanup.
    pub async fn stop_by_project_path(&self, path: &Path) -> Vec<ScriptId> {
        let targets: Vec<ScriptId> = self
            .processes
            .lock()
            .values()
            .filter(|e| e.config.project_path == path && !e.state().is_terminal())
            .map(|e| e.id.clone())
            .collect();

        let mut stopped = Vec::new();
        for id in targets {
            if self.stop(&id, false).await.is_ok() {
                stopped.push(id);
            }
        }
        stopped
    }

    /// Stop everything in parallel, used at daemon shutdown.
    pub async fn stop_all(&self, timeout: Duration) {
        let ids: Vec<ScriptId> = self
            .processes
            .lock()
            .values()
            .filter(|e| !e.state().is_terminal())
            .map(|e| e.id.clone())
            .collect();

        let stops = ids.into_iter().map(|id| async move {
            let _ = self.stop(&id, false).await;
        });
        let _ = tokio::time::timeout(timeout, futures_util::future::join_all(stops)).await;
    }

    /// Drop a terminal record from the table.
    pub fn remove(&self, id: &ScriptId) -> bool {
        let mut processes = self.processes.lock();
        match processes.get(id) {
            Some(entry) if entry.state().is_terminal() => {
                processes.remove(id);
                true
            }
            _ => false,
        }
    }
}

/// Pump one child stream into the output ring, line by line.
async fn pump(
    stream: impl tokio::io::AsyncRead + Unpin,
    kind: StreamKind,
    entry: Arc<ProcessEntry>,
) {
    let mut lines = BufReader::new(stream).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                entry.output.push(OutputFrame { stream: kind, text: line, at: Utc::now() });
            }
            Ok(None) => break,
            Err(e) => {
                debug!(id = %entry.id, error = %e, "output pump ended");
                break;
            }
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
