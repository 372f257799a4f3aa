// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session registry: named live sessions with heartbeat liveness.
//!
//! The sweeper only flips stale sessions to disconnected - removal is
//! the owning connection's job, so a laggy client can come back with a
//! heartbeat without losing its registration.

use chrono::Duration as ChronoDuration;
use devtool_core::{next_code, Clock, DaemonError, SessionCode, SessionRecord, SessionStatus};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub struct SessionRegistry<C: Clock> {
    clock: C,
    sessions: RwLock<HashMap<SessionCode, SessionRecord>>,
}

impl<C: Clock> SessionRegistry<C> {
    pub fn new(clock: C) -> Self {
        Self { clock, sessions: RwLock::new(HashMap::new()) }
    }

    /// Register a new session. Duplicate codes are refused.
    pub fn register(&self, record: SessionRecord) -> Result<(), DaemonError> {
        let mut sessions = self.sessions.write();
        if sessions.contains_key(&record.code) {
            return Err(DaemonError::exists(format!("session {} already registered", record.code)));
        }
        info!(code = %record.code, path = %record.project_path.display(), "session registered");
        sessions.insert(record.code.clone(), record);
        Ok(())
    }

    pub fn unregister(&self, code: &SessionCode) -> Result<SessionRecord, DaemonError> {
        let removed = self.sessions.write().remove(code);
        match removed {
            Some(record) => {
                info!(code = %code, "session unregistered");
                Ok(record)
            }
            None => Err(DaemonError::not_found(format!("no session {code}"))),
        }
    }

    pub fn get(&self, code: &SessionCode) -> Result<SessionRecord, DaemonError> {
        self.sessions
            .read()
            .get(code)
            .cloned()
            .ok_or_else(|| DaemonError::not_found(format!("no session {code}")))
    }

    pub fn list(&self) -> Vec<SessionRecord> {
        let mut records: Vec<SessionRecord> = self.sessions.read().values().cloned().collect();
        records.sort_by(|a, b| a.code.as_str().cmp(b.code.as_str()));
        records
    }

    pub fn count(&self) -> usize {
        self.sessions.read().len()
    }

    /// Advance `last_seen` and force the session back to active.
    pub fn heartbeat(&self, code: &SessionCode) -> Result<(), DaemonError> {
        let mut sessions = self.sessions.write();
        let record = sessions
            .get_mut(code)
            .ok_or_else(|| DaemonError::not_found(format!("no session {code}")))?;
        record.last_seen = self.clock.now_utc();
        record.status = SessionStatus::Active;
        Ok(())
    }

    /// Most recently started session registered for a project path.
    pub fn find_by_path(&self, path: &Path) -> Option<SessionRecord> {
        self.sessions
            .read()
            .values()
            .filter(|r| r.project_path == path)
            .max_by_key(|r| r.started_at)
            .cloned()
    }

    /// Generate the next free `{prefix}-{n}` code.
    pub fn generate_code(&self, prefix: &str) -> SessionCode {
        let sessions = self.sessions.read();
        next_code(prefix, sessions.keys().map(|c| c.as_str()))
    }

    /// Flip sessions whose heartbeat went stale to disconnected.
    /// Returns the codes that were flipped.
    pub fn sweep(&self, timeout: Duration) -> Vec<SessionCode> {
        let now = self.clock.now_utc();
        let cutoff = ChronoDuration::from_std(timeout).unwrap_or(ChronoDuration::seconds(30));

        let mut flipped = Vec::new();
        let mut sessions = self.sessions.write();
        for record in sessions.values_mut() {
            if record.status == SessionStatus::Active && now - record.last_seen > cutoff {
                record.status = SessionStatus::Disconnected;
                flipped.push(record.code.clone());
            }
        }
        drop(sessions);

        for code in &flipped {
            debug!(code = %code, "session heartbeat stale, marked disconnected");
        }
        flipped
    }

    /// Periodic sweep task.
    pub async fn run_sweeper(
        self: Arc<Self>,
        token: CancellationToken,
        interval: Duration,
        timeout: Duration,
    ) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    self.sweep(timeout);
                }
            }
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
