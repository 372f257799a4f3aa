// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduler: time-ordered delivery of messages to sessions.
//!
//! A one-second ticker scans the pending map; every due task gets a
//! concurrent delivery attempt. Delivery speaks HTTP over the session's
//! overlay socket. Terminal tasks leave both the in-memory map and the
//! per-project mirror immediately.

use crate::overlay;
use crate::session::SessionRegistry;
use crate::storage::TaskStore;
use chrono::{DateTime, Utc};
use devtool_core::{
    Clock, DaemonError, ScheduledTask, SessionCode, SessionStatus, TaskId, TaskStatus,
    DEFAULT_MAX_ATTEMPTS,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub struct Scheduler<C: Clock> {
    clock: C,
    registry: Arc<SessionRegistry<C>>,
    tasks: Mutex<HashMap<TaskId, ScheduledTask>>,
    store: Option<Arc<TaskStore>>,
    max_attempts: u32,
}

impl<C: Clock> Scheduler<C> {
    pub fn new(clock: C, registry: Arc<SessionRegistry<C>>, store: Option<Arc<TaskStore>>) -> Self {
        Self {
            clock,
            registry,
            tasks: Mutex::new(HashMap::new()),
            store,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Reload pending tasks persisted by a previous daemon.
    pub fn load_persisted(&self) -> usize {
        let Some(store) = &self.store else { return 0 };
        let loaded = store.load_all();
        let count = loaded.len();
        let mut tasks = self.tasks.lock();
        for task in loaded {
            tasks.insert(task.id.clone(), task);
        }
        count
    }

    /// Queue a message for delivery at `deliver_at`.
    pub fn schedule(
        &self,
        session_code: SessionCode,
        message: String,
        deliver_at: DateTime<Utc>,
        project_path: PathBuf,
    ) -> Result<TaskId, DaemonError> {
        // Fail fast on unknown sessions; delivery would only retry into
        // the same error.
        self.registry.get(&session_code)?;

        let task = ScheduledTask::new(
            session_code,
            message,
            deliver_at,
            self.clock.now_utc(),
            project_path,
        );
        let id = task.id.clone();
        info!(task = %id, session = %task.session_code, at = %deliver_at, "task scheduled");
        self.tasks.lock().insert(id.clone(), task);
        self.persist();
        Ok(id)
    }

    /// Cancel a pending task. Cancelled tasks never deliver.
    pub fn cancel(&self, id: &TaskId) -> Result<(), DaemonError> {
        let removed = self.tasks.lock().remove(id);
        match removed {
            Some(_) => {
                info!(task = %id, "task cancelled");
                self.persist();
                Ok(())
            }
            None => Err(DaemonError::not_found(format!("no pending task {id}"))),
        }
    }

    /// Pending tasks, optionally scoped to one project.
    pub fn list_pending(&self, project: Option<&Path>) -> Vec<ScheduledTask> {
        let mut pending: Vec<ScheduledTask> = self
            .tasks
            .lock()
            .values()
            .filter(|t| t.status == TaskStatus::Pending)
            .filter(|t| project.is_none_or(|p| t.project_path == p))
            .cloned()
            .collect();
        pending.sort_by_key(|t| t.deliver_at);
        pending
    }

    pub fn pending_count(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Deliver a message right now, outside the task machinery.
    pub async fn send_now(
        &self,
        session_code: &SessionCode,
        message: &str,
    ) -> Result<(), DaemonError> {
        let session = self.registry.get(session_code)?;
        if session.status != SessionStatus::Active {
            return Err(DaemonError::unavailable(format!(
                "session {session_code} is not active"
            )));
        }
        post_message(&session.overlay_socket, message).await?;
        Ok(())
    }

    /// One scheduler tick: attempt every due task concurrently.
    pub async fn tick_once(&self) {
        let now = self.clock.now_utc();
        let due: Vec<ScheduledTask> = {
            let tasks = self.tasks.lock();
            tasks.values().filter(|t| t.is_due(now)).cloned().collect()
        };
        if due.is_empty() {
            return;
        }

        let attempts = due.into_iter().map(|task| async move {
            let outcome = self.attempt(&task).await;
            (task, outcome)
        });
        let results = futures_util::future::join_all(attempts).await;

        let mut dirty = false;
        {
            let mut tasks = self.tasks.lock();
            for (task, outcome) in results {
                let Some(entry) = tasks.get_mut(&task.id) else { continue };
                dirty = true;
                match outcome {
                    Ok(()) => {
                        info!(task = %task.id, session = %task.session_code, "task delivered");
                        tasks.remove(&task.id);
                    }
                    Err(e) => {
                        entry.attempts += 1;
                        entry.last_error = Some(e.to_string());
                        if entry.attempts >= self.max_attempts {
                            warn!(task = %task.id, error = %e, "task failed after max attempts");
                            tasks.remove(&task.id);
                        } else {
                            warn!(
                                task = %task.id,
                                attempt = entry.attempts,
                                error = %e,
                                "delivery failed, will retry"
                            );
                        }
                    }
                }
            }
        }
        if dirty {
            self.persist();
        }
    }

    async fn attempt(&self, task: &ScheduledTask) -> Result<(), DaemonError> {
        let session = self.registry.get(&task.session_code)?;
        if session.status != SessionStatus::Active {
            return Err(DaemonError::unavailable(format!(
                "session {} is not active",
                task.session_code
            )));
        }
        post_message(&session.overlay_socket, &task.message).await?;
        Ok(())
    }

    /// Ticker loop; runs until cancelled.
    pub async fn run(self: Arc<Self>, token: CancellationToken, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => self.tick_once().await,
            }
        }
    }

    fn persist(&self) {
        let Some(store) = &self.store else { return };
        let pending: Vec<ScheduledTask> = self.tasks.lock().values().cloned().collect();
        if let Err(e) = store.save_all(&pending) {
            warn!(error = %e, "task persistence failed");
        }
    }
}

/// The overlay `/type` contract: text is typed into the session's
/// terminal, submitted immediately.
async fn post_message(socket: &Path, text: &str) -> Result<(), DaemonError> {
    let body = serde_json::json!({ "text": text, "enter": true, "instant": true });
    overlay::post(socket, "/type", &body).await?;
    Ok(())
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
