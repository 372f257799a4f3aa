// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduled-message tasks.

use crate::id::{SessionCode, TaskId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Delivery attempts before a task is marked failed.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Delivery state of a scheduled task.
///
/// `Pending` is the only state eligible for delivery; the other three
/// are terminal and remove the task from both stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Delivered,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskStatus::Pending)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Delivered => "delivered",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// A message queued for future delivery to a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledTask {
    pub id: TaskId,
    pub session_code: SessionCode,
    pub message: String,
    pub deliver_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    /// Project the issuing client was in; task listings are scoped to it.
    pub project_path: PathBuf,
    pub status: TaskStatus,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl ScheduledTask {
    pub fn new(
        session_code: SessionCode,
        message: impl Into<String>,
        deliver_at: DateTime<Utc>,
        created_at: DateTime<Utc>,
        project_path: PathBuf,
    ) -> Self {
        Self {
            id: TaskId::generate(),
            session_code,
            message: message.into(),
            deliver_at,
            created_at,
            project_path,
            status: TaskStatus::Pending,
            attempts: 0,
            last_error: None,
        }
    }

    /// True when the task should be attempted at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == TaskStatus::Pending && self.deliver_at <= now
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
