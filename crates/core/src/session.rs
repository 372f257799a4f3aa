// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session records and code generation.
//!
//! A session names one live interactive client (editor, agent, shell).
//! The daemon delivers scheduled messages to it through the overlay
//! socket and scopes fuzzy proxy lookup to its project path.

use crate::id::SessionCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Liveness of a session as seen by the registry sweeper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Disconnected,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::Active => write!(f, "active"),
            SessionStatus::Disconnected => write!(f, "disconnected"),
        }
    }
}

/// A registered client session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub code: SessionCode,
    /// Filesystem socket the daemon dials to deliver messages.
    pub overlay_socket: PathBuf,
    pub project_path: PathBuf,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub status: SessionStatus,
    pub last_seen: DateTime<Utc>,
}

/// Next free code for `prefix`: one past the highest existing `{prefix}-{n}`.
pub fn next_code<'a>(prefix: &str, existing: impl Iterator<Item = &'a str>) -> SessionCode {
    let max = existing
        .filter_map(|code| code.strip_prefix(prefix))
        .filter_map(|rest| rest.strip_prefix('-'))
        .filter_map(|n| n.parse::<u64>().ok())
        .max()
        .unwrap_or(0);
    SessionCode::new(format!("{prefix}-{}", max + 1))
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
