// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! DTO structs returned in `JSON` responses.

use chrono::{DateTime, Utc};
use devtool_core::{ProcessState, RingStats};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Daemon-level info for `INFO`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaemonInfo {
    pub pid: u32,
    pub version: String,
    pub socket_path: PathBuf,
    pub uptime_secs: u64,
    pub processes: usize,
    pub proxies: usize,
    pub sessions: usize,
    pub pending_tasks: usize,
}

/// Summary of a supervised process for `PROC LIST` / `PROC STATUS`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessSummary {
    pub id: String,
    pub state: ProcessState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    pub project_path: PathBuf,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub urls: Vec<String>,
    pub output: RingStats,
}

/// Summary of a proxy for `PROXY LIST` / `PROXY STATUS`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxySummary {
    pub id: String,
    pub target_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listen_addr: Option<String>,
    pub path: PathBuf,
    pub running: bool,
    pub created_at: DateTime<Utc>,
    pub restart_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub log: RingStats,
    pub agents: usize,
}

/// A page the injected agent has reported activity for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageInfo {
    pub url: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub hits: u64,
    pub error_count: u64,
}

/// One key in the daemon store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreEntry {
    pub key: String,
    pub value: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

/// JSON payload accepted by `RUN`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    /// Stable process id; derived from the command when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Project directory; falls back to the attached session's path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub env: HashMap<String, String>,
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod tests;
