// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control-plane events consumed by the daemon's orchestrator task.

use crate::id::ScriptId;
use crate::proxy::ProxyConfigEntry;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Events that drive proxy wiring.
///
/// Serializes with `{"type": "event:name", ...fields}` format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    /// A supervised process printed a new dev-server URL.
    #[serde(rename = "url:detected")]
    UrlDetected { script_id: ScriptId, url: String, path: PathBuf },

    /// A client asked for a proxy directly.
    #[serde(rename = "proxy:start")]
    ExplicitStart { proxy_id: String, config: ProxyConfigEntry, path: PathBuf },

    /// A supervised process left the supervisor's list.
    #[serde(rename = "script:stopped")]
    ScriptStopped { script_id: ScriptId },
}

impl Event {
    /// One-line summary for structured logs.
    pub fn log_summary(&self) -> String {
        match self {
            Event::UrlDetected { script_id, url, .. } => {
                format!("url:detected script={script_id} url={url}")
            }
            Event::ExplicitStart { proxy_id, .. } => format!("proxy:start id={proxy_id}"),
            Event::ScriptStopped { script_id } => {
                format!("script:stopped script={script_id}")
            }
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
