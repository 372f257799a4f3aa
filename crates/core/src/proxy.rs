// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Project configuration entries and proxy-id composition.
//!
//! Config parsing itself lives outside the daemon; these are the
//! pre-parsed shapes the daemon consumes.

use crate::error::DaemonError;
use crate::id::ProxyId;
use crate::project::{basename_hash, host_port_component};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A proxy declared in a project's config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProxyConfigEntry {
    /// Logical name, the middle component of the compound id.
    pub name: String,
    /// Supervised process whose detected URL this proxy should front.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    /// Explicit target URL. Highest precedence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Target port on localhost. Used when `url` is absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Legacy target URL. Lowest precedence, deprecated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Listener port override; OS-assigned when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listen_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_log_size: Option<usize>,
    #[serde(default)]
    pub autostart: bool,
}

/// A supervised command declared in a project's config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandConfigEntry {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: std::collections::HashMap<String, String>,
    #[serde(default)]
    pub autostart: bool,
}

/// Pre-parsed per-project configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub proxies: Vec<ProxyConfigEntry>,
    #[serde(default)]
    pub commands: Vec<CommandConfigEntry>,
}

/// Raised when a config entry names more than one target source.
///
/// The resolver still picks a target (url > port > target) but the
/// caller must log this rather than silently dropping the losers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetPrecedenceWarning {
    pub entry: String,
    pub chosen: &'static str,
    pub ignored: Vec<&'static str>,
    pub deprecated_target: bool,
}

impl std::fmt::Display for TargetPrecedenceWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "proxy {:?}: using {} target, ignoring {}{}",
            self.entry,
            self.chosen,
            self.ignored.join(", "),
            if self.deprecated_target { " (`target` is deprecated, use `url`)" } else { "" }
        )
    }
}

impl ProxyConfigEntry {
    /// Resolve the target URL with precedence `url > port > target`.
    pub fn resolve_target_url(
        &self,
    ) -> Result<(String, Option<TargetPrecedenceWarning>), DaemonError> {
        let mut present: Vec<&'static str> = Vec::new();
        if self.url.is_some() {
            present.push("url");
        }
        if self.port.is_some() {
            present.push("port");
        }
        if self.target.is_some() {
            present.push("target");
        }

        let chosen = match present.first() {
            Some(c) => *c,
            None => {
                return Err(DaemonError::invalid_arg(format!(
                    "proxy {:?} has no url, port, or target",
                    self.name
                )))
            }
        };

        let url = match chosen {
            "url" => self.url.clone().unwrap_or_default(),
            "port" => format!("http://localhost:{}", self.port.unwrap_or_default()),
            _ => self.target.clone().unwrap_or_default(),
        };

        let warning = (present.len() > 1).then(|| TargetPrecedenceWarning {
            entry: self.name.clone(),
            chosen,
            ignored: present[1..].to_vec(),
            deprecated_target: self.target.is_some(),
        });

        Ok((url, warning))
    }
}

/// Compose the compound id `{basename-hash}:{name}:{host-port}`.
pub fn compose_proxy_id(
    project_path: &Path,
    logical_name: &str,
    target_url: &str,
) -> Result<ProxyId, DaemonError> {
    let host_port = host_port_component(target_url).ok_or_else(|| {
        DaemonError::invalid_arg(format!("target url has no host:port: {target_url}"))
    })?;
    Ok(ProxyId::new(format!(
        "{}:{}:{}",
        basename_hash(project_path),
        logical_name,
        host_port
    )))
}

#[cfg(test)]
#[path = "proxy_tests.rs"]
mod tests;
