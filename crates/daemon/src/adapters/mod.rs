// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Seams to out-of-core collaborators: tunnel binaries, the chaos rule
//! engine, project-type detection, and project config parsing.
//!
//! The daemon only owns the contract; hosts that ship the collaborators
//! install real adapters, everyone else gets `unavailable` errors.

mod config;

pub use config::{JsonConfigSource, ProjectConfigSource, StaticConfigSource};

use async_trait::async_trait;
use devtool_core::DaemonError;
use devtool_wire::ChaosCmd;
use std::path::Path;

/// Public-ingress tunnels (`TUNNEL` verbs) are handed off to external
/// tunnel binaries managed behind this trait.
#[async_trait]
pub trait TunnelAdapter: Send + Sync {
    async fn start(
        &self,
        proxy_id: &str,
        local_addr: &str,
    ) -> Result<serde_json::Value, DaemonError>;
    async fn stop(&self, tunnel_id: &str) -> Result<(), DaemonError>;
    async fn status(&self, tunnel_id: &str) -> Result<serde_json::Value, DaemonError>;
    async fn list(&self) -> Result<serde_json::Value, DaemonError>;
}

/// Installed when no tunnel runner ships with the daemon.
pub struct NullTunnelAdapter;

#[async_trait]
impl TunnelAdapter for NullTunnelAdapter {
    async fn start(&self, _: &str, _: &str) -> Result<serde_json::Value, DaemonError> {
        Err(unavailable_tunnel())
    }

    async fn stop(&self, _: &str) -> Result<(), DaemonError> {
        Err(unavailable_tunnel())
    }

    async fn status(&self, _: &str) -> Result<serde_json::Value, DaemonError> {
        Err(unavailable_tunnel())
    }

    async fn list(&self) -> Result<serde_json::Value, DaemonError> {
        Err(unavailable_tunnel())
    }
}

fn unavailable_tunnel() -> DaemonError {
    DaemonError::unavailable("no tunnel runner installed")
}

/// The fault-injection rule engine behind the `CHAOS` verbs. The whole
/// sub-verb surface is forwarded; rule semantics live in the engine.
#[async_trait]
pub trait ChaosAdapter: Send + Sync {
    async fn handle(
        &self,
        cmd: ChaosCmd,
        args: &[String],
        payload: Option<&serde_json::Value>,
    ) -> Result<serde_json::Value, DaemonError>;
}

/// Installed when no chaos engine ships with the daemon.
pub struct NullChaosAdapter;

#[async_trait]
impl ChaosAdapter for NullChaosAdapter {
    async fn handle(
        &self,
        _: ChaosCmd,
        _: &[String],
        _: Option<&serde_json::Value>,
    ) -> Result<serde_json::Value, DaemonError> {
        Err(DaemonError::unavailable("no chaos engine installed"))
    }
}

/// Language/project-type detection behind the `DETECT` verb.
#[async_trait]
pub trait ProjectDetector: Send + Sync {
    async fn detect(&self, path: &Path) -> Result<serde_json::Value, DaemonError>;
}

/// Installed when no detector ships with the daemon.
pub struct NullDetector;

#[async_trait]
impl ProjectDetector for NullDetector {
    async fn detect(&self, _: &Path) -> Result<serde_json::Value, DaemonError> {
        Err(DaemonError::unavailable("no project detector installed"))
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
