// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Project configuration source.
//!
//! KDL parsing is an external collaborator; the daemon consumes its
//! pre-parsed JSON output at `.devtool/config.json`. A missing file is
//! an empty config, not an error.

use devtool_core::{DaemonError, ProjectConfig};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Relative location of the pre-parsed config inside a project.
pub const CONFIG_RELATIVE_PATH: &str = ".devtool/config.json";

pub trait ProjectConfigSource: Send + Sync {
    fn load(&self, path: &Path) -> Result<ProjectConfig, DaemonError>;
}

/// Production source: reads the pre-parsed JSON from the project tree.
pub struct JsonConfigSource;

impl ProjectConfigSource for JsonConfigSource {
    fn load(&self, path: &Path) -> Result<ProjectConfig, DaemonError> {
        let file = path.join(CONFIG_RELATIVE_PATH);
        let bytes = match std::fs::read(&file) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(ProjectConfig::default())
            }
            Err(e) => {
                return Err(DaemonError::internal(format!(
                    "read {}: {e}",
                    file.display()
                )))
            }
        };
        serde_json::from_slice(&bytes).map_err(|e| {
            DaemonError::invalid_arg(format!("bad config {}: {e}", file.display()))
        })
    }
}

/// In-memory source for tests and embedded hosts.
#[derive(Default)]
pub struct StaticConfigSource {
    configs: RwLock<HashMap<PathBuf, ProjectConfig>>,
}

impl StaticConfigSource {
    pub fn set(&self, path: PathBuf, config: ProjectConfig) {
        self.configs.write().insert(path, config);
    }
}

impl ProjectConfigSource for StaticConfigSource {
    fn load(&self, path: &Path) -> Result<ProjectConfig, DaemonError> {
        Ok(self.configs.read().get(path).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
