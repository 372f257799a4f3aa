// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-project mirrors of pending scheduler tasks.
//!
//! Each project gets one JSON file under `<state>/tasks/`, named by the
//! project's basename-hash. Terminal tasks are removed from the mirror,
//! so a file only ever holds pending work.

use super::{atomic_write_json, load_json, StorageError};
use devtool_core::{basename_hash, ScheduledTask, TaskStatus};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::warn;

pub struct TaskStore {
    dir: PathBuf,
}

impl TaskStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn file_for(&self, project_path: &Path) -> PathBuf {
        self.dir.join(format!("{}.json", basename_hash(project_path)))
    }

    /// Load every pending task across all project files.
    pub fn load_all(&self) -> Vec<ScheduledTask> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!(error = %e, dir = %self.dir.display(), "failed to read task dir");
                return Vec::new();
            }
        };

        let mut tasks = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_none_or(|e| e != "json") {
                continue;
            }
            match load_json::<Vec<ScheduledTask>>(&path) {
                Ok(Some(loaded)) => {
                    tasks.extend(loaded.into_iter().filter(|t| t.status == TaskStatus::Pending));
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, path = %path.display(), "skipping unreadable task file"),
            }
        }
        tasks
    }

    /// Rewrite the project mirrors for the given tasks.
    ///
    /// `tasks` is the full pending set; files for projects with no
    /// remaining tasks are deleted.
    pub fn save_all(&self, tasks: &[ScheduledTask]) -> Result<(), StorageError> {
        let mut by_project: HashMap<PathBuf, Vec<&ScheduledTask>> = HashMap::new();
        for task in tasks.iter().filter(|t| t.status == TaskStatus::Pending) {
            by_project.entry(task.project_path.clone()).or_default().push(task);
        }

        // Remove files whose project no longer has pending tasks.
        let live_files: Vec<PathBuf> =
            by_project.keys().map(|p| self.file_for(p)).collect();
        if let Ok(entries) = std::fs::read_dir(&self.dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().is_some_and(|e| e == "json")
                    && !live_files.contains(&path)
                {
                    let _ = std::fs::remove_file(&path);
                }
            }
        }

        for (project, tasks) in by_project {
            atomic_write_json(&self.file_for(&project), &tasks)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "tasks_tests.rs"]
mod tests;
