// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `tasks.json`: the persisted scheduled task list.

use crate::error::StorageError;
use crate::file::{read_array, write_atomic};
use cadence_core::{ScheduledTask, TaskId};
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub const TASKS_FILE: &str = "tasks.json";

#[derive(Debug, Clone)]
pub struct TaskStore {
    path: PathBuf,
}

impl TaskStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `<state_dir>/tasks.json`.
    pub fn in_dir(state_dir: &Path) -> Self {
        Self::new(state_dir.join(TASKS_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load and normalize every record. Invalid records are dropped with a
    /// warning; the rest load.
    pub fn load(&self) -> Result<Vec<ScheduledTask>, StorageError> {
        let raw = read_array(&self.path)?;
        let total = raw.len();
        let mut seen = HashSet::new();
        let mut tasks = Vec::with_capacity(total);
        for (index, value) in raw.into_iter().enumerate() {
            match normalize_task(value) {
                Ok(task) if seen.insert(task.id.clone()) => tasks.push(task),
                Ok(task) => {
                    tracing::warn!(index, task_id = %task.id, "dropping duplicate task record")
                }
                Err(reason) => tracing::warn!(index, %reason, "dropping invalid task record"),
            }
        }
        tracing::debug!(path = %self.path.display(), loaded = tasks.len(), total, "tasks loaded");
        Ok(tasks)
    }

    pub fn save(&self, tasks: &[ScheduledTask]) -> Result<(), StorageError> {
        write_atomic(&self.path, tasks)
    }
}

fn normalize_task(value: Value) -> Result<ScheduledTask, String> {
    let mut task: ScheduledTask = serde_json::from_value(value).map_err(|e| e.to_string())?;
    if task.id.is_empty() {
        task.id = TaskId::new();
    }
    task.name = task.name.trim().to_string();
    if task.name.is_empty() {
        return Err("name is empty".to_string());
    }
    task.cron = task.cron.split_whitespace().collect::<Vec<_>>().join(" ");
    if task.working_directory.as_os_str().is_empty() {
        return Err("workingDirectory is empty".to_string());
    }
    if task.updated_at < task.created_at {
        task.updated_at = task.created_at;
    }
    Ok(task)
}

#[cfg(test)]
#[path = "tasks_tests.rs"]
mod tests;
