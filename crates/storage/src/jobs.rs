// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `jobs.json`: the persisted job list with embedded todo items.

use crate::error::StorageError;
use crate::file::{read_array, write_atomic};
use cadence_core::{Job, JobId, TodoId, TodoItem};
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub const JOBS_FILE: &str = "jobs.json";

#[derive(Debug, Clone)]
pub struct JobStore {
    path: PathBuf,
}

impl JobStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `<state_dir>/jobs.json`.
    pub fn in_dir(state_dir: &Path) -> Self {
        Self::new(state_dir.join(JOBS_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load and normalize every job. A bad todo item is dropped from its job;
    /// a bad job is dropped from the list. Items persisted as `running` are
    /// kept as-is for the runner's stale-state reconcile.
    pub fn load(&self) -> Result<Vec<Job>, StorageError> {
        let raw = read_array(&self.path)?;
        let total = raw.len();
        let mut seen = HashSet::new();
        let mut jobs = Vec::with_capacity(total);
        for (index, value) in raw.into_iter().enumerate() {
            match normalize_job(value) {
                Ok(job) if seen.insert(job.id.clone()) => jobs.push(job),
                Ok(job) => tracing::warn!(index, job_id = %job.id, "dropping duplicate job record"),
                Err(reason) => tracing::warn!(index, %reason, "dropping invalid job record"),
            }
        }
        tracing::debug!(path = %self.path.display(), loaded = jobs.len(), total, "jobs loaded");
        Ok(jobs)
    }

    pub fn save(&self, jobs: &[Job]) -> Result<(), StorageError> {
        write_atomic(&self.path, jobs)
    }
}

fn normalize_job(value: Value) -> Result<Job, String> {
    let Value::Object(mut fields) = value else {
        return Err("not an object".to_string());
    };
    let raw_todos = match fields.remove("todos") {
        Some(Value::Array(items)) => items,
        Some(Value::Null) | None => Vec::new(),
        Some(_) => return Err("todos is not an array".to_string()),
    };

    let mut job: Job = serde_json::from_value(Value::Object(fields)).map_err(|e| e.to_string())?;
    if job.id.is_empty() {
        job.id = JobId::new();
    }
    job.name = job.name.trim().to_string();
    if job.name.is_empty() {
        return Err("name is empty".to_string());
    }
    if job.working_directory.as_os_str().is_empty() {
        return Err("workingDirectory is empty".to_string());
    }
    job.runner_command = job.runner_command.trim().to_string();
    if job.updated_at < job.created_at {
        job.updated_at = job.created_at;
    }

    let mut seen = HashSet::new();
    for (index, raw) in raw_todos.into_iter().enumerate() {
        match normalize_todo(raw) {
            Ok(mut todo) => {
                if !seen.insert(todo.id.clone()) {
                    todo.id = TodoId::new();
                    seen.insert(todo.id.clone());
                }
                job.todos.push(todo);
            }
            Err(reason) => {
                tracing::warn!(job_id = %job.id, index, %reason, "dropping invalid todo item")
            }
        }
    }
    Ok(job)
}

fn normalize_todo(value: Value) -> Result<TodoItem, String> {
    let mut todo = match value {
        Value::String(text) => TodoItem::new(text),
        other => serde_json::from_value::<TodoItem>(other).map_err(|e| e.to_string())?,
    };
    todo.text = todo.text.trim().to_string();
    if todo.text.is_empty() {
        return Err("text is empty".to_string());
    }
    if todo.id.is_empty() {
        todo.id = TodoId::new();
    }
    Ok(todo)
}

#[cfg(test)]
#[path = "jobs_tests.rs"]
mod tests;
