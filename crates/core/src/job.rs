// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Jobs: an ordered todo list advanced one item at a time by the job runner.

use crate::status::{RunStatus, Trigger};
use crate::time_fmt::{de_epoch_ms, de_opt_epoch_ms};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

crate::define_id! {
    /// Unique identifier for a job.
    pub struct JobId("job-");
}

crate::define_id! {
    /// Unique identifier for a todo item within a job.
    pub struct TodoId("tdo-");
}

/// Lifecycle of a single todo item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TodoStatus {
    #[default]
    Pending,
    Running,
    Done,
    Error,
}

crate::simple_display! {
    TodoStatus {
        Pending => "pending",
        Running => "running",
        Done => "done",
        Error => "error",
    }
}

/// One unit of work inside a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoItem {
    #[serde(default)]
    pub id: TodoId,
    pub text: String,
    #[serde(default)]
    pub status: TodoStatus,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    pub last_error: Option<String>,
    #[serde(default, deserialize_with = "de_opt_epoch_ms")]
    pub last_run_at: Option<u64>,
    #[serde(default)]
    pub last_duration_ms: Option<u64>,
}

impl TodoItem {
    /// A fresh pending item with no history.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: TodoId::new(),
            text: text.into(),
            status: TodoStatus::Pending,
            attempts: 0,
            last_error: None,
            last_run_at: None,
            last_duration_ms: None,
        }
    }

    /// Whether the runner may dispatch this item given the retry limit.
    pub fn is_eligible(&self, max_attempts: u32) -> bool {
        self.status != TodoStatus::Done && self.attempts < max_attempts
    }
}

fn default_true() -> bool {
    true
}

/// A persisted job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    #[serde(default)]
    pub id: JobId,
    pub name: String,
    #[serde(default)]
    pub prompt: String,
    pub working_directory: PathBuf,
    /// Shell command run once per todo item (`bash -c`). Empty means the
    /// configured default agent command.
    #[serde(default)]
    pub runner_command: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub fast_exit_mode: bool,
    #[serde(default)]
    pub todos: Vec<TodoItem>,
    #[serde(default, deserialize_with = "de_epoch_ms")]
    pub created_at: u64,
    #[serde(default, deserialize_with = "de_epoch_ms")]
    pub updated_at: u64,
}

crate::builder! {
    pub struct JobBuilder => Job {
        into {
            id: JobId = "job-test",
            name: String = "test job",
            prompt: String = "work through the list",
            working_directory: PathBuf = std::env::temp_dir(),
            runner_command: String = "true",
        }
        set {
            enabled: bool = true,
            fast_exit_mode: bool = false,
            todos: Vec<TodoItem> = Vec::new(),
        }
        computed {
            created_at: u64 = 0,
            updated_at: u64 = 0,
        }
    }
}

impl Job {
    /// Index of the first item the runner may dispatch, in list order.
    pub fn next_eligible_todo(&self, max_attempts: u32) -> Option<usize> {
        self.todos.iter().position(|t| t.is_eligible(max_attempts))
    }

    pub fn todo_texts(&self) -> Vec<&str> {
        self.todos.iter().map(|t| t.text.as_str()).collect()
    }

    pub fn todo_index(&self, todo_id: &str) -> Option<usize> {
        self.todos.iter().position(|t| t.id == todo_id)
    }

    /// True when every item is done.
    pub fn is_complete(&self) -> bool {
        !self.todos.is_empty() && self.todos.iter().all(|t| t.status == TodoStatus::Done)
    }
}

/// Transient per-job runtime state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRuntimeState {
    pub running: bool,
    pub current_todo_index: Option<usize>,
    pub last_status: RunStatus,
    pub last_error: Option<String>,
    pub last_duration_ms: Option<u64>,
    pub last_trigger: Option<Trigger>,
    pub last_run_at: Option<u64>,
}

/// A job paired with its runtime state, for display.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobView {
    #[serde(flatten)]
    pub job: Job,
    pub runtime: JobRuntimeState,
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
