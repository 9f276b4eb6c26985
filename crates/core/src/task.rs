// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduled (cron-driven) tasks and their transient runtime state.

use crate::status::{RunStatus, Trigger};
use crate::time_fmt::de_epoch_ms;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

crate::define_id! {
    /// Unique identifier for a scheduled task.
    pub struct TaskId("tsk-");
}

fn default_true() -> bool {
    true
}

/// A persisted cron task.
///
/// Mutated only through explicit create/update/delete operations; the
/// scheduler tick reads tasks and writes [`TaskRuntimeState`] only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledTask {
    #[serde(default)]
    pub id: TaskId,
    pub name: String,
    /// Five-field cron expression (or `@daily`-style macro).
    pub cron: String,
    pub prompt: String,
    pub working_directory: PathBuf,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Allow the agent to exit without interactive confirmation.
    #[serde(default)]
    pub fast_exit_mode: bool,
    #[serde(default, deserialize_with = "de_epoch_ms")]
    pub created_at: u64,
    #[serde(default, deserialize_with = "de_epoch_ms")]
    pub updated_at: u64,
}

crate::builder! {
    pub struct ScheduledTaskBuilder => ScheduledTask {
        into {
            id: TaskId = "tsk-test",
            name: String = "test task",
            cron: String = "* * * * *",
            prompt: String = "say hello",
            working_directory: PathBuf = std::env::temp_dir(),
        }
        set {
            enabled: bool = true,
            fast_exit_mode: bool = false,
        }
        computed {
            created_at: u64 = 0,
            updated_at: u64 = 0,
        }
    }
}

/// Transient per-task runtime state. Rebuilt on startup, never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRuntimeState {
    pub last_run_at: Option<u64>,
    pub last_status: RunStatus,
    pub last_error: Option<String>,
    pub last_duration_ms: Option<u64>,
    pub last_trigger: Option<Trigger>,
    pub last_completed_minute_key: Option<String>,
    pub last_scheduled_minute_key: Option<String>,
    pub last_backfill_minutes: Option<u64>,
    /// Failed runs since the last success; drives auto-disable.
    pub consecutive_failures: u32,
    /// Queued cron runs not yet dispatched.
    pub pending_runs: usize,
}

impl TaskRuntimeState {
    /// Runtime state for a task whose cron expression failed to parse.
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self { last_status: RunStatus::Error, last_error: Some(reason.into()), ..Self::default() }
    }

    pub fn is_running(&self) -> bool {
        self.last_status == RunStatus::Running
    }
}

/// A task paired with its runtime state, for display.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskView {
    #[serde(flatten)]
    pub task: ScheduledTask,
    pub runtime: TaskRuntimeState,
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
