// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run status and trigger shared by task and job runtime state.

use serde::{Deserialize, Serialize};

/// Outcome of the most recent run of a task or job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    #[default]
    Idle,
    Running,
    Success,
    Error,
}

crate::simple_display! {
    RunStatus {
        Idle => "idle",
        Running => "running",
        Success => "success",
        Error => "error",
    }
}

/// What caused a run to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    /// A cron minute matched (possibly backfilled).
    Cron,
    /// The job runner's periodic tick picked the job.
    Tick,
    /// Explicit "run now" request.
    Manual,
}

crate::simple_display! {
    Trigger {
        Cron => "cron",
        Tick => "tick",
        Manual => "manual",
    }
}

/// Suffix appended to the last error of a task or job that was auto-disabled.
pub const PAUSED_SUFFIX: &str = "(attempt limit reached, paused)";

/// Append [`PAUSED_SUFFIX`] to an error message.
pub fn paused_error(message: &str) -> String {
    format!("{message} {PAUSED_SUFFIX}")
}
