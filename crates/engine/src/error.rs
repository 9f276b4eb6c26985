// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error types

use crate::cron::CronParseError;
use cadence_storage::StorageError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors returned synchronously by scheduler and runner operations.
///
/// Validation variants reject a mutation before anything is persisted.
/// Execution failures never surface here; they land in runtime state.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid cron expression '{expr}': {source}")]
    InvalidCron {
        expr: String,
        #[source]
        source: CronParseError,
    },
    #[error("working directory does not exist: {}", .0.display())]
    MissingWorkingDirectory(PathBuf),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("task not found: {0}")]
    TaskNotFound(String),
    #[error("job not found: {0}")]
    JobNotFound(String),
    #[error("todo {todo} not found in job {job}")]
    TodoNotFound { job: String, todo: String },
    #[error("a run is already in progress for {0}")]
    AlreadyRunning(String),
    #[error("job {0} is running or has eligible items; pause the job first")]
    JobBusy(String),
    #[error("shutting down")]
    ShuttingDown,
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("background store task failed: {0}")]
    StoreTask(#[from] tokio::task::JoinError),
}
