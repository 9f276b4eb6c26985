// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup, reload, shutdown.

mod startup;
pub use startup::startup;

use std::fs::File;
use std::path::PathBuf;

use cadence_core::SystemClock;
use cadence_engine::{BroadcastNotifier, DrainOutcome, EngineError, JobRunner, Notification, Scheduler};
use cadence_storage::{JOBS_FILE, TASKS_FILE};
use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub type DaemonScheduler = Scheduler<BroadcastNotifier, SystemClock>;
pub type DaemonRunner = JobRunner<BroadcastNotifier, SystemClock>;

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Root state directory (e.g. ~/.local/state/cadence)
    pub state_dir: PathBuf,
    /// Path to lock/PID file
    pub lock_path: PathBuf,
    /// Path to daemon log file
    pub log_path: PathBuf,
    pub tasks_path: PathBuf,
    pub jobs_path: PathBuf,
}

impl Config {
    /// Resolve paths under the user's state directory.
    pub fn load() -> Result<Self, LifecycleError> {
        Ok(Self::in_dir(crate::env::state_dir()?))
    }

    pub fn in_dir(state_dir: PathBuf) -> Self {
        Self {
            lock_path: state_dir.join("cadenced.pid"),
            log_path: state_dir.join("cadenced.log"),
            tasks_path: state_dir.join(TASKS_FILE),
            jobs_path: state_dir.join(JOBS_FILE),
            state_dir,
        }
    }
}

/// A started daemon. Holds the single-instance lock until dropped.
pub struct Daemon {
    pub config: Config,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    pub scheduler: DaemonScheduler,
    pub runner: DaemonRunner,
    pub notifier: BroadcastNotifier,
}

/// Background tasks spawned by [`Daemon::start`].
pub struct Loops {
    scheduler: JoinHandle<()>,
    runner: JoinHandle<()>,
    notifications: JoinHandle<()>,
}

impl Daemon {
    /// Start the scheduler tick loop, the runner tick loop and the
    /// notification logger.
    pub fn start(&self) -> Loops {
        let loops = Loops {
            scheduler: self.scheduler.start(),
            runner: self.runner.start(),
            notifications: spawn_notification_logger(&self.notifier),
        };
        info!(
            tasks = self.scheduler.list_tasks().len(),
            jobs = self.runner.list_jobs().len(),
            state_dir = %self.config.state_dir.display(),
            "daemon started"
        );
        loops
    }

    /// Re-read both stores from disk. A failed reload keeps the previous
    /// in-memory state.
    pub async fn reload(&self) {
        match self.scheduler.reload_tasks().await {
            Ok(count) => info!(tasks = count, "tasks reloaded"),
            Err(e) => warn!(error = %e, "task reload failed"),
        }
        match self.runner.reload_jobs().await {
            Ok(count) => info!(jobs = count, "jobs reloaded"),
            Err(e) => warn!(error = %e, "job reload failed"),
        }
    }

    /// Drain the scheduler and runner concurrently, wait for their loops
    /// and remove the PID file.
    pub async fn shutdown(self, loops: Loops) -> (DrainOutcome, DrainOutcome) {
        info!("Shutting down daemon...");
        let outcomes = tokio::join!(self.scheduler.shutdown(), self.runner.shutdown());
        for (name, handle) in [("scheduler", loops.scheduler), ("runner", loops.runner)] {
            if let Err(e) = handle.await {
                warn!(error = %e, "{name} loop ended abnormally");
            }
        }
        loops.notifications.abort();

        if self.config.lock_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.lock_path) {
                warn!("Failed to remove PID file: {}", e);
            }
        }
        info!(scheduler = ?outcomes.0, runner = ?outcomes.1, "Daemon shutdown complete");
        outcomes
    }
}

fn spawn_notification_logger(notifier: &BroadcastNotifier) -> JoinHandle<()> {
    let mut rx = notifier.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => log_notification(&event),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "notification logger lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    })
}

fn log_notification(event: &Notification) {
    match event {
        Notification::TaskStarted { id, trigger } => debug!(task_id = %id, ?trigger, "task started"),
        Notification::TaskCompleted { id, status } => debug!(task_id = %id, ?status, "task completed"),
        Notification::JobStarted { id, todo } => debug!(job_id = %id, todo_id = %todo, "job item started"),
        Notification::JobCompleted { id, todo, status } => {
            debug!(job_id = %id, todo_id = %todo, ?status, "job item completed")
        }
        other => debug!(event = ?other, "state changed"),
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Could not determine state directory")]
    NoStateDir,

    #[error("Failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("Failed to install log subscriber: {0}")]
    Logging(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),
}

impl LifecycleError {
    /// Process exit status for the daemon binary.
    pub fn exit_code(&self) -> i32 {
        match self {
            LifecycleError::LockFailed(_) => 2,
            LifecycleError::NoStateDir | LifecycleError::Logging(_) => 78,
            LifecycleError::Io(_) => 74,
            LifecycleError::Engine(_) => 1,
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
