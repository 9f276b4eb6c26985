// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon startup and initialization logic.

use std::io::Write;

use cadence_core::SystemClock;
use cadence_engine::{BroadcastNotifier, EngineConfig, JobRunner, Scheduler};
use cadence_storage::{JobStore, TaskStore};
use fs2::FileExt;
use tracing::{info, warn};

use super::{Config, Daemon, LifecycleError};

/// Take the single-instance lock and load both stores.
pub fn startup(config: &Config, engine: EngineConfig) -> Result<Daemon, LifecycleError> {
    match startup_inner(config, engine) {
        Ok(daemon) => Ok(daemon),
        Err(e) => {
            // The PID file belongs to the running daemon when the lock was taken.
            if !matches!(e, LifecycleError::LockFailed(_)) {
                cleanup_on_failure(config);
            }
            Err(e)
        }
    }
}

fn startup_inner(config: &Config, engine: EngineConfig) -> Result<Daemon, LifecycleError> {
    std::fs::create_dir_all(&config.state_dir)?;

    // Open without truncating: the running daemon's PID must survive a failed lock.
    let mut lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&config.lock_path)?;
    lock_file.try_lock_exclusive().map_err(LifecycleError::LockFailed)?;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;

    info!(
        pid = std::process::id(),
        cron_zone = ?engine.cron_zone,
        max_concurrent_jobs = engine.max_concurrent_jobs,
        agent_command = %engine.agent_command,
        "starting cadenced"
    );

    let notifier = BroadcastNotifier::new(crate::env::notification_capacity());
    let scheduler = Scheduler::new(
        engine.clone(),
        TaskStore::new(config.tasks_path.clone()),
        notifier.clone(),
        SystemClock,
    )?;
    let runner = JobRunner::new(engine, JobStore::new(config.jobs_path.clone()), notifier.clone(), SystemClock)?;

    Ok(Daemon { config: config.clone(), lock_file, scheduler, runner, notifier })
}

fn cleanup_on_failure(config: &Config) {
    if config.lock_path.exists() {
        if let Err(e) = std::fs::remove_file(&config.lock_path) {
            warn!("Failed to remove PID file: {}", e);
        }
    }
}

#[cfg(test)]
#[path = "startup_tests.rs"]
mod tests;
