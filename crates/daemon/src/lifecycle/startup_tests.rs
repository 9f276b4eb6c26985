// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use cadence_core::test_support::pending_todos;
use cadence_core::{Job, ScheduledTask};
use cadence_engine::DrainOutcome;
use std::path::Path;
use std::time::Duration;
use tempfile::tempdir;

fn engine_config() -> EngineConfig {
    EngineConfig {
        agent_command: "true".to_string(),
        tick_interval: Duration::from_secs(600),
        runner_tick_interval: Duration::from_secs(600),
        drain_timeout: Duration::from_millis(200),
        ..EngineConfig::default()
    }
}

fn pid_in(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap().trim().to_string()
}

#[tokio::test]
async fn startup_writes_pid_and_shutdown_removes_it() {
    let dir = tempdir().unwrap();
    let config = Config::in_dir(dir.path().join("state"));

    let daemon = startup(&config, engine_config()).unwrap();
    assert_eq!(pid_in(&config.lock_path), std::process::id().to_string());

    let loops = daemon.start();
    let outcomes = daemon.shutdown(loops).await;
    assert_eq!(outcomes, (DrainOutcome::Drained, DrainOutcome::Drained));
    assert!(!config.lock_path.exists());
}

#[tokio::test]
async fn startup_lock_failed_does_not_remove_pid_file() {
    let dir = tempdir().unwrap();
    let config = Config::in_dir(dir.path().to_path_buf());

    // Hold an exclusive lock (simulating the running daemon)
    let lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&config.lock_path)
        .unwrap();
    lock_file.lock_exclusive().unwrap();
    std::fs::write(&config.lock_path, b"12345").unwrap();

    match startup(&config, engine_config()) {
        Err(LifecycleError::LockFailed(_)) => {}
        Err(e) => panic!("expected LockFailed, got: {e}"),
        Ok(_) => panic!("expected LockFailed, but startup succeeded"),
    }
    assert_eq!(pid_in(&config.lock_path), "12345");
}

#[tokio::test]
async fn second_daemon_is_refused_while_first_runs() {
    let dir = tempdir().unwrap();
    let config = Config::in_dir(dir.path().to_path_buf());

    let first = startup(&config, engine_config()).unwrap();
    assert!(matches!(startup(&config, engine_config()), Err(LifecycleError::LockFailed(_))));
    drop(first);
    assert!(startup(&config, engine_config()).is_ok());
}

#[tokio::test]
async fn startup_loads_existing_stores() {
    let dir = tempdir().unwrap();
    let config = Config::in_dir(dir.path().to_path_buf());
    let task = ScheduledTask::builder().id("tsk-existing").working_directory(dir.path()).build();
    TaskStore::new(config.tasks_path.clone()).save(&[task]).unwrap();
    let job = Job::builder()
        .id("job-existing")
        .working_directory(dir.path())
        .todos(pending_todos(&["one", "two"]))
        .build();
    JobStore::new(config.jobs_path.clone()).save(&[job]).unwrap();

    let daemon = startup(&config, engine_config()).unwrap();
    assert!(daemon.scheduler.task("tsk-existing").is_some());
    assert_eq!(daemon.runner.job("job-existing").unwrap().job.todos.len(), 2);
}

#[tokio::test]
async fn reload_picks_up_edited_files() {
    let dir = tempdir().unwrap();
    let config = Config::in_dir(dir.path().to_path_buf());
    let daemon = startup(&config, engine_config()).unwrap();
    assert!(daemon.scheduler.list_tasks().is_empty());

    let task = ScheduledTask::builder().id("tsk-added").working_directory(dir.path()).build();
    TaskStore::new(config.tasks_path.clone()).save(&[task]).unwrap();
    daemon.reload().await;

    assert!(daemon.scheduler.task("tsk-added").is_some());
    assert!(daemon.runner.list_jobs().is_empty());
}
