// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end behavior of the scheduler and runner through the public API.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use cadence_core::test_support::todo;
use cadence_core::{FakeClock, Job, JobId, RunStatus, ScheduledTask, TodoStatus, MINUTE_MS};
use cadence_engine::cron::{CronExpr, CronZone};
use cadence_engine::{
    BroadcastNotifier, EngineConfig, EngineError, FakeNotifier, JobRunner, Notification, Scheduler,
};
use cadence_storage::{JobStore, TaskStore};
use std::time::{Duration, Instant};

/// 2026-01-01T00:00:00Z, a Thursday.
const JAN_2026_MINUTE: i64 = 1_767_225_600 / 60;

fn config() -> EngineConfig {
    EngineConfig {
        cron_zone: CronZone::Utc,
        sigterm_timeout: Duration::from_millis(500),
        sigkill_timeout: Duration::from_millis(500),
        ..EngineConfig::default()
    }
}

async fn eventually(what: &str, mut done: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !done() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn matching_minutes(expr: &str, days: i64) -> Vec<String> {
    let expr = CronExpr::parse(expr).unwrap();
    (JAN_2026_MINUTE..JAN_2026_MINUTE + days * 1_440)
        .filter(|m| expr.matches(&CronZone::Utc.parts(*m)))
        .map(|m| CronZone::Utc.minute_key(m))
        .collect()
}

#[test]
fn every_minute_matches_every_minute() {
    assert_eq!(matching_minutes("* * * * *", 1).len(), 1_440);
}

#[test]
fn weekday_mornings_skip_weekends() {
    let hits = matching_minutes("0 9 * * 1-5", 31);
    assert_eq!(hits.len(), 22);
    assert!(hits.iter().all(|k| k.ends_with("T09:00")));
    assert!(!hits.contains(&"2026-01-03T09:00".to_string()));
    assert!(!hits.contains(&"2026-01-04T09:00".to_string()));
}

#[test]
fn day_of_month_and_weekday_combine_with_or() {
    assert_eq!(
        matching_minutes("0 0 1 * 1", 31),
        vec!["2026-01-01T00:00", "2026-01-05T00:00", "2026-01-12T00:00", "2026-01-19T00:00", "2026-01-26T00:00"]
    );
}

#[tokio::test]
async fn manual_and_cron_runs_never_overlap_for_one_task() {
    let dir = tempfile::tempdir().unwrap();
    let store = TaskStore::in_dir(dir.path());
    let task = ScheduledTask::builder()
        .id("tsk-solo")
        .cron("* * * * *")
        .working_directory(dir.path())
        .build();
    store.save(&[task]).unwrap();

    let mut cfg = config();
    cfg.agent_command = "[ -e lock ] && echo overlap >> violations; touch lock; sleep 0.1; rm lock".to_string();
    let clock = FakeClock::at_epoch_ms(JAN_2026_MINUTE as u64 * MINUTE_MS);
    let scheduler = Scheduler::new(cfg, store, FakeNotifier::new(), clock.clone()).unwrap();

    scheduler.tick().await.unwrap();
    assert!(matches!(scheduler.run_task_now("tsk-solo"), Err(EngineError::AlreadyRunning(_))));
    clock.advance_minutes(3);
    scheduler.tick().await.unwrap();
    eventually("scheduler idle", || {
        assert!(scheduler.running_count() <= 1);
        scheduler.is_idle()
    })
    .await;
    scheduler.run_task_now("tsk-solo").unwrap();
    eventually("manual run", || scheduler.is_idle()).await;

    assert!(!dir.path().join("violations").exists());
    let view = scheduler.task("tsk-solo").unwrap();
    assert_eq!(view.runtime.last_status, RunStatus::Success);
}

#[tokio::test]
async fn broadcast_subscribers_see_the_run_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let store = TaskStore::in_dir(dir.path());
    let task = ScheduledTask::builder().id("tsk-b").cron("0 0 1 1 *").working_directory(dir.path()).build();
    store.save(&[task]).unwrap();

    let mut cfg = config();
    cfg.agent_command = "true".to_string();
    let notifier = BroadcastNotifier::new(16);
    let mut rx = notifier.subscribe();
    let scheduler = Scheduler::new(cfg, store, notifier, FakeClock::new()).unwrap();

    scheduler.run_task_now("tsk-b").unwrap();
    let started = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap();
    assert!(matches!(started, Notification::TaskStarted { .. }));
    let completed = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap();
    assert!(matches!(completed, Notification::TaskCompleted { status: RunStatus::Success, .. }));
}

#[tokio::test]
async fn restart_recovers_items_left_running() {
    let dir = tempfile::tempdir().unwrap();
    let store = JobStore::in_dir(dir.path());
    let mut job = Job::builder().id("job-r").working_directory(dir.path()).runner_command("true").build();
    job.todos = vec![todo("interrupted", TodoStatus::Running, 1)];
    store.save(&[job]).unwrap();

    // A fresh runner over the same file plays the part of the restarted daemon.
    let runner = JobRunner::new(config(), store, FakeNotifier::new(), FakeClock::new()).unwrap();
    assert_eq!(runner.tick().await, vec![JobId::from("job-r")]);
    eventually("runner idle", || runner.is_idle()).await;

    let item = &runner.job("job-r").unwrap().job.todos[0];
    assert_eq!(item.status, TodoStatus::Done);
    assert_eq!(item.attempts, 2);
    let stored = JobStore::in_dir(dir.path()).load().unwrap();
    assert_eq!(stored[0].todos[0].status, TodoStatus::Done);
}

#[tokio::test]
async fn stops_are_free_and_failures_are_not() {
    let dir = tempfile::tempdir().unwrap();
    let store = JobStore::in_dir(dir.path());
    let job = Job::builder()
        .id("job-p")
        .working_directory(dir.path())
        .runner_command("if [ -e fail ]; then exit 1; fi; sleep 30")
        .todos(vec![todo("item", TodoStatus::Pending, 0)])
        .build();
    store.save(&[job]).unwrap();
    let mut cfg = config();
    cfg.max_attempts = 2;
    let runner = JobRunner::new(cfg, store, FakeNotifier::new(), FakeClock::new()).unwrap();

    for _ in 0..3 {
        runner.tick().await;
        eventually("spawn", || runner.running_count() == 1).await;
        assert!(runner.stop_job("job-p").await.unwrap());
        eventually("stop", || runner.is_idle()).await;
        let item = &runner.job("job-p").unwrap().job.todos[0];
        assert_eq!((item.status, item.attempts), (TodoStatus::Pending, 0));
    }

    std::fs::write(dir.path().join("fail"), "").unwrap();
    for attempt in 1..=2 {
        runner.tick().await;
        eventually("failure", || runner.is_idle()).await;
        let view = runner.job("job-p").unwrap();
        assert_eq!((view.job.todos[0].status, view.job.todos[0].attempts), (TodoStatus::Error, attempt));
    }
    assert!(!runner.job("job-p").unwrap().job.enabled);
}
