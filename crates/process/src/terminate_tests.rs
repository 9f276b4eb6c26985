// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::config::RunConfig;
use crate::observer::{LineContext, ProcessObserver};
use crate::run::{run_managed_process, RunResult};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Hands the process handle out once the child prints `ready`.
struct ReadySignal {
    handle: Option<ProcessHandle>,
    tx: Option<oneshot::Sender<ProcessHandle>>,
}

impl ProcessObserver for ReadySignal {
    fn on_spawned(&mut self, handle: &ProcessHandle) {
        self.handle = Some(handle.clone());
    }

    fn on_line(&mut self, line: &str, _ctx: &mut LineContext<'_>) {
        if line == "ready" {
            if let (Some(tx), Some(handle)) = (self.tx.take(), self.handle.clone()) {
                let _ = tx.send(handle);
            }
        }
    }
}

async fn start(script: &str) -> (ProcessHandle, JoinHandle<RunResult>) {
    let (tx, rx) = oneshot::channel();
    let config = RunConfig::new("sh").arg("-c").arg(script).max_runtime(Duration::ZERO);
    let run = tokio::spawn(async move {
        let mut observer = ReadySignal { handle: None, tx: Some(tx) };
        run_managed_process(&config, &mut observer).await
    });
    let handle = rx.await.unwrap();
    (handle, run)
}

#[tokio::test]
async fn cooperative_process_exits_on_sigterm() {
    let (handle, run) = start("echo ready; sleep 30").await;
    let result = terminate_managed_process(
        &handle,
        Duration::from_secs(5),
        Duration::from_secs(2),
        "test stop",
    )
    .await;

    assert!(!result.escalated_to_sigkill);
    assert!(!result.timed_out);
    assert!(!result.already_exited);
    assert_eq!(result.signal, Some(Signal::SIGTERM as i32));

    let run = run.await.unwrap();
    assert!(!run.timed_out);
    assert_eq!(run.signal, Some(Signal::SIGTERM as i32));
}

#[tokio::test]
async fn process_ignoring_sigterm_is_killed_after_grace_period() {
    let (handle, run) = start("trap '' TERM; echo ready; sleep 30").await;
    let grace = Duration::from_millis(400);
    let started = std::time::Instant::now();
    let result =
        terminate_managed_process(&handle, grace, Duration::from_secs(5), "test stop").await;

    assert!(result.escalated_to_sigkill);
    assert!(!result.timed_out);
    assert_eq!(result.signal, Some(Signal::SIGKILL as i32));
    assert!(started.elapsed() >= grace);
    assert!(started.elapsed() < grace + Duration::from_secs(5));
    run.await.unwrap();
}

#[tokio::test]
async fn grandchildren_in_the_group_are_signalled() {
    let (handle, run) = start("sleep 30 & echo ready; wait").await;
    let result = terminate_managed_process(
        &handle,
        Duration::from_secs(5),
        Duration::from_secs(2),
        "test stop",
    )
    .await;
    assert!(!result.escalated_to_sigkill);
    let run = run.await.unwrap();
    assert!(run.duration < Duration::from_secs(10));
}

#[tokio::test]
async fn terminating_an_exited_process_reports_already_exited() {
    let (handle, run) = start("echo ready").await;
    run.await.unwrap();
    let result = terminate_managed_process(
        &handle,
        Duration::from_millis(100),
        Duration::from_millis(100),
        "late stop",
    )
    .await;
    assert!(result.already_exited);
    assert!(!result.escalated_to_sigkill);
    assert_eq!(result.exit_code, Some(0));
}

#[tokio::test]
async fn signal_after_exit_is_not_an_error() {
    let (handle, run) = start("echo ready").await;
    run.await.unwrap();
    assert_eq!(handle.signal(Signal::SIGTERM).unwrap(), SignalOutcome::AlreadyExited);
    assert!(matches!(handle.wait_exit().await, ExitWait::Exited(_)));
}
