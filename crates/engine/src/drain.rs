// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Two-phase shutdown shared by the scheduler and the job runner.

use cadence_process::{terminate_managed_process, ProcessHandle};
use futures_util::future::join_all;
use std::time::Duration;
use tokio_util::task::TaskTracker;

/// Recorded as the last error of a run the user stopped.
pub(crate) const STOPPED_BY_USER: &str = "stopped by user";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Every in-flight run finished within the drain timeout.
    Drained,
    /// The timeout elapsed; this many processes were terminated.
    Terminated(usize),
}

/// Await in-flight runs up to `drain_timeout`, then terminate whatever is
/// still running with SIGTERM/SIGKILL escalation.
pub(crate) async fn drain_then_terminate<F>(
    component: &'static str,
    tracker: &TaskTracker,
    drain_timeout: Duration,
    sigterm_timeout: Duration,
    sigkill_timeout: Duration,
    running: F,
) -> DrainOutcome
where
    F: Fn() -> Vec<ProcessHandle>,
{
    tracker.close();
    let in_flight = tracker.len();
    if tokio::time::timeout(drain_timeout, tracker.wait()).await.is_ok() {
        tracing::info!(component, in_flight, "drained in-flight runs");
        return DrainOutcome::Drained;
    }

    let handles = running();
    tracing::warn!(
        component,
        remaining = handles.len(),
        drain_timeout_ms = drain_timeout.as_millis() as u64,
        "drain timed out, terminating running processes"
    );
    let results = join_all(
        handles
            .iter()
            .map(|h| terminate_managed_process(h, sigterm_timeout, sigkill_timeout, "shutdown")),
    )
    .await;
    let unkillable = results.iter().filter(|r| r.timed_out).count();
    if unkillable > 0 {
        tracing::error!(component, unkillable, "processes survived shutdown");
    }

    // Let completion handlers record the terminated runs.
    if tokio::time::timeout(sigterm_timeout + sigkill_timeout, tracker.wait()).await.is_err() {
        tracing::warn!(component, "completion handlers still pending after terminate");
    }
    DrainOutcome::Terminated(handles.len())
}
