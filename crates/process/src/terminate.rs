// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Externally requested termination with SIGTERM-then-SIGKILL escalation.

use crate::handle::{ExitInfo, ExitWait, ProcessHandle, SignalOutcome};
use nix::sys::signal::Signal;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TerminateResult {
    pub exit_code: Option<i32>,
    pub signal: Option<i32>,
    pub escalated_to_sigkill: bool,
    /// The process survived SIGKILL for the whole wait. Always logged at error level.
    pub timed_out: bool,
    /// The process was already gone before SIGTERM was sent.
    pub already_exited: bool,
}

impl TerminateResult {
    fn exited(info: ExitInfo, escalated_to_sigkill: bool) -> Self {
        Self {
            exit_code: info.code,
            signal: info.signal,
            escalated_to_sigkill,
            ..Self::default()
        }
    }
}

/// Stop `handle`: SIGTERM, wait `sigterm_timeout`, then SIGKILL and wait
/// `sigkill_timeout`. `reason` is only used for logging.
pub async fn terminate_managed_process(
    handle: &ProcessHandle,
    sigterm_timeout: Duration,
    sigkill_timeout: Duration,
    reason: &str,
) -> TerminateResult {
    let pid = handle.pid();
    if let Some(info) = handle.exit_info() {
        return TerminateResult { already_exited: true, ..TerminateResult::exited(info, false) };
    }

    tracing::info!(pid, label = handle.label(), reason, "terminating process");
    let mut already_exited = false;
    match handle.signal(Signal::SIGTERM) {
        Ok(SignalOutcome::Sent) => {}
        Ok(SignalOutcome::AlreadyExited) => already_exited = true,
        Err(e) => tracing::warn!(pid, error = %e, "failed to send SIGTERM"),
    }

    match handle.wait_exit_timeout(sigterm_timeout).await {
        ExitWait::Exited(info) => {
            tracing::debug!(pid, reason, "process exited after SIGTERM");
            return TerminateResult { already_exited, ..TerminateResult::exited(info, false) };
        }
        ExitWait::Detached => {
            return TerminateResult { already_exited, ..TerminateResult::default() };
        }
        ExitWait::TimedOut => {}
    }

    tracing::warn!(
        pid,
        label = handle.label(),
        reason,
        sigterm_timeout_ms = sigterm_timeout.as_millis() as u64,
        "process ignored SIGTERM, escalating to SIGKILL"
    );
    if let Err(e) = handle.signal(Signal::SIGKILL) {
        tracing::error!(pid, error = %e, "failed to send SIGKILL");
    }

    match handle.wait_exit_timeout(sigkill_timeout).await {
        ExitWait::Exited(info) => TerminateResult::exited(info, true),
        ExitWait::Detached => TerminateResult { escalated_to_sigkill: true, ..TerminateResult::default() },
        ExitWait::TimedOut => {
            tracing::error!(
                pid,
                label = handle.label(),
                reason,
                sigkill_timeout_ms = sigkill_timeout.as_millis() as u64,
                "process still alive after SIGKILL"
            );
            TerminateResult { escalated_to_sigkill: true, timed_out: true, ..TerminateResult::default() }
        }
    }
}

#[cfg(test)]
#[path = "terminate_tests.rs"]
mod tests;
