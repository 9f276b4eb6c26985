// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lightweight reference to a running managed process.

use crate::error::ProcessError;
use nix::errno::Errno;
use nix::sys::signal::{kill, killpg, Signal};
use nix::unistd::Pid;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// How a process ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExitInfo {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

impl ExitInfo {
    pub fn from_status(status: std::process::ExitStatus) -> Self {
        use std::os::unix::process::ExitStatusExt;
        Self { code: status.code(), signal: status.signal() }
    }
}

/// Result of waiting for a process to exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitWait {
    Exited(ExitInfo),
    /// The owning run went away without reporting an exit (its future was
    /// dropped; the child was killed on drop).
    Detached,
    TimedOut,
}

/// Outcome of sending a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalOutcome {
    Sent,
    AlreadyExited,
}

/// Cloneable reference to a process owned by a running
/// [`run_managed_process`](crate::run_managed_process) call.
///
/// The run owns the child and reaps it; the handle can only observe exit
/// and send signals.
#[derive(Debug, Clone)]
pub struct ProcessHandle {
    pid: u32,
    process_group: bool,
    label: Arc<str>,
    exit_rx: watch::Receiver<Option<ExitInfo>>,
}

impl ProcessHandle {
    pub(crate) fn new(
        pid: u32,
        process_group: bool,
        label: &str,
        exit_rx: watch::Receiver<Option<ExitInfo>>,
    ) -> Self {
        Self { pid, process_group, label: Arc::from(label), exit_rx }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn exit_info(&self) -> Option<ExitInfo> {
        *self.exit_rx.borrow()
    }

    pub fn has_exited(&self) -> bool {
        self.exit_info().is_some()
    }

    /// Wait until the owning run reaps the process.
    pub async fn wait_exit(&self) -> ExitWait {
        let mut rx = self.exit_rx.clone();
        loop {
            if let Some(info) = *rx.borrow_and_update() {
                return ExitWait::Exited(info);
            }
            if rx.changed().await.is_err() {
                return match *rx.borrow() {
                    Some(info) => ExitWait::Exited(info),
                    None => ExitWait::Detached,
                };
            }
        }
    }

    pub async fn wait_exit_timeout(&self, timeout: Duration) -> ExitWait {
        tokio::time::timeout(timeout, self.wait_exit()).await.unwrap_or(ExitWait::TimedOut)
    }

    /// Send `signal` to the process group (or the pid when not a group leader).
    ///
    /// Checks the exit state first; `ESRCH` counts as already exited.
    pub fn signal(&self, signal: Signal) -> Result<SignalOutcome, ProcessError> {
        if self.has_exited() {
            return Ok(SignalOutcome::AlreadyExited);
        }
        let pid = Pid::from_raw(self.pid as i32);
        let result = if self.process_group { killpg(pid, signal) } else { kill(pid, signal) };
        match result {
            Ok(()) => Ok(SignalOutcome::Sent),
            Err(Errno::ESRCH) => Ok(SignalOutcome::AlreadyExited),
            Err(source) => Err(ProcessError::Signal { pid: self.pid, signal, source }),
        }
    }
}
