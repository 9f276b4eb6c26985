// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Side-channel callbacks for a managed run.

use crate::handle::ProcessHandle;

/// Mutable access to the run's result error from inside the line classifier.
///
/// A line that looks like a structured failure report sets the error, which
/// then overrides an otherwise-successful exit code.
pub struct LineContext<'a> {
    result_error: &'a mut Option<String>,
}

impl<'a> LineContext<'a> {
    pub fn new(result_error: &'a mut Option<String>) -> Self {
        Self { result_error }
    }

    pub fn result_error(&self) -> Option<&str> {
        self.result_error.as_deref()
    }

    pub fn set_result_error(&mut self, error: impl Into<String>) {
        *self.result_error = Some(error.into());
    }

    pub fn clear_result_error(&mut self) {
        *self.result_error = None;
    }
}

/// Observer for events during a managed run. All methods default to no-ops.
///
/// Callbacks run on the task driving the run, in event order.
pub trait ProcessObserver: Send {
    /// Called once the process exists, before any output is read.
    fn on_spawned(&mut self, _handle: &ProcessHandle) {}

    /// Called for every complete, non-blank stdout line.
    fn on_line(&mut self, _line: &str, _ctx: &mut LineContext<'_>) {}

    /// Called for every complete, non-blank stderr line.
    fn on_stderr_line(&mut self, _line: &str) {}

    /// The runtime budget elapsed and SIGTERM was sent.
    fn on_timeout(&mut self) {}

    /// The grace period elapsed and SIGKILL was sent.
    fn on_force_kill(&mut self) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ProcessObserver for NoopObserver {}
