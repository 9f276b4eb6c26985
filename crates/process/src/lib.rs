// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

//! Process lifecycle management: spawn a command, stream its output line by
//! line, enforce a runtime budget and terminate with SIGTERM/SIGKILL
//! escalation. Children lead their own process group so signals reach
//! shell-spawned grandchildren too.

mod config;
mod error;
mod handle;
mod observer;
mod run;
mod tail;
mod terminate;

pub use config::{
    RunConfig, DEFAULT_FORCE_KILL_TIMEOUT, DEFAULT_MAX_RUNTIME, DEFAULT_OUTPUT_TAIL_CHARS,
};
pub use error::{ProcessError, SpawnError, SpawnErrorKind};
pub use handle::{ExitInfo, ExitWait, ProcessHandle, SignalOutcome};
pub use observer::{LineContext, NoopObserver, ProcessObserver};
pub use run::{run_managed_process, RunResult, POST_EXIT_DRAIN};
pub use tail::{LineSplitter, OutputTail, MAX_LINE_BYTES};
pub use terminate::{terminate_managed_process, TerminateResult};
