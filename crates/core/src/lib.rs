// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! cadence-core: data model shared by the process manager, scheduler and job runner

pub mod macros;

pub mod clock;
pub mod id;
pub mod job;
pub mod status;
pub mod task;
pub mod text;
pub mod time_fmt;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use clock::{Clock, FakeClock, SystemClock, MINUTE_MS};
pub use job::{Job, JobId, JobRuntimeState, JobView, TodoId, TodoItem, TodoStatus};
pub use status::{paused_error, RunStatus, Trigger, PAUSED_SUFFIX};
pub use task::{ScheduledTask, TaskId, TaskRuntimeState, TaskView};
pub use text::{last_line, truncate_chars};
pub use time_fmt::format_elapsed_ms;
