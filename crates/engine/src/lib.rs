// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

//! Cadence engine: the cron task scheduler and the concurrency-limited job
//! runner, plus the pieces they share (cron evaluation, configuration,
//! notifications, output classification, shutdown drain).

pub mod classify;
pub mod cron;
mod drain;
pub mod env;
pub mod error;
pub mod notify;
pub mod runner;
pub mod scheduler;

pub use classify::{classify_line, Verdict};
pub use drain::DrainOutcome;
pub use env::EngineConfig;
pub use error::EngineError;
pub use notify::{BroadcastNotifier, NoopNotifier, Notification, Notifier, NotifyError};
pub use runner::{JobPatch, JobRunner, NewJob};
pub use scheduler::{NewTask, Scheduler, TaskPatch, TickReport};

#[cfg(any(test, feature = "test-support"))]
pub use notify::FakeNotifier;
