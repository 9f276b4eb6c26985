// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! cadence-storage: JSON-file persistence for tasks and jobs

mod error;
mod file;
mod jobs;
mod tasks;

pub use error::StorageError;
pub use jobs::{JobStore, JOBS_FILE};
pub use tasks::{TaskStore, TASKS_FILE};
