// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cadence daemon library: state directory resolution, single-instance
//! startup and the wiring between the engine and its stores.

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod env;
pub mod lifecycle;
pub mod logging;

pub use lifecycle::{startup, Config, Daemon, LifecycleError};
