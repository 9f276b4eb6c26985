// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cron expression engine: parsing, matching, scan windows and backlog.

mod cache;
mod expr;
mod window;
mod zone;

pub use cache::CronCache;
pub use expr::{CronExpr, CronField, CronParseError};
pub use window::{resolve_window, PendingQueue, PendingRun, ScanWindow};
pub use zone::{minute_rfc3339, CronZone, MinuteParts};
