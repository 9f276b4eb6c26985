// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scan-window resolution and the per-task pending run queue.

use std::collections::VecDeque;
use std::ops::RangeInclusive;

/// Minutes one tick scans, oldest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanWindow {
    pub minutes: RangeInclusive<i64>,
    /// Missed minutes dropped because the gap exceeded the backfill limit.
    pub clamped: u64,
}

impl ScanWindow {
    pub fn len(&self) -> u64 {
        (self.minutes.end() - self.minutes.start() + 1).max(0) as u64
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Resolve the minutes to scan on this tick.
///
/// The first tick (`last_scanned == None`) scans only `now`. Otherwise scans
/// `last_scanned + 1 ..= now`, keeping at most the newest `backfill_minutes`.
/// Returns `None` when there is nothing new (same minute, or the clock went
/// backwards).
pub fn resolve_window(last_scanned: Option<i64>, now: i64, backfill_minutes: u32) -> Option<ScanWindow> {
    let Some(last) = last_scanned else {
        return Some(ScanWindow { minutes: now..=now, clamped: 0 });
    };
    if now <= last {
        return None;
    }
    let limit = i64::from(backfill_minutes.max(1));
    let first = last + 1;
    let earliest = now - limit + 1;
    if first < earliest {
        Some(ScanWindow { minutes: earliest..=now, clamped: (earliest - first) as u64 })
    } else {
        Some(ScanWindow { minutes: first..=now, clamped: 0 })
    }
}

/// A queued cron run for one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRun {
    pub minute: i64,
    pub minute_key: String,
}

/// Pending runs for one task, ascending by minute, bounded by a backlog limit.
#[derive(Debug, Clone, Default)]
pub struct PendingQueue {
    runs: VecDeque<PendingRun>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    pub fn contains(&self, minute_key: &str) -> bool {
        self.runs.iter().any(|r| r.minute_key == minute_key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingRun> {
        self.runs.iter()
    }

    /// Insert in minute order (duplicates ignored), then trim to `limit` by
    /// dropping the oldest. Returns the dropped runs.
    pub fn push(&mut self, run: PendingRun, limit: usize) -> Vec<PendingRun> {
        if !self.contains(&run.minute_key) {
            let at = self.runs.partition_point(|r| r.minute <= run.minute);
            self.runs.insert(at, run);
        }
        let excess = self.runs.len().saturating_sub(limit.max(1));
        self.runs.drain(..excess).collect()
    }

    pub fn pop_oldest(&mut self) -> Option<PendingRun> {
        self.runs.pop_front()
    }

    /// Put a run that never started back at the head of the queue.
    pub fn requeue_front(&mut self, run: PendingRun) {
        if !self.contains(&run.minute_key) {
            self.runs.push_front(run);
        }
    }

    pub fn clear(&mut self) {
        self.runs.clear();
    }
}

#[cfg(test)]
#[path = "window_tests.rs"]
mod tests;
