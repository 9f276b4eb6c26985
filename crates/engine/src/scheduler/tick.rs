// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tick: window resolution, match & enqueue, dispatch.

use super::execute::RunStart;
use super::{Scheduler, SchedulerState};
use crate::cron::{resolve_window, PendingRun, ScanWindow};
use crate::env::EngineConfig;
use crate::notify::{Notification, Notifier};
use cadence_core::{Clock, TaskId, Trigger};

/// What one tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub window: Option<ScanWindow>,
    /// Cron matches pushed onto pending queues.
    pub enqueued: usize,
    /// Queued runs dropped by the backlog limit.
    pub dropped: usize,
    pub dispatched: usize,
}

impl<N: Notifier, C: Clock> Scheduler<N, C> {
    /// Run one tick. A tick requested while another is in flight is
    /// coalesced: it runs once the current one finishes and `None` is
    /// returned to the caller that was folded in.
    pub async fn tick(&self) -> Option<TickReport> {
        {
            let mut state = self.inner.state.lock();
            if state.shutting_down {
                return None;
            }
            if state.tick_in_flight {
                state.tick_owed = true;
                tracing::debug!("tick in flight, coalescing");
                return None;
            }
            state.tick_in_flight = true;
        }

        let mut report = self.tick_once().await;
        loop {
            {
                let mut state = self.inner.state.lock();
                if !state.tick_owed || state.shutting_down {
                    state.tick_owed = false;
                    state.tick_in_flight = false;
                    break;
                }
                state.tick_owed = false;
            }
            tracing::debug!("running owed tick");
            report = self.tick_once().await;
        }
        Some(report)
    }

    async fn tick_once(&self) -> TickReport {
        let now = self.inner.clock.epoch_minute();
        let (mut report, touched) = {
            let mut state = self.inner.state.lock();
            enqueue_due(&mut state, &self.inner.config, now)
        };
        for id in touched {
            self.broadcast(Notification::TaskUpdated(id)).await;
        }
        report.dispatched = self.dispatch_all();
        report
    }

    /// Attempt dispatch for every task with queued runs.
    pub(crate) fn dispatch_all(&self) -> usize {
        let ready: Vec<TaskId> = {
            let state = self.inner.state.lock();
            state.pending.iter().filter(|(_, q)| !q.is_empty()).map(|(id, _)| id.clone()).collect()
        };
        ready.iter().filter(|id| self.try_dispatch(id)).count()
    }

    /// Pop the oldest queued minute for `id` and start it, unless the task
    /// is already busy or the scheduler is shutting down.
    pub(crate) fn try_dispatch(&self, id: &TaskId) -> bool {
        let (ticket, run) = {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;
            if state.shutting_down || state.is_busy(id) {
                return false;
            }
            let Some(queue) = state.pending.get_mut(id) else {
                return false;
            };
            let Some(run) = queue.pop_oldest() else {
                return false;
            };
            let remaining = queue.len();
            if let Some(rt) = state.runtime.get_mut(id) {
                rt.pending_runs = remaining;
            }
            (state.reserve(id), run)
        };

        tracing::debug!(task_id = %id, minute_key = %run.minute_key, "dispatching cron run");
        let this = self.clone();
        let id = id.clone();
        self.inner.tracker.spawn(async move {
            let start = this.execute(&id, ticket, Trigger::Cron, Some(&run)).await;
            this.finish_dispatch(&id, ticket, Some(run), start);
            this.try_dispatch(&id);
        });
        true
    }

    /// Release the reservation held by `ticket`. A superseded cron run goes
    /// back to the head of its queue when the scheduler is not shutting down
    /// and the task, as now installed, is enabled and still matches the
    /// run's minute.
    pub(crate) fn finish_dispatch(&self, id: &TaskId, ticket: u64, run: Option<PendingRun>, start: RunStart) {
        let zone = self.inner.config.cron_zone;
        let mut guard = self.inner.state.lock();
        let state = &mut *guard;
        state.release(id, ticket);
        if start != RunStart::Superseded || state.shutting_down {
            return;
        }
        let Some(run) = run else { return };
        let SchedulerState { tasks, runtime, pending, cache, .. } = state;
        let Some(task) = tasks.iter().find(|t| t.id == *id && t.enabled) else {
            return;
        };
        if !cache.get(&task.cron).is_ok_and(|expr| expr.matches(&zone.parts(run.minute))) {
            tracing::debug!(task_id = %id, minute_key = %run.minute_key, "superseded run no longer matches");
            return;
        }
        tracing::debug!(task_id = %id, minute_key = %run.minute_key, "requeueing superseded run");
        let queue = pending.entry(id.clone()).or_default();
        queue.requeue_front(run);
        if let Some(rt) = runtime.get_mut(id) {
            rt.pending_runs = queue.len();
        }
    }
}

/// Resolve this tick's window and queue every unqueued match.
/// Returns the report and the tasks whose queue changed.
fn enqueue_due(
    state: &mut SchedulerState,
    config: &EngineConfig,
    now: i64,
) -> (TickReport, Vec<TaskId>) {
    let mut report = TickReport::default();
    let mut touched = Vec::new();

    let Some(window) = resolve_window(state.last_scanned_minute, now, config.backfill_minutes) else {
        if let Some(last) = state.last_scanned_minute {
            if now < last {
                tracing::warn!(last, now, "clock moved backwards, re-anchoring scan window");
                state.last_scanned_minute = Some(now);
            }
        }
        return (report, touched);
    };
    if window.clamped > 0 {
        tracing::warn!(
            clamped = window.clamped,
            scanned = window.len(),
            backfill_minutes = config.backfill_minutes,
            "scan window clamped"
        );
    }
    state.last_scanned_minute = Some(now);

    let zone = config.cron_zone;
    let SchedulerState { tasks, runtime, pending, cache, .. } = state;
    for task in tasks.iter().filter(|t| t.enabled) {
        let Ok(expr) = cache.get(&task.cron) else {
            continue;
        };
        let rt = runtime.entry(task.id.clone()).or_default();
        let queue = pending.entry(task.id.clone()).or_default();
        let mut changed = false;

        for minute in window.minutes.clone() {
            if !expr.matches(&zone.parts(minute)) {
                continue;
            }
            let minute_key = zone.minute_key(minute);
            if rt.last_completed_minute_key.as_deref() == Some(minute_key.as_str())
                || rt.last_scheduled_minute_key.as_deref() == Some(minute_key.as_str())
                || queue.contains(&minute_key)
            {
                continue;
            }
            let dropped = queue.push(PendingRun { minute, minute_key }, config.pending_backlog_limit);
            report.enqueued += 1;
            changed = true;
            if !dropped.is_empty() {
                tracing::warn!(
                    task_id = %task.id,
                    dropped = dropped.len(),
                    oldest_dropped = %dropped[0].minute_key,
                    backlog_limit = config.pending_backlog_limit,
                    "pending backlog full, dropped oldest runs"
                );
                report.dropped += dropped.len();
            }
        }

        if changed {
            rt.pending_runs = queue.len();
            touched.push(task.id.clone());
        }
    }
    tracing::debug!(
        first = *window.minutes.start(),
        last = *window.minutes.end(),
        enqueued = report.enqueued,
        "tick scanned"
    );
    report.window = Some(window);
    (report, touched)
}
