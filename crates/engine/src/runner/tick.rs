// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{JobRunner, RunnerState};
use crate::notify::{Notification, Notifier};
use cadence_core::{Clock, JobId, TodoStatus};

impl<N: Notifier, C: Clock> JobRunner<N, C> {
    /// Reconcile stale state, then start the next eligible item of as many
    /// idle jobs as there are free slots. Returns the jobs started.
    pub async fn tick(&self) -> Vec<JobId> {
        let persist = self.inner.persist.lock().await;
        let (reconciled, picks, snapshot) = {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;
            if state.shutting_down {
                return Vec::new();
            }
            let reconciled = reconcile(state);
            let snapshot = (!reconciled.is_empty()).then(|| state.jobs.clone());
            let busy = state.running.len() + state.reserved.len();
            let slots = self.inner.config.max_concurrent_jobs.saturating_sub(busy);
            let picks = select(state, slots, self.inner.config.max_attempts);
            (reconciled, picks, snapshot)
        };
        if let Some(jobs) = snapshot {
            self.write_logged(jobs).await;
        }
        drop(persist);

        for id in reconciled {
            self.broadcast(Notification::JobTodosChanged(id)).await;
        }
        for id in &picks {
            let this = self.clone();
            let id = id.clone();
            self.inner.tracker.spawn(async move {
                this.execute_item(&id).await;
            });
        }
        picks
    }
}

/// Reset items left `running` by a previous process (or a lost handle)
/// back to `pending`. Returns the jobs touched.
fn reconcile(state: &mut RunnerState) -> Vec<JobId> {
    let RunnerState { jobs, running, reserved, .. } = state;
    let mut touched = Vec::new();
    for job in jobs.iter_mut() {
        if running.contains_key(&job.id) || reserved.contains(&job.id) {
            continue;
        }
        let mut stale = 0;
        for todo in job.todos.iter_mut().filter(|t| t.status == TodoStatus::Running) {
            todo.status = TodoStatus::Pending;
            stale += 1;
        }
        if stale > 0 {
            tracing::warn!(job_id = %job.id, stale, "reset stale running items to pending");
            touched.push(job.id.clone());
        }
    }
    touched
}

/// Walk jobs once from the rotating offset and reserve up to `slots` idle
/// jobs that have an eligible item.
fn select(state: &mut RunnerState, slots: usize, max_attempts: u32) -> Vec<JobId> {
    let count = state.jobs.len();
    let mut picks = Vec::new();
    if count == 0 || slots == 0 {
        return picks;
    }
    let start = state.scan_offset % count;
    for step in 0..count {
        let index = (start + step) % count;
        let job = &state.jobs[index];
        if !job.enabled || state.is_busy(&job.id) || job.next_eligible_todo(max_attempts).is_none() {
            continue;
        }
        let id = job.id.clone();
        state.reserved.insert(id.clone());
        state.scan_offset = (index + 1) % count;
        tracing::debug!(job_id = %id, index, "reserved slot");
        picks.push(id);
        if picks.len() == slots {
            break;
        }
    }
    picks
}
