// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cron task scheduler.
//!
//! A periodic tick scans the minutes since the previous tick, queues cron
//! matches per task and dispatches at most one run per task at a time.
//! All loop-local state sits behind one mutex that is never held across an
//! `.await`.

mod execute;
mod ops;
mod tick;

pub use ops::{NewTask, TaskPatch};
pub use tick::TickReport;

use crate::cron::{CronCache, PendingQueue};
use crate::drain::{drain_then_terminate, DrainOutcome};
use crate::env::EngineConfig;
use crate::error::EngineError;
use crate::notify::{Notification, Notifier};
use cadence_core::{Clock, ScheduledTask, TaskId, TaskRuntimeState, TaskView};
use cadence_process::ProcessHandle;
use cadence_storage::TaskStore;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// One reserved run (cron or manual), spawned or not. A stop request is
/// recorded on the reservation it targets and dies with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Reservation {
    ticket: u64,
    /// Task list generation the run was reserved under. A cron run whose
    /// generation is stale when it comes to start is superseded.
    generation: u64,
    stop: bool,
}

#[derive(Default)]
pub(crate) struct SchedulerState {
    tasks: Vec<ScheduledTask>,
    runtime: HashMap<TaskId, TaskRuntimeState>,
    pending: HashMap<TaskId, PendingQueue>,
    dispatching: HashMap<TaskId, Reservation>,
    running: HashMap<TaskId, ProcessHandle>,
    next_ticket: u64,
    /// Bumped whenever the task list is (re)installed.
    generation: u64,
    cache: CronCache,
    last_scanned_minute: Option<i64>,
    tick_in_flight: bool,
    tick_owed: bool,
    shutting_down: bool,
}

impl SchedulerState {
    fn find_task(&self, id: &str) -> Option<&ScheduledTask> {
        self.tasks.iter().find(|t| t.id == id)
    }

    fn view(&self, task: &ScheduledTask) -> TaskView {
        TaskView {
            task: task.clone(),
            runtime: self.runtime.get(&task.id).cloned().unwrap_or_default(),
        }
    }

    fn is_busy(&self, id: &TaskId) -> bool {
        self.dispatching.contains_key(id) || self.running.contains_key(id)
    }

    /// Reserve the task's single run slot and return the run's ticket.
    fn reserve(&mut self, id: &TaskId) -> u64 {
        self.next_ticket += 1;
        let reservation = Reservation { ticket: self.next_ticket, generation: self.generation, stop: false };
        self.dispatching.insert(id.clone(), reservation);
        self.next_ticket
    }

    fn reservation(&self, id: &TaskId, ticket: u64) -> Option<Reservation> {
        self.dispatching.get(id).copied().filter(|r| r.ticket == ticket)
    }

    /// Drop the reservation if it still belongs to `ticket`.
    fn release(&mut self, id: &TaskId, ticket: u64) -> Option<Reservation> {
        let reservation = self.reservation(id, ticket)?;
        self.dispatching.remove(id);
        Some(reservation)
    }
}

struct Inner<N, C> {
    config: EngineConfig,
    store: TaskStore,
    notifier: N,
    clock: C,
    state: Mutex<SchedulerState>,
    /// Held by every writer of `tasks.json` from snapshot until the write
    /// lands, so writes reach disk in the order they were made in memory.
    persist: tokio::sync::Mutex<()>,
    tracker: TaskTracker,
    cancel: CancellationToken,
}

/// Cron-driven task scheduler. Clones share the same instance.
pub struct Scheduler<N, C> {
    inner: Arc<Inner<N, C>>,
}

impl<N, C> Clone for Scheduler<N, C> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<N: Notifier, C: Clock> Scheduler<N, C> {
    /// Load tasks from `store`. Tasks whose cron expression does not parse
    /// are force-disabled and the reason recorded in their runtime state.
    pub fn new(
        config: EngineConfig,
        store: TaskStore,
        notifier: N,
        clock: C,
    ) -> Result<Self, EngineError> {
        let tasks = store.load()?;
        let scheduler = Self {
            inner: Arc::new(Inner {
                config,
                store,
                notifier,
                clock,
                state: Mutex::new(SchedulerState::default()),
                persist: tokio::sync::Mutex::new(()),
                tracker: TaskTracker::new(),
                cancel: CancellationToken::new(),
            }),
        };
        if let Some(tasks) = scheduler.install_tasks(tasks) {
            scheduler.inner.store.save(&tasks)?;
        }
        Ok(scheduler)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Start the periodic tick loop. The first tick runs immediately.
    pub fn start(&self) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(this.inner.config.tick_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            tracing::info!(
                tick_interval_ms = this.inner.config.tick_interval.as_millis() as u64,
                zone = %this.inner.config.cron_zone,
                "scheduler started"
            );
            loop {
                tokio::select! {
                    _ = this.inner.cancel.cancelled() => break,
                    _ = interval.tick() => {
                        this.tick().await;
                    }
                }
            }
            tracing::info!("scheduler tick loop stopped");
        })
    }

    /// Stop dispatching, await in-flight runs up to the drain timeout, then
    /// terminate whatever is still running.
    pub async fn shutdown(&self) -> DrainOutcome {
        {
            let mut state = self.inner.state.lock();
            if state.shutting_down {
                tracing::debug!("scheduler shutdown already requested");
            }
            state.shutting_down = true;
        }
        self.inner.cancel.cancel();
        let config = &self.inner.config;
        drain_then_terminate(
            "scheduler",
            &self.inner.tracker,
            config.drain_timeout,
            config.sigterm_timeout,
            config.sigkill_timeout,
            || self.inner.state.lock().running.values().cloned().collect(),
        )
        .await
    }

    pub fn list_tasks(&self) -> Vec<TaskView> {
        let state = self.inner.state.lock();
        state.tasks.iter().map(|t| state.view(t)).collect()
    }

    pub fn task(&self, id: &str) -> Option<TaskView> {
        let state = self.inner.state.lock();
        state.find_task(id).map(|t| state.view(t))
    }

    /// No run is reserved, in progress or queued.
    pub fn is_idle(&self) -> bool {
        let state = self.inner.state.lock();
        state.dispatching.is_empty() && state.pending.values().all(|q| q.is_empty())
    }

    /// Number of live process handles (at most one per task).
    pub fn running_count(&self) -> usize {
        self.inner.state.lock().running.len()
    }

    /// Re-read `tasks.json`, clear the cron cache and prune state of tasks
    /// that no longer exist.
    pub async fn reload_tasks(&self) -> Result<usize, EngineError> {
        let persist = self.inner.persist.lock().await;
        let tasks = self.inner.store.load()?;
        let count = tasks.len();
        if let Some(tasks) = self.install_tasks(tasks) {
            self.write(tasks).await?;
        }
        drop(persist);
        tracing::info!(tasks = count, "tasks reloaded");
        self.broadcast(Notification::TasksReloaded).await;
        Ok(count)
    }

    /// Replace the task list. Returns the list to persist when loading
    /// force-disabled a task. Runs reserved under the previous list are
    /// superseded.
    fn install_tasks(&self, mut tasks: Vec<ScheduledTask>) -> Option<Vec<ScheduledTask>> {
        let mut guard = self.inner.state.lock();
        let state = &mut *guard;
        state.cache.clear();

        let mut disabled = 0;
        let mut runtime = HashMap::with_capacity(tasks.len());
        for task in &mut tasks {
            let previous = state.runtime.remove(&task.id).unwrap_or_default();
            match state.cache.get(&task.cron) {
                Ok(_) => {
                    runtime.insert(task.id.clone(), previous);
                }
                Err(e) => {
                    let reason = EngineError::InvalidCron { expr: task.cron.clone(), source: e }
                        .to_string();
                    if task.enabled {
                        task.enabled = false;
                        disabled += 1;
                    }
                    tracing::warn!(task_id = %task.id, %reason, "task force-disabled");
                    runtime.insert(task.id.clone(), TaskRuntimeState::invalid(reason));
                }
            }
        }

        let live: HashSet<TaskId> = tasks.iter().map(|t| t.id.clone()).collect();
        state.pending.retain(|id, _| live.contains(id));
        for task in tasks.iter().filter(|t| !t.enabled) {
            state.pending.remove(&task.id);
        }
        state.generation += 1;
        state.tasks = tasks;
        state.runtime = runtime;
        (disabled > 0).then(|| state.tasks.clone())
    }

    async fn broadcast(&self, event: Notification) {
        if let Err(e) = self.inner.notifier.notify(event).await {
            tracing::debug!(error = %e, "notification dropped");
        }
    }

    /// Write `tasks` on the blocking pool and hand the list back for the
    /// in-memory commit. Callers hold `persist`.
    async fn write(&self, tasks: Vec<ScheduledTask>) -> Result<Vec<ScheduledTask>, EngineError> {
        let store = self.inner.store.clone();
        let tasks = tokio::task::spawn_blocking(move || store.save(&tasks).map(|()| tasks)).await??;
        Ok(tasks)
    }

    /// Like [`Self::write`] for internal transitions; failures are logged,
    /// not propagated.
    async fn write_logged(&self, tasks: Vec<ScheduledTask>) {
        if let Err(e) = self.write(tasks).await {
            tracing::error!(error = %e, "failed to persist tasks");
        }
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
