// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Concurrency-limited job runner.
//!
//! Each job owns an ordered todo list. A periodic tick hands free slots to
//! idle jobs in round-robin order; each slot runs the job's next eligible
//! item through the process manager.

mod execute;
mod ops;
mod tick;
mod todos;

pub use ops::{JobPatch, NewJob};
pub use todos::merge_todos;

use crate::drain::{drain_then_terminate, DrainOutcome};
use crate::env::EngineConfig;
use crate::error::EngineError;
use crate::notify::{Notification, Notifier};
use cadence_core::{Clock, Job, JobId, JobRuntimeState, JobView};
use cadence_process::ProcessHandle;
use cadence_storage::JobStore;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

#[derive(Default)]
pub(crate) struct RunnerState {
    jobs: Vec<Job>,
    runtime: HashMap<JobId, JobRuntimeState>,
    running: HashMap<JobId, ProcessHandle>,
    /// Slots claimed by a tick whose process has not spawned yet.
    reserved: HashSet<JobId>,
    stop_requested: HashSet<JobId>,
    scan_offset: usize,
    shutting_down: bool,
}

impl RunnerState {
    fn job_index(&self, id: &str) -> Option<usize> {
        self.jobs.iter().position(|j| j.id == id)
    }

    fn find_job(&self, id: &str) -> Option<&Job> {
        self.jobs.iter().find(|j| j.id == id)
    }

    fn is_busy(&self, id: &JobId) -> bool {
        self.running.contains_key(id) || self.reserved.contains(id)
    }

    fn view(&self, job: &Job) -> JobView {
        JobView { job: job.clone(), runtime: self.runtime.get(&job.id).cloned().unwrap_or_default() }
    }
}

struct Inner<N, C> {
    config: EngineConfig,
    store: JobStore,
    notifier: N,
    clock: C,
    state: Mutex<RunnerState>,
    /// Held by every writer of `jobs.json` from snapshot until the write
    /// lands.
    persist: tokio::sync::Mutex<()>,
    tracker: TaskTracker,
    cancel: CancellationToken,
}

/// Round-robin job runner. Clones share the same instance.
pub struct JobRunner<N, C> {
    inner: Arc<Inner<N, C>>,
}

impl<N, C> Clone for JobRunner<N, C> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<N: Notifier, C: Clock> JobRunner<N, C> {
    /// Load jobs from `store`. Items persisted as `running` stay that way
    /// until the first tick reconciles them.
    pub fn new(config: EngineConfig, store: JobStore, notifier: N, clock: C) -> Result<Self, EngineError> {
        let jobs = store.load()?;
        tracing::info!(jobs = jobs.len(), path = %store.path().display(), "jobs loaded");
        let runtime = jobs.iter().map(|j| (j.id.clone(), JobRuntimeState::default())).collect();
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                store,
                notifier,
                clock,
                state: Mutex::new(RunnerState { jobs, runtime, ..RunnerState::default() }),
                persist: tokio::sync::Mutex::new(()),
                tracker: TaskTracker::new(),
                cancel: CancellationToken::new(),
            }),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Start the periodic tick loop. The first tick runs immediately.
    pub fn start(&self) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(this.inner.config.runner_tick_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            tracing::info!(
                max_concurrent_jobs = this.inner.config.max_concurrent_jobs,
                max_attempts = this.inner.config.max_attempts,
                "job runner started"
            );
            loop {
                tokio::select! {
                    _ = this.inner.cancel.cancelled() => break,
                    _ = interval.tick() => {
                        this.tick().await;
                    }
                }
            }
            tracing::info!("job runner tick loop stopped");
        })
    }

    /// Stop starting items, await in-flight ones up to the drain timeout,
    /// then terminate whatever is still running.
    pub async fn shutdown(&self) -> DrainOutcome {
        self.inner.state.lock().shutting_down = true;
        self.inner.cancel.cancel();
        let config = &self.inner.config;
        drain_then_terminate(
            "runner",
            &self.inner.tracker,
            config.drain_timeout,
            config.sigterm_timeout,
            config.sigkill_timeout,
            || self.inner.state.lock().running.values().cloned().collect(),
        )
        .await
    }

    pub fn list_jobs(&self) -> Vec<JobView> {
        let state = self.inner.state.lock();
        state.jobs.iter().map(|j| state.view(j)).collect()
    }

    pub fn job(&self, id: &str) -> Option<JobView> {
        let state = self.inner.state.lock();
        state.find_job(id).map(|j| state.view(j))
    }

    /// No slot is reserved and no process is running.
    pub fn is_idle(&self) -> bool {
        let state = self.inner.state.lock();
        state.running.is_empty() && state.reserved.is_empty()
    }

    pub fn running_count(&self) -> usize {
        self.inner.state.lock().running.len()
    }

    /// Re-read `jobs.json`. Runtime state of jobs that still exist is kept.
    pub async fn reload_jobs(&self) -> Result<usize, EngineError> {
        let persist = self.inner.persist.lock().await;
        let jobs = self.inner.store.load()?;
        let count = jobs.len();
        {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;
            let live: HashSet<JobId> = jobs.iter().map(|j| j.id.clone()).collect();
            state.runtime.retain(|id, _| live.contains(id));
            for job in &jobs {
                state.runtime.entry(job.id.clone()).or_default();
            }
            state.stop_requested.retain(|id| live.contains(id));
            state.jobs = jobs;
        }
        drop(persist);
        tracing::info!(jobs = count, "jobs reloaded");
        self.broadcast(Notification::JobsReloaded).await;
        Ok(count)
    }

    async fn broadcast(&self, event: Notification) {
        if let Err(e) = self.inner.notifier.notify(event).await {
            tracing::debug!(error = %e, "notification dropped");
        }
    }

    /// Write `jobs` on the blocking pool and hand the list back for the
    /// in-memory commit. Callers hold `persist`.
    async fn write(&self, jobs: Vec<Job>) -> Result<Vec<Job>, EngineError> {
        let store = self.inner.store.clone();
        let jobs = tokio::task::spawn_blocking(move || store.save(&jobs).map(|()| jobs)).await??;
        Ok(jobs)
    }

    async fn write_logged(&self, jobs: Vec<Job>) {
        if let Err(e) = self.write(jobs).await {
            tracing::error!(error = %e, "failed to persist jobs");
        }
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
