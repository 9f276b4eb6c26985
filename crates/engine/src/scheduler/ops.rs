// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task CRUD and run control.

use super::{Scheduler, SchedulerState};
use crate::drain::STOPPED_BY_USER;
use crate::error::EngineError;
use crate::notify::{Notification, Notifier};
use cadence_core::{Clock, RunStatus, ScheduledTask, TaskId, TaskRuntimeState, TaskView, Trigger};
use cadence_process::terminate_managed_process;
use std::path::PathBuf;

/// Fields for a new task.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub name: String,
    pub cron: String,
    pub prompt: String,
    pub working_directory: PathBuf,
    pub enabled: bool,
    pub fast_exit_mode: bool,
}

impl NewTask {
    pub fn new(
        name: impl Into<String>,
        cron: impl Into<String>,
        prompt: impl Into<String>,
        working_directory: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            cron: cron.into(),
            prompt: prompt.into(),
            working_directory: working_directory.into(),
            enabled: true,
            fast_exit_mode: false,
        }
    }
}

/// Partial update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub name: Option<String>,
    pub cron: Option<String>,
    pub prompt: Option<String>,
    pub working_directory: Option<PathBuf>,
    pub enabled: Option<bool>,
    pub fast_exit_mode: Option<bool>,
}

impl<N: Notifier, C: Clock> Scheduler<N, C> {
    pub async fn create_task(&self, new: NewTask) -> Result<TaskView, EngineError> {
        let now = self.inner.clock.epoch_ms();
        let mut task = ScheduledTask {
            id: TaskId::new(),
            name: new.name,
            cron: new.cron,
            prompt: new.prompt,
            working_directory: new.working_directory,
            enabled: new.enabled,
            fast_exit_mode: new.fast_exit_mode,
            created_at: now,
            updated_at: now,
        };
        let persist = self.inner.persist.lock().await;
        let tasks = {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;
            validate(state, &mut task)?;
            let mut tasks = state.tasks.clone();
            tasks.push(task.clone());
            tasks
        };
        let tasks = self.write(tasks).await?;
        let view = {
            let mut state = self.inner.state.lock();
            state.tasks = tasks;
            state.runtime.insert(task.id.clone(), TaskRuntimeState::default());
            state.view(&task)
        };
        drop(persist);
        tracing::info!(task_id = %view.task.id, name = %view.task.name, cron = %view.task.cron, "task created");
        self.broadcast(Notification::TaskCreated(view.task.id.clone())).await;
        Ok(view)
    }

    /// Apply `patch`. Changing the cron expression or disabling the task
    /// discards its queued runs.
    pub async fn update_task(&self, id: &str, patch: TaskPatch) -> Result<TaskView, EngineError> {
        let persist = self.inner.persist.lock().await;
        let (tasks, task, was_enabled, cron_changed) = {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;
            let Some(index) = state.tasks.iter().position(|t| t.id == id) else {
                return Err(EngineError::TaskNotFound(id.to_string()));
            };
            let mut task = state.tasks[index].clone();
            let was_enabled = task.enabled;
            let cron_changed = patch.cron.as_ref().is_some_and(|c| *c != task.cron);
            if let Some(name) = patch.name {
                task.name = name;
            }
            if let Some(cron) = patch.cron {
                task.cron = cron;
            }
            if let Some(prompt) = patch.prompt {
                task.prompt = prompt;
            }
            if let Some(dir) = patch.working_directory {
                task.working_directory = dir;
            }
            if let Some(enabled) = patch.enabled {
                task.enabled = enabled;
            }
            if let Some(fast) = patch.fast_exit_mode {
                task.fast_exit_mode = fast;
            }
            validate(state, &mut task)?;
            task.updated_at = self.inner.clock.epoch_ms().max(task.created_at);

            let mut tasks = state.tasks.clone();
            tasks[index] = task.clone();
            (tasks, task, was_enabled, cron_changed)
        };
        let tasks = self.write(tasks).await?;
        let view = {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;
            state.tasks = tasks;
            let rt = state.runtime.entry(task.id.clone()).or_default();
            if cron_changed && !rt.is_running() && rt.last_status == RunStatus::Error {
                // A previously invalid expression was replaced.
                rt.last_status = RunStatus::Idle;
                rt.last_error = None;
            }
            if cron_changed || !task.enabled {
                if let Some(queue) = state.pending.get_mut(&task.id) {
                    queue.clear();
                }
                rt.pending_runs = 0;
            }
            if task.enabled && !was_enabled {
                rt.consecutive_failures = 0;
            }
            state.view(&task)
        };
        drop(persist);
        tracing::info!(task_id = %view.task.id, enabled = view.task.enabled, "task updated");
        self.broadcast(Notification::TaskUpdated(view.task.id.clone())).await;
        Ok(view)
    }

    pub async fn set_task_enabled(&self, id: &str, enabled: bool) -> Result<TaskView, EngineError> {
        self.update_task(id, TaskPatch { enabled: Some(enabled), ..TaskPatch::default() }).await
    }

    /// Remove the task and terminate its process if one is running.
    pub async fn delete_task(&self, id: &str) -> Result<(), EngineError> {
        let persist = self.inner.persist.lock().await;
        let (tasks, task_id) = {
            let state = self.inner.state.lock();
            let Some(index) = state.tasks.iter().position(|t| t.id == id) else {
                return Err(EngineError::TaskNotFound(id.to_string()));
            };
            let mut tasks = state.tasks.clone();
            let removed = tasks.remove(index);
            (tasks, removed.id)
        };
        let tasks = self.write(tasks).await?;
        let handle = {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;
            state.tasks = tasks;
            state.pending.remove(&task_id);
            state.runtime.remove(&task_id);
            if let Some(reservation) = state.dispatching.get_mut(&task_id) {
                reservation.stop = true;
            }
            state.running.get(&task_id).cloned()
        };
        drop(persist);
        tracing::info!(task_id = %task_id, running = handle.is_some(), "task deleted");
        self.broadcast(Notification::TaskDeleted(task_id)).await;
        if let Some(handle) = handle {
            let config = &self.inner.config;
            terminate_managed_process(&handle, config.sigterm_timeout, config.sigkill_timeout, "task deleted")
                .await;
        }
        Ok(())
    }

    /// Start a manual run now. Fails with [`EngineError::AlreadyRunning`]
    /// when a run for this task is in progress.
    pub fn run_task_now(&self, id: &str) -> Result<(), EngineError> {
        let (task_id, ticket) = {
            let mut state = self.inner.state.lock();
            if state.shutting_down {
                return Err(EngineError::ShuttingDown);
            }
            let Some(task) = state.find_task(id) else {
                return Err(EngineError::TaskNotFound(id.to_string()));
            };
            let task_id = task.id.clone();
            if state.is_busy(&task_id) {
                return Err(EngineError::AlreadyRunning(id.to_string()));
            }
            let ticket = state.reserve(&task_id);
            (task_id, ticket)
        };

        tracing::info!(task_id = %task_id, "manual run requested");
        let this = self.clone();
        self.inner.tracker.spawn(async move {
            let start = this.execute(&task_id, ticket, Trigger::Manual, None).await;
            this.finish_dispatch(&task_id, ticket, None, start);
            // Cron runs may have queued up behind the manual one.
            this.try_dispatch(&task_id);
        });
        Ok(())
    }

    /// Stop the task's in-progress run. Returns `false` when nothing was
    /// running, including a run whose process had already exited by the
    /// time the stop reached it.
    pub async fn stop_task(&self, id: &str) -> Result<bool, EngineError> {
        let (task_id, ticket, handle) = {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;
            let Some(task) = state.find_task(id) else {
                return Err(EngineError::TaskNotFound(id.to_string()));
            };
            let task_id = task.id.clone();
            let Some(reservation) = state.dispatching.get_mut(&task_id) else {
                return Ok(false);
            };
            reservation.stop = true;
            let ticket = reservation.ticket;
            let handle = state.running.get(&task_id).cloned();
            (task_id, ticket, handle)
        };
        tracing::info!(task_id = %task_id, spawned = handle.is_some(), "stopping task");
        let Some(handle) = handle else {
            return Ok(true);
        };
        let config = &self.inner.config;
        let result =
            terminate_managed_process(&handle, config.sigterm_timeout, config.sigkill_timeout, STOPPED_BY_USER)
                .await;
        if result.already_exited {
            // The run ends on its own terms.
            let mut state = self.inner.state.lock();
            if let Some(reservation) = state.dispatching.get_mut(&task_id).filter(|r| r.ticket == ticket) {
                reservation.stop = false;
            }
            drop(state);
            tracing::info!(task_id = %task_id, "task process had already exited");
            return Ok(false);
        }
        if result.timed_out {
            tracing::error!(task_id = %task_id, pid = handle.pid(), "task process survived stop");
        }
        Ok(true)
    }
}

/// Normalize and validate `task` before it is persisted.
fn validate(state: &mut SchedulerState, task: &mut ScheduledTask) -> Result<(), EngineError> {
    task.name = task.name.trim().to_string();
    if task.name.is_empty() {
        return Err(EngineError::InvalidInput("task name must not be empty".to_string()));
    }
    if task.prompt.trim().is_empty() {
        return Err(EngineError::InvalidInput("task prompt must not be empty".to_string()));
    }
    task.cron = task.cron.split_whitespace().collect::<Vec<_>>().join(" ");
    if let Err(source) = state.cache.get(&task.cron) {
        return Err(EngineError::InvalidCron { expr: task.cron.clone(), source });
    }
    if !task.working_directory.is_dir() {
        return Err(EngineError::MissingWorkingDirectory(task.working_directory.clone()));
    }
    Ok(())
}
