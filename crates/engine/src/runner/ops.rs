// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job CRUD, todo editing and run control.

use super::todos::{merge_todos, normalize_texts};
use super::{JobRunner, RunnerState};
use crate::drain::STOPPED_BY_USER;
use crate::error::EngineError;
use crate::notify::{Notification, Notifier};
use cadence_core::{Clock, Job, JobId, JobRuntimeState, JobView, RunStatus, TodoItem, TodoStatus};
use cadence_process::terminate_managed_process;
use std::path::PathBuf;

/// Fields for a new job.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub name: String,
    pub prompt: String,
    pub working_directory: PathBuf,
    /// Empty runs the configured agent command.
    pub runner_command: String,
    pub enabled: bool,
    pub fast_exit_mode: bool,
    pub todos: Vec<String>,
}

impl NewJob {
    pub fn new(name: impl Into<String>, working_directory: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            prompt: String::new(),
            working_directory: working_directory.into(),
            runner_command: String::new(),
            enabled: true,
            fast_exit_mode: false,
            todos: Vec::new(),
        }
    }
}

/// Metadata update; `None` leaves a field unchanged. Todos are edited with
/// [`JobRunner::set_job_todos`].
#[derive(Debug, Clone, Default)]
pub struct JobPatch {
    pub name: Option<String>,
    pub prompt: Option<String>,
    pub working_directory: Option<PathBuf>,
    pub runner_command: Option<String>,
    pub fast_exit_mode: Option<bool>,
}

impl<N: Notifier, C: Clock> JobRunner<N, C> {
    pub async fn create_job(&self, new: NewJob) -> Result<JobView, EngineError> {
        let now = self.inner.clock.epoch_ms();
        let mut job = Job {
            id: JobId::new(),
            name: new.name,
            prompt: new.prompt,
            working_directory: new.working_directory,
            runner_command: new.runner_command.trim().to_string(),
            enabled: new.enabled,
            fast_exit_mode: new.fast_exit_mode,
            todos: normalize_texts(&new.todos).into_iter().map(TodoItem::new).collect(),
            created_at: now,
            updated_at: now,
        };
        validate(&mut job)?;
        let persist = self.inner.persist.lock().await;
        let mut jobs = self.inner.state.lock().jobs.clone();
        jobs.push(job.clone());
        let jobs = self.write(jobs).await?;
        let view = {
            let mut state = self.inner.state.lock();
            state.jobs = jobs;
            state.runtime.insert(job.id.clone(), JobRuntimeState::default());
            state.view(&job)
        };
        drop(persist);
        tracing::info!(job_id = %view.job.id, name = %view.job.name, todos = view.job.todos.len(), "job created");
        self.broadcast(Notification::JobCreated(view.job.id.clone())).await;
        Ok(view)
    }

    pub async fn update_job(&self, id: &str, patch: JobPatch) -> Result<JobView, EngineError> {
        let view = self.mutate_job(id, |_, job| {
            if let Some(name) = patch.name {
                job.name = name;
            }
            if let Some(prompt) = patch.prompt {
                job.prompt = prompt;
            }
            if let Some(dir) = patch.working_directory {
                job.working_directory = dir;
            }
            if let Some(command) = patch.runner_command {
                job.runner_command = command.trim().to_string();
            }
            if let Some(fast) = patch.fast_exit_mode {
                job.fast_exit_mode = fast;
            }
            validate(job)
        })
        .await?;
        tracing::info!(job_id = %view.job.id, "job updated");
        self.broadcast(Notification::JobUpdated(view.job.id.clone())).await;
        Ok(view)
    }

    /// Replace the todo list. Rejected with [`EngineError::JobBusy`] while
    /// the job is running, or enabled with an eligible item, unless the
    /// text list is unchanged.
    pub async fn set_job_todos<S: AsRef<str>>(&self, id: &str, texts: &[S]) -> Result<JobView, EngineError> {
        let texts = normalize_texts(texts);
        let max_attempts = self.inner.config.max_attempts;
        let mut changed = false;
        let view = self.mutate_job(id, |state, job| {
            if job.todo_texts() == texts {
                return Ok(());
            }
            let eligible = job.next_eligible_todo(max_attempts).is_some();
            if state.is_busy(&job.id) || (job.enabled && eligible) {
                return Err(EngineError::JobBusy(job.id.to_string()));
            }
            job.todos = merge_todos(&job.todos, &texts);
            changed = true;
            Ok(())
        })
        .await?;
        if changed {
            tracing::info!(job_id = %view.job.id, todos = view.job.todos.len(), "job todos replaced");
            self.broadcast(Notification::JobTodosChanged(view.job.id.clone())).await;
        }
        Ok(view)
    }

    /// Enable or pause a job. Enabling clears the attempt counters of
    /// errored items so a job paused at the attempt limit can progress.
    pub async fn set_job_enabled(&self, id: &str, enabled: bool) -> Result<JobView, EngineError> {
        let view = self.mutate_job(id, |state, job| {
            if enabled && !job.enabled {
                for todo in job.todos.iter_mut().filter(|t| t.status == TodoStatus::Error) {
                    todo.attempts = 0;
                    todo.status = TodoStatus::Pending;
                }
                if let Some(rt) = state.runtime.get_mut(&job.id) {
                    if rt.last_status == RunStatus::Error {
                        rt.last_status = RunStatus::Idle;
                    }
                    rt.last_error = None;
                }
            }
            job.enabled = enabled;
            Ok(())
        })
        .await?;
        tracing::info!(job_id = %view.job.id, enabled, "job enabled state changed");
        self.broadcast(Notification::JobUpdated(view.job.id.clone())).await;
        Ok(view)
    }

    /// Return one item to `pending` with zero attempts.
    pub async fn reset_todo(&self, id: &str, todo_id: &str) -> Result<JobView, EngineError> {
        let view = self.mutate_job(id, |state, job| {
            let busy = state.is_busy(&job.id);
            let Some(index) = job.todo_index(todo_id) else {
                return Err(EngineError::TodoNotFound { job: job.id.to_string(), todo: todo_id.to_string() });
            };
            let todo = &mut job.todos[index];
            if busy && todo.status == TodoStatus::Running {
                return Err(EngineError::AlreadyRunning(todo_id.to_string()));
            }
            todo.status = TodoStatus::Pending;
            todo.attempts = 0;
            todo.last_error = None;
            Ok(())
        })
        .await?;
        tracing::info!(job_id = %view.job.id, todo_id, "todo reset");
        self.broadcast(Notification::JobTodosChanged(view.job.id.clone())).await;
        Ok(view)
    }

    /// Remove the job and terminate its process if one is running.
    pub async fn delete_job(&self, id: &str) -> Result<(), EngineError> {
        let persist = self.inner.persist.lock().await;
        let (jobs, job_id) = {
            let state = self.inner.state.lock();
            let Some(index) = state.job_index(id) else {
                return Err(EngineError::JobNotFound(id.to_string()));
            };
            let mut jobs = state.jobs.clone();
            let removed = jobs.remove(index);
            (jobs, removed.id)
        };
        let jobs = self.write(jobs).await?;
        let handle = {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;
            state.jobs = jobs;
            state.runtime.remove(&job_id);
            if state.is_busy(&job_id) {
                state.stop_requested.insert(job_id.clone());
            }
            state.running.get(&job_id).cloned()
        };
        drop(persist);
        tracing::info!(job_id = %job_id, running = handle.is_some(), "job deleted");
        self.broadcast(Notification::JobDeleted(job_id)).await;
        if let Some(handle) = handle {
            let config = &self.inner.config;
            terminate_managed_process(&handle, config.sigterm_timeout, config.sigkill_timeout, "job deleted").await;
        }
        Ok(())
    }

    /// Stop the job's in-progress item. The item returns to `pending` and
    /// its attempt is refunded. Returns `false` when nothing was running,
    /// including an item whose process had already exited.
    pub async fn stop_job(&self, id: &str) -> Result<bool, EngineError> {
        let (job_id, handle) = {
            let mut state = self.inner.state.lock();
            let Some(job) = state.find_job(id) else {
                return Err(EngineError::JobNotFound(id.to_string()));
            };
            let job_id = job.id.clone();
            if !state.is_busy(&job_id) {
                return Ok(false);
            }
            state.stop_requested.insert(job_id.clone());
            let handle = state.running.get(&job_id).cloned();
            (job_id, handle)
        };
        tracing::info!(job_id = %job_id, spawned = handle.is_some(), "stopping job");
        let Some(handle) = handle else {
            return Ok(true);
        };
        let config = &self.inner.config;
        let result =
            terminate_managed_process(&handle, config.sigterm_timeout, config.sigkill_timeout, STOPPED_BY_USER).await;
        if result.already_exited {
            // Withdraw the stop unless the run it targeted has already
            // been recorded.
            let mut state = self.inner.state.lock();
            if state.running.get(&job_id).is_some_and(|h| h.pid() == handle.pid()) {
                state.stop_requested.remove(&job_id);
            }
            drop(state);
            tracing::info!(job_id = %job_id, "job process had already exited");
            return Ok(false);
        }
        if result.timed_out {
            tracing::error!(job_id = %job_id, pid = handle.pid(), "job process survived stop");
        }
        Ok(true)
    }

    /// Apply `f` to a copy of the job, persist on success and return the
    /// new view. Nothing changes when `f` fails.
    async fn mutate_job<F>(&self, id: &str, f: F) -> Result<JobView, EngineError>
    where
        F: FnOnce(&mut RunnerState, &mut Job) -> Result<(), EngineError>,
    {
        let persist = self.inner.persist.lock().await;
        let (jobs, job) = {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;
            let Some(index) = state.job_index(id) else {
                return Err(EngineError::JobNotFound(id.to_string()));
            };
            let before = state.jobs[index].clone();
            let mut job = before.clone();
            f(state, &mut job)?;
            if job == before {
                return Ok(state.view(&job));
            }
            job.updated_at = self.inner.clock.epoch_ms().max(job.created_at);
            let mut jobs = state.jobs.clone();
            jobs[index] = job.clone();
            (jobs, job)
        };
        let jobs = self.write(jobs).await?;
        let mut state = self.inner.state.lock();
        state.jobs = jobs;
        let view = state.view(&job);
        drop(state);
        drop(persist);
        Ok(view)
    }
}

fn validate(job: &mut Job) -> Result<(), EngineError> {
    job.name = job.name.trim().to_string();
    if job.name.is_empty() {
        return Err(EngineError::InvalidInput("job name must not be empty".to_string()));
    }
    if !job.working_directory.is_dir() {
        return Err(EngineError::MissingWorkingDirectory(job.working_directory.clone()));
    }
    Ok(())
}
