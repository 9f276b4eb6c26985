// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Running one todo item and applying the retry policy.

use super::{JobRunner, RunnerState};
use crate::classify::AgentObserver;
use crate::drain::STOPPED_BY_USER;
use crate::env::flag;
use crate::error::EngineError;
use crate::notify::{Notification, Notifier};
use cadence_core::{
    paused_error, truncate_chars, Clock, Job, JobId, RunStatus, TodoId, TodoItem, TodoStatus, Trigger,
};
use cadence_process::{run_managed_process, terminate_managed_process, ProcessHandle, RunConfig, RunResult};
use serde_json::json;

/// Snapshot of the item being run, taken under the lock.
struct Prepared {
    job: Job,
    todo: TodoItem,
    index: usize,
}

/// How a finished run affects the item.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Disposition {
    Done,
    /// Stop or transport failure: back to pending, attempt refunded.
    Requeue(Option<String>),
    Failed(String),
}

impl<N: Notifier, C: Clock> JobRunner<N, C> {
    /// Run the next eligible item of `id`. The caller holds the reservation.
    pub(crate) async fn execute_item(&self, id: &JobId) {
        let Some(prepared) = self.prepare(id).await else {
            return;
        };
        let Prepared { job, todo, index } = prepared;

        tracing::info!(
            job_id = %id,
            todo_id = %todo.id,
            index,
            attempt = todo.attempts,
            "job item started"
        );
        self.broadcast(Notification::JobStarted { id: id.clone(), todo: todo.id.clone() }).await;

        let config = self.run_config(&job, &todo, index);
        let mut observer = AgentObserver::new(config.label.clone(), self.register_handle(id));
        let result = run_managed_process(&config, &mut observer).await;

        self.complete(id, &todo.id, &result).await;
    }

    /// Mark the next eligible item running and persist. `None` releases the
    /// reservation without spending an attempt.
    async fn prepare(&self, id: &JobId) -> Option<Prepared> {
        let max_attempts = self.inner.config.max_attempts;
        let now = self.inner.clock.epoch_ms();
        let mut paused = None;
        let persist = self.inner.persist.lock().await;
        let (prepared, snapshot) = {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;
            let superseded = state.shutting_down || state.stop_requested.remove(id);
            let prepared = match state.job_index(id.as_str()) {
                _ if superseded => None,
                None => None,
                Some(job_index) => {
                    let job = &mut state.jobs[job_index];
                    match job.next_eligible_todo(max_attempts) {
                        None => None,
                        Some(_) if !job.enabled => None,
                        Some(_) if !job.working_directory.is_dir() => {
                            let err = EngineError::MissingWorkingDirectory(job.working_directory.clone());
                            job.enabled = false;
                            job.updated_at = now.max(job.created_at);
                            paused = Some(err.to_string());
                            None
                        }
                        Some(index) => {
                            let todo = &mut job.todos[index];
                            todo.status = TodoStatus::Running;
                            todo.attempts = todo.attempts.saturating_add(1);
                            todo.last_run_at = Some(now);
                            todo.last_error = None;
                            let todo = todo.clone();
                            Some(Prepared { job: job.clone(), todo, index })
                        }
                    }
                }
            };

            if prepared.is_none() {
                state.reserved.remove(id);
            }
            if let Some(rt) = state.runtime.get_mut(id) {
                if let Some(p) = &prepared {
                    rt.running = true;
                    rt.current_todo_index = Some(p.index);
                    rt.last_status = RunStatus::Running;
                    rt.last_error = None;
                    rt.last_trigger = Some(Trigger::Tick);
                    rt.last_run_at = Some(now);
                } else if let Some(err) = &paused {
                    rt.last_status = RunStatus::Error;
                    rt.last_error = Some(err.clone());
                }
            }
            let snapshot = (prepared.is_some() || paused.is_some()).then(|| state.jobs.clone());
            (prepared, snapshot)
        };
        if let Some(jobs) = snapshot {
            self.write_logged(jobs).await;
        }
        drop(persist);

        if let Some(err) = paused {
            tracing::warn!(job_id = %id, error = %err, "job paused");
            self.broadcast(Notification::JobUpdated(id.clone())).await;
        } else if prepared.is_none() {
            tracing::debug!(job_id = %id, "reservation released without a run");
        }
        prepared
    }

    /// Spawn callback: promote the reservation to a running handle, and
    /// honour a stop that raced the spawn.
    fn register_handle(&self, id: &JobId) -> impl FnOnce(&ProcessHandle) + Send + 'static {
        let this = self.clone();
        let id = id.clone();
        move |handle: &ProcessHandle| {
            let stop = {
                let mut state = this.inner.state.lock();
                state.reserved.remove(&id);
                state.running.insert(id.clone(), handle.clone());
                state.stop_requested.contains(&id)
            };
            if stop {
                let handle = handle.clone();
                let (term, kill) = (this.inner.config.sigterm_timeout, this.inner.config.sigkill_timeout);
                this.inner.tracker.spawn(async move {
                    terminate_managed_process(&handle, term, kill, STOPPED_BY_USER).await;
                });
            }
        }
    }

    fn run_config(&self, job: &Job, todo: &TodoItem, index: usize) -> RunConfig {
        let config = &self.inner.config;
        let command = if job.runner_command.trim().is_empty() {
            config.agent_command.as_str()
        } else {
            job.runner_command.as_str()
        };
        let payload = json!({
            "jobId": job.id,
            "jobName": job.name,
            "prompt": job.prompt,
            "todo": {
                "id": todo.id,
                "text": todo.text,
                "index": index,
                "attempt": todo.attempts,
            },
            "todos": job.todo_texts(),
            "workingDirectory": job.working_directory,
            "fastExitMode": job.fast_exit_mode,
        });
        let (text, text_truncated) = truncate_chars(&todo.text, config.env_value_max_chars);
        let (prompt, prompt_truncated) = truncate_chars(&job.prompt, config.env_value_max_chars);

        RunConfig::shell(command)
            .cwd(&job.working_directory)
            .stdin(format!("{payload}\n"))
            .env("CADENCE_JOB_ID", job.id.as_str())
            .env("CADENCE_JOB_NAME", job.name.as_str())
            .env("CADENCE_TODO_ID", todo.id.as_str())
            .env("CADENCE_TODO_INDEX", index.to_string())
            .env("CADENCE_TODO_ATTEMPT", todo.attempts.to_string())
            .env("CADENCE_TODO_TEXT", text)
            .env("CADENCE_TODO_TEXT_TRUNCATED", flag(text_truncated))
            .env("CADENCE_JOB_PROMPT", prompt)
            .env("CADENCE_JOB_PROMPT_TRUNCATED", flag(prompt_truncated))
            .env("CADENCE_FAST_EXIT", flag(job.fast_exit_mode))
            .max_runtime(config.max_runtime)
            .force_kill_timeout(config.force_kill_timeout)
            .output_tail_chars(config.output_tail_chars)
            .label(format!("job {} item {index}", job.id))
    }

    async fn complete(&self, id: &JobId, todo_id: &TodoId, result: &RunResult) {
        let max_attempts = self.inner.config.max_attempts;
        let duration_ms = result.duration.as_millis() as u64;
        let persist = self.inner.persist.lock().await;
        let (outcome, snapshot) = {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;
            state.running.remove(id);
            state.reserved.remove(id);
            let stopped = state.stop_requested.remove(id);
            let disposition = disposition(stopped, result);
            let outcome = apply(state, id, todo_id, &disposition, duration_ms, max_attempts);
            let snapshot = outcome.is_some().then(|| state.jobs.clone());
            (outcome.map(|(status, paused)| (status, paused, disposition)), snapshot)
        };
        if let Some(jobs) = snapshot {
            self.write_logged(jobs).await;
        }
        drop(persist);

        let Some((status, paused, disposition)) = outcome else {
            tracing::info!(job_id = %id, todo_id = %todo_id, duration_ms, "run finished for removed item");
            return;
        };
        match &disposition {
            Disposition::Done => tracing::info!(job_id = %id, todo_id = %todo_id, duration_ms, "job item done"),
            Disposition::Requeue(reason) => tracing::info!(
                job_id = %id,
                todo_id = %todo_id,
                reason = reason.as_deref().unwrap_or(STOPPED_BY_USER),
                "job item returned to pending"
            ),
            Disposition::Failed(error) => tracing::warn!(
                job_id = %id,
                todo_id = %todo_id,
                duration_ms,
                exit_code = result.exit_code,
                %error,
                paused,
                "job item failed"
            ),
        }
        self.broadcast(Notification::JobCompleted { id: id.clone(), todo: todo_id.clone(), status }).await;
        if paused {
            self.broadcast(Notification::JobUpdated(id.clone())).await;
        }
    }
}

/// A stop only requeues a run it actually cut short: an item whose process
/// exited cleanly before the stop landed is done.
fn disposition(stopped: bool, result: &RunResult) -> Disposition {
    if stopped && !result.succeeded() {
        return Disposition::Requeue(None);
    }
    if let Some(err) = result.spawn_error.as_ref().filter(|e| e.is_transport()) {
        return Disposition::Requeue(Some(err.to_string()));
    }
    match result.failure_message() {
        None => Disposition::Done,
        Some(message) => Disposition::Failed(message),
    }
}

/// Apply `disposition` to the item and job. Returns the item's new status
/// and whether the job was paused, or `None` when the item is gone.
fn apply(
    state: &mut RunnerState,
    id: &JobId,
    todo_id: &TodoId,
    disposition: &Disposition,
    duration_ms: u64,
    max_attempts: u32,
) -> Option<(TodoStatus, bool)> {
    let RunnerState { jobs, runtime, .. } = state;
    let job = jobs.iter_mut().find(|j| j.id == *id)?;
    let rt = runtime.entry(id.clone()).or_default();
    rt.running = false;
    rt.current_todo_index = None;
    rt.last_duration_ms = Some(duration_ms);

    let todo = job.todos.iter_mut().find(|t| t.id == *todo_id)?;
    todo.last_duration_ms = Some(duration_ms);

    let mut paused = false;
    match disposition {
        Disposition::Done => {
            todo.status = TodoStatus::Done;
            todo.last_error = None;
            rt.last_status = RunStatus::Success;
            rt.last_error = None;
        }
        Disposition::Requeue(reason) => {
            todo.status = TodoStatus::Pending;
            todo.attempts = todo.attempts.saturating_sub(1);
            todo.last_error = reason.clone();
            rt.last_status = RunStatus::Idle;
            rt.last_error = Some(reason.clone().unwrap_or_else(|| STOPPED_BY_USER.to_string()));
        }
        Disposition::Failed(message) => {
            todo.status = TodoStatus::Error;
            todo.last_error = Some(message.clone());
            rt.last_status = RunStatus::Error;
            if todo.attempts >= max_attempts {
                job.enabled = false;
                paused = true;
                rt.last_error = Some(paused_error(message));
            } else {
                rt.last_error = Some(message.clone());
            }
        }
    }
    Some((todo.status, paused))
}
