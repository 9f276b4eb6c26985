// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Executing one task run and recording its outcome.

use super::{Scheduler, SchedulerState};
use crate::classify::AgentObserver;
use crate::drain::STOPPED_BY_USER;
use crate::cron::{minute_rfc3339, PendingRun};
use crate::env::flag;
use crate::notify::{Notification, Notifier};
use cadence_core::{paused_error, truncate_chars, Clock, RunStatus, ScheduledTask, TaskId, Trigger};
use cadence_process::{run_managed_process, terminate_managed_process, ProcessHandle, RunConfig, RunResult};

/// How far a reserved run got.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RunStart {
    Started,
    /// Shutdown began, or the task list was reloaded, before the run could
    /// start. A superseded cron run is requeued at the head of its queue.
    Superseded,
    /// The task was deleted, disabled or stopped before spawn.
    Skipped,
}

/// Scheduling context handed to the agent alongside the prompt.
struct RunContext {
    trigger: Trigger,
    scheduled_at: String,
    minute_key: String,
    backfill_minutes: u64,
}

impl<N: Notifier, C: Clock> Scheduler<N, C> {
    /// Run `id` once under the reservation identified by `ticket`.
    pub(crate) async fn execute(
        &self,
        id: &TaskId,
        ticket: u64,
        trigger: Trigger,
        run: Option<&PendingRun>,
    ) -> RunStart {
        let now_ms = self.inner.clock.epoch_ms();
        let now_minute = self.inner.clock.epoch_minute();
        let zone = self.inner.config.cron_zone;

        let (task, ctx) = {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;
            if state.shutting_down {
                return RunStart::Superseded;
            }
            let Some(reservation) = state.reservation(id, ticket) else {
                return RunStart::Skipped;
            };
            if trigger == Trigger::Cron && reservation.generation != state.generation {
                return RunStart::Superseded;
            }
            let Some(task) = state.find_task(id.as_str()).cloned() else {
                return RunStart::Skipped;
            };
            if trigger == Trigger::Cron && !task.enabled {
                return RunStart::Skipped;
            }
            if reservation.stop {
                let rt = state.runtime.entry(id.clone()).or_default();
                rt.last_status = RunStatus::Idle;
                rt.last_error = Some(STOPPED_BY_USER.to_string());
                return RunStart::Skipped;
            }

            let ctx = match run {
                Some(run) => RunContext {
                    trigger,
                    scheduled_at: minute_rfc3339(run.minute),
                    minute_key: run.minute_key.clone(),
                    backfill_minutes: now_minute.saturating_sub(run.minute).max(0) as u64,
                },
                None => RunContext {
                    trigger,
                    scheduled_at: minute_rfc3339(now_minute),
                    minute_key: zone.minute_key(now_minute),
                    backfill_minutes: 0,
                },
            };

            let rt = state.runtime.entry(id.clone()).or_default();
            rt.last_status = RunStatus::Running;
            rt.last_run_at = Some(now_ms);
            rt.last_trigger = Some(trigger);
            rt.last_error = None;
            rt.last_backfill_minutes = Some(ctx.backfill_minutes);
            if let Some(run) = run {
                rt.last_scheduled_minute_key = Some(run.minute_key.clone());
            }
            (task, ctx)
        };

        tracing::info!(
            task_id = %id,
            %trigger,
            minute_key = %ctx.minute_key,
            backfill_minutes = ctx.backfill_minutes,
            "task run started"
        );
        self.broadcast(Notification::TaskStarted { id: id.clone(), trigger }).await;

        let result = if task.working_directory.is_dir() {
            let config = self.run_config(&task, &ctx);
            let mut observer = AgentObserver::new(config.label.clone(), self.register_handle(id, ticket));
            run_managed_process(&config, &mut observer).await
        } else {
            RunResult {
                result_error: Some(format!(
                    "working directory does not exist: {}",
                    task.working_directory.display()
                )),
                ..RunResult::default()
            }
        };

        self.complete(id, ticket, run, &result).await;
        RunStart::Started
    }

    /// Spawn callback: record the handle, and honour a stop that raced the spawn.
    fn register_handle(&self, id: &TaskId, ticket: u64) -> impl FnOnce(&ProcessHandle) + Send + 'static {
        let this = self.clone();
        let id = id.clone();
        move |handle: &ProcessHandle| {
            let stop = {
                let mut state = this.inner.state.lock();
                state.running.insert(id.clone(), handle.clone());
                state.reservation(&id, ticket).is_some_and(|r| r.stop)
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

    fn run_config(&self, task: &ScheduledTask, ctx: &RunContext) -> RunConfig {
        let config = &self.inner.config;
        let (name, name_truncated) = truncate_chars(&task.name, config.env_value_max_chars);
        RunConfig::shell(&config.agent_command)
            .cwd(&task.working_directory)
            .stdin(annotate_prompt(&task.prompt, ctx))
            .env("CADENCE_TASK_ID", task.id.as_str())
            .env("CADENCE_TASK_NAME", name)
            .env("CADENCE_TASK_NAME_TRUNCATED", flag(name_truncated))
            .env("CADENCE_TRIGGER", ctx.trigger.to_string())
            .env("CADENCE_SCHEDULED_AT", ctx.scheduled_at.as_str())
            .env("CADENCE_MINUTE_KEY", ctx.minute_key.as_str())
            .env("CADENCE_BACKFILL_MINUTES", ctx.backfill_minutes.to_string())
            .env("CADENCE_FAST_EXIT", flag(task.fast_exit_mode))
            .max_runtime(config.max_runtime)
            .force_kill_timeout(config.force_kill_timeout)
            .output_tail_chars(config.output_tail_chars)
            .label(format!("task {}", task.id))
    }

    /// Record the outcome and release the reservation. A stop that lands
    /// after a clean exit does not override the success.
    async fn complete(&self, id: &TaskId, ticket: u64, run: Option<&PendingRun>, result: &RunResult) {
        let limit = self.inner.config.task_failure_limit;
        let duration_ms = result.duration.as_millis() as u64;
        let persist = self.inner.persist.lock().await;
        let (outcome, snapshot) = {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;
            state.running.remove(id);
            let stopped = state.release(id, ticket).is_some_and(|r| r.stop) && !result.succeeded();
            let outcome = state.runtime.get_mut(id).map(|rt| {
                rt.last_duration_ms = Some(duration_ms);
                if let Some(run) = run {
                    rt.last_completed_minute_key = Some(run.minute_key.clone());
                }
                let mut disabled = false;
                if stopped {
                    rt.last_status = RunStatus::Idle;
                    rt.last_error = Some(STOPPED_BY_USER.to_string());
                } else if let Some(message) = result.failure_message() {
                    rt.consecutive_failures = rt.consecutive_failures.saturating_add(1);
                    rt.last_status = RunStatus::Error;
                    if limit > 0 && rt.consecutive_failures >= limit {
                        rt.last_error = Some(paused_error(&message));
                        disabled = true;
                    } else {
                        rt.last_error = Some(message);
                    }
                } else {
                    rt.last_status = RunStatus::Success;
                    rt.last_error = None;
                    rt.consecutive_failures = 0;
                }
                (rt.last_status, rt.last_error.clone(), disabled)
            });
            let snapshot = match outcome {
                Some((_, _, true)) => self.disable_after_failures(state, id),
                _ => None,
            };
            (outcome, snapshot)
        };
        if let Some(tasks) = snapshot {
            self.write_logged(tasks).await;
        }
        drop(persist);
        let Some((status, error, disabled)) = outcome else {
            tracing::info!(task_id = %id, duration_ms, "run finished for deleted task");
            return;
        };

        match &error {
            Some(error) if status == RunStatus::Error => tracing::warn!(
                task_id = %id,
                duration_ms,
                exit_code = result.exit_code,
                %error,
                "task run failed"
            ),
            _ => tracing::info!(task_id = %id, %status, duration_ms, "task run finished"),
        }
        self.broadcast(Notification::TaskCompleted { id: id.clone(), status }).await;
        if disabled {
            self.broadcast(Notification::TaskUpdated(id.clone())).await;
        }
    }

    /// Disable `id` in memory and return the task list to persist.
    fn disable_after_failures(&self, state: &mut SchedulerState, id: &TaskId) -> Option<Vec<ScheduledTask>> {
        let now_ms = self.inner.clock.epoch_ms();
        let task = state.tasks.iter_mut().find(|t| t.id == *id)?;
        task.enabled = false;
        task.updated_at = now_ms.max(task.created_at);
        state.pending.remove(id);
        if let Some(rt) = state.runtime.get_mut(id) {
            rt.pending_runs = 0;
        }
        tracing::warn!(
            task_id = %id,
            failures = self.inner.config.task_failure_limit,
            "task disabled after consecutive failures"
        );
        Some(state.tasks.clone())
    }
}

fn annotate_prompt(prompt: &str, ctx: &RunContext) -> String {
    format!(
        "{prompt}\n\n[cadence] trigger={} scheduledAt={} minuteKey={} backfillMinutes={}\n",
        ctx.trigger, ctx.scheduled_at, ctx.minute_key, ctx.backfill_minutes
    )
}
