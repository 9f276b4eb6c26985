// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the engine.
//!
//! Every value has a default. Unparseable input logs a warning and falls
//! back to the default; out-of-range input is clamped with a warning.

use crate::cron::CronZone;
use std::ops::RangeInclusive;
use std::time::Duration;

pub const DEFAULT_AGENT_COMMAND: &str = "claude -p";

/// Resolved engine settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub max_runtime: Duration,
    pub force_kill_timeout: Duration,
    pub sigterm_timeout: Duration,
    pub sigkill_timeout: Duration,
    pub backfill_minutes: u32,
    pub pending_backlog_limit: usize,
    pub max_concurrent_jobs: usize,
    pub max_attempts: u32,
    pub drain_timeout: Duration,
    pub tick_interval: Duration,
    pub runner_tick_interval: Duration,
    pub output_tail_chars: usize,
    pub env_value_max_chars: usize,
    /// Consecutive failed runs before a task is auto-disabled; 0 never disables.
    pub task_failure_limit: u32,
    pub cron_zone: CronZone,
    /// Shell command (`bash -c`) for task runs and jobs without a runner command.
    pub agent_command: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_runtime: Duration::from_millis(1_800_000),
            force_kill_timeout: Duration::from_millis(5_000),
            sigterm_timeout: Duration::from_millis(5_000),
            sigkill_timeout: Duration::from_millis(2_000),
            backfill_minutes: 15,
            pending_backlog_limit: 5,
            max_concurrent_jobs: 2,
            max_attempts: 3,
            drain_timeout: Duration::from_millis(5_000),
            tick_interval: Duration::from_millis(10_000),
            runner_tick_interval: Duration::from_millis(5_000),
            output_tail_chars: 16_384,
            env_value_max_chars: 4_096,
            task_failure_limit: 3,
            cron_zone: CronZone::Local,
            agent_command: DEFAULT_AGENT_COMMAND.to_string(),
        }
    }
}

impl EngineConfig {
    /// Read every `CADENCE_*` override from the process environment.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            max_runtime: millis("CADENCE_MAX_RUNTIME_MS", d.max_runtime, 1_000..=86_400_000),
            force_kill_timeout: millis(
                "CADENCE_FORCE_KILL_TIMEOUT_MS",
                d.force_kill_timeout,
                100..=300_000,
            ),
            sigterm_timeout: millis("CADENCE_SIGTERM_TIMEOUT_MS", d.sigterm_timeout, 100..=300_000),
            sigkill_timeout: millis("CADENCE_SIGKILL_TIMEOUT_MS", d.sigkill_timeout, 100..=60_000),
            backfill_minutes: clamped("CADENCE_BACKFILL_MINUTES", d.backfill_minutes as u64, 1..=1_440)
                as u32,
            pending_backlog_limit: clamped(
                "CADENCE_PENDING_BACKLOG_LIMIT",
                d.pending_backlog_limit as u64,
                1..=1_000,
            ) as usize,
            max_concurrent_jobs: clamped(
                "CADENCE_MAX_CONCURRENT_JOBS",
                d.max_concurrent_jobs as u64,
                1..=32,
            ) as usize,
            max_attempts: clamped("CADENCE_MAX_ATTEMPTS", d.max_attempts as u64, 1..=100) as u32,
            drain_timeout: millis("CADENCE_DRAIN_TIMEOUT_MS", d.drain_timeout, 0..=300_000),
            tick_interval: millis("CADENCE_TICK_INTERVAL_MS", d.tick_interval, 250..=600_000),
            runner_tick_interval: millis(
                "CADENCE_RUNNER_TICK_INTERVAL_MS",
                d.runner_tick_interval,
                250..=600_000,
            ),
            output_tail_chars: clamped(
                "CADENCE_OUTPUT_TAIL_CHARS",
                d.output_tail_chars as u64,
                256..=1_048_576,
            ) as usize,
            env_value_max_chars: clamped(
                "CADENCE_ENV_VALUE_MAX_CHARS",
                d.env_value_max_chars as u64,
                64..=65_536,
            ) as usize,
            task_failure_limit: clamped(
                "CADENCE_TASK_FAILURE_LIMIT",
                d.task_failure_limit as u64,
                0..=1_000,
            ) as u32,
            cron_zone: cron_zone(),
            agent_command: agent_command(),
        }
    }
}

/// Cron evaluation zone: `CADENCE_CRON_TZ` = `local` (default) or `utc`.
pub fn cron_zone() -> CronZone {
    match std::env::var("CADENCE_CRON_TZ") {
        Err(_) => CronZone::Local,
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "" | "local" => CronZone::Local,
            "utc" | "z" => CronZone::Utc,
            other => {
                tracing::warn!(var = "CADENCE_CRON_TZ", value = other, "unknown cron zone, using local");
                CronZone::Local
            }
        },
    }
}

/// Agent command (`CADENCE_AGENT_COMMAND`, default `claude -p`).
pub fn agent_command() -> String {
    match std::env::var("CADENCE_AGENT_COMMAND") {
        Ok(cmd) if !cmd.trim().is_empty() => cmd.trim().to_string(),
        Ok(_) => {
            tracing::warn!(var = "CADENCE_AGENT_COMMAND", "empty agent command, using default");
            DEFAULT_AGENT_COMMAND.to_string()
        }
        Err(_) => DEFAULT_AGENT_COMMAND.to_string(),
    }
}

/// `"1"`/`"0"` for boolean environment values passed to child processes.
pub(crate) fn flag(on: bool) -> &'static str {
    if on {
        "1"
    } else {
        "0"
    }
}

fn millis(name: &str, default: Duration, range: RangeInclusive<u64>) -> Duration {
    Duration::from_millis(clamped(name, default.as_millis() as u64, range))
}

/// Parse `name` as an integer within `range`.
pub(crate) fn clamped(name: &str, default: u64, range: RangeInclusive<u64>) -> u64 {
    let Ok(raw) = std::env::var(name) else {
        return default;
    };
    let Ok(value) = raw.trim().parse::<u64>() else {
        tracing::warn!(var = name, value = %raw, default, "invalid value, using default");
        return default;
    };
    if range.contains(&value) {
        return value;
    }
    let clamped = value.clamp(*range.start(), *range.end());
    tracing::warn!(
        var = name,
        value,
        clamped,
        min = *range.start(),
        max = *range.end(),
        "value out of range, clamped"
    );
    clamped
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
