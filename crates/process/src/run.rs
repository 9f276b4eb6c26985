// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run one command to completion under a runtime budget.

use crate::config::RunConfig;
use crate::error::SpawnError;
use crate::handle::{ExitInfo, ProcessHandle, SignalOutcome};
use crate::observer::{LineContext, ProcessObserver};
use crate::tail::CapturedStream;
use cadence_core::{format_elapsed_ms, last_line};
use nix::sys::signal::Signal;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::sync::watch;
use tokio::time::{sleep_until, Instant};

/// How long output is still read after the direct child exits. Grandchildren
/// that inherited the pipes would otherwise hold the run open.
pub const POST_EXIT_DRAIN: Duration = Duration::from_secs(2);

const READ_BUF_BYTES: usize = 8 * 1024;

/// Everything known about a finished run.
#[derive(Debug, Clone, Default)]
pub struct RunResult {
    pub pid: Option<u32>,
    pub exit_code: Option<i32>,
    pub signal: Option<i32>,
    pub spawn_error: Option<SpawnError>,
    pub timed_out: bool,
    pub force_killed: bool,
    /// Set by the line classifier; overrides a zero exit code.
    pub result_error: Option<String>,
    pub stdout_tail: String,
    pub stderr_tail: String,
    pub duration: Duration,
}

impl RunResult {
    fn spawn_failed(error: SpawnError, duration: Duration) -> Self {
        Self { spawn_error: Some(error), duration, ..Self::default() }
    }

    pub fn spawned(&self) -> bool {
        self.spawn_error.is_none()
    }

    pub fn succeeded(&self) -> bool {
        self.spawned()
            && !self.timed_out
            && self.result_error.is_none()
            && self.exit_code == Some(0)
    }

    /// Human-readable reason the run did not succeed, `None` on success.
    pub fn failure_message(&self) -> Option<String> {
        if let Some(err) = &self.spawn_error {
            return Some(err.to_string());
        }
        if self.timed_out {
            let how = if self.force_killed { "killed" } else { "terminated" };
            let elapsed = format_elapsed_ms(self.duration.as_millis() as u64);
            return Some(format!("timed out after {elapsed} ({how})"));
        }
        if let Some(err) = &self.result_error {
            return Some(err.clone());
        }
        match (self.exit_code, self.signal) {
            (Some(0), _) => None,
            (Some(code), _) => Some(match last_line(&self.stderr_tail) {
                Some(line) => format!("exited with code {code}: {line}"),
                None => format!("exited with code {code}"),
            }),
            (None, Some(sig)) => Some(format!("killed by signal {sig}")),
            (None, None) => Some("exited without a status".to_string()),
        }
    }
}

/// Spawn `config` and drive it to completion.
///
/// Never returns early on spawn failure: the failure is reported in
/// [`RunResult::spawn_error`] and the observer is not called.
pub async fn run_managed_process<O: ProcessObserver>(
    config: &RunConfig,
    observer: &mut O,
) -> RunResult {
    let started = Instant::now();

    let mut cmd = Command::new(&config.program);
    cmd.args(&config.args)
        .envs(&config.env)
        .stdin(if config.stdin.is_some() { Stdio::piped() } else { Stdio::null() })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .process_group(0);
    if let Some(cwd) = &config.cwd {
        cmd.current_dir(cwd);
    }

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            let err = SpawnError::from_io(&config.program, &e);
            tracing::warn!(label = %config.label, error = %err, "spawn failed");
            return RunResult::spawn_failed(err, started.elapsed());
        }
    };

    let pid = child.id().unwrap_or_default();
    let (exit_tx, exit_rx) = watch::channel(None);
    let handle = ProcessHandle::new(pid, true, &config.label, exit_rx);
    tracing::debug!(label = %config.label, pid, "process spawned");
    observer.on_spawned(&handle);

    if let (Some(payload), Some(mut stdin)) = (config.stdin.clone(), child.stdin.take()) {
        tokio::spawn(async move {
            if let Err(e) = stdin.write_all(payload.as_bytes()).await {
                tracing::debug!(pid, error = %e, "stdin payload not fully written");
            }
        });
    }

    let mut stdout = child.stdout.take();
    let mut stderr = child.stderr.take();
    let mut out = CapturedStream::new(config.output_tail_chars);
    let mut err = CapturedStream::new(config.output_tail_chars);
    let mut out_buf = [0u8; READ_BUF_BYTES];
    let mut err_buf = [0u8; READ_BUF_BYTES];

    let mut result = RunResult { pid: Some(pid), ..RunResult::default() };
    let mut exit: Option<ExitInfo> = None;

    let far_future = Instant::now() + Duration::from_secs(365 * 24 * 3600);
    let mut runtime_deadline =
        (!config.max_runtime.is_zero()).then(|| Instant::now() + config.max_runtime);
    let mut kill_deadline: Option<Instant> = None;
    let mut drain_deadline: Option<Instant> = None;

    loop {
        if exit.is_some() && stdout.is_none() && stderr.is_none() {
            break;
        }
        tokio::select! {
            read = read_some(&mut stdout, &mut out_buf), if stdout.is_some() => match read {
                Ok(n) if n > 0 => {
                    for line in out.push(&out_buf[..n]) {
                        deliver_stdout(observer, &line, &mut result.result_error);
                    }
                }
                _ => {
                    stdout = None;
                    if let Some(line) = out.finish() {
                        deliver_stdout(observer, &line, &mut result.result_error);
                    }
                }
            },
            read = read_some(&mut stderr, &mut err_buf), if stderr.is_some() => match read {
                Ok(n) if n > 0 => {
                    for line in err.push(&err_buf[..n]) {
                        deliver_stderr(observer, &line);
                    }
                }
                _ => {
                    stderr = None;
                    if let Some(line) = err.finish() {
                        deliver_stderr(observer, &line);
                    }
                }
            },
            status = child.wait(), if exit.is_none() => {
                let info = match status {
                    Ok(status) => ExitInfo::from_status(status),
                    Err(e) => {
                        tracing::warn!(pid, error = %e, "failed to wait for process");
                        ExitInfo::default()
                    }
                };
                exit = Some(info);
                exit_tx.send_replace(Some(info));
                runtime_deadline = None;
                kill_deadline = None;
                drain_deadline = Some(Instant::now() + POST_EXIT_DRAIN);
            },
            _ = sleep_until(runtime_deadline.unwrap_or(far_future)), if runtime_deadline.is_some() => {
                runtime_deadline = None;
                result.timed_out = true;
                tracing::warn!(
                    label = %config.label,
                    pid,
                    max_runtime_ms = config.max_runtime.as_millis() as u64,
                    "runtime budget exceeded, sending SIGTERM"
                );
                if send_logged(&handle, Signal::SIGTERM) == Some(SignalOutcome::Sent) {
                    observer.on_timeout();
                    kill_deadline = Some(Instant::now() + config.force_kill_timeout);
                }
            },
            _ = sleep_until(kill_deadline.unwrap_or(far_future)), if kill_deadline.is_some() => {
                kill_deadline = None;
                tracing::warn!(
                    label = %config.label,
                    pid,
                    grace_ms = config.force_kill_timeout.as_millis() as u64,
                    "process ignored SIGTERM, sending SIGKILL"
                );
                if send_logged(&handle, Signal::SIGKILL) == Some(SignalOutcome::Sent) {
                    result.force_killed = true;
                    observer.on_force_kill();
                }
            },
            _ = sleep_until(drain_deadline.unwrap_or(far_future)), if drain_deadline.is_some() => {
                drain_deadline = None;
                tracing::debug!(pid, "output still open after exit, abandoning it");
                if stdout.take().is_some() {
                    if let Some(line) = out.finish() {
                        deliver_stdout(observer, &line, &mut result.result_error);
                    }
                }
                if stderr.take().is_some() {
                    if let Some(line) = err.finish() {
                        deliver_stderr(observer, &line);
                    }
                }
            },
        }
    }

    let info = exit.unwrap_or_default();
    result.exit_code = info.code;
    result.signal = info.signal;
    result.stdout_tail = out.tail.into_string();
    result.stderr_tail = err.tail.into_string();
    result.duration = started.elapsed();
    tracing::debug!(
        label = %config.label,
        pid,
        exit_code = ?result.exit_code,
        signal = ?result.signal,
        timed_out = result.timed_out,
        duration_ms = result.duration.as_millis() as u64,
        "process finished"
    );
    result
}

async fn read_some<R: AsyncRead + Unpin>(
    reader: &mut Option<R>,
    buf: &mut [u8],
) -> std::io::Result<usize> {
    match reader {
        Some(r) => r.read(buf).await,
        None => std::future::pending().await,
    }
}

fn deliver_stdout<O: ProcessObserver>(observer: &mut O, line: &str, error: &mut Option<String>) {
    if line.trim().is_empty() {
        return;
    }
    let mut ctx = LineContext::new(error);
    observer.on_line(line, &mut ctx);
}

fn deliver_stderr<O: ProcessObserver>(observer: &mut O, line: &str) {
    if !line.trim().is_empty() {
        observer.on_stderr_line(line);
    }
}

fn send_logged(handle: &ProcessHandle, signal: Signal) -> Option<SignalOutcome> {
    match handle.signal(signal) {
        Ok(outcome) => Some(outcome),
        Err(e) => {
            tracing::error!(pid = handle.pid(), error = %e, "signal delivery failed");
            None
        }
    }
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
