// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::error::SpawnErrorKind;
use crate::observer::NoopObserver;

#[derive(Default)]
struct Recorder {
    spawned: Option<u32>,
    lines: Vec<String>,
    stderr: Vec<String>,
    timeouts: usize,
    force_kills: usize,
    fail_on: Option<&'static str>,
}

impl ProcessObserver for Recorder {
    fn on_spawned(&mut self, handle: &ProcessHandle) {
        assert!(self.lines.is_empty(), "spawn callback must precede output");
        self.spawned = Some(handle.pid());
    }

    fn on_line(&mut self, line: &str, ctx: &mut LineContext<'_>) {
        self.lines.push(line.to_string());
        if Some(line) == self.fail_on {
            ctx.set_result_error(format!("reported failure: {line}"));
        }
    }

    fn on_stderr_line(&mut self, line: &str) {
        self.stderr.push(line.to_string());
    }

    fn on_timeout(&mut self) {
        self.timeouts += 1;
    }

    fn on_force_kill(&mut self) {
        self.force_kills += 1;
    }
}

fn sh(script: &str) -> RunConfig {
    RunConfig::new("sh").arg("-c").arg(script)
}

#[tokio::test]
async fn captures_exit_code_and_lines_in_order() {
    let mut rec = Recorder::default();
    let result = run_managed_process(&sh("echo one; echo; echo two; exit 3"), &mut rec).await;

    assert!(rec.spawned.is_some());
    assert_eq!(rec.lines, vec!["one", "two"]);
    assert_eq!(result.exit_code, Some(3));
    assert!(!result.succeeded());
    assert_eq!(result.stdout_tail, "one\n\ntwo\n");
    assert_eq!(result.failure_message().as_deref(), Some("exited with code 3"));
}

#[tokio::test]
async fn unterminated_final_line_is_delivered() {
    let mut rec = Recorder::default();
    let result = run_managed_process(&sh("printf 'a\\nlast'"), &mut rec).await;
    assert_eq!(rec.lines, vec!["a", "last"]);
    assert!(result.succeeded());
}

#[tokio::test]
async fn stderr_is_captured_separately() {
    let mut rec = Recorder::default();
    let result = run_managed_process(&sh("echo out; echo boom >&2; exit 1"), &mut rec).await;
    assert_eq!(rec.lines, vec!["out"]);
    assert_eq!(rec.stderr, vec!["boom"]);
    assert_eq!(result.stderr_tail, "boom\n");
    assert_eq!(result.failure_message().as_deref(), Some("exited with code 1: boom"));
}

#[tokio::test]
async fn classifier_error_overrides_zero_exit() {
    let mut rec = Recorder { fail_on: Some("FAILED"), ..Recorder::default() };
    let result = run_managed_process(&sh("echo working; echo FAILED; exit 0"), &mut rec).await;
    assert_eq!(result.exit_code, Some(0));
    assert_eq!(result.result_error.as_deref(), Some("reported failure: FAILED"));
    assert!(!result.succeeded());
    assert_eq!(result.failure_message().as_deref(), Some("reported failure: FAILED"));
}

#[tokio::test]
async fn stdin_payload_reaches_the_child() {
    let mut rec = Recorder::default();
    let config = sh("cat").stdin("{\"prompt\":\"hi\"}\n");
    let result = run_managed_process(&config, &mut rec).await;
    assert!(result.succeeded());
    assert_eq!(rec.lines, vec!["{\"prompt\":\"hi\"}"]);
}

#[tokio::test]
async fn env_and_cwd_are_applied() {
    let dir = tempfile::tempdir().unwrap();
    let mut rec = Recorder::default();
    let config = sh("echo \"$GREETING\"; pwd").env("GREETING", "hello").cwd(dir.path());
    run_managed_process(&config, &mut rec).await;
    assert_eq!(rec.lines[0], "hello");
    let pwd = std::path::Path::new(&rec.lines[1]).canonicalize().unwrap();
    assert_eq!(pwd, dir.path().canonicalize().unwrap());
}

#[tokio::test]
async fn missing_binary_is_a_spawn_error() {
    let mut rec = Recorder::default();
    let result =
        run_managed_process(&RunConfig::new("/definitely/not/a/real/binary"), &mut rec).await;
    let err = result.spawn_error.clone().unwrap();
    assert_eq!(err.kind, SpawnErrorKind::NotFound);
    assert!(!err.is_transport());
    assert!(rec.spawned.is_none());
    assert!(!result.spawned());
    assert!(result.failure_message().unwrap().contains("not found"));
}

#[tokio::test]
async fn missing_working_directory_is_a_spawn_error() {
    let result = run_managed_process(&sh("true").cwd("/no/such/dir/anywhere"), &mut NoopObserver)
        .await;
    assert!(result.spawn_error.is_some());
}

#[tokio::test]
async fn timeout_sends_sigterm() {
    let mut rec = Recorder::default();
    let config = sh("sleep 30").max_runtime(Duration::from_millis(200));
    let result = run_managed_process(&config, &mut rec).await;

    assert!(result.timed_out);
    assert!(!result.force_killed);
    assert_eq!(result.signal, Some(Signal::SIGTERM as i32));
    assert_eq!(rec.timeouts, 1);
    assert_eq!(rec.force_kills, 0);
    assert!(result.duration < Duration::from_secs(10));
    assert!(result.failure_message().unwrap().starts_with("timed out"));
}

#[tokio::test]
async fn timeout_escalates_to_sigkill_when_term_is_ignored() {
    let mut rec = Recorder::default();
    let config = sh("trap '' TERM; echo ready; sleep 30")
        .max_runtime(Duration::from_millis(300))
        .force_kill_timeout(Duration::from_millis(300));
    let result = run_managed_process(&config, &mut rec).await;

    assert!(result.timed_out);
    assert!(result.force_killed);
    assert_eq!(result.signal, Some(Signal::SIGKILL as i32));
    assert_eq!((rec.timeouts, rec.force_kills), (1, 1));
    assert!(result.duration >= Duration::from_millis(600));
}

#[tokio::test]
async fn zero_max_runtime_disables_the_budget() {
    let config = sh("sleep 0.2").max_runtime(Duration::ZERO);
    let result = run_managed_process(&config, &mut NoopObserver).await;
    assert!(!result.timed_out);
    assert!(result.succeeded());
}

#[tokio::test]
async fn tails_are_bounded() {
    let config = sh("i=0; while [ $i -lt 200 ]; do echo line-$i; i=$((i+1)); done")
        .output_tail_chars(32);
    let result = run_managed_process(&config, &mut NoopObserver).await;
    assert!(result.stdout_tail.chars().count() <= 32);
    assert!(result.stdout_tail.ends_with("line-199\n"));
}

#[tokio::test]
async fn background_grandchild_holding_pipes_does_not_block_completion() {
    let config = sh("sleep 30 & echo started");
    let started = std::time::Instant::now();
    let result = run_managed_process(&config, &mut NoopObserver).await;
    assert_eq!(result.exit_code, Some(0));
    assert!(started.elapsed() < POST_EXIT_DRAIN + Duration::from_secs(5));
    assert!(result.stdout_tail.contains("started"));
    if let Some(pid) = result.pid {
        let _ = nix::sys::signal::killpg(
            nix::unistd::Pid::from_raw(pid as i32),
            Signal::SIGKILL,
        );
    }
}

#[test]
fn failure_message_prefers_signal_when_no_code() {
    let result = RunResult { signal: Some(9), ..RunResult::default() };
    assert_eq!(result.failure_message().as_deref(), Some("killed by signal 9"));
}

#[yare::parameterized(
    terminated = { false, 850, "timed out after 850ms (terminated)" },
    killed     = { true, 65_000, "timed out after 1m 5s (killed)" },
)]
fn timeout_message_formats_elapsed(force_killed: bool, ms: u64, expected: &str) {
    let result = RunResult {
        timed_out: true,
        force_killed,
        duration: Duration::from_millis(ms),
        ..RunResult::default()
    };
    assert_eq!(result.failure_message().as_deref(), Some(expected));
}
