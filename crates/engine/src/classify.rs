// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-band result detection on agent stdout.
//!
//! Agents often exit 0 even when the work failed; a structured report on
//! stdout is the real verdict. Recognized shapes:
//!
//! - `{"type":"result","is_error":true,"result":"..."}`
//! - `{"status":"error"|"failed","error":"..."}` / `{"status":"success"|"done"}`

use cadence_process::{LineContext, ProcessHandle, ProcessObserver};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Success,
    Failure(String),
}

/// Classify one stdout line. Non-JSON lines and unrecognized objects are `None`.
pub fn classify_line(line: &str) -> Option<Verdict> {
    let trimmed = line.trim();
    if !trimmed.starts_with('{') {
        return None;
    }
    let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(trimmed) else {
        return None;
    };

    if obj.get("type").and_then(Value::as_str) == Some("result") {
        let subtype_error = obj
            .get("subtype")
            .and_then(Value::as_str)
            .is_some_and(|s| s.starts_with("error"));
        let is_error = obj.get("is_error").and_then(Value::as_bool).unwrap_or(false);
        return Some(if is_error || subtype_error {
            Verdict::Failure(message(&obj, &["error", "result", "subtype"], "agent reported an error"))
        } else {
            Verdict::Success
        });
    }

    let status = obj.get("status").and_then(Value::as_str)?.to_ascii_lowercase();
    match status.as_str() {
        "error" | "failed" | "failure" => {
            Some(Verdict::Failure(message(&obj, &["error", "message", "reason"], "agent reported failure")))
        }
        "success" | "succeeded" | "done" | "ok" | "completed" => Some(Verdict::Success),
        _ => None,
    }
}

fn message(obj: &Map<String, Value>, keys: &[&str], fallback: &str) -> String {
    keys.iter()
        .filter_map(|k| obj.get(*k).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .unwrap_or(fallback)
        .to_string()
}

/// Observer shared by task and job runs: hands the process handle to the
/// owner on spawn and applies [`classify_line`] to stdout.
pub(crate) struct AgentObserver<F> {
    label: String,
    on_spawned: Option<F>,
}

impl<F> AgentObserver<F>
where
    F: FnOnce(&ProcessHandle) + Send,
{
    pub(crate) fn new(label: impl Into<String>, on_spawned: F) -> Self {
        Self { label: label.into(), on_spawned: Some(on_spawned) }
    }
}

impl<F> ProcessObserver for AgentObserver<F>
where
    F: FnOnce(&ProcessHandle) + Send,
{
    fn on_spawned(&mut self, handle: &ProcessHandle) {
        if let Some(register) = self.on_spawned.take() {
            register(handle);
        }
    }

    fn on_line(&mut self, line: &str, ctx: &mut LineContext<'_>) {
        match classify_line(line) {
            Some(Verdict::Failure(msg)) => {
                tracing::debug!(label = %self.label, error = %msg, "agent reported failure");
                ctx.set_result_error(msg);
            }
            Some(Verdict::Success) => ctx.clear_result_error(),
            None => {}
        }
    }

    fn on_stderr_line(&mut self, line: &str) {
        tracing::debug!(label = %self.label, line, "stderr");
    }
}

#[cfg(test)]
#[path = "classify_tests.rs"]
mod tests;
