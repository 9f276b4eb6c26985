// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-invocation run configuration.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Default runtime budget (30 minutes).
pub const DEFAULT_MAX_RUNTIME: Duration = Duration::from_secs(30 * 60);

/// Default grace period between SIGTERM and SIGKILL on timeout.
pub const DEFAULT_FORCE_KILL_TIMEOUT: Duration = Duration::from_secs(5);

/// Default size of each captured output tail, in characters.
pub const DEFAULT_OUTPUT_TAIL_CHARS: usize = 16 * 1024;

/// Immutable configuration for one managed process run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: HashMap<String, String>,
    /// Written to the child's stdin, which is then closed. `None` wires stdin to null.
    pub stdin: Option<String>,
    /// Zero disables the runtime budget.
    pub max_runtime: Duration,
    pub force_kill_timeout: Duration,
    pub output_tail_chars: usize,
    /// Short description used in log events (e.g. `task tsk-abc`).
    pub label: String,
}

impl RunConfig {
    pub fn new(program: impl Into<String>) -> Self {
        let program = program.into();
        Self {
            label: program.clone(),
            program,
            args: Vec::new(),
            cwd: None,
            env: HashMap::new(),
            stdin: None,
            max_runtime: DEFAULT_MAX_RUNTIME,
            force_kill_timeout: DEFAULT_FORCE_KILL_TIMEOUT,
            output_tail_chars: DEFAULT_OUTPUT_TAIL_CHARS,
        }
    }

    /// Run `command` through `bash -c`.
    pub fn shell(command: &str) -> Self {
        Self::new("bash").arg("-c").arg(command)
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn stdin(mut self, payload: impl Into<String>) -> Self {
        self.stdin = Some(payload.into());
        self
    }

    pub fn max_runtime(mut self, d: Duration) -> Self {
        self.max_runtime = d;
        self
    }

    pub fn force_kill_timeout(mut self, d: Duration) -> Self {
        self.force_kill_timeout = d;
        self
    }

    pub fn output_tail_chars(mut self, chars: usize) -> Self {
        self.output_tail_chars = chars;
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}
