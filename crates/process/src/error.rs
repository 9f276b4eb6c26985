// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Spawn and signalling errors.

use nix::errno::Errno;
use nix::sys::signal::Signal;
use thiserror::Error;

/// Why a process never started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnErrorKind {
    /// Binary (or working directory) does not exist.
    NotFound,
    /// Binary is not executable.
    PermissionDenied,
    /// Arguments or environment too large for the OS to deliver (`E2BIG`).
    ArgumentListTooLong,
    Other,
}

impl std::fmt::Display for SpawnErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SpawnErrorKind::NotFound => "not found",
            SpawnErrorKind::PermissionDenied => "permission denied",
            SpawnErrorKind::ArgumentListTooLong => "argument list too long",
            SpawnErrorKind::Other => "spawn failed",
        })
    }
}

/// A process that could not be started. Never retried by this crate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to spawn '{program}' ({kind}): {message}")]
pub struct SpawnError {
    pub program: String,
    pub kind: SpawnErrorKind,
    pub message: String,
    pub os_code: Option<i32>,
}

impl SpawnError {
    pub fn from_io(program: &str, err: &std::io::Error) -> Self {
        let os_code = err.raw_os_error();
        let kind = if os_code == Some(Errno::E2BIG as i32) {
            SpawnErrorKind::ArgumentListTooLong
        } else {
            match err.kind() {
                std::io::ErrorKind::NotFound => SpawnErrorKind::NotFound,
                std::io::ErrorKind::PermissionDenied => SpawnErrorKind::PermissionDenied,
                _ => SpawnErrorKind::Other,
            }
        };
        Self { program: program.to_string(), kind, message: err.to_string(), os_code }
    }

    /// Payload-size failures are the transport's fault, not the work item's.
    pub fn is_transport(&self) -> bool {
        self.kind == SpawnErrorKind::ArgumentListTooLong
    }
}

/// Errors from signalling a running process.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to send {signal} to pid {pid}: {source}")]
    Signal { pid: u32, signal: Signal, source: Errno },
}
