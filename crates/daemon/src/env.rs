// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;

use crate::lifecycle::LifecycleError;

/// Resolve state directory: CADENCE_STATE_DIR > XDG_STATE_HOME/cadence > ~/.local/state/cadence
pub fn state_dir() -> Result<PathBuf, LifecycleError> {
    if let Some(dir) = non_empty("CADENCE_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Some(xdg) = non_empty("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("cadence"));
    }
    let home = non_empty("HOME").ok_or(LifecycleError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/cadence"))
}

const DEFAULT_NOTIFY_CAPACITY: usize = 256;

/// Capacity of the notification channel the daemon logs from. A value that
/// does not parse as a positive integer falls back to the default.
pub fn notification_capacity() -> usize {
    let Ok(raw) = std::env::var("CADENCE_NOTIFY_CAPACITY") else {
        return DEFAULT_NOTIFY_CAPACITY;
    };
    match raw.trim().parse::<usize>() {
        Ok(n) if n > 0 => n,
        _ => {
            tracing::warn!(
                var = "CADENCE_NOTIFY_CAPACITY",
                value = %raw,
                default = DEFAULT_NOTIFY_CAPACITY,
                "invalid value, using default"
            );
            DEFAULT_NOTIFY_CAPACITY
        }
    }
}

fn non_empty(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
