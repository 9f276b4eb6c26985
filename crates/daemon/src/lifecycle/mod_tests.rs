// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::path::Path;

#[test]
fn config_paths_live_in_state_dir() {
    let config = Config::in_dir(PathBuf::from("/state"));
    assert_eq!(config.lock_path, Path::new("/state/cadenced.pid"));
    assert_eq!(config.log_path, Path::new("/state/cadenced.log"));
    assert_eq!(config.tasks_path, Path::new("/state/tasks.json"));
    assert_eq!(config.jobs_path, Path::new("/state/jobs.json"));
}

#[yare::parameterized(
    lock_failed  = { LifecycleError::LockFailed(std::io::Error::other("held")), 2 },
    no_state_dir = { LifecycleError::NoStateDir, 78 },
    io           = { LifecycleError::Io(std::io::Error::other("disk")), 74 },
    engine       = { LifecycleError::Engine(EngineError::ShuttingDown), 1 },
)]
fn exit_codes(error: LifecycleError, expected: i32) {
    assert_eq!(error.exit_code(), expected);
}

#[tokio::test]
async fn notification_logger_stops_when_channel_closes() {
    let notifier = BroadcastNotifier::new(4);
    let handle = spawn_notification_logger(&notifier);
    drop(notifier);
    tokio::time::timeout(std::time::Duration::from_secs(5), handle).await.unwrap().unwrap();
}
