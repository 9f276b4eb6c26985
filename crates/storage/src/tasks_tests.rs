// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;
use tempfile::tempdir;

fn write(store: &TaskStore, value: Value) {
    std::fs::write(store.path(), serde_json::to_vec(&value).unwrap()).unwrap();
}

#[test]
fn save_then_load_preserves_tasks() {
    let dir = tempdir().unwrap();
    let store = TaskStore::in_dir(dir.path());
    let mut task = ScheduledTask::builder().id("tsk-a").cron("0 9 * * 1-5").build();
    task.created_at = 5;
    task.updated_at = 7;
    store.save(std::slice::from_ref(&task)).unwrap();

    assert_eq!(store.load().unwrap(), vec![task]);
}

#[test]
fn persisted_schema_is_camel_case_with_epoch_ms() {
    let dir = tempdir().unwrap();
    let store = TaskStore::in_dir(dir.path());
    let mut task = ScheduledTask::builder().id("tsk-a").fast_exit_mode(true).build();
    task.created_at = 1_700_000_000_000;
    store.save(&[task]).unwrap();

    let raw: Value = serde_json::from_slice(&std::fs::read(store.path()).unwrap()).unwrap();
    let record = &raw[0];
    for key in ["id", "name", "cron", "prompt", "workingDirectory", "enabled", "fastExitMode", "createdAt", "updatedAt"] {
        assert!(record.get(key).is_some(), "missing {key}");
    }
    assert_eq!(record["createdAt"], json!(1_700_000_000_000u64));
}

#[test]
fn invalid_records_are_dropped_individually() {
    let dir = tempdir().unwrap();
    let store = TaskStore::in_dir(dir.path());
    write(
        &store,
        json!([
            {"id": "tsk-good", "name": "good", "cron": "* * * * *", "prompt": "p", "workingDirectory": "/tmp"},
            {"id": "tsk-noname", "name": "  ", "cron": "* * * * *", "prompt": "p", "workingDirectory": "/tmp"},
            {"id": "tsk-nodir", "name": "x", "cron": "* * * * *", "prompt": "p", "workingDirectory": ""},
            {"id": "tsk-wrongtype", "name": 42, "cron": "* * * * *", "prompt": "p", "workingDirectory": "/tmp"},
            "not an object",
            {"id": "tsk-good", "name": "dup", "cron": "* * * * *", "prompt": "p", "workingDirectory": "/tmp"}
        ]),
    );

    let tasks = store.load().unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].id, "tsk-good");
    assert_eq!(tasks[0].name, "good");
}

#[test]
fn normalization_fills_defaults() {
    let dir = tempdir().unwrap();
    let store = TaskStore::in_dir(dir.path());
    write(
        &store,
        json!([{
            "name": "  nightly  ",
            "cron": "  0   2 * *  * ",
            "prompt": "p",
            "workingDirectory": "/tmp",
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": 0
        }]),
    );

    let task = store.load().unwrap().remove(0);
    assert!(task.id.as_str().starts_with("tsk-"));
    assert_eq!(task.name, "nightly");
    assert_eq!(task.cron, "0 2 * * *");
    assert!(task.enabled);
    assert!(!task.fast_exit_mode);
    assert_eq!(task.created_at, 1_704_067_200_000);
    assert_eq!(task.updated_at, task.created_at);
}

#[test]
fn invalid_cron_is_kept_for_the_scheduler_to_disable() {
    let dir = tempdir().unwrap();
    let store = TaskStore::in_dir(dir.path());
    write(
        &store,
        json!([{"id": "tsk-x", "name": "x", "cron": "not a cron", "prompt": "p", "workingDirectory": "/tmp"}]),
    );
    assert_eq!(store.load().unwrap()[0].cron, "not a cron");
}
