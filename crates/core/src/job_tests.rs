// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::todo;

#[test]
fn next_eligible_skips_done_and_exhausted_items() {
    let job = Job::builder()
        .todos(vec![
            todo("a", TodoStatus::Done, 1),
            todo("b", TodoStatus::Error, 3),
            todo("c", TodoStatus::Error, 1),
            todo("d", TodoStatus::Pending, 0),
        ])
        .build();
    assert_eq!(job.next_eligible_todo(3), Some(2));
    assert_eq!(job.next_eligible_todo(1), Some(3));
}

#[test]
fn next_eligible_none_when_all_done() {
    let job = Job::builder().todos(vec![todo("a", TodoStatus::Done, 1)]).build();
    assert_eq!(job.next_eligible_todo(3), None);
    assert!(job.is_complete());
}

#[test]
fn empty_job_is_not_complete() {
    assert!(!Job::builder().build().is_complete());
}

#[yare::parameterized(
    pending = { TodoStatus::Pending, "\"pending\"" },
    running = { TodoStatus::Running, "\"running\"" },
    done    = { TodoStatus::Done,    "\"done\"" },
    error   = { TodoStatus::Error,   "\"error\"" },
)]
fn todo_status_wire_format(status: TodoStatus, wire: &str) {
    assert_eq!(serde_json::to_string(&status).unwrap(), wire);
    assert_eq!(status.to_string(), wire.trim_matches('"'));
}

#[test]
fn deserializes_persisted_job_schema() {
    let json = r#"{
        "id": "j1",
        "name": "refactor",
        "prompt": "clean up",
        "workingDirectory": "/repo",
        "runnerCommand": "agent --stdin",
        "enabled": false,
        "fastExitMode": true,
        "todos": [
            {"id": "a", "text": "first", "status": "done", "attempts": 1, "lastError": null,
             "lastRunAt": 1700000000000, "lastDurationMs": 1200},
            {"id": "b", "text": "second"}
        ],
        "createdAt": 1,
        "updatedAt": 2
    }"#;
    let job: Job = serde_json::from_str(json).unwrap();
    assert!(!job.enabled);
    assert_eq!(job.todos.len(), 2);
    assert_eq!(job.todos[0].status, TodoStatus::Done);
    assert_eq!(job.todos[0].last_duration_ms, Some(1200));
    assert_eq!(job.todos[1].status, TodoStatus::Pending);
    assert_eq!(job.todos[1].attempts, 0);
    assert_eq!(job.todo_index("b"), Some(1));
}
