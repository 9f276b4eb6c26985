// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::job::{TodoItem, TodoStatus};

/// Proptest strategies for model types.
pub mod strategies {
    use crate::job::TodoStatus;
    use proptest::prelude::*;

    pub fn arb_todo_status() -> impl Strategy<Value = TodoStatus> {
        prop_oneof![
            Just(TodoStatus::Pending),
            Just(TodoStatus::Running),
            Just(TodoStatus::Done),
            Just(TodoStatus::Error),
        ]
    }
}

/// A todo item with the given status and attempt count.
pub fn todo(text: &str, status: TodoStatus, attempts: u32) -> TodoItem {
    TodoItem { status, attempts, ..TodoItem::new(text) }
}

/// Pending todo items for each text.
pub fn pending_todos(texts: &[&str]) -> Vec<TodoItem> {
    texts.iter().map(|t| TodoItem::new(*t)).collect()
}
