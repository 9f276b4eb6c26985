// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! State-change notifications for observers that refresh a view.

use async_trait::async_trait;
use cadence_core::{JobId, RunStatus, TaskId, TodoId, TodoStatus, Trigger};
use thiserror::Error;
use tokio::sync::broadcast;

/// Errors from notify operations
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("send failed: {0}")]
    SendFailed(String),
}

/// A state change in the scheduler or the job runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    TaskCreated(TaskId),
    TaskUpdated(TaskId),
    TaskDeleted(TaskId),
    TaskStarted { id: TaskId, trigger: Trigger },
    TaskCompleted { id: TaskId, status: RunStatus },
    TasksReloaded,
    JobCreated(JobId),
    JobUpdated(JobId),
    JobDeleted(JobId),
    JobTodosChanged(JobId),
    JobStarted { id: JobId, todo: TodoId },
    JobCompleted { id: JobId, todo: TodoId, status: TodoStatus },
    JobsReloaded,
}

/// Hook invoked after every state change. Delivery is best effort.
#[async_trait]
pub trait Notifier: Clone + Send + Sync + 'static {
    async fn notify(&self, event: Notification) -> Result<(), NotifyError>;
}

/// Discards every notification.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _event: Notification) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Fans notifications out to any number of subscribers. Having no
/// subscribers is not an error.
#[derive(Clone, Debug)]
pub struct BroadcastNotifier {
    tx: broadcast::Sender<Notification>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }
}

#[async_trait]
impl Notifier for BroadcastNotifier {
    async fn notify(&self, event: Notification) -> Result<(), NotifyError> {
        let _ = self.tx.send(event);
        Ok(())
    }
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::{Notification, Notifier, NotifyError};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Records every notification for assertions.
    #[derive(Clone, Default)]
    pub struct FakeNotifier {
        calls: Arc<Mutex<Vec<Notification>>>,
    }

    impl FakeNotifier {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn calls(&self) -> Vec<Notification> {
            self.calls.lock().clone()
        }

        pub fn clear(&self) {
            self.calls.lock().clear();
        }
    }

    #[async_trait]
    impl Notifier for FakeNotifier {
        async fn notify(&self, event: Notification) -> Result<(), NotifyError> {
            self.calls.lock().push(event);
            Ok(())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeNotifier;
