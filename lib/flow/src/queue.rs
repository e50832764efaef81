//! Execution queue: the outbound transport for fired executions.
//!
//! The scheduler commits a fire by persisting the trigger record first and
//! emitting the execution second, so the queue contract is at-least-once
//! upstream of that commit: a crash between the two is recovered
//! operationally, never by silent re-emission.

use crate::execution::Execution;
use async_trait::async_trait;
use std::fmt;
use std::sync::Mutex;

/// Errors from execution queue operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// The queue has been closed; no further emissions are accepted.
    Closed,
    /// Failed to reach the transport.
    ConnectionFailed { message: String },
    /// Failed to publish an execution.
    PublishFailed { message: String },
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "execution queue is closed"),
            Self::ConnectionFailed { message } => {
                write!(f, "execution queue connection failed: {message}")
            }
            Self::PublishFailed { message } => {
                write!(f, "execution publish failed: {message}")
            }
        }
    }
}

impl std::error::Error for QueueError {}

/// Outbound queue for fired executions.
#[async_trait]
pub trait ExecutionQueue: Send + Sync {
    /// Emits one execution.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue is closed or the transport rejects the
    /// publish; the caller treats either as an evaluation failure.
    async fn emit(&self, execution: &Execution) -> Result<(), QueueError>;
}

/// In-memory execution queue for tests and embedded use.
#[derive(Debug, Default)]
pub struct InMemoryExecutionQueue {
    inner: Mutex<QueueInner>,
}

#[derive(Debug, Default)]
struct QueueInner {
    emitted: Vec<Execution>,
    closed: bool,
}

impl InMemoryExecutionQueue {
    /// Creates an open, empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything emitted so far, in order.
    #[must_use]
    pub fn emitted(&self) -> Vec<Execution> {
        self.inner.lock().expect("queue lock poisoned").emitted.clone()
    }

    /// Closes the queue; later emissions fail with [`QueueError::Closed`].
    pub fn close(&self) {
        self.inner.lock().expect("queue lock poisoned").closed = true;
    }
}

#[async_trait]
impl ExecutionQueue for InMemoryExecutionQueue {
    async fn emit(&self, execution: &Execution) -> Result<(), QueueError> {
        let mut inner = self.inner.lock().expect("queue lock poisoned");
        if inner.closed {
            return Err(QueueError::Closed);
        }
        inner.emitted.push(execution.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emits_in_order() {
        let queue = InMemoryExecutionQueue::new();
        let first = Execution::new("ns", "flow", 1);
        let second = Execution::new("ns", "flow", 1);

        queue.emit(&first).await.expect("emit first");
        queue.emit(&second).await.expect("emit second");

        let emitted = queue.emitted();
        assert_eq!(emitted.len(), 2);
        assert_eq!(emitted[0].id, first.id);
        assert_eq!(emitted[1].id, second.id);
    }

    #[tokio::test]
    async fn closed_queue_rejects_emissions() {
        let queue = InMemoryExecutionQueue::new();
        queue.close();

        let result = queue.emit(&Execution::new("ns", "flow", 1)).await;
        assert_eq!(result, Err(QueueError::Closed));
        assert!(queue.emitted().is_empty());
    }
}
