//! Execution: the unit of work a fired trigger emits.

use chrono::{DateTime, Utc};
use copper_courier_core::ExecutionId;
use serde::{Deserialize, Serialize};

/// The overall state of an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    /// Queued, waiting for an executor.
    Queued,
    /// Actively executing.
    Running,
    /// Completed successfully.
    Completed,
    /// Failed.
    Failed,
    /// Cancelled by user or system.
    Cancelled,
}

impl ExecutionState {
    /// Returns true if no further transitions occur from this state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// A single execution of a flow.
///
/// The scheduler constructs executions in `Queued` state and emits them on
/// the execution queue; the executor owns every later transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Execution {
    /// Unique identifier for this execution.
    pub id: ExecutionId,
    /// Namespace of the flow being executed.
    pub namespace: String,
    /// Identifier of the flow being executed.
    pub flow_id: String,
    /// Revision of the flow this execution was built from.
    pub flow_revision: u32,
    /// Current state.
    pub state: ExecutionState,
    /// When this execution was created.
    pub created_at: DateTime<Utc>,
}

impl Execution {
    /// Creates a new execution in queued state.
    #[must_use]
    pub fn new(namespace: impl Into<String>, flow_id: impl Into<String>, flow_revision: u32) -> Self {
        Self {
            id: ExecutionId::new(),
            namespace: namespace.into(),
            flow_id: flow_id.into(),
            flow_revision,
            state: ExecutionState::Queued,
            created_at: Utc::now(),
        }
    }

    /// Returns this execution in the given state.
    #[must_use]
    pub fn with_state(mut self, state: ExecutionState) -> Self {
        self.state = state;
        self
    }
}
