//! Error types for the scheduler crate.

use crate::store::StoreError;
use copper_courier_flow::{QueueError, TriggerError, TriggerUid};
use std::fmt;

/// Errors surfaced by the scheduler's result handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// A result handler tried to release a trigger that holds no slot.
    /// This is an internal-state violation, reported loudly.
    SlotNotHeld { uid: TriggerUid },
    /// A state store operation failed.
    Store(StoreError),
    /// The execution queue rejected an emission.
    Queue(QueueError),
    /// A trigger evaluation failed.
    Evaluation(TriggerError),
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SlotNotHeld { uid } => {
                write!(f, "can't release trigger '{uid}' from running")
            }
            Self::Store(e) => write!(f, "state store error: {e}"),
            Self::Queue(e) => write!(f, "execution queue error: {e}"),
            Self::Evaluation(e) => write!(f, "evaluation error: {e}"),
        }
    }
}

impl std::error::Error for SchedulerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::SlotNotHeld { .. } => None,
            Self::Store(e) => Some(e),
            Self::Queue(e) => Some(e),
            Self::Evaluation(e) => Some(e),
        }
    }
}

impl From<StoreError> for SchedulerError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

impl From<QueueError> for SchedulerError {
    fn from(e: QueueError) -> Self {
        Self::Queue(e)
    }
}

impl From<TriggerError> for SchedulerError {
    fn from(e: TriggerError) -> Self {
        Self::Evaluation(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_not_held_names_the_trigger() {
        let err = SchedulerError::SlotNotHeld {
            uid: TriggerUid::new("ns", "flow", "t"),
        };
        assert!(err.to_string().contains("ns.flow.t"));
    }

    #[test]
    fn wrapped_errors_expose_a_source() {
        use std::error::Error;

        let err = SchedulerError::from(QueueError::Closed);
        assert!(err.source().is_some());
    }
}
