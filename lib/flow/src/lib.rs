//! Flow model for the copper-courier platform.
//!
//! This crate provides the domain types the scheduler and the executor share:
//!
//! - **Flow definitions**: namespaced, versioned flows carrying their triggers
//! - **Trigger contract**: declarations, the polling trigger interface, and
//!   the per-trigger context and durable record
//! - **Executions**: the outbound unit of work with its state machine
//! - **Run context**: per-evaluation runtime view handed to trigger code
//! - **Execution queue**: the outbound transport contract, with in-memory and
//!   NATS JetStream implementations

pub mod context;
pub mod definition;
pub mod error;
pub mod execution;
pub mod nats;
pub mod queue;
pub mod schedule;
pub mod trigger;

pub use context::{DefaultRunContextFactory, RunContext, RunContextFactory};
pub use definition::Flow;
pub use error::{ScheduleError, TriggerError};
pub use execution::{Execution, ExecutionState};
pub use nats::{NatsExecutionQueue, NatsQueueConfig, QueuedExecution};
pub use queue::{ExecutionQueue, InMemoryExecutionQueue, QueueError};
pub use schedule::ScheduleTrigger;
pub use trigger::{PollingTrigger, TriggerContext, TriggerDeclaration, TriggerRecord, TriggerUid};
