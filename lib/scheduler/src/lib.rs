//! Polling trigger scheduler for the copper-courier platform.
//!
//! This crate provides:
//!
//! - **Scheduler**: the 1 Hz tick loop that evaluates polling triggers and
//!   emits executions, with per-trigger interval gating, single-flight
//!   evaluation, and a prior-execution interlock
//! - **Collaborator contracts**: flow listener, condition evaluator, trigger
//!   and execution state stores, clock, and metric registry
//! - **In-memory implementations** of every contract, for tests and
//!   embedded deployments

pub mod clock;
pub mod condition;
pub mod error;
pub mod listener;
pub mod metrics;
pub mod scheduler;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use condition::{ConditionEvaluator, DefaultConditionEvaluator};
pub use error::SchedulerError;
pub use listener::{FlowListener, StaticFlowListener};
pub use metrics::{InMemoryMetricRegistry, MetricRegistry, MetricTags, RecorderMetricRegistry};
pub use scheduler::{Scheduler, SchedulerConfig};
pub use store::{
    ExecutionStateStore, InMemoryExecutionStateStore, InMemoryTriggerStateStore, StoreError,
    TriggerStateStore,
};
