//! Core domain types for the copper-courier platform.
//!
//! This crate provides the execution identifier shared by the flow model,
//! the scheduler, and the server.

pub mod id;

pub use id::{ExecutionId, ParseIdError};
