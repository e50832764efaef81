//! NATS JetStream implementation of the execution queue.
//!
//! Executions are published to subjects like `executions.<namespace>.<flow_id>`
//! on a work-queue stream, wrapped in a versioned JSON payload so the
//! executor side can evolve the schema without a lockstep deploy.

use crate::execution::Execution;
use crate::queue::{ExecutionQueue, QueueError};
use async_nats::jetstream;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Subject prefix for emitted executions.
const EXECUTIONS_SUBJECT_PREFIX: &str = "executions";

/// Stream name for emitted executions.
const EXECUTIONS_STREAM_NAME: &str = "EXECUTIONS";

/// Current version of the queued payload format.
const PAYLOAD_VERSION: u32 = 1;

/// The versioned wire form of an emitted execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedExecution {
    /// Payload format version.
    pub version: u32,
    /// The emitted execution.
    pub execution: Execution,
}

impl QueuedExecution {
    /// Wraps an execution in the current payload version.
    #[must_use]
    pub fn new(execution: Execution) -> Self {
        Self {
            version: PAYLOAD_VERSION,
            execution,
        }
    }
}

/// Configuration for the NATS execution queue.
#[derive(Debug, Clone)]
pub struct NatsQueueConfig {
    /// NATS server URL.
    pub url: String,
    /// Stream name override (defaults to `EXECUTIONS`).
    pub stream_name: Option<String>,
}

impl NatsQueueConfig {
    /// Creates a config for the given NATS URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            stream_name: None,
        }
    }

    fn stream(&self) -> &str {
        self.stream_name.as_deref().unwrap_or(EXECUTIONS_STREAM_NAME)
    }
}

/// JetStream-backed execution queue.
pub struct NatsExecutionQueue {
    jetstream: jetstream::Context,
    config: NatsQueueConfig,
}

impl NatsExecutionQueue {
    /// Connects to NATS and ensures the executions stream exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or stream setup fails.
    pub async fn new(config: NatsQueueConfig) -> Result<Self, QueueError> {
        let client =
            async_nats::connect(&config.url)
                .await
                .map_err(|e| QueueError::ConnectionFailed {
                    message: e.to_string(),
                })?;

        let jetstream = jetstream::new(client);
        Self::ensure_stream(&jetstream, &config).await?;

        Ok(Self { jetstream, config })
    }

    async fn ensure_stream(
        jetstream: &jetstream::Context,
        config: &NatsQueueConfig,
    ) -> Result<(), QueueError> {
        let stream_config = jetstream::stream::Config {
            name: config.stream().to_string(),
            subjects: vec![format!("{EXECUTIONS_SUBJECT_PREFIX}.>")],
            storage: jetstream::stream::StorageType::File,
            retention: jetstream::stream::RetentionPolicy::WorkQueue,
            ..Default::default()
        };

        jetstream
            .get_or_create_stream(stream_config)
            .await
            .map_err(|e| QueueError::ConnectionFailed {
                message: format!("failed to create executions stream: {e}"),
            })?;

        Ok(())
    }

    /// Returns the subject an execution is published to.
    fn subject(execution: &Execution) -> String {
        format!(
            "{EXECUTIONS_SUBJECT_PREFIX}.{}.{}",
            execution.namespace, execution.flow_id
        )
    }
}

#[async_trait]
impl ExecutionQueue for NatsExecutionQueue {
    async fn emit(&self, execution: &Execution) -> Result<(), QueueError> {
        let payload = QueuedExecution::new(execution.clone());
        let bytes = serde_json::to_vec(&payload).map_err(|e| QueueError::PublishFailed {
            message: format!("failed to serialize execution: {e}"),
        })?;

        self.jetstream
            .publish(Self::subject(execution), bytes.into())
            .await
            .map_err(|e| QueueError::PublishFailed {
                message: e.to_string(),
            })?
            .await
            .map_err(|e| QueueError::PublishFailed {
                message: e.to_string(),
            })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_includes_namespace_and_flow() {
        let execution = Execution::new("company.team", "daily-report", 1);
        assert_eq!(
            NatsExecutionQueue::subject(&execution),
            "executions.company.team.daily-report"
        );
    }

    #[test]
    fn queued_execution_serde_roundtrip() {
        let payload = QueuedExecution::new(Execution::new("ns", "flow", 3));
        assert_eq!(payload.version, PAYLOAD_VERSION);

        let json = serde_json::to_vec(&payload).expect("serialize");
        let parsed = serde_json::from_slice::<QueuedExecution>(&json).expect("deserialize");
        assert_eq!(payload, parsed);
    }
}
