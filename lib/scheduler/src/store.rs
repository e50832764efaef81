//! State store contracts: trigger records and execution lookup.
//!
//! The scheduler never issues two concurrent writes for the same trigger
//! identity (the running gate serializes them), so stores only need to
//! tolerate concurrent upserts for distinct keys.

use async_trait::async_trait;
use copper_courier_core::ExecutionId;
use copper_courier_flow::{Execution, TriggerRecord, TriggerUid};
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

/// Errors from state store operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Storage operation failed.
    StorageFailed { message: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StorageFailed { message } => write!(f, "state store failed: {message}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Durable store of per-trigger records.
#[async_trait]
pub trait TriggerStateStore: Send + Sync {
    /// The last record for a trigger identity, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    async fn find_last(&self, uid: &TriggerUid) -> Result<Option<TriggerRecord>, StoreError>;

    /// Upserts the record for its trigger identity.
    ///
    /// The save must be durable before it returns: the caller considers the
    /// fire committed once this succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails; the caller then does not emit.
    async fn save(&self, record: TriggerRecord) -> Result<(), StoreError>;
}

/// Read-side view of the execution store.
#[async_trait]
pub trait ExecutionStateStore: Send + Sync {
    /// Looks up an execution by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    async fn find_by_id(&self, id: ExecutionId) -> Result<Option<Execution>, StoreError>;
}

/// In-memory trigger record store for tests and embedded use.
#[derive(Debug, Default)]
pub struct InMemoryTriggerStateStore {
    records: Mutex<HashMap<TriggerUid, TriggerRecord>>,
}

impl InMemoryTriggerStateStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TriggerStateStore for InMemoryTriggerStateStore {
    async fn find_last(&self, uid: &TriggerUid) -> Result<Option<TriggerRecord>, StoreError> {
        Ok(self
            .records
            .lock()
            .expect("record lock poisoned")
            .get(uid)
            .cloned())
    }

    async fn save(&self, record: TriggerRecord) -> Result<(), StoreError> {
        self.records
            .lock()
            .expect("record lock poisoned")
            .insert(record.uid(), record);
        Ok(())
    }
}

/// In-memory execution store for tests and embedded use.
#[derive(Debug, Default)]
pub struct InMemoryExecutionStateStore {
    executions: Mutex<HashMap<ExecutionId, Execution>>,
}

impl InMemoryExecutionStateStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces an execution.
    pub fn put(&self, execution: Execution) {
        self.executions
            .lock()
            .expect("execution lock poisoned")
            .insert(execution.id, execution);
    }

    /// Removes an execution, returning it if present.
    pub fn remove(&self, id: ExecutionId) -> Option<Execution> {
        self.executions
            .lock()
            .expect("execution lock poisoned")
            .remove(&id)
    }
}

#[async_trait]
impl ExecutionStateStore for InMemoryExecutionStateStore {
    async fn find_by_id(&self, id: ExecutionId) -> Result<Option<Execution>, StoreError> {
        Ok(self
            .executions
            .lock()
            .expect("execution lock poisoned")
            .get(&id)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use copper_courier_flow::{ExecutionState, TriggerContext};

    fn record(revision: u32, execution_id: Option<ExecutionId>) -> TriggerRecord {
        TriggerRecord {
            namespace: "ns".to_string(),
            flow_id: "flow".to_string(),
            flow_revision: revision,
            trigger_id: "t".to_string(),
            date: Utc::now(),
            execution_id,
        }
    }

    #[tokio::test]
    async fn save_then_find_last_roundtrips() {
        let store = InMemoryTriggerStateStore::new();
        let saved = record(1, Some(ExecutionId::new()));

        store.save(saved.clone()).await.expect("save");
        let found = store.find_last(&saved.uid()).await.expect("find");
        assert_eq!(found, Some(saved));
    }

    #[tokio::test]
    async fn save_replaces_by_identity_across_revisions() {
        let store = InMemoryTriggerStateStore::new();
        let first = record(1, None);
        let second = record(2, Some(ExecutionId::new()));
        assert_eq!(first.uid(), second.uid());

        store.save(first).await.expect("save first");
        store.save(second.clone()).await.expect("save second");

        let found = store.find_last(&second.uid()).await.expect("find");
        assert_eq!(found, Some(second));
    }

    #[tokio::test]
    async fn find_last_on_unknown_identity_is_none() {
        let store = InMemoryTriggerStateStore::new();
        let context = TriggerContext::new("ns", "flow", 1, "t", Utc::now());
        let found = store.find_last(&context.uid()).await.expect("find");
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn execution_store_lookup() {
        let store = InMemoryExecutionStateStore::new();
        let execution = Execution::new("ns", "flow", 1).with_state(ExecutionState::Running);
        let id = execution.id;
        store.put(execution.clone());

        let found = store.find_by_id(id).await.expect("find");
        assert_eq!(found, Some(execution));

        assert!(store.remove(id).is_some());
        let gone = store.find_by_id(id).await.expect("find");
        assert!(gone.is_none());
    }
}
