//! Flow catalog view.
//!
//! The scheduler reads the catalog once per tick; the snapshot must be a
//! cheap O(#flows) read. Change propagation (who updates the snapshot, and
//! when) belongs to the catalog source.

use copper_courier_flow::Flow;
use std::sync::RwLock;

/// Read-side view of the flow catalog.
pub trait FlowListener: Send + Sync {
    /// Current snapshot of all flows.
    fn flows(&self) -> Vec<Flow>;
}

/// In-memory flow catalog, updated by whoever owns the flow source.
#[derive(Debug, Default)]
pub struct StaticFlowListener {
    flows: RwLock<Vec<Flow>>,
}

impl StaticFlowListener {
    /// Creates a listener over the given flows.
    #[must_use]
    pub fn new(flows: Vec<Flow>) -> Self {
        Self {
            flows: RwLock::new(flows),
        }
    }

    /// Replaces the catalog snapshot.
    pub fn set_flows(&self, flows: Vec<Flow>) {
        *self.flows.write().expect("catalog lock poisoned") = flows;
    }
}

impl FlowListener for StaticFlowListener {
    fn flows(&self) -> Vec<Flow> {
        self.flows.read().expect("catalog lock poisoned").clone()
    }
}
