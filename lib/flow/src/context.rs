//! Run context: the runtime view handed to a trigger evaluation.
//!
//! A run context is produced fresh for every evaluation because triggers may
//! consume flow-derived state; it is never cached.

use crate::definition::Flow;
use crate::trigger::TriggerDeclaration;
use serde_json::json;

/// Runtime view for a single trigger evaluation.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Namespace of the flow under evaluation.
    pub namespace: String,
    /// Identifier of the flow under evaluation.
    pub flow_id: String,
    /// Revision of the flow under evaluation.
    pub flow_revision: u32,
    /// Identifier of the trigger under evaluation.
    pub trigger_id: String,
    /// Flow-derived variables exposed to trigger code.
    pub variables: serde_json::Value,
}

/// Produces a [`RunContext`] for a `(flow, trigger)` pair.
pub trait RunContextFactory: Send + Sync {
    /// Builds the run context for one evaluation.
    fn of(&self, flow: &Flow, trigger: &dyn TriggerDeclaration) -> RunContext;
}

/// Default factory: snapshots the flow identity into the variables.
#[derive(Debug, Clone, Default)]
pub struct DefaultRunContextFactory;

impl RunContextFactory for DefaultRunContextFactory {
    fn of(&self, flow: &Flow, trigger: &dyn TriggerDeclaration) -> RunContext {
        RunContext {
            namespace: flow.namespace.clone(),
            flow_id: flow.id.clone(),
            flow_revision: flow.revision,
            trigger_id: trigger.id().to_string(),
            variables: json!({
                "flow": {
                    "namespace": flow.namespace,
                    "id": flow.id,
                    "revision": flow.revision,
                },
                "trigger": {
                    "id": trigger.id(),
                },
            }),
        }
    }
}
