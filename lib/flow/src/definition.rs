//! Flow definition types.
//!
//! A flow is a namespaced, versioned automation. The scheduler treats flows
//! as opaque apart from their identity, their disabled flag, and the ordered
//! triggers they declare.

use crate::trigger::TriggerDeclaration;
use std::fmt;
use std::sync::Arc;

/// A flow definition as seen by the scheduler.
#[derive(Clone)]
pub struct Flow {
    /// Namespace this flow lives in.
    pub namespace: String,
    /// Identifier of this flow, unique within its namespace.
    pub id: String,
    /// Revision, bumped on every edit.
    pub revision: u32,
    /// Whether this flow is disabled (its triggers are never eligible).
    pub disabled: bool,
    /// Ordered triggers declared by this flow. May be empty.
    pub triggers: Vec<Arc<dyn TriggerDeclaration>>,
}

impl Flow {
    /// Creates a flow with no triggers.
    #[must_use]
    pub fn new(namespace: impl Into<String>, id: impl Into<String>, revision: u32) -> Self {
        Self {
            namespace: namespace.into(),
            id: id.into(),
            revision,
            disabled: false,
            triggers: Vec::new(),
        }
    }

    /// Adds a trigger declaration.
    #[must_use]
    pub fn with_trigger(mut self, trigger: Arc<dyn TriggerDeclaration>) -> Self {
        self.triggers.push(trigger);
        self
    }

    /// Sets the disabled flag.
    #[must_use]
    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }
}

impl fmt::Debug for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Flow")
            .field("namespace", &self.namespace)
            .field("id", &self.id)
            .field("revision", &self.revision)
            .field("disabled", &self.disabled)
            .field(
                "triggers",
                &self.triggers.iter().map(|t| t.id()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
