//! Trigger contract: declarations, the polling interface, and trigger state.
//!
//! A flow declares an ordered list of triggers. A subset of those are
//! *polling* triggers, which the scheduler evaluates on a fixed cadence.
//! Every polling trigger carries a stable identity (`TriggerUid`) that
//! deliberately excludes the flow revision, so the durable record chain
//! survives flow edits.

use crate::context::RunContext;
use crate::error::TriggerError;
use crate::execution::Execution;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use copper_courier_core::ExecutionId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A trigger as declared on a flow.
///
/// Declarations are opaque to the scheduler apart from their id and whether
/// they poll. Non-polling kinds (webhooks, manual starts) are handled by
/// other subsystems and return `None` from [`polling`](Self::polling).
pub trait TriggerDeclaration: Send + Sync {
    /// Identifier of this trigger, unique within its flow.
    fn id(&self) -> &str;

    /// Polling view of this trigger, for declarations the scheduler
    /// evaluates. The default is a non-polling declaration.
    fn polling(self: Arc<Self>) -> Option<Arc<dyn PollingTrigger>> {
        None
    }
}

/// A trigger the scheduler polls.
///
/// Implementations decide when and whether to fire; the scheduler only
/// enforces spacing, single-flight, and the prior-execution interlock.
#[async_trait]
pub trait PollingTrigger: TriggerDeclaration {
    /// Minimum spacing between evaluation attempts. Non-negative.
    fn interval(&self) -> Duration;

    /// The next firing instant, given the last persisted record if any.
    ///
    /// Must be pure: the same record contents yield the same instant.
    fn next_date(&self, last: Option<&TriggerRecord>) -> DateTime<Utc>;

    /// Evaluates the trigger at `context.date`.
    ///
    /// Returns `Some(execution)` to fire now, `None` for "not yet". May be
    /// expensive and may fail; failures are retried on the next admission.
    ///
    /// # Errors
    ///
    /// Returns an error when the evaluation itself fails (the scheduler
    /// releases the slot and leaves the record untouched).
    async fn evaluate(
        &self,
        run_context: RunContext,
        context: &TriggerContext,
    ) -> Result<Option<Execution>, TriggerError>;
}

/// Stable identity of a trigger: `(namespace, flow_id, trigger_id)`.
///
/// The flow revision is excluded so that editing a flow does not orphan the
/// trigger's durable record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TriggerUid {
    /// Namespace of the owning flow.
    pub namespace: String,
    /// Identifier of the owning flow.
    pub flow_id: String,
    /// Identifier of the trigger within the flow.
    pub trigger_id: String,
}

impl TriggerUid {
    /// Creates a trigger identity.
    #[must_use]
    pub fn new(
        namespace: impl Into<String>,
        flow_id: impl Into<String>,
        trigger_id: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            flow_id: flow_id.into(),
            trigger_id: trigger_id.into(),
        }
    }
}

impl fmt::Display for TriggerUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.namespace, self.flow_id, self.trigger_id)
    }
}

/// The evaluation context handed to a polling trigger.
///
/// `date` is the nominal firing instant for this evaluation, truncated to
/// whole seconds by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerContext {
    /// Namespace of the owning flow.
    pub namespace: String,
    /// Identifier of the owning flow.
    pub flow_id: String,
    /// Revision of the flow this evaluation was built from.
    pub flow_revision: u32,
    /// Identifier of the trigger within the flow.
    pub trigger_id: String,
    /// Nominal date of this evaluation.
    pub date: DateTime<Utc>,
}

impl TriggerContext {
    /// Creates a trigger context.
    #[must_use]
    pub fn new(
        namespace: impl Into<String>,
        flow_id: impl Into<String>,
        flow_revision: u32,
        trigger_id: impl Into<String>,
        date: DateTime<Utc>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            flow_id: flow_id.into(),
            flow_revision,
            trigger_id: trigger_id.into(),
            date,
        }
    }

    /// The stable identity of this trigger.
    #[must_use]
    pub fn uid(&self) -> TriggerUid {
        TriggerUid::new(
            self.namespace.clone(),
            self.flow_id.clone(),
            self.trigger_id.clone(),
        )
    }

    /// Returns this context with a different nominal date.
    #[must_use]
    pub fn with_date(mut self, date: DateTime<Utc>) -> Self {
        self.date = date;
        self
    }
}

/// The durable per-trigger record: the most recent admission or fire.
///
/// At most one record exists per [`TriggerUid`]; saves replace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerRecord {
    /// Namespace of the owning flow.
    pub namespace: String,
    /// Identifier of the owning flow.
    pub flow_id: String,
    /// Revision of the flow at record time.
    pub flow_revision: u32,
    /// Identifier of the trigger within the flow.
    pub trigger_id: String,
    /// Date of the recorded firing (or synthesized baseline).
    pub date: DateTime<Utc>,
    /// Execution produced by the recorded firing, if any.
    pub execution_id: Option<ExecutionId>,
}

impl TriggerRecord {
    /// Builds the record for a fired evaluation.
    #[must_use]
    pub fn of(context: &TriggerContext, execution: &Execution) -> Self {
        Self {
            namespace: context.namespace.clone(),
            flow_id: context.flow_id.clone(),
            flow_revision: context.flow_revision,
            trigger_id: context.trigger_id.clone(),
            date: context.date,
            execution_id: Some(execution.id),
        }
    }

    /// Builds a baseline record for a trigger that has never fired.
    #[must_use]
    pub fn initial(context: &TriggerContext, date: DateTime<Utc>) -> Self {
        Self {
            namespace: context.namespace.clone(),
            flow_id: context.flow_id.clone(),
            flow_revision: context.flow_revision,
            trigger_id: context.trigger_id.clone(),
            date,
            execution_id: None,
        }
    }

    /// The stable identity of this trigger.
    #[must_use]
    pub fn uid(&self) -> TriggerUid {
        TriggerUid::new(
            self.namespace.clone(),
            self.flow_id.clone(),
            self.trigger_id.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context_at(date: DateTime<Utc>) -> TriggerContext {
        TriggerContext::new("company.team", "daily-report", 3, "every-morning", date)
    }

    #[test]
    fn uid_excludes_revision() {
        let a = context_at(Utc::now());
        let b = TriggerContext {
            flow_revision: a.flow_revision + 5,
            ..a.clone()
        };
        assert_eq!(a.uid(), b.uid());
    }

    #[test]
    fn uid_display() {
        let uid = TriggerUid::new("company.team", "daily-report", "every-morning");
        assert_eq!(uid.to_string(), "company.team.daily-report.every-morning");
    }

    #[test]
    fn record_of_fire_captures_context_date_and_execution() {
        let date = Utc::now();
        let context = context_at(date);
        let execution = Execution::new("company.team", "daily-report", 3);

        let record = TriggerRecord::of(&context, &execution);
        assert_eq!(record.date, date);
        assert_eq!(record.execution_id, Some(execution.id));
        assert_eq!(record.uid(), context.uid());
    }

    #[test]
    fn initial_record_has_no_execution() {
        let context = context_at(Utc::now());
        let baseline = Utc::now() - Duration::hours(1);

        let record = TriggerRecord::initial(&context, baseline);
        assert_eq!(record.date, baseline);
        assert!(record.execution_id.is_none());
    }

    #[test]
    fn record_serde_roundtrip() {
        let context = context_at(Utc::now());
        let execution = Execution::new("company.team", "daily-report", 3);
        let record = TriggerRecord::of(&context, &execution);

        let json = serde_json::to_string(&record).expect("serialize");
        let parsed: TriggerRecord = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(record, parsed);
    }
}
