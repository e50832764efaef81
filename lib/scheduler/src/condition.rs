//! Condition evaluation: whether a trigger is eligible for its flow.

use copper_courier_flow::{Flow, TriggerDeclaration};

/// Decides whether a trigger may be evaluated for a flow at this moment.
///
/// Implementations must be pure: the decision depends only on the flow and
/// trigger passed in.
pub trait ConditionEvaluator: Send + Sync {
    /// Returns true if the trigger is eligible for this flow.
    fn is_valid(&self, trigger: &dyn TriggerDeclaration, flow: &Flow) -> bool;
}

/// Default conditions: disabled flows are never eligible.
#[derive(Debug, Clone, Default)]
pub struct DefaultConditionEvaluator;

impl ConditionEvaluator for DefaultConditionEvaluator {
    fn is_valid(&self, _trigger: &dyn TriggerDeclaration, flow: &Flow) -> bool {
        !flow.disabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use copper_courier_flow::ScheduleTrigger;

    #[test]
    fn disabled_flow_is_not_eligible() {
        let trigger = ScheduleTrigger::new("morning", "0 0 7 * * *").expect("valid cron");
        let enabled = Flow::new("ns", "flow", 1);
        let disabled = Flow::new("ns", "flow", 1).with_disabled(true);

        let evaluator = DefaultConditionEvaluator;
        assert!(evaluator.is_valid(&trigger, &enabled));
        assert!(!evaluator.is_valid(&trigger, &disabled));
    }
}
