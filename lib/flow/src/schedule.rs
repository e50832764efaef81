//! Cron-scheduled polling trigger.
//!
//! `ScheduleTrigger` is the built-in time-based trigger: it fires once per
//! cron occurrence, walking the occurrence chain from the last durable
//! record so missed occurrences are not silently backfilled.

use crate::context::RunContext;
use crate::error::{ScheduleError, TriggerError};
use crate::execution::Execution;
use crate::trigger::{PollingTrigger, TriggerContext, TriggerDeclaration, TriggerRecord};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use cron::Schedule;
use std::str::FromStr;
use std::sync::Arc;

/// A polling trigger driven by a cron expression (seconds resolution).
#[derive(Debug, Clone)]
pub struct ScheduleTrigger {
    id: String,
    expression: String,
    schedule: Schedule,
    interval: Duration,
}

impl ScheduleTrigger {
    /// Creates a schedule trigger from a cron expression.
    ///
    /// The expression is parsed eagerly so invalid schedules are rejected at
    /// flow-save time rather than in the scheduler loop.
    ///
    /// # Errors
    ///
    /// Returns an error if the expression does not parse.
    pub fn new(id: impl Into<String>, expression: impl Into<String>) -> Result<Self, ScheduleError> {
        let expression = expression.into();
        let schedule =
            Schedule::from_str(&expression).map_err(|e| ScheduleError::InvalidCronExpression {
                expression: expression.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            id: id.into(),
            expression,
            schedule,
            interval: Duration::seconds(1),
        })
    }

    /// Sets the minimum evaluation spacing.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// The cron expression backing this trigger.
    #[must_use]
    pub fn expression(&self) -> &str {
        &self.expression
    }
}

impl TriggerDeclaration for ScheduleTrigger {
    fn id(&self) -> &str {
        &self.id
    }

    fn polling(self: Arc<Self>) -> Option<Arc<dyn PollingTrigger>> {
        Some(self)
    }
}

#[async_trait]
impl PollingTrigger for ScheduleTrigger {
    fn interval(&self) -> Duration {
        self.interval
    }

    fn next_date(&self, last: Option<&TriggerRecord>) -> DateTime<Utc> {
        let after = last.map_or_else(Utc::now, |record| record.date);
        self.schedule.after(&after).next().unwrap_or(after)
    }

    async fn evaluate(
        &self,
        _run_context: RunContext,
        context: &TriggerContext,
    ) -> Result<Option<Execution>, TriggerError> {
        // The scheduler hands us a context dated at the next cron occurrence;
        // fire once that occurrence has arrived.
        if context.date <= Utc::now() {
            Ok(Some(Execution::new(
                context.namespace.clone(),
                context.flow_id.clone(),
                context.flow_revision,
            )))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::DefaultRunContextFactory;
    use crate::context::RunContextFactory;
    use crate::definition::Flow;
    use chrono::TimeZone;

    fn hourly() -> ScheduleTrigger {
        ScheduleTrigger::new("hourly", "0 0 * * * *").expect("valid cron")
    }

    #[test]
    fn rejects_invalid_expression() {
        let result = ScheduleTrigger::new("bad", "whenever");
        assert!(matches!(
            result,
            Err(ScheduleError::InvalidCronExpression { .. })
        ));
    }

    #[test]
    fn next_date_follows_last_record() {
        let trigger = hourly();
        let last_fire = Utc.with_ymd_and_hms(2024, 5, 14, 9, 0, 0).unwrap();
        let context = TriggerContext::new("ns", "flow", 1, "hourly", last_fire);
        let execution = Execution::new("ns", "flow", 1);
        let record = TriggerRecord::of(&context, &execution);

        let next = trigger.next_date(Some(&record));
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 5, 14, 10, 0, 0).unwrap());
    }

    #[test]
    fn next_date_is_deterministic_for_same_record() {
        let trigger = hourly();
        let date = Utc.with_ymd_and_hms(2024, 5, 14, 9, 30, 0).unwrap();
        let context = TriggerContext::new("ns", "flow", 1, "hourly", date);
        let record = TriggerRecord::initial(&context, date);

        assert_eq!(
            trigger.next_date(Some(&record)),
            trigger.next_date(Some(&record))
        );
    }

    #[test]
    fn next_date_without_record_is_in_the_future() {
        let trigger = hourly();
        assert!(trigger.next_date(None) > Utc::now());
    }

    #[tokio::test]
    async fn evaluate_fires_once_the_occurrence_arrived() {
        let trigger = hourly();
        let flow = Flow::new("ns", "flow", 1);
        let past = Utc::now() - Duration::seconds(5);
        let context = TriggerContext::new("ns", "flow", 1, "hourly", past);
        let run_context = DefaultRunContextFactory.of(&flow, &trigger);

        let fired = trigger
            .evaluate(run_context, &context)
            .await
            .expect("evaluate");
        let execution = fired.expect("should fire for an arrived occurrence");
        assert_eq!(execution.namespace, "ns");
        assert_eq!(execution.flow_id, "flow");
    }

    #[tokio::test]
    async fn evaluate_waits_for_a_future_occurrence() {
        let trigger = hourly();
        let flow = Flow::new("ns", "flow", 1);
        let future = Utc::now() + Duration::hours(1);
        let context = TriggerContext::new("ns", "flow", 1, "hourly", future);
        let run_context = DefaultRunContextFactory.of(&flow, &trigger);

        let fired = trigger
            .evaluate(run_context, &context)
            .await
            .expect("evaluate");
        assert!(fired.is_none());
    }
}
