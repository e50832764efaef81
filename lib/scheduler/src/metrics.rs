//! Metrics surface for the scheduler.
//!
//! Every metric is tagged with the trigger identity so operators can chart
//! one trigger's behavior. The production registry forwards to the global
//! `metrics` recorder; the in-memory registry is queryable and backs tests.

use copper_courier_flow::{TriggerContext, TriggerUid};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Timer around each trigger `evaluate` call.
pub const SCHEDULER_EVALUATE_DURATION: &str = "scheduler.evaluate.duration";

/// Gauge of in-flight evaluations, per trigger (0 or 1 by construction).
pub const SCHEDULER_EVALUATE_RUNNING_COUNT: &str = "scheduler.evaluate.running.count";

/// Counter of fires, per trigger.
pub const SCHEDULER_TRIGGER_COUNT: &str = "scheduler.trigger.count";

/// Per-trigger metric tags.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetricTags {
    /// Namespace of the owning flow.
    pub namespace: String,
    /// Identifier of the owning flow.
    pub flow_id: String,
    /// Identifier of the trigger within the flow.
    pub trigger_id: String,
}

impl From<&TriggerContext> for MetricTags {
    fn from(context: &TriggerContext) -> Self {
        Self {
            namespace: context.namespace.clone(),
            flow_id: context.flow_id.clone(),
            trigger_id: context.trigger_id.clone(),
        }
    }
}

impl From<&TriggerUid> for MetricTags {
    fn from(uid: &TriggerUid) -> Self {
        Self {
            namespace: uid.namespace.clone(),
            flow_id: uid.flow_id.clone(),
            trigger_id: uid.trigger_id.clone(),
        }
    }
}

/// Sink for scheduler metrics.
pub trait MetricRegistry: Send + Sync {
    /// Adds one to a counter.
    fn increment_counter(&self, name: &'static str, tags: &MetricTags);

    /// Applies a signed delta to a gauge.
    fn increment_gauge(&self, name: &'static str, tags: &MetricTags, delta: i64);

    /// Records one timer sample.
    fn record_timer(&self, name: &'static str, tags: &MetricTags, duration: Duration);
}

/// Registry forwarding to the global `metrics` recorder.
///
/// Whatever exporter the host process installs (Prometheus, statsd, ...)
/// receives the scheduler's series.
#[derive(Debug, Clone, Default)]
pub struct RecorderMetricRegistry;

impl MetricRegistry for RecorderMetricRegistry {
    fn increment_counter(&self, name: &'static str, tags: &MetricTags) {
        metrics::counter!(
            name,
            "namespace" => tags.namespace.clone(),
            "flow_id" => tags.flow_id.clone(),
            "trigger_id" => tags.trigger_id.clone()
        )
        .increment(1);
    }

    fn increment_gauge(&self, name: &'static str, tags: &MetricTags, delta: i64) {
        metrics::gauge!(
            name,
            "namespace" => tags.namespace.clone(),
            "flow_id" => tags.flow_id.clone(),
            "trigger_id" => tags.trigger_id.clone()
        )
        .increment(delta as f64);
    }

    fn record_timer(&self, name: &'static str, tags: &MetricTags, duration: Duration) {
        metrics::histogram!(
            name,
            "namespace" => tags.namespace.clone(),
            "flow_id" => tags.flow_id.clone(),
            "trigger_id" => tags.trigger_id.clone()
        )
        .record(duration.as_secs_f64());
    }
}

/// Queryable in-memory registry for tests and embedded use.
#[derive(Debug, Default)]
pub struct InMemoryMetricRegistry {
    inner: Mutex<MetricsInner>,
}

#[derive(Debug, Default)]
struct MetricsInner {
    counters: HashMap<(&'static str, MetricTags), u64>,
    gauges: HashMap<(&'static str, MetricTags), i64>,
    timers: HashMap<(&'static str, MetricTags), Vec<Duration>>,
}

impl InMemoryMetricRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current counter value, zero if never incremented.
    #[must_use]
    pub fn counter(&self, name: &'static str, tags: &MetricTags) -> u64 {
        self.inner
            .lock()
            .expect("metrics lock poisoned")
            .counters
            .get(&(name, tags.clone()))
            .copied()
            .unwrap_or(0)
    }

    /// Current gauge value, zero if never touched.
    #[must_use]
    pub fn gauge(&self, name: &'static str, tags: &MetricTags) -> i64 {
        self.inner
            .lock()
            .expect("metrics lock poisoned")
            .gauges
            .get(&(name, tags.clone()))
            .copied()
            .unwrap_or(0)
    }

    /// Number of timer samples recorded.
    #[must_use]
    pub fn timer_samples(&self, name: &'static str, tags: &MetricTags) -> usize {
        self.inner
            .lock()
            .expect("metrics lock poisoned")
            .timers
            .get(&(name, tags.clone()))
            .map_or(0, Vec::len)
    }
}

impl MetricRegistry for InMemoryMetricRegistry {
    fn increment_counter(&self, name: &'static str, tags: &MetricTags) {
        *self
            .inner
            .lock()
            .expect("metrics lock poisoned")
            .counters
            .entry((name, tags.clone()))
            .or_insert(0) += 1;
    }

    fn increment_gauge(&self, name: &'static str, tags: &MetricTags, delta: i64) {
        *self
            .inner
            .lock()
            .expect("metrics lock poisoned")
            .gauges
            .entry((name, tags.clone()))
            .or_insert(0) += delta;
    }

    fn record_timer(&self, name: &'static str, tags: &MetricTags, duration: Duration) {
        self.inner
            .lock()
            .expect("metrics lock poisoned")
            .timers
            .entry((name, tags.clone()))
            .or_default()
            .push(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags() -> MetricTags {
        MetricTags {
            namespace: "ns".to_string(),
            flow_id: "flow".to_string(),
            trigger_id: "t".to_string(),
        }
    }

    #[test]
    fn counter_accumulates() {
        let registry = InMemoryMetricRegistry::new();
        registry.increment_counter(SCHEDULER_TRIGGER_COUNT, &tags());
        registry.increment_counter(SCHEDULER_TRIGGER_COUNT, &tags());
        assert_eq!(registry.counter(SCHEDULER_TRIGGER_COUNT, &tags()), 2);
    }

    #[test]
    fn gauge_applies_signed_deltas() {
        let registry = InMemoryMetricRegistry::new();
        registry.increment_gauge(SCHEDULER_EVALUATE_RUNNING_COUNT, &tags(), 1);
        registry.increment_gauge(SCHEDULER_EVALUATE_RUNNING_COUNT, &tags(), -1);
        assert_eq!(registry.gauge(SCHEDULER_EVALUATE_RUNNING_COUNT, &tags()), 0);
    }

    #[test]
    fn timer_counts_samples() {
        let registry = InMemoryMetricRegistry::new();
        registry.record_timer(
            SCHEDULER_EVALUATE_DURATION,
            &tags(),
            Duration::from_millis(12),
        );
        assert_eq!(registry.timer_samples(SCHEDULER_EVALUATE_DURATION, &tags()), 1);
    }

    #[test]
    fn tags_from_uid_and_context_agree() {
        let uid = TriggerUid::new("ns", "flow", "t");
        let context = TriggerContext::new("ns", "flow", 9, "t", chrono::Utc::now());
        assert_eq!(MetricTags::from(&uid), MetricTags::from(&context));
    }
}
