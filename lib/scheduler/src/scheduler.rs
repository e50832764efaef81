//! The polling trigger scheduler.
//!
//! A single driver ticks at a fixed rate (1 Hz by default). Each tick takes
//! one catalog snapshot, flattens it to `(flow, polling trigger)` pairs, and
//! admits the eligible ones:
//!
//! 1. the declaration polls,
//! 2. the condition evaluator accepts it for this flow,
//! 3. the per-trigger interval has elapsed since the last admission,
//! 4. no evaluation is already in flight for the trigger, and
//! 5. the previously fired execution (if any) is known and terminal.
//!
//! Admitted triggers are evaluated on the runtime's task pool. A fire is
//! committed by persisting the trigger record first and emitting the
//! execution second; a failure releases the slot and retries at the next
//! admission. The selection phase and all bookkeeping share one lock, so
//! check-then-admit is atomic against concurrent result handlers.

use crate::clock::Clock;
use crate::condition::ConditionEvaluator;
use crate::error::SchedulerError;
use crate::listener::FlowListener;
use crate::metrics::{
    MetricRegistry, MetricTags, SCHEDULER_EVALUATE_DURATION, SCHEDULER_EVALUATE_RUNNING_COUNT,
    SCHEDULER_TRIGGER_COUNT,
};
use crate::store::{ExecutionStateStore, StoreError, TriggerStateStore};
use chrono::{DateTime, SubsecRound, Utc};
use copper_courier_flow::{
    Execution, ExecutionQueue, Flow, PollingTrigger, RunContextFactory, TriggerContext,
    TriggerDeclaration, TriggerError, TriggerRecord, TriggerUid,
};
use futures::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, trace, warn};

/// Configuration for the scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Spacing between ticks of the selection driver.
    pub tick_period: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_period: Duration::from_secs(1),
        }
    }
}

impl SchedulerConfig {
    /// Sets the tick period.
    #[must_use]
    pub fn with_tick_period(mut self, tick_period: Duration) -> Self {
        self.tick_period = tick_period;
        self
    }
}

/// One admitted unit of work: a flow, its polling trigger, and the context
/// the evaluation runs under.
struct FlowWithPollingTrigger {
    flow: Flow,
    trigger: Arc<dyn PollingTrigger>,
    context: TriggerContext,
}

/// Bookkeeping shared by the selection phase and the result handlers.
#[derive(Debug, Default)]
struct SchedulerState {
    /// Wall time of the most recent admission, per trigger.
    last_evaluate: HashMap<TriggerUid, DateTime<Utc>>,
    /// Presence means an evaluation is in flight; the value is its start.
    evaluate_running: HashMap<TriggerUid, DateTime<Utc>>,
    /// In-memory mirror of the running gauge, per trigger.
    evaluate_running_count: HashMap<TriggerUid, i64>,
}

impl SchedulerState {
    /// Running gate and interval gate in one atomic step.
    ///
    /// The running check comes first so an in-flight evaluation never bumps
    /// the admission time. The interval comparison is strictly less-than:
    /// `last + interval < now`.
    fn admit(&mut self, uid: &TriggerUid, interval: chrono::Duration, now: DateTime<Utc>) -> bool {
        if self.evaluate_running.contains_key(uid) {
            return false;
        }

        match self.last_evaluate.get(uid) {
            None => {
                self.last_evaluate.insert(uid.clone(), now);
                true
            }
            Some(last) if *last + interval < now => {
                self.last_evaluate.insert(uid.clone(), now);
                true
            }
            Some(_) => false,
        }
    }
}

/// The polling trigger scheduler.
///
/// Embedded component: construct it with its collaborators, call
/// [`start`](Self::start), and [`close`](Self::close) on shutdown. In-flight
/// evaluations run to completion after close; their emissions may observe a
/// closed queue and are surfaced as failures.
pub struct Scheduler {
    config: SchedulerConfig,
    flow_listener: Arc<dyn FlowListener>,
    condition: Arc<dyn ConditionEvaluator>,
    trigger_state: Arc<dyn TriggerStateStore>,
    execution_state: Arc<dyn ExecutionStateStore>,
    run_context_factory: Arc<dyn RunContextFactory>,
    queue: Arc<dyn ExecutionQueue>,
    clock: Arc<dyn Clock>,
    metrics: Arc<dyn MetricRegistry>,
    state: Mutex<SchedulerState>,
    shutdown: watch::Sender<bool>,
}

impl Scheduler {
    /// Creates a scheduler over its collaborators.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        config: SchedulerConfig,
        flow_listener: Arc<dyn FlowListener>,
        condition: Arc<dyn ConditionEvaluator>,
        trigger_state: Arc<dyn TriggerStateStore>,
        execution_state: Arc<dyn ExecutionStateStore>,
        run_context_factory: Arc<dyn RunContextFactory>,
        queue: Arc<dyn ExecutionQueue>,
        clock: Arc<dyn Clock>,
        metrics: Arc<dyn MetricRegistry>,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            config,
            flow_listener,
            condition,
            trigger_state,
            execution_state,
            run_context_factory,
            queue,
            clock,
            metrics,
            state: Mutex::new(SchedulerState::default()),
            shutdown,
        }
    }

    /// Launches the fixed-rate driver and its watchdog.
    ///
    /// A tick that panics is logged and isolated; the driver keeps ticking.
    /// If the driver task itself dies, the watchdog logs the cause and exits
    /// the process with a non-zero status so an orchestrator restarts it.
    pub fn start(self: &Arc<Self>) {
        let scheduler = Arc::clone(self);
        let mut shutdown = self.shutdown.subscribe();

        let driver = tokio::spawn(async move {
            if *shutdown.borrow_and_update() {
                return;
            }

            let mut ticks = tokio::time::interval(scheduler.config.tick_period);
            // Overrun ticks fire immediately after; at most one is pending.
            ticks.set_missed_tick_behavior(MissedTickBehavior::Burst);

            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = ticks.tick() => {
                        if let Err(panic) = AssertUnwindSafe(scheduler.tick()).catch_unwind().await {
                            error!(cause = panic_message(panic.as_ref()), "scheduler tick panicked");
                        }
                    }
                }
            }
        });

        tokio::spawn(async move {
            match driver.await {
                Ok(()) => debug!("scheduler driver stopped"),
                Err(e) => {
                    error!(error = %e, "scheduler driver failed");
                    std::process::exit(1);
                }
            }
        });
    }

    /// Stops the driver. In-flight evaluations run to completion.
    pub fn close(&self) {
        self.shutdown.send_replace(true);
    }

    /// One selection pass: snapshot the catalog, admit eligible triggers,
    /// and dispatch their evaluations.
    async fn tick(self: &Arc<Self>) {
        let mut state = self.state.lock().await;

        let flows = self.flow_listener.flows();
        let now = self.clock.now().trunc_subsecs(0);

        let mut schedulable = Vec::new();
        for flow in &flows {
            for declaration in &flow.triggers {
                if let Some(polling) = Arc::clone(declaration).polling() {
                    schedulable.push((flow.clone(), polling));
                }
            }
        }

        trace!(
            schedulable = schedulable.len(),
            flows = flows.len(),
            "scheduler iteration"
        );

        for (flow, polling) in schedulable {
            let declaration: &dyn TriggerDeclaration = polling.as_ref();
            if !self.condition.is_valid(declaration, &flow) {
                continue;
            }

            let context = TriggerContext::new(
                flow.namespace.clone(),
                flow.id.clone(),
                flow.revision,
                polling.id().to_string(),
                now,
            );
            let uid = context.uid();

            if !state.admit(&uid, polling.interval(), now) {
                continue;
            }

            let last = match self.last_trigger(&context, polling.as_ref()).await {
                Ok(last) => last,
                Err(e) => {
                    warn!(
                        namespace = %context.namespace,
                        flow_id = %context.flow_id,
                        trigger_id = %context.trigger_id,
                        error = %e,
                        "trigger record lookup failed, skipping"
                    );
                    continue;
                }
            };

            if !self.execution_not_running(&last).await {
                continue;
            }

            // The evaluation runs under the scheduled date, not the tick date.
            let context = context.with_date(polling.next_date(Some(&last)));

            self.add_to_running(&mut state, &context);

            let scheduler = Arc::clone(self);
            let work = FlowWithPollingTrigger {
                flow,
                trigger: polling,
                context,
            };
            tokio::spawn(async move {
                scheduler.evaluate_and_handle(work).await;
            });
        }
    }

    /// The last durable record for this trigger, or a synthesized baseline
    /// when it has never fired.
    ///
    /// The baseline date is `min(next_date(∅), now)`: it gives `next_date` a
    /// well-defined starting point and guards against the trigger placing its
    /// first occurrence in the past.
    async fn last_trigger(
        &self,
        context: &TriggerContext,
        polling: &dyn PollingTrigger,
    ) -> Result<TriggerRecord, StoreError> {
        match self.trigger_state.find_last(&context.uid()).await? {
            Some(record) => Ok(record),
            None => {
                let next = polling.next_date(None);
                Ok(TriggerRecord::initial(context, next.min(self.clock.now())))
            }
        }
    }

    /// Prior-execution gate: false while the record's execution is missing
    /// from the execution store or not yet terminal.
    async fn execution_not_running(&self, last: &TriggerRecord) -> bool {
        let Some(execution_id) = last.execution_id else {
            return true;
        };

        match self.execution_state.find_by_id(execution_id).await {
            Ok(Some(execution)) if execution.state.is_terminal() => true,
            Ok(Some(execution)) => {
                debug!(
                    execution_id = %execution_id,
                    namespace = %last.namespace,
                    flow_id = %last.flow_id,
                    state = ?execution.state,
                    "execution is still running, waiting for next evaluation"
                );
                false
            }
            // The indexer hasn't seen the execution yet, or lost it.
            Ok(None) => {
                warn!(
                    execution_id = %execution_id,
                    namespace = %last.namespace,
                    flow_id = %last.flow_id,
                    "execution not found, schedule is blocked"
                );
                false
            }
            Err(e) => {
                warn!(
                    execution_id = %execution_id,
                    namespace = %last.namespace,
                    flow_id = %last.flow_id,
                    error = %e,
                    "execution lookup failed, schedule is blocked"
                );
                false
            }
        }
    }

    fn add_to_running(&self, state: &mut SchedulerState, context: &TriggerContext) {
        let uid = context.uid();
        state.evaluate_running.insert(uid.clone(), self.clock.now());
        *state.evaluate_running_count.entry(uid).or_insert(0) += 1;
        self.metrics
            .increment_gauge(SCHEDULER_EVALUATE_RUNNING_COUNT, &MetricTags::from(context), 1);
    }

    async fn remove_from_running(&self, context: &TriggerContext) -> Result<(), SchedulerError> {
        let uid = context.uid();
        let mut state = self.state.lock().await;

        if state.evaluate_running.remove(&uid).is_none() {
            return Err(SchedulerError::SlotNotHeld { uid });
        }
        *state.evaluate_running_count.entry(uid).or_insert(0) -= 1;

        self.metrics.increment_gauge(
            SCHEDULER_EVALUATE_RUNNING_COUNT,
            &MetricTags::from(context),
            -1,
        );
        Ok(())
    }

    /// Runs one evaluation and applies its result.
    async fn evaluate_and_handle(self: Arc<Self>, work: FlowWithPollingTrigger) {
        match self.evaluate_polling_trigger(&work).await {
            Ok(Some(execution)) => {
                if let Err(e) = self.handle_fire(&work.context, execution).await {
                    match e {
                        SchedulerError::SlotNotHeld { .. } => {
                            error!(error = %e, "scheduler state violation");
                        }
                        _ => warn!(
                            namespace = %work.context.namespace,
                            flow_id = %work.context.flow_id,
                            trigger_id = %work.context.trigger_id,
                            date = %work.context.date,
                            error = %e,
                            "trigger fire could not be committed"
                        ),
                    }
                }
            }
            Ok(None) => {
                if let Err(e) = self.remove_from_running(&work.context).await {
                    error!(error = %e, "scheduler state violation");
                    return;
                }
                debug!(
                    namespace = %work.context.namespace,
                    flow_id = %work.context.flow_id,
                    date = %work.context.date,
                    "empty evaluation, waiting"
                );
            }
            Err(e) => {
                if let Err(state_err) = self.remove_from_running(&work.context).await {
                    error!(error = %state_err, "scheduler state violation");
                }
                warn!(
                    namespace = %work.context.namespace,
                    flow_id = %work.context.flow_id,
                    trigger_id = %work.context.trigger_id,
                    date = %work.context.date,
                    error = %e,
                    "evaluate failed"
                );
            }
        }
    }

    async fn evaluate_polling_trigger(
        &self,
        work: &FlowWithPollingTrigger,
    ) -> Result<Option<Execution>, TriggerError> {
        // A fresh run context per evaluation: triggers consume flow-derived
        // state, so it is never cached.
        let declaration: &dyn TriggerDeclaration = work.trigger.as_ref();
        let run_context = self.run_context_factory.of(&work.flow, declaration);

        let started = Instant::now();
        let result = work.trigger.evaluate(run_context, &work.context).await;
        self.metrics.record_timer(
            SCHEDULER_EVALUATE_DURATION,
            &MetricTags::from(&work.context),
            started.elapsed(),
        );
        result
    }

    /// Commits a fire: release the slot, count and log it, persist the
    /// record, then emit the execution.
    ///
    /// Persist-before-emit: a crash between the two leaves a record pointing
    /// at an execution the store never receives, which the prior-execution
    /// gate surfaces operationally. The reverse order would silently
    /// re-emit the same firing after a restart.
    async fn handle_fire(
        &self,
        context: &TriggerContext,
        execution: Execution,
    ) -> Result<(), SchedulerError> {
        self.remove_from_running(context).await?;

        self.metrics
            .increment_counter(SCHEDULER_TRIGGER_COUNT, &MetricTags::from(context));
        info!(
            execution_id = %execution.id,
            namespace = %execution.namespace,
            flow_id = %execution.flow_id,
            date = %context.date,
            trigger_id = %context.trigger_id,
            "schedule execution"
        );

        self.trigger_state
            .save(TriggerRecord::of(context, &execution))
            .await?;
        self.queue.emit(&execution).await?;
        Ok(())
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
