//! Standalone scheduler server.
//!
//! Wires the polling trigger scheduler to a NATS-backed execution queue and
//! runs it until interrupted. Flow catalog and state store integrations are
//! deployment-specific: this binary starts from an empty in-memory catalog
//! that the embedding process (or an operator console) populates through
//! [`StaticFlowListener::set_flows`].

mod config;

use crate::config::ServerConfig;
use copper_courier_flow::{DefaultRunContextFactory, NatsExecutionQueue, NatsQueueConfig};
use copper_courier_scheduler::{
    DefaultConditionEvaluator, InMemoryExecutionStateStore, InMemoryTriggerStateStore,
    RecorderMetricRegistry, Scheduler, SchedulerConfig, StaticFlowListener, SystemClock,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = ServerConfig::from_env().expect("failed to load configuration");
    tracing::info!("Loaded configuration");

    // Connect the outbound execution queue
    tracing::info!(url = %config.nats.url, "Connecting to NATS...");
    let queue = NatsExecutionQueue::new(NatsQueueConfig::new(config.nats.url.clone()))
        .await
        .expect("failed to connect to NATS");

    let listener = Arc::new(StaticFlowListener::default());

    let scheduler = Arc::new(Scheduler::new(
        SchedulerConfig::default()
            .with_tick_period(Duration::from_secs(config.scheduler.tick_period_seconds)),
        listener,
        Arc::new(DefaultConditionEvaluator),
        Arc::new(InMemoryTriggerStateStore::new()),
        Arc::new(InMemoryExecutionStateStore::new()),
        Arc::new(DefaultRunContextFactory),
        Arc::new(queue),
        Arc::new(SystemClock),
        Arc::new(RecorderMetricRegistry),
    ));

    scheduler.start();
    tracing::info!(
        tick_period_seconds = config.scheduler.tick_period_seconds,
        "Scheduler started"
    );

    tokio::signal::ctrl_c()
        .await
        .expect("failed to listen for shutdown signal");

    tracing::info!("Shutting down scheduler");
    scheduler.close();
}
