//! Centralized server configuration.
//!
//! Strongly-typed configuration for the standalone scheduler, loaded via the
//! `config` crate from environment variables. Nested fields use `__` as the
//! separator, e.g. `NATS__URL` or `SCHEDULER__TICK_PERIOD_SECONDS`.

use serde::Deserialize;

/// Configuration for the standalone scheduler server.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// NATS transport configuration.
    #[serde(default)]
    pub nats: NatsConfig,

    /// Scheduler configuration.
    #[serde(default)]
    pub scheduler: SchedulerSettings,
}

/// NATS transport configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct NatsConfig {
    /// NATS server URL.
    #[serde(default = "default_nats_url")]
    pub url: String,
}

fn default_nats_url() -> String {
    "nats://localhost:4222".to_string()
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            url: default_nats_url(),
        }
    }
}

/// Scheduler-specific settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSettings {
    /// Spacing between selection ticks, in seconds.
    #[serde(default = "default_tick_period_seconds")]
    pub tick_period_seconds: u64,
}

fn default_tick_period_seconds() -> u64 {
    1
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            tick_period_seconds: default_tick_period_seconds(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the environment cannot be parsed into a config.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nats_config_has_a_local_default() {
        let config = NatsConfig::default();
        assert_eq!(config.url, "nats://localhost:4222");
    }

    #[test]
    fn scheduler_settings_default_to_one_second() {
        let settings = SchedulerSettings::default();
        assert_eq!(settings.tick_period_seconds, 1);
    }
}
