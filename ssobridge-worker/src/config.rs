/// Reconciler configuration
///
/// Layered with the `config` crate: built-in defaults, then `RECONCILER_*`
/// environment variables.
///
/// | Variable | Default |
/// |---|---|
/// | `RECONCILER_POLL_INTERVAL_MS` | 1000 |
/// | `RECONCILER_BATCH_SIZE` | 50 |
/// | `RECONCILER_MAX_ATTEMPTS` | 8 |
/// | `RECONCILER_BASE_BACKOFF_MS` | 1000 |
/// | `RECONCILER_MAX_BACKOFF_MS` | 300000 |
/// | `RECONCILER_LEASE_SECS` | 60 |

use config::{Config, ConfigError, Environment};
use serde::Deserialize;
use std::time::Duration;

pub const ENV_PREFIX: &str = "RECONCILER";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReconcilerConfig {
    /// Sleep between polls when the outbox is drained
    pub poll_interval_ms: u64,

    /// Entries claimed per poll
    pub batch_size: usize,

    /// Attempts before an entry is parked
    pub max_attempts: i32,

    /// Delay after the first failure; doubles per attempt
    pub base_backoff_ms: u64,

    /// Backoff cap
    pub max_backoff_ms: u64,

    /// How long a claimed entry stays invisible to other workers
    pub lease_secs: u64,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            batch_size: 50,
            max_attempts: 8,
            base_backoff_ms: 1000,
            max_backoff_ms: 300_000,
            lease_secs: 60,
        }
    }
}

impl ReconcilerConfig {
    /// Loads configuration from `RECONCILER_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(Environment::with_prefix(ENV_PREFIX))
    }

    /// Loads configuration from defaults overlaid with `source`
    pub fn load(source: Environment) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let config: Self = Config::builder()
            .set_default("poll_interval_ms", defaults.poll_interval_ms)?
            .set_default("batch_size", defaults.batch_size as u64)?
            .set_default("max_attempts", i64::from(defaults.max_attempts))?
            .set_default("base_backoff_ms", defaults.base_backoff_ms)?
            .set_default("max_backoff_ms", defaults.max_backoff_ms)?
            .set_default("lease_secs", defaults.lease_secs)?
            .add_source(source.try_parsing(true))
            .build()?
            .try_deserialize()?;

        if config.batch_size == 0 {
            return Err(ConfigError::Message(
                "RECONCILER_BATCH_SIZE must be at least 1".to_string(),
            ));
        }
        if config.max_attempts < 1 {
            return Err(ConfigError::Message(
                "RECONCILER_MAX_ATTEMPTS must be at least 1".to_string(),
            ));
        }

        Ok(config)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn base_backoff(&self) -> Duration {
        Duration::from_millis(self.base_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    pub fn lease(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.lease_secs as i64)
    }
}
