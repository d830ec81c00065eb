//! Typed configuration from environment variables.
//!
//! Loads once at startup, fails fast on malformed values. Every knob has a
//! default so the relay runs unconfigured; set `SLUICE_*` vars to override.
//! In local dev, call `dotenvy::dotenv().ok()` before loading.

use std::time::Duration;

use crate::error::{Error, Result};
use crate::retry::RetryPolicy;

#[derive(Debug, Clone)]
pub struct Config {
    /// Admission queue capacity. Must be non-zero.
    pub queue_capacity: usize,
    /// Retries after the first attempt (so `max_retries + 1` total attempts).
    pub max_retries: u32,
    /// Base backoff delay before the first retry.
    pub initial_delay_ms: u64,
    /// Cap on the exponential backoff delay.
    pub max_delay_ms: u64,
    /// Hard deadline for a single downstream attempt.
    pub per_attempt_timeout_ms: u64,
    /// How long a dedup record lives, measured from first sight.
    pub dedup_ttl_secs: u64,
    /// Interval of the periodic dedup sweep.
    pub sweep_interval_secs: u64,
    /// Optional OTLP endpoint (e.g. "http://localhost:4317").
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            queue_capacity: 64,
            max_retries: 3,
            initial_delay_ms: 100,
            max_delay_ms: 10_000,
            per_attempt_timeout_ms: 5_000,
            dedup_ttl_secs: 600,
            sweep_interval_secs: 60,
            otel_endpoint: None,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        let defaults = Config::default();
        let config = Self {
            queue_capacity: parsed_var("SLUICE_QUEUE_CAPACITY", defaults.queue_capacity)?,
            max_retries: parsed_var("SLUICE_MAX_RETRIES", defaults.max_retries)?,
            initial_delay_ms: parsed_var("SLUICE_INITIAL_DELAY_MS", defaults.initial_delay_ms)?,
            max_delay_ms: parsed_var("SLUICE_MAX_DELAY_MS", defaults.max_delay_ms)?,
            per_attempt_timeout_ms: parsed_var(
                "SLUICE_PER_ATTEMPT_TIMEOUT_MS",
                defaults.per_attempt_timeout_ms,
            )?,
            dedup_ttl_secs: parsed_var("SLUICE_DEDUP_TTL_SECS", defaults.dedup_ttl_secs)?,
            sweep_interval_secs: parsed_var(
                "SLUICE_SWEEP_INTERVAL_SECS",
                defaults.sweep_interval_secs,
            )?,
            otel_endpoint: std::env::var("OTEL_ENDPOINT").ok(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the relay cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(Error::Config(
                "queue capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// The retry policy this configuration describes.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            per_attempt_timeout: Duration::from_millis(self.per_attempt_timeout_ms),
        }
    }

    pub fn dedup_ttl(&self) -> Duration {
        Duration::from_secs(self.dedup_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

fn parsed_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| Error::Config(format!("{name} has invalid value: {raw}"))),
        Err(_) => Ok(default),
    }
}
