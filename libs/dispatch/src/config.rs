//! Delivery engine configuration.

use std::str::FromStr;
use std::time::Duration;

use anyhow::Result;

/// Configuration for the delivery engine.
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    /// Maximum send attempts per `(event, subscriber)` pair before
    /// dead-lettering.
    pub max_attempts: u32,

    /// Backoff before the first retry; doubles on each subsequent retry.
    pub base_backoff: Duration,

    /// Upper bound on the backoff interval.
    pub max_backoff: Duration,

    /// Per-request timeout for webhook sends.
    pub delivery_timeout: Duration,

    /// Capacity of the in-process emission queue.
    pub queue_capacity: usize,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(60),
            delivery_timeout: Duration::from_secs(30),
            queue_capacity: 1024,
        }
    }
}

impl DeliveryConfig {
    /// Loads configuration from the environment, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            max_attempts: env_or("RELAY_MAX_ATTEMPTS", defaults.max_attempts)?,
            base_backoff: Duration::from_millis(env_or(
                "RELAY_BASE_BACKOFF_MS",
                defaults.base_backoff.as_millis() as u64,
            )?),
            max_backoff: Duration::from_millis(env_or(
                "RELAY_MAX_BACKOFF_MS",
                defaults.max_backoff.as_millis() as u64,
            )?),
            delivery_timeout: Duration::from_millis(env_or(
                "RELAY_DELIVERY_TIMEOUT_MS",
                defaults.delivery_timeout.as_millis() as u64,
            )?),
            queue_capacity: env_or("RELAY_QUEUE_CAPACITY", defaults.queue_capacity)?,
        })
    }
}

fn env_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(value) => value
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid {}: {}", name, e)),
        Err(_) => Ok(default),
    }
}
