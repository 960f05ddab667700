//! Configuration schema definitions.
//!
//! This module defines the per-destination client configuration.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::resilience::backoff::{Backoff, BackoffStrategy};
use crate::resilience::circuit_breaker::BreakerConfig;
use crate::resilience::timeouts::TimeoutGuard;

/// Root configuration: one entry per logical destination.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ClientConfig {
    /// Destinations keyed by name (e.g. "student-service").
    pub destinations: BTreeMap<String, DestinationConfig>,
}

impl ClientConfig {
    pub fn destination(&self, name: &str) -> Option<&DestinationConfig> {
        self.destinations.get(name)
    }

    /// Builder-style insert, mostly for tests and embedding.
    pub fn with_destination(mut self, name: impl Into<String>, destination: DestinationConfig) -> Self {
        self.destinations.insert(name.into(), destination);
        self
    }
}

/// Resilience settings for a single destination.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct DestinationConfig {
    /// Base URL every request path is appended to (e.g., "http://students:8080/api").
    pub base_url: String,

    /// Per-attempt timeout.
    #[serde(default = "default_attempt_timeout_ms")]
    pub attempt_timeout_ms: u64,

    /// Retries after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default)]
    pub backoff_strategy: BackoffStrategy,

    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Upper bound on any single backoff delay.
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,

    /// Consecutive failed calls before the circuit opens.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Time the circuit stays open before a probe is allowed.
    #[serde(default = "default_reset_timeout_ms")]
    pub reset_timeout_ms: u64,
}

fn default_attempt_timeout_ms() -> u64 {
    10_000
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    1_000
}

fn default_backoff_max_ms() -> u64 {
    30_000
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_reset_timeout_ms() -> u64 {
    60_000
}

impl DestinationConfig {
    /// Defaults for everything but the base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            attempt_timeout_ms: default_attempt_timeout_ms(),
            max_retries: default_max_retries(),
            backoff_strategy: BackoffStrategy::default(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            failure_threshold: default_failure_threshold(),
            reset_timeout_ms: default_reset_timeout_ms(),
        }
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }

    pub fn reset_timeout(&self) -> Duration {
        Duration::from_millis(self.reset_timeout_ms)
    }

    pub fn timeout_guard(&self) -> TimeoutGuard {
        TimeoutGuard::new(self.attempt_timeout())
    }

    pub fn backoff(&self) -> Backoff {
        Backoff::from_strategy(
            self.backoff_strategy,
            Duration::from_millis(self.backoff_base_ms),
            Duration::from_millis(self.backoff_max_ms),
        )
    }

    pub fn breaker_config(&self) -> BreakerConfig {
        BreakerConfig {
            failure_threshold: self.failure_threshold,
            reset_timeout: self.reset_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_minimal_toml() {
        let config: ClientConfig = toml::from_str(
            r#"
            [destinations.student-service]
            base_url = "http://students:8080"
            "#,
        )
        .unwrap();

        let dest = config.destination("student-service").unwrap();
        assert_eq!(dest, &DestinationConfig::new("http://students:8080"));
        assert_eq!(dest.attempt_timeout(), Duration::from_secs(10));
        assert_eq!(dest.max_retries, 3);
        assert_eq!(dest.backoff_strategy, BackoffStrategy::Exponential);
        assert_eq!(dest.breaker_config(), BreakerConfig::default());
    }

    #[test]
    fn test_overrides_from_toml() {
        let config: ClientConfig = toml::from_str(
            r#"
            [destinations.courses]
            base_url = "http://courses"
            max_retries = 1
            backoff_strategy = "linear"
            backoff_base_ms = 250
            failure_threshold = 2
            reset_timeout_ms = 5000
            "#,
        )
        .unwrap();

        let dest = config.destination("courses").unwrap();
        assert_eq!(dest.max_retries, 1);
        assert_eq!(dest.backoff().delay(2), Duration::from_millis(500));
        assert_eq!(dest.breaker_config().failure_threshold, 2);
        assert_eq!(dest.reset_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_empty_config() {
        let config: ClientConfig = toml::from_str("").unwrap();
        assert!(config.destinations.is_empty());
    }
}
