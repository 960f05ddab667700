//! Backoff strategies for the retry loop.
//!
//! Two named strategies (`exponential`, `linear`) selectable per destination,
//! plus an escape hatch for callers that need their own curve.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Named backoff strategy, as written in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    /// `base * 2^attempt`
    #[default]
    Exponential,
    /// `base * attempt`
    Linear,
}

impl fmt::Display for BackoffStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackoffStrategy::Exponential => f.write_str("exponential"),
            BackoffStrategy::Linear => f.write_str("linear"),
        }
    }
}

/// Error returned when a strategy name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown backoff strategy '{0}' (expected 'exponential' or 'linear')")]
pub struct ParseBackoffError(pub String);

impl FromStr for BackoffStrategy {
    type Err = ParseBackoffError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exponential" => Ok(BackoffStrategy::Exponential),
            "linear" => Ok(BackoffStrategy::Linear),
            other => Err(ParseBackoffError(other.to_string())),
        }
    }
}

/// Delay function evaluated at retry index `1..=max_retries`.
#[derive(Clone)]
pub enum Backoff {
    Exponential { base: Duration, max: Duration },
    Linear { base: Duration, max: Duration },
    Custom(Arc<dyn Fn(u32) -> Duration + Send + Sync>),
}

impl Backoff {
    /// Build a named strategy. `max` caps every delay.
    pub fn from_strategy(strategy: BackoffStrategy, base: Duration, max: Duration) -> Self {
        match strategy {
            BackoffStrategy::Exponential => Backoff::Exponential { base, max },
            BackoffStrategy::Linear => Backoff::Linear { base, max },
        }
    }

    /// Wrap an arbitrary delay function.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(u32) -> Duration + Send + Sync + 'static,
    {
        Backoff::Custom(Arc::new(f))
    }

    /// Delay to wait after attempt `attempt` failed, before the next one.
    pub fn delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        match self {
            Backoff::Exponential { base, max } => {
                let factor = 2u32.saturating_pow(attempt);
                base.saturating_mul(factor).min(*max)
            }
            Backoff::Linear { base, max } => base.saturating_mul(attempt).min(*max),
            Backoff::Custom(f) => f(attempt),
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::Exponential {
            base: Duration::from_secs(1),
            max: Duration::from_secs(30),
        }
    }
}

impl fmt::Debug for Backoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backoff::Exponential { base, max } => f
                .debug_struct("Exponential")
                .field("base", base)
                .field("max", max)
                .finish(),
            Backoff::Linear { base, max } => f
                .debug_struct("Linear")
                .field("base", base)
                .field("max", max)
                .finish(),
            Backoff::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_backoff() {
        let backoff = Backoff::default();
        assert_eq!(backoff.delay(1), Duration::from_secs(2));
        assert_eq!(backoff.delay(2), Duration::from_secs(4));
        assert_eq!(backoff.delay(3), Duration::from_secs(8));
    }

    #[test]
    fn test_linear_backoff() {
        let backoff = Backoff::from_strategy(
            BackoffStrategy::Linear,
            Duration::from_millis(1000),
            Duration::from_secs(30),
        );
        assert_eq!(backoff.delay(1), Duration::from_secs(1));
        assert_eq!(backoff.delay(2), Duration::from_secs(2));
        assert_eq!(backoff.delay(3), Duration::from_secs(3));
    }

    #[test]
    fn test_backoff_is_capped_and_monotonic() {
        let backoff = Backoff::from_strategy(
            BackoffStrategy::Exponential,
            Duration::from_millis(100),
            Duration::from_secs(1),
        );
        let delays: Vec<_> = (1..=40).map(|i| backoff.delay(i)).collect();
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(delays.last().copied(), Some(Duration::from_secs(1)));
    }

    #[test]
    fn test_custom_backoff() {
        let backoff = Backoff::custom(|attempt| Duration::from_millis(u64::from(attempt) * 7));
        assert_eq!(backoff.delay(3), Duration::from_millis(21));
        assert_eq!(format!("{backoff:?}"), "Custom(..)");
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!("Linear".parse::<BackoffStrategy>(), Ok(BackoffStrategy::Linear));
        assert_eq!(" exponential ".parse::<BackoffStrategy>(), Ok(BackoffStrategy::Exponential));
        assert!("fibonacci".parse::<BackoffStrategy>().is_err());
    }
}
