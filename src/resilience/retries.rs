//! Retry logic.
//!
//! # Responsibilities
//! - Drive attempts `1..=max_retries + 1` of one logical call
//! - Bound each attempt through `TimeoutGuard`
//! - Sleep the configured backoff between attempts
//! - Stop early on non-retryable failures and when the caller's deadline cannot be met
//!
//! # Design Decisions
//! - Bounded iterative loop, never recursion
//! - Backoff sleep suspends only this call's task
//! - Attempts run strictly in index order; backoff index is the number of the failed attempt

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::observability::metrics;
use crate::resilience::backoff::Backoff;
use crate::resilience::classify::{AttemptFailure, RawOutcome};
use crate::resilience::timeouts::TimeoutGuard;

/// One iteration of the retry loop, handed to the attempt function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallAttempt {
    /// 1-based attempt index.
    pub index: u32,
    /// When the attempt was started.
    pub started_at: Instant,
    /// Overall deadline of the logical call, if the caller set one.
    pub deadline: Option<Instant>,
}

/// Runs attempts of one logical call until success, a terminal failure, or exhaustion.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    label: Arc<str>,
    max_retries: u32,
    backoff: Backoff,
    timeout: TimeoutGuard,
}

impl RetryExecutor {
    pub const DEFAULT_MAX_RETRIES: u32 = 3;

    /// `label` names the destination in logs and metrics.
    pub fn new(label: &str, max_retries: u32, backoff: Backoff, timeout: TimeoutGuard) -> Self {
        Self {
            label: Arc::from(label),
            max_retries,
            backoff,
            timeout,
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    pub fn timeout(&self) -> TimeoutGuard {
        self.timeout
    }

    /// Run `attempt` up to `max_retries + 1` times.
    ///
    /// Returns the first success, the first non-retryable failure, or the last
    /// failure once retries are exhausted or the next backoff would overrun `deadline`.
    pub async fn run<F, Fut, T>(
        &self,
        mut attempt: F,
        deadline: Option<Instant>,
    ) -> Result<T, AttemptFailure>
    where
        F: FnMut(CallAttempt) -> Fut,
        Fut: Future<Output = Result<T, AttemptFailure>>,
    {
        let total_attempts = self.max_retries.saturating_add(1);
        let mut index = 1;

        loop {
            let started_at = Instant::now();
            if deadline.is_some_and(|deadline| started_at >= deadline) {
                return Err(AttemptFailure::from_outcome(
                    RawOutcome::DeadlineExceeded,
                    "overall call deadline exceeded before dispatch",
                ));
            }

            let call = CallAttempt {
                index,
                started_at,
                deadline,
            };

            let failure = match self.timeout.bound_until(attempt(call), deadline).await {
                Ok(value) => {
                    if index > 1 {
                        tracing::info!(
                            service = %self.label,
                            attempt = index,
                            "call recovered after retry"
                        );
                    }
                    return Ok(value);
                }
                Err(failure) => failure,
            };

            if !failure.retryable {
                tracing::debug!(
                    service = %self.label,
                    attempt = index,
                    kind = %failure.kind,
                    "non-retryable failure"
                );
                return Err(failure);
            }

            if index >= total_attempts {
                tracing::warn!(
                    service = %self.label,
                    attempts = index,
                    kind = %failure.kind,
                    "retries exhausted"
                );
                return Err(failure);
            }

            let delay = self.backoff.delay(index);
            if let Some(deadline) = deadline {
                if Instant::now() + delay >= deadline {
                    tracing::warn!(
                        service = %self.label,
                        attempt = index,
                        delay_ms = delay.as_millis() as u64,
                        "next backoff would overrun call deadline, giving up"
                    );
                    return Err(failure);
                }
            }

            tracing::warn!(
                service = %self.label,
                attempt = index,
                max_attempts = total_attempts,
                delay_ms = delay.as_millis() as u64,
                kind = %failure.kind,
                error = %failure.detail,
                "attempt failed, retrying"
            );
            metrics::record_retry(&self.label, failure.kind);

            if delay > Duration::ZERO {
                tokio::time::sleep(delay).await;
            }
            index += 1;
        }
    }
}
