//! Timeout enforcement.
//!
//! # Responsibilities
//! - Bound a single attempt's duration
//! - Respect the caller's overall deadline when it is earlier than the attempt timeout
//! - Cancel the in-flight transport call on expiry
//!
//! # Design Decisions
//! - Uses Tokio's `timeout_at`; on expiry the attempt future is dropped, which
//!   aborts the underlying request and releases its connection
//! - Timeout errors are distinct from other errors (`FailureKind::Timeout`)
//! - Expiry of the caller's deadline is reported as `RawOutcome::DeadlineExceeded`,
//!   never retried and never held against the destination

use std::future::Future;
use std::time::Duration;

use tokio::time::{timeout_at, Instant};

use crate::resilience::classify::{AttemptFailure, RawOutcome};

/// Bounds one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutGuard {
    duration: Duration,
}

impl TimeoutGuard {
    pub const DEFAULT_DURATION: Duration = Duration::from_secs(10);

    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Run `call`, failing with `Timeout` if it does not finish within the attempt timeout.
    pub async fn bound<F, T>(&self, call: F) -> Result<T, AttemptFailure>
    where
        F: Future<Output = Result<T, AttemptFailure>>,
    {
        self.bound_until(call, None).await
    }

    /// Like [`bound`](Self::bound), but never runs past `deadline`.
    pub async fn bound_until<F, T>(
        &self,
        call: F,
        deadline: Option<Instant>,
    ) -> Result<T, AttemptFailure>
    where
        F: Future<Output = Result<T, AttemptFailure>>,
    {
        let attempt_limit = Instant::now() + self.duration;
        let (limit, capped_by_deadline) = match deadline {
            Some(deadline) if deadline < attempt_limit => (deadline, true),
            _ => (attempt_limit, false),
        };

        match timeout_at(limit, call).await {
            Ok(result) => result,
            Err(_) if capped_by_deadline => Err(AttemptFailure::from_outcome(
                RawOutcome::DeadlineExceeded,
                "overall call deadline exceeded",
            )),
            Err(_) => Err(AttemptFailure::from_outcome(
                RawOutcome::AttemptTimedOut,
                format!("attempt exceeded {}ms", self.duration.as_millis()),
            )),
        }
    }
}

impl Default for TimeoutGuard {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DURATION)
    }
}
