//! Circuit breaker for destination protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: destination assumed down, calls fail fast without dispatch
//! - Half-Open: a single probe call is testing whether the destination recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive_failures >= failure_threshold
//! Open → Half-Open: reset_timeout elapsed since opened_at (this call becomes the probe)
//! Half-Open → Closed: probe succeeds (consecutive_failures reset to 0)
//! Half-Open → Open: probe fails in any way (opened_at restarts, counter unchanged)
//! Half-Open → Open: probe abandoned by its caller (opened_at kept)
//! ```
//!
//! # Design Decisions
//! - One breaker per destination, owned by the registry (never a process global)
//! - The guarded operation is a whole attempt sequence, so one logical call counts once
//! - Only breaker-relevant failures count; 4xx and malformed responses do not
//! - Caller-side aborts (expired deadline, unbuildable request) are not a verdict on
//!   the destination: they never count, and a probe ending that way is abandoned
//! - Failures accumulate while Closed; only a successful probe resets them
//! - At most one probe in flight; concurrent callers during Half-Open are rejected as if Open
//! - State lock is never held across an await

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::observability::metrics;
use crate::resilience::classify::{AttemptFailure, FailureOrigin, RawOutcome};

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    /// Gauge value (0=Closed, 1=Open, 2=HalfOpen).
    pub fn as_metric_value(self) -> f64 {
        match self {
            CircuitState::Closed => 0.0,
            CircuitState::Open => 1.0,
            CircuitState::HalfOpen => 2.0,
        }
    }
}

/// Immutable breaker configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerConfig {
    /// Consecutive breaker-relevant failures before opening.
    pub failure_threshold: u32,
    /// Time to stay Open before allowing a probe.
    pub reset_timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(60),
        }
    }
}

/// Point-in-time view of a breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    /// Set only while Open or Half-Open.
    pub opened_at: Option<Instant>,
}

/// Returned when the breaker refuses to start a call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("circuit for {service} is open, {}", wait_hint(.retry_after))]
pub struct CircuitOpenError {
    pub service: String,
    /// Time until a probe may be dispatched; `None` while a probe is already in flight.
    pub retry_after: Option<Duration>,
}

fn wait_hint(retry_after: &Option<Duration>) -> String {
    match retry_after {
        Some(wait) => format!("next probe in {}ms", wait.as_millis()),
        None => "a probe is already in flight".to_string(),
    }
}

impl From<CircuitOpenError> for AttemptFailure {
    fn from(err: CircuitOpenError) -> Self {
        AttemptFailure::from_outcome(RawOutcome::Rejected, err.to_string())
    }
}

/// Failures the breaker can judge.
pub trait BreakerFailure {
    /// Whether this failure counts toward opening the circuit.
    fn trips_breaker(&self) -> bool;

    /// Whether the caller gave up before the destination could be judged.
    fn is_caller_abort(&self) -> bool {
        false
    }
}

impl BreakerFailure for AttemptFailure {
    fn trips_breaker(&self) -> bool {
        AttemptFailure::trips_breaker(self)
    }

    fn is_caller_abort(&self) -> bool {
        matches!(
            self.origin,
            FailureOrigin::CallerDeadline | FailureOrigin::InvalidRequest
        )
    }
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    Normal,
    Probe,
}

/// Per-destination circuit breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(name: &str, config: BreakerConfig) -> Self {
        Self {
            name: name.to_string(),
            config,
            state: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                probe_in_flight: false,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> BreakerConfig {
        self.config
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let state = self.lock();
        BreakerSnapshot {
            state: state.state,
            consecutive_failures: state.consecutive_failures,
            opened_at: state.opened_at,
        }
    }

    /// Force the breaker back to Closed with a zero counter.
    pub fn reset(&self) {
        let mut state = self.lock();
        state.state = CircuitState::Closed;
        state.consecutive_failures = 0;
        state.opened_at = None;
        state.probe_in_flight = false;
        tracing::info!(service = %self.name, "circuit breaker manually reset");
        metrics::record_breaker_state(&self.name, CircuitState::Closed);
    }

    /// Run `operation` under breaker protection.
    ///
    /// `operation` is not invoked at all when the breaker rejects the call.
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: BreakerFailure + From<CircuitOpenError>,
    {
        let admission = self.admit()?;
        let mut probe = ProbePermit {
            breaker: self,
            armed: admission == Admission::Probe,
        };

        let result = operation().await;
        probe.armed = false;

        match (&result, admission) {
            (Ok(_), _) => self.on_success(admission),
            (Err(err), Admission::Probe) if err.is_caller_abort() => self.abandon_probe(),
            (Err(err), _) if err.trips_breaker() => self.on_failure(admission),
            // any other failed probe still re-opens, without counting
            (Err(_), Admission::Probe) => self.on_failure(admission),
            (Err(_), Admission::Normal) => {}
        }

        result
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn admit(&self) -> Result<Admission, CircuitOpenError> {
        let mut state = self.lock();

        match state.state {
            CircuitState::Closed => Ok(Admission::Normal),
            CircuitState::Open => {
                let elapsed = state
                    .opened_at
                    .map_or(self.config.reset_timeout, |opened_at| {
                        Instant::now().saturating_duration_since(opened_at)
                    });

                if elapsed >= self.config.reset_timeout {
                    state.state = CircuitState::HalfOpen;
                    state.probe_in_flight = true;
                    tracing::info!(service = %self.name, "circuit breaker half-open, dispatching probe");
                    metrics::record_breaker_state(&self.name, CircuitState::HalfOpen);
                    Ok(Admission::Probe)
                } else {
                    Err(self.reject(Some(self.config.reset_timeout - elapsed)))
                }
            }
            CircuitState::HalfOpen => {
                if state.probe_in_flight {
                    Err(self.reject(None))
                } else {
                    state.probe_in_flight = true;
                    Ok(Admission::Probe)
                }
            }
        }
    }

    fn reject(&self, retry_after: Option<Duration>) -> CircuitOpenError {
        tracing::debug!(
            service = %self.name,
            retry_after_ms = retry_after.map(|wait| wait.as_millis() as u64),
            probe_in_flight = retry_after.is_none(),
            "circuit open, rejecting call"
        );
        metrics::record_rejection(&self.name);
        CircuitOpenError {
            service: self.name.clone(),
            retry_after,
        }
    }

    fn on_success(&self, admission: Admission) {
        let mut state = self.lock();

        if admission == Admission::Probe && state.state == CircuitState::HalfOpen {
            state.state = CircuitState::Closed;
            state.consecutive_failures = 0;
            state.opened_at = None;
            state.probe_in_flight = false;
            tracing::info!(service = %self.name, "circuit breaker closed, destination recovered");
            metrics::record_breaker_state(&self.name, CircuitState::Closed);
        }
    }

    fn on_failure(&self, admission: Admission) {
        let mut state = self.lock();

        match (admission, state.state) {
            (Admission::Normal, CircuitState::Closed) => {
                state.consecutive_failures = state.consecutive_failures.saturating_add(1);
                if state.consecutive_failures >= self.config.failure_threshold {
                    state.state = CircuitState::Open;
                    state.opened_at = Some(Instant::now());
                    tracing::warn!(
                        service = %self.name,
                        failures = state.consecutive_failures,
                        reset_timeout_ms = self.config.reset_timeout.as_millis() as u64,
                        "circuit breaker opened"
                    );
                    metrics::record_breaker_state(&self.name, CircuitState::Open);
                }
            }
            (Admission::Probe, CircuitState::HalfOpen) => {
                state.state = CircuitState::Open;
                state.opened_at = Some(Instant::now());
                state.probe_in_flight = false;
                tracing::warn!(service = %self.name, "probe failed, circuit breaker re-opened");
                metrics::record_breaker_state(&self.name, CircuitState::Open);
            }
            // late result of a call admitted before the circuit opened, or after a manual reset
            _ => {}
        }
    }

    fn abandon_probe(&self) {
        let mut state = self.lock();

        if state.state == CircuitState::HalfOpen && state.probe_in_flight {
            // opened_at is kept, so the next caller may probe straight away
            state.state = CircuitState::Open;
            state.probe_in_flight = false;
            tracing::debug!(service = %self.name, "probe abandoned by caller, circuit back to open");
            metrics::record_breaker_state(&self.name, CircuitState::Open);
        }
    }
}

/// Releases the probe slot if the probe future is dropped before completing.
struct ProbePermit<'a> {
    breaker: &'a CircuitBreaker,
    armed: bool,
}

impl Drop for ProbePermit<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.breaker.abandon_probe();
        }
    }
}
