//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Logical call to a destination:
//!     → circuit_breaker.rs (admit, or fail fast with CircuitOpen)
//!     → retries.rs (attempt loop, backoff.rs decides the sleep between attempts)
//!         → timeouts.rs (bound each attempt by min(attempt timeout, caller deadline))
//!         → classify.rs (turn the raw outcome into a FailureKind)
//!     → circuit_breaker.rs (record the final outcome once per logical call)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every attempt has a deadline
//! - Retries only for failures the classifier marks retryable
//! - The breaker wraps the whole retry sequence, not individual attempts
//! - Each piece is usable on its own; `client::ServiceClient` composes them

pub mod backoff;
pub mod circuit_breaker;
pub mod classify;
pub mod retries;
pub mod timeouts;

pub use backoff::{Backoff, BackoffStrategy};
pub use circuit_breaker::{BreakerConfig, BreakerSnapshot, CircuitBreaker, CircuitOpenError, CircuitState};
pub use classify::{classify, AttemptFailure, Classification, FailureKind, FailureOrigin, RawOutcome};
pub use retries::{CallAttempt, RetryExecutor};
pub use timeouts::TimeoutGuard;
