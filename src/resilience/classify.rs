//! Failure classification.
//!
//! # Responsibilities
//! - Map a raw attempt outcome (status code, transport failure) to a `FailureKind`
//! - Decide whether the failure is worth another attempt
//! - Decide whether the failure counts against the destination's circuit breaker
//!
//! # Design Decisions
//! - Pure function, no I/O and no state
//! - The taxonomy is closed: every raw outcome maps to exactly one kind
//! - 4xx (except 429) are NOT retried and do NOT trip the breaker (caller error, not destination failure)
//! - Failures that never reached the destination (expired caller deadline, unbuildable
//!   request) keep their kind but carry a non-destination `FailureOrigin`

use std::fmt;

use serde::Serialize;

use crate::error::UpstreamError;

/// Closed taxonomy of failures a logical call can end with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FailureKind {
    /// Connection refused, unreachable host, or connection dropped mid-exchange.
    NetworkUnavailable,
    /// Attempt exceeded its timeout or the caller's overall deadline.
    Timeout,
    /// HTTP 429, 503 or 504.
    UpstreamOverloaded,
    /// Any other HTTP 5xx.
    UpstreamServerError,
    /// HTTP 4xx other than 429.
    UpstreamClientError,
    /// Breaker rejected the call before dispatch.
    CircuitOpen,
    /// Response could not be decoded.
    MalformedResponse,
}

impl FailureKind {
    /// Taxonomy key carried by `ServiceError::code`.
    pub fn code(self) -> &'static str {
        match self {
            FailureKind::NetworkUnavailable => "SVC_UNAVAILABLE",
            FailureKind::Timeout => "SVC_TIMEOUT",
            FailureKind::UpstreamOverloaded => "SVC_OVERLOADED",
            FailureKind::UpstreamServerError => "SVC_UPSTREAM_ERROR",
            FailureKind::UpstreamClientError => "SVC_CLIENT_ERROR",
            FailureKind::CircuitOpen => "SVC_CIRCUIT_OPEN",
            FailureKind::MalformedResponse => "SVC_MALFORMED_RESPONSE",
        }
    }

    /// Short label for logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::NetworkUnavailable => "network_unavailable",
            FailureKind::Timeout => "timeout",
            FailureKind::UpstreamOverloaded => "upstream_overloaded",
            FailureKind::UpstreamServerError => "upstream_server_error",
            FailureKind::UpstreamClientError => "upstream_client_error",
            FailureKind::CircuitOpen => "circuit_open",
            FailureKind::MalformedResponse => "malformed_response",
        }
    }

    /// Whether another attempt may succeed.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            FailureKind::NetworkUnavailable
                | FailureKind::Timeout
                | FailureKind::UpstreamOverloaded
                | FailureKind::UpstreamServerError
        )
    }

    /// Whether the failure says something about the destination's health.
    pub fn trips_breaker(self) -> bool {
        matches!(
            self,
            FailureKind::NetworkUnavailable
                | FailureKind::Timeout
                | FailureKind::UpstreamOverloaded
                | FailureKind::UpstreamServerError
        )
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an attempt actually observed, before interpretation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawOutcome {
    /// No usable connection (refused, unreachable, reset).
    ConnectionFailed,
    /// TimeoutGuard (or the transport's own timer) expired.
    AttemptTimedOut,
    /// Destination answered with a non-success status.
    Status(u16),
    /// Breaker refused to start the attempt sequence.
    Rejected,
    /// Destination answered but the body or framing was unusable.
    Undecodable,
    /// The caller's overall deadline ran out, before or during an attempt.
    DeadlineExceeded,
    /// The request could not be built locally and was never sent.
    Unbuildable,
}

impl RawOutcome {
    /// Where a failure with this outcome came from.
    pub fn origin(self) -> FailureOrigin {
        match self {
            RawOutcome::ConnectionFailed
            | RawOutcome::AttemptTimedOut
            | RawOutcome::Status(_)
            | RawOutcome::Undecodable => FailureOrigin::Destination,
            RawOutcome::Rejected => FailureOrigin::Breaker,
            RawOutcome::DeadlineExceeded => FailureOrigin::CallerDeadline,
            RawOutcome::Unbuildable => FailureOrigin::InvalidRequest,
        }
    }
}

/// Who is responsible for a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureOrigin {
    /// The destination failed, answered badly, or could not be reached.
    Destination,
    /// The local circuit breaker refused the call.
    Breaker,
    /// The caller's own deadline cut the call short.
    CallerDeadline,
    /// The caller handed over a request that could not be sent.
    InvalidRequest,
}

/// Verdict for one raw outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub kind: FailureKind,
    pub retryable: bool,
}

/// Classify a raw outcome.
///
/// `Status` is expected to carry a non-success code; anything outside 4xx/5xx
/// (an unfollowed redirect, say) is an unexpected answer and is treated as malformed.
pub fn classify(outcome: &RawOutcome) -> Classification {
    let kind = match *outcome {
        RawOutcome::ConnectionFailed => FailureKind::NetworkUnavailable,
        RawOutcome::AttemptTimedOut => FailureKind::Timeout,
        RawOutcome::Status(429 | 503 | 504) => FailureKind::UpstreamOverloaded,
        RawOutcome::Status(500..=599) => FailureKind::UpstreamServerError,
        RawOutcome::Status(400..=499) => FailureKind::UpstreamClientError,
        RawOutcome::Status(_) => FailureKind::MalformedResponse,
        RawOutcome::Rejected => FailureKind::CircuitOpen,
        RawOutcome::Undecodable => FailureKind::MalformedResponse,
        RawOutcome::DeadlineExceeded => FailureKind::Timeout,
        RawOutcome::Unbuildable => FailureKind::UpstreamClientError,
    };

    Classification {
        kind,
        retryable: kind.is_retryable() && outcome.origin() == FailureOrigin::Destination,
    }
}

/// Failure of one attempt (or of a whole attempt sequence), already classified.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {detail}")]
pub struct AttemptFailure {
    /// Classified kind.
    pub kind: FailureKind,
    /// Whether the retry loop may try again.
    pub retryable: bool,
    /// Status of the upstream response, if one was received.
    pub status: Option<u16>,
    /// Human-readable diagnostic.
    pub detail: String,
    /// Error body returned by the destination, if it sent a parsable one.
    pub upstream: Option<UpstreamError>,
    /// Who caused the failure.
    pub origin: FailureOrigin,
}

impl AttemptFailure {
    /// Classify `outcome` and attach a diagnostic.
    pub fn from_outcome(outcome: RawOutcome, detail: impl Into<String>) -> Self {
        let Classification { kind, retryable } = classify(&outcome);
        let status = match outcome {
            RawOutcome::Status(code) => Some(code),
            _ => None,
        };
        Self {
            kind,
            retryable,
            status,
            detail: detail.into(),
            upstream: None,
            origin: outcome.origin(),
        }
    }

    /// Whether this failure says something about the destination's health.
    pub fn trips_breaker(&self) -> bool {
        self.origin == FailureOrigin::Destination && self.kind.trips_breaker()
    }

    /// Attach the destination's own error body.
    pub fn with_upstream(mut self, upstream: Option<UpstreamError>) -> Self {
        self.upstream = upstream;
        self
    }
}
