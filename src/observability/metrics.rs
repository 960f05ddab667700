//! Metrics collection.
//!
//! # Metrics
//! - `svc_client_calls_total` (counter): logical calls by service, outcome
//! - `svc_client_call_duration_seconds` (histogram): end-to-end call latency by service
//! - `svc_client_retries_total` (counter): retries scheduled by service, failure kind
//! - `svc_breaker_rejections_total` (counter): calls refused by an open circuit
//! - `svc_breaker_state` (gauge): 0=closed, 1=open, 2=half-open
//!
//! # Design Decisions
//! - Low-overhead metric updates through the `metrics` facade
//! - Labels are service name plus one low-cardinality dimension

use std::time::Duration;

use metrics::{counter, gauge, histogram};

use crate::resilience::circuit_breaker::CircuitState;
use crate::resilience::classify::FailureKind;

/// Record the end of one logical call. `failure` is `None` on success.
pub fn record_call(service: &str, failure: Option<FailureKind>, elapsed: Duration) {
    let outcome = failure.map_or("success", FailureKind::as_str);

    counter!(
        "svc_client_calls_total",
        "service" => service.to_string(),
        "outcome" => outcome
    )
    .increment(1);

    histogram!("svc_client_call_duration_seconds", "service" => service.to_string())
        .record(elapsed.as_secs_f64());
}

/// Record a retry about to be scheduled after a failed attempt.
pub fn record_retry(service: &str, kind: FailureKind) {
    counter!(
        "svc_client_retries_total",
        "service" => service.to_string(),
        "kind" => kind.as_str()
    )
    .increment(1);
}

pub fn record_rejection(service: &str) {
    counter!("svc_breaker_rejections_total", "service" => service.to_string()).increment(1);
}

pub fn record_breaker_state(service: &str, state: CircuitState) {
    gauge!("svc_breaker_state", "service" => service.to_string()).set(state.as_metric_value());
}
