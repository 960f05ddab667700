//! Error types returned to callers.
//!
//! # Responsibilities
//! - `ServiceError`: the single failure value of a logical call, serializable
//!   to the JSON error body shared by every service in the pipeline
//! - `UpstreamError`: a destination's own error body, when it sent one
//! - `RegistryError`: failures building or looking up clients
//!
//! # Design Decisions
//! - `ServiceError` is immutable once built; all fields are read through accessors
//! - The upstream message is surfaced verbatim for 4xx/5xx so callers can relay it
//! - Both error body shapes seen downstream are accepted: flat and `{"error": {...}}`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::transport::TransportError;
use crate::config::loader::ConfigError;
use crate::resilience::classify::{AttemptFailure, FailureKind, FailureOrigin};

/// Terminal failure of one logical call to a destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(rename_all = "camelCase")]
#[error("{code} from {service}: {message}")]
pub struct ServiceError {
    #[serde(skip)]
    kind: FailureKind,
    code: &'static str,
    message: String,
    details: Option<String>,
    timestamp: DateTime<Utc>,
    service: String,
    trace_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    upstream_code: Option<String>,
}

impl ServiceError {
    /// Wrap the final failure of a call to `service`.
    pub fn from_failure(service: &str, trace_id: &str, failure: AttemptFailure) -> Self {
        let AttemptFailure {
            kind,
            status,
            detail,
            upstream,
            origin,
            ..
        } = failure;

        let (upstream_code, upstream_message, upstream_details) = match upstream {
            Some(UpstreamError {
                code,
                message,
                details,
            }) => (Some(code), message, details),
            None => (None, None, None),
        };

        let message = match (origin, kind) {
            (FailureOrigin::InvalidRequest, _) => {
                format!("request to {service} could not be built and was never sent")
            }
            (FailureOrigin::CallerDeadline, _) => {
                format!("deadline for the call to {service} expired before it completed")
            }
            (_, FailureKind::UpstreamClientError | FailureKind::UpstreamServerError) => {
                upstream_message.unwrap_or_else(|| default_message(kind, service))
            }
            _ => default_message(kind, service),
        };

        let details = upstream_details.or_else(|| (!detail.is_empty()).then_some(detail));

        Self {
            kind,
            code: kind.code(),
            message,
            details,
            timestamp: Utc::now(),
            service: service.to_string(),
            trace_id: trace_id.to_string(),
            status,
            upstream_code,
        }
    }

    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    /// Taxonomy key, e.g. `SVC_TIMEOUT`.
    pub fn code(&self) -> &str {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Name of the destination that failed.
    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    /// HTTP status of the last upstream response, if any was received.
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// The destination's own error code (e.g. `RES_NOT_FOUND`).
    pub fn upstream_code(&self) -> Option<&str> {
        self.upstream_code.as_deref()
    }

    /// JSON error body.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

fn default_message(kind: FailureKind, service: &str) -> String {
    match kind {
        FailureKind::NetworkUnavailable => format!("{service} is unavailable"),
        FailureKind::Timeout => format!("{service} did not respond in time"),
        FailureKind::UpstreamOverloaded => format!("{service} is overloaded, try again later"),
        FailureKind::UpstreamServerError => format!("{service} failed to process the request"),
        FailureKind::UpstreamClientError => format!("{service} rejected the request"),
        FailureKind::CircuitOpen => format!("{service} is temporarily unavailable"),
        FailureKind::MalformedResponse => format!("{service} returned an unreadable response"),
    }
}

/// Error body sent by a destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamError {
    pub code: String,
    pub message: Option<String>,
    pub details: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Envelope {
    Wrapped { error: Body },
    Flat(Body),
}

#[derive(Deserialize)]
struct Body {
    code: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Option<Value>,
}

impl UpstreamError {
    /// Parse a response body; `None` if it is not a recognisable error document.
    pub fn parse(body: &[u8]) -> Option<Self> {
        let body = match serde_json::from_slice::<Envelope>(body).ok()? {
            Envelope::Wrapped { error } => error,
            Envelope::Flat(body) => body,
        };

        let details = match body.details {
            None | Some(Value::Null) => None,
            Some(Value::String(text)) => Some(text),
            Some(other) => Some(other.to_string()),
        };

        Some(Self {
            code: body.code,
            message: body.message,
            details,
        })
    }
}

/// Failures building a registry or looking up a client.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("no destination named '{0}' is configured")]
    UnknownDestination(String),

    #[error("destination '{name}' has an invalid base URL: {reason}")]
    InvalidBaseUrl { name: String, reason: String },

    #[error("failed to build HTTP transport: {0}")]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
