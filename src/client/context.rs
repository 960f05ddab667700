//! Per-call request context.
//!
//! # Responsibilities
//! - Carry the trace ID, bearer token and optional overall deadline of one logical call
//! - Render them as outbound headers, identically on every attempt
//! - Recover them from an incoming request so traces flow across services
//!
//! # Design Decisions
//! - Trace IDs are UUID v4, generated when the caller has none
//! - The context is owned by the caller; the client only reads it

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, InvalidHeaderValue, AUTHORIZATION};
use tokio::time::Instant;
use uuid::Uuid;

/// Trace header name, lower-cased as HTTP/2 requires.
pub const TRACE_ID_HEADER: &str = "x-trace-id";

/// Caller-supplied context for one logical call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    trace_id: String,
    auth_token: Option<String>,
    deadline: Option<Instant>,
}

impl RequestContext {
    /// Fresh context with a new trace ID, no token and no deadline.
    pub fn new() -> Self {
        Self {
            trace_id: Uuid::new_v4().to_string(),
            auth_token: None,
            deadline: None,
        }
    }

    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = trace_id.into();
        self
    }

    /// Bearer token, without the `Bearer ` prefix.
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Bound the whole call (all attempts and backoff) by `deadline`.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Like [`with_deadline`](Self::with_deadline), measured from now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Build a context from an incoming request's headers.
    ///
    /// Reuses the `X-Trace-Id` and bearer token when present; otherwise a new
    /// trace ID is generated.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut ctx = Self::new();

        if let Some(trace_id) = headers
            .get(TRACE_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
        {
            ctx.trace_id = trace_id.to_string();
        }

        ctx.auth_token = headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty());

        ctx
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    pub fn auth_token(&self) -> Option<&str> {
        self.auth_token.as_deref()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Write the trace and authorization headers into `headers`.
    pub fn apply_headers(&self, headers: &mut HeaderMap) -> Result<(), InvalidHeaderValue> {
        headers.insert(TRACE_ID_HEADER, HeaderValue::from_str(&self.trace_id)?);

        if let Some(token) = &self.auth_token {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        Ok(())
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}
