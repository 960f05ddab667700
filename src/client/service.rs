//! Per-destination client facade.
//!
//! # Responsibilities
//! - Expose verb-shaped calls (`get`, `post`, `put`, `delete`) against one destination
//! - Inject `X-Trace-Id` and `Authorization: Bearer` on every attempt
//! - Compose the pipeline: breaker → retry loop → timeout → transport
//! - Turn the terminal failure into a `ServiceError`
//!
//! # Data Flow
//! ```text
//! call(method, path, body, ctx)
//!     → build request once (URL, headers, JSON body)
//!     → CircuitBreaker::execute
//!         → RetryExecutor::run (each attempt bounded by TimeoutGuard)
//!             → Transport::send, non-2xx classified with its error body
//!     → decode JSON (empty body decodes as null)
//!     → Ok(R) or ServiceError { service, trace_id, ... }
//! ```
//!
//! # Design Decisions
//! - The request is built before the breaker is consulted; a request that cannot
//!   be built is the caller's fault and never counts against the destination
//! - A deadline that has already passed fails the call before the breaker is consulted
//! - Decoding happens after the breaker has recorded the call, so an unreadable
//!   body is a caller-visible failure but not a destination health signal

use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::time::Instant;
use tracing::Instrument;
use url::Url;

use crate::client::context::RequestContext;
use crate::client::transport::{InboundResponse, OutboundRequest, Transport};
use crate::config::schema::DestinationConfig;
use crate::config::validation::check_base_url;
use crate::error::{RegistryError, ServiceError, UpstreamError};
use crate::observability::metrics;
use crate::resilience::circuit_breaker::CircuitBreaker;
use crate::resilience::classify::{AttemptFailure, FailureKind, RawOutcome};
use crate::resilience::retries::{CallAttempt, RetryExecutor};

/// Longest slice of an unparsable error body kept in `details`.
const MAX_DETAIL_BYTES: usize = 512;

/// Resilient client for one destination.
#[derive(Debug)]
pub struct ServiceClient {
    name: String,
    base_url: Url,
    transport: Arc<dyn Transport>,
    breaker: Arc<CircuitBreaker>,
    retry: RetryExecutor,
}

impl ServiceClient {
    /// Build a client and its breaker from destination settings.
    pub fn new(
        name: &str,
        config: &DestinationConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, RegistryError> {
        let base_url = check_base_url(&config.base_url).map_err(|reason| {
            RegistryError::InvalidBaseUrl {
                name: name.to_string(),
                reason,
            }
        })?;

        Ok(Self {
            name: name.to_string(),
            base_url,
            transport,
            breaker: Arc::new(CircuitBreaker::new(name, config.breaker_config())),
            retry: RetryExecutor::new(
                name,
                config.max_retries,
                config.backoff(),
                config.timeout_guard(),
            ),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn retry(&self) -> &RetryExecutor {
        &self.retry
    }

    pub async fn get<R>(&self, path: &str, ctx: &RequestContext) -> Result<R, ServiceError>
    where
        R: DeserializeOwned,
    {
        self.call::<(), R>(Method::GET, path, None, ctx).await
    }

    pub async fn post<B, R>(&self, path: &str, body: &B, ctx: &RequestContext) -> Result<R, ServiceError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.call(Method::POST, path, Some(body), ctx).await
    }

    pub async fn put<B, R>(&self, path: &str, body: &B, ctx: &RequestContext) -> Result<R, ServiceError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.call(Method::PUT, path, Some(body), ctx).await
    }

    pub async fn delete<R>(&self, path: &str, ctx: &RequestContext) -> Result<R, ServiceError>
    where
        R: DeserializeOwned,
    {
        self.call::<(), R>(Method::DELETE, path, None, ctx).await
    }

    /// Perform one logical call with any method.
    pub async fn call<B, R>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        ctx: &RequestContext,
    ) -> Result<R, ServiceError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let span = tracing::info_span!(
            "service_call",
            service = %self.name,
            trace_id = %ctx.trace_id(),
            method = %method,
            path = %path
        );

        let started = Instant::now();
        let result = self.execute(method, path, body, ctx).instrument(span.clone()).await;
        metrics::record_call(&self.name, result.as_ref().err().map(|f| f.kind), started.elapsed());

        result.map_err(|failure| {
            let _entered = span.enter();
            if failure.kind == FailureKind::UpstreamClientError {
                tracing::warn!(kind = %failure.kind, status = ?failure.status, error = %failure.detail, "call rejected by destination");
            } else {
                tracing::error!(kind = %failure.kind, status = ?failure.status, error = %failure.detail, "call failed");
            }
            ServiceError::from_failure(&self.name, ctx.trace_id(), failure)
        })
    }

    async fn execute<B, R>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        ctx: &RequestContext,
    ) -> Result<R, AttemptFailure>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let request = self.build_request(method, path, body, ctx)?;
        let request = &request;

        if ctx.deadline().is_some_and(|deadline| Instant::now() >= deadline) {
            return Err(AttemptFailure::from_outcome(
                RawOutcome::DeadlineExceeded,
                "overall call deadline exceeded before dispatch",
            ));
        }

        let response = self
            .breaker
            .execute(|| {
                self.retry
                    .run(move |attempt| self.attempt(request, attempt), ctx.deadline())
            })
            .await?;

        decode(&response.body)
    }

    async fn attempt(
        &self,
        request: &OutboundRequest,
        attempt: CallAttempt,
    ) -> Result<InboundResponse, AttemptFailure> {
        tracing::debug!(attempt = attempt.index, url = %request.url, "dispatching attempt");

        let response = self
            .transport
            .send(request.clone())
            .await
            .map_err(|e| AttemptFailure::from_outcome(e.outcome(), e.message))?;

        if response.status.is_success() {
            return Ok(response);
        }

        let status = response.status.as_u16();
        let upstream = UpstreamError::parse(&response.body);
        let detail = if upstream.is_some() || response.body.is_empty() {
            format!("HTTP {status}")
        } else {
            format!("HTTP {status}: {}", body_snippet(&response.body))
        };

        Err(AttemptFailure::from_outcome(RawOutcome::Status(status), detail).with_upstream(upstream))
    }

    fn build_request<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        ctx: &RequestContext,
    ) -> Result<OutboundRequest, AttemptFailure>
    where
        B: Serialize + ?Sized,
    {
        let url = self.url_for(path)?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        ctx.apply_headers(&mut headers)
            .map_err(|e| invalid_request(format!("invalid header value: {e}")))?;

        let body = match body {
            Some(body) => {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                let bytes = serde_json::to_vec(body)
                    .map_err(|e| invalid_request(format!("request body could not be serialized: {e}")))?;
                Some(bytes)
            }
            None => None,
        };

        Ok(OutboundRequest {
            method,
            url,
            headers,
            body,
        })
    }

    /// `base_url` joined with `path`, keeping any base path prefix.
    fn url_for(&self, path: &str) -> Result<Url, AttemptFailure> {
        let joined = format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Url::parse(&joined).map_err(|e| invalid_request(format!("invalid request path '{path}': {e}")))
    }
}

/// A request that could not be built; never dispatched, never retried.
fn invalid_request(detail: String) -> AttemptFailure {
    AttemptFailure::from_outcome(RawOutcome::Unbuildable, detail)
}

fn decode<R: DeserializeOwned>(body: &[u8]) -> Result<R, AttemptFailure> {
    let body: &[u8] = if body.iter().all(u8::is_ascii_whitespace) {
        b"null"
    } else {
        body
    };

    serde_json::from_slice(body).map_err(|e| {
        AttemptFailure::from_outcome(
            RawOutcome::Undecodable,
            format!("response body is not the expected JSON: {e}"),
        )
    })
}

fn body_snippet(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.len() <= MAX_DETAIL_BYTES {
        return text.to_string();
    }

    let mut end = MAX_DETAIL_BYTES;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}
