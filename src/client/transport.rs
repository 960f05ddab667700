//! Transport primitive.
//!
//! # Responsibilities
//! - Send one HTTP request and return status plus body bytes
//! - Report transport failures in a small, classifiable vocabulary
//!
//! # Design Decisions
//! - Object-safe async trait so the client can hold `Arc<dyn Transport>`
//! - No timeouts or retries here; the resilience layer owns both
//! - Dropping the `send` future aborts the request and frees the connection

use std::fmt;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use url::Url;

use crate::resilience::classify::RawOutcome;

/// A fully built request, ready to dispatch.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

/// Status and raw body of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Refused, unreachable or unresolvable.
    Connect,
    /// The transport's own timer fired.
    TimedOut,
    /// Connection lost mid-exchange.
    Interrupted,
    /// Invalid HTTP or a body that could not be read as sent.
    Protocol,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind:?}: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Raw outcome for the classifier.
    pub fn outcome(&self) -> RawOutcome {
        match self.kind {
            TransportErrorKind::Connect | TransportErrorKind::Interrupted => {
                RawOutcome::ConnectionFailed
            }
            TransportErrorKind::TimedOut => RawOutcome::AttemptTimedOut,
            TransportErrorKind::Protocol => RawOutcome::Undecodable,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            TransportErrorKind::TimedOut
        } else if err.is_connect() {
            TransportErrorKind::Connect
        } else if err.is_decode() || err.is_builder() || err.is_redirect() {
            TransportErrorKind::Protocol
        } else {
            TransportErrorKind::Interrupted
        };
        Self::new(kind, err.to_string())
    }
}

/// Sends requests to a destination.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    async fn send(&self, request: OutboundRequest) -> Result<InboundResponse, TransportError>;
}

/// Pooled HTTP transport backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .pool_idle_timeout(std::time::Duration::from_secs(90))
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self { client })
    }

    /// Use an already configured client (custom TLS, proxies).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: OutboundRequest) -> Result<InboundResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method, request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        Ok(InboundResponse {
            status,
            body: body.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds_map_to_outcomes() {
        let cases = [
            (TransportErrorKind::Connect, RawOutcome::ConnectionFailed),
            (TransportErrorKind::Interrupted, RawOutcome::ConnectionFailed),
            (TransportErrorKind::TimedOut, RawOutcome::AttemptTimedOut),
            (TransportErrorKind::Protocol, RawOutcome::Undecodable),
        ];
        for (kind, outcome) in cases {
            assert_eq!(TransportError::new(kind, "x").outcome(), outcome);
        }
    }

    #[tokio::test]
    async fn test_refused_connection_is_connect_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = ReqwestTransport::new().unwrap();
        let err = transport
            .send(OutboundRequest {
                method: Method::GET,
                url: Url::parse(&format!("http://{addr}/")).unwrap(),
                headers: HeaderMap::new(),
                body: None,
            })
            .await
            .unwrap_err();

        assert_eq!(err.kind, TransportErrorKind::Connect);
    }
}
