//! Shared utilities for integration and load testing.

use std::collections::VecDeque;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::Router;
use tokio::net::TcpListener;
use tokio::time::Instant;

use service_link::client::{
    InboundResponse, OutboundRequest, Transport, TransportError, TransportErrorKind,
};
use service_link::config::{ClientConfig, DestinationConfig};
use service_link::ClientRegistry;

/// What the mock saw for one request.
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub trace_id: Option<String>,
    pub authorization: Option<String>,
    pub body: String,
}

/// A running mock downstream service.
#[allow(dead_code)]
pub struct MockService {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

#[allow(dead_code)]
impl MockService {
    pub fn base_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn hits(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

/// Start a programmable mock service on an ephemeral port.
///
/// `f` receives the 1-based request number and returns status and JSON body.
#[allow(dead_code)]
pub async fn start_programmable_backend<F, Fut>(f: F) -> MockService
where
    F: Fn(u32) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let requests = Arc::new(Mutex::new(Vec::new()));
    let counter = Arc::new(AtomicU32::new(0));
    let f = Arc::new(f);

    let recorded = requests.clone();
    let handler = move |method: Method, uri: Uri, headers: HeaderMap, body: String| {
        let f = f.clone();
        let counter = counter.clone();
        let recorded = recorded.clone();
        async move {
            let header = |name: &str| {
                headers
                    .get(name)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string)
            };
            recorded.lock().unwrap().push(RecordedRequest {
                method: method.to_string(),
                path: uri.path().to_string(),
                trace_id: header("x-trace-id"),
                authorization: header("authorization"),
                body,
            });

            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            let (status, body) = f(n).await;
            (
                StatusCode::from_u16(status).unwrap(),
                [(header::CONTENT_TYPE, "application/json")],
                body,
            )
        }
    };

    let app = Router::new().fallback(handler);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockService { addr, requests }
}

/// Start a mock service that always answers with the same status and body.
#[allow(dead_code)]
pub async fn start_mock_backend(status: u16, body: &'static str) -> MockService {
    start_programmable_backend(move |_| async move { (status, body.to_string()) }).await
}

/// An address nothing is listening on.
#[allow(dead_code)]
pub fn refused_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Destination settings tuned for fast tests.
#[allow(dead_code)]
pub fn fast_destination(base_url: &str) -> DestinationConfig {
    let mut dest = DestinationConfig::new(base_url);
    dest.attempt_timeout_ms = 2_000;
    dest.backoff_base_ms = 10;
    dest.backoff_max_ms = 50;
    dest
}

#[allow(dead_code)]
pub fn registry_for(name: &str, dest: DestinationConfig) -> ClientRegistry {
    ClientRegistry::new(ClientConfig::default().with_destination(name, dest)).unwrap()
}

/// In-memory transport replaying a fixed script of responses.
#[allow(dead_code)]
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<(u16, String), TransportErrorKind>>>,
    sent: Mutex<Vec<(Instant, OutboundRequest)>>,
}

#[allow(dead_code)]
impl ScriptedTransport {
    pub fn new<'a>(script: impl IntoIterator<Item = Result<(u16, &'a str), TransportErrorKind>>) -> Self {
        Self {
            script: Mutex::new(
                script
                    .into_iter()
                    .map(|step| step.map(|(status, body)| (status, body.to_string())))
                    .collect(),
            ),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Requests received so far, with the instant each arrived.
    pub fn sent(&self) -> Vec<(Instant, OutboundRequest)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: OutboundRequest) -> Result<InboundResponse, TransportError> {
        self.sent.lock().unwrap().push((Instant::now(), request));

        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok((500, r#"{"code":"SCRIPT_EXHAUSTED"}"#.to_string())));

        match step {
            Ok((status, body)) => Ok(InboundResponse {
                status: reqwest::StatusCode::from_u16(status).unwrap(),
                body: body.into_bytes(),
            }),
            Err(kind) => Err(TransportError::new(kind, "scripted transport failure")),
        }
    }
}
