//! Retry and breaker timing through the full client, on a paused clock.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use service_link::client::TransportErrorKind;
use service_link::config::{ClientConfig, DestinationConfig};
use service_link::resilience::BackoffStrategy;
use service_link::{ClientRegistry, CircuitState, RequestContext};

mod common;

use common::ScriptedTransport;

fn registry(dest: DestinationConfig, transport: Arc<ScriptedTransport>) -> ClientRegistry {
    let config = ClientConfig::default().with_destination("student-service", dest);
    ClientRegistry::with_transport(config, transport).unwrap()
}

fn gaps(transport: &ScriptedTransport) -> Vec<Duration> {
    transport
        .sent()
        .windows(2)
        .map(|pair| pair[1].0 - pair[0].0)
        .collect()
}

fn assert_gaps(actual: Vec<Duration>, expected: &[u64]) {
    assert_eq!(actual.len(), expected.len(), "gaps: {actual:?}");
    for (gap, secs) in actual.iter().zip(expected) {
        let want = Duration::from_secs(*secs);
        assert!(*gap >= want && *gap < want + Duration::from_millis(10), "gap {gap:?}, want {want:?}");
    }
}

#[tokio::test(start_paused = true)]
async fn test_exponential_backoff_between_attempts() {
    let transport = Arc::new(ScriptedTransport::new([
        Ok((503, "{}")),
        Ok((503, "{}")),
        Ok((503, "{}")),
        Ok((503, "{}")),
    ]));
    let registry = registry(DestinationConfig::new("http://students"), transport.clone());
    let client = registry.client_for("student-service").unwrap();

    let err = client.get::<Value>("/students", &RequestContext::new()).await.unwrap_err();

    assert_eq!(err.code(), "SVC_OVERLOADED");
    assert_eq!(transport.sent().len(), 4, "1 initial + 3 retries");
    assert_gaps(gaps(&transport), &[2, 4, 8]);
}

#[tokio::test(start_paused = true)]
async fn test_linear_backoff_between_attempts() {
    let transport = Arc::new(ScriptedTransport::new([
        Err(TransportErrorKind::Connect),
        Err(TransportErrorKind::Interrupted),
        Ok((500, "{}")),
        Ok((200, r#"{"id":1}"#)),
    ]));
    let mut dest = DestinationConfig::new("http://students");
    dest.backoff_strategy = BackoffStrategy::Linear;
    let registry = registry(dest, transport.clone());
    let client = registry.client_for("student-service").unwrap();

    let reply: Value = client.get("/students/1", &RequestContext::new()).await.unwrap();

    assert_eq!(reply["id"], 1);
    assert_gaps(gaps(&transport), &[1, 2, 3]);
}

#[tokio::test(start_paused = true)]
async fn test_trace_id_constant_across_attempts() {
    let transport = Arc::new(ScriptedTransport::new([
        Err(TransportErrorKind::TimedOut),
        Ok((502, "")),
        Ok((200, "{}")),
    ]));
    let registry = registry(DestinationConfig::new("http://students"), transport.clone());
    let client = registry.client_for("student-service").unwrap();
    let ctx = RequestContext::new().with_auth_token("tok");

    client.get::<Value>("/students", &ctx).await.unwrap();

    let sent = transport.sent();
    assert_eq!(sent.len(), 3);
    for (_, request) in &sent {
        assert_eq!(request.headers["x-trace-id"], ctx.trace_id());
        assert_eq!(request.headers["authorization"], "Bearer tok");
    }
}

#[tokio::test(start_paused = true)]
async fn test_breaker_counts_logical_calls_not_attempts() {
    let transport = Arc::new(ScriptedTransport::new(
        std::iter::repeat(Err(TransportErrorKind::Connect)).take(12),
    ));
    let mut dest = DestinationConfig::new("http://students");
    dest.failure_threshold = 3;
    let registry = registry(dest, transport.clone());
    let client = registry.client_for("student-service").unwrap();

    for call in 1..=3 {
        let err = client.get::<Value>("/students", &RequestContext::new()).await.unwrap_err();
        assert_eq!(err.code(), "SVC_UNAVAILABLE");
        assert_eq!(transport.sent().len(), call * 4);
    }
    assert_eq!(client.breaker().state(), CircuitState::Open);

    let err = client.get::<Value>("/students", &RequestContext::new()).await.unwrap_err();
    assert_eq!(err.code(), "SVC_CIRCUIT_OPEN");
    assert_eq!(transport.sent().len(), 12);
}

#[tokio::test(start_paused = true)]
async fn test_open_circuit_probes_after_reset_timeout() {
    let transport = Arc::new(ScriptedTransport::new([
        Ok((500, "{}")),
        Ok((500, "{}")),
        Ok((200, r#"{"recovered":true}"#)),
    ]));
    let mut dest = DestinationConfig::new("http://students");
    dest.max_retries = 0;
    dest.failure_threshold = 1;
    let registry = registry(dest, transport.clone());
    let client = registry.client_for("student-service").unwrap();

    assert!(client.get::<Value>("/s", &RequestContext::new()).await.is_err());

    tokio::time::advance(Duration::from_secs(30)).await;
    let err = client.get::<Value>("/s", &RequestContext::new()).await.unwrap_err();
    assert_eq!(err.code(), "SVC_CIRCUIT_OPEN");

    // failed probe restarts the 60s window
    tokio::time::advance(Duration::from_secs(30)).await;
    assert_eq!(
        client.get::<Value>("/s", &RequestContext::new()).await.unwrap_err().code(),
        "SVC_UPSTREAM_ERROR"
    );
    tokio::time::advance(Duration::from_secs(59)).await;
    assert_eq!(
        client.get::<Value>("/s", &RequestContext::new()).await.unwrap_err().code(),
        "SVC_CIRCUIT_OPEN"
    );

    tokio::time::advance(Duration::from_secs(1)).await;
    let reply: Value = client.get("/s", &RequestContext::new()).await.unwrap();
    assert_eq!(reply["recovered"], true);
    assert_eq!(client.breaker().state(), CircuitState::Closed);
    assert_eq!(transport.sent().len(), 3);
}
