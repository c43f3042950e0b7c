//! Integration tests for `RoadStatusClient` using wiremock HTTP mocks.
//!
//! Every test stands up its own `MockServer` (or, for a truncated body, a
//! bare loopback listener); nothing leaves the machine. Retry tests use a
//! zero back-off policy so they run instantly.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use roadstatus_core::{
    ApiConfig, Cancellation, RetryPolicy, RoadId, RoadStatus, RoadStatusClient, RoadStatusError,
};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Builds a client against the mock server with no retries.
fn test_client(base_url: &str) -> RoadStatusClient {
    RoadStatusClient::with_base_url(base_url)
        .expect("client construction should not fail")
        .with_retry_policy(RetryPolicy::no_retries())
}

/// Builds a client with `max_retries` instant retries.
fn test_client_with_retries(base_url: &str, max_retries: u32) -> RoadStatusClient {
    RoadStatusClient::with_base_url(base_url)
        .expect("client construction should not fail")
        .with_retry_policy(RetryPolicy::new(max_retries, Duration::ZERO, Duration::ZERO))
}

fn road(id: &str) -> RoadId {
    RoadId::parse(id).expect("valid road id")
}

fn a2_body() -> serde_json::Value {
    json!([{
        "$type": "Tfl.Api.Presentation.Entities.RoadCorridor, Tfl.Api.Presentation.Entities",
        "id": "a2",
        "displayName": "A2",
        "statusSeverity": "Good",
        "statusSeverityDescription": "No Exceptional Delays",
        "bounds": "[[-0.0857,51.44091],[0.17118,51.49438]]",
        "url": "/Road/a2"
    }])
}

async fn request_count(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .expect("request recording is enabled")
        .len()
}

// ---------------------------------------------------------------------------
// Happy paths
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fetch_a2_returns_parsed_status() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/Road/A2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(a2_body()))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let status = client.fetch(&road("A2")).await.expect("should parse status");

    assert_eq!(
        status,
        RoadStatus::new("A2", "Good", "No Exceptional Delays").unwrap()
    );
}

#[tokio::test]
async fn fetch_matches_field_names_case_insensitively() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/Road/A3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "DISPLAYNAME": "A3",
            "StatusSeverity": "Serious",
            "statusSeverityDESCRIPTION": "Serious Delays"
        }])))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let status = client.fetch(&road("A3")).await.expect("should parse status");

    assert_eq!(status.display_name(), "A3");
    assert_eq!(status.status_severity(), "Serious");
    assert_eq!(status.status_description(), "Serious Delays");
}

#[tokio::test]
async fn fetch_sends_credentials_as_query_params() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/Road/A2"))
        .and(query_param("app_id", "test-app-id"))
        .and(query_param("app_key", "test-app-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(a2_body()))
        .expect(1)
        .mount(&server)
        .await;

    let client = RoadStatusClient::new(&ApiConfig {
        base_url: server.uri(),
        app_id: Some("test-app-id".to_owned()),
        app_key: Some("test-app-key".to_owned()),
        max_retries: 0,
        ..ApiConfig::default()
    })
    .expect("client construction should not fail");

    let status = client.fetch(&road("A2")).await;
    assert!(status.is_ok(), "expected Ok, got: {status:?}");
}

#[tokio::test]
async fn repeated_fetches_return_identical_status() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/Road/A2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(a2_body()))
        .expect(2)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let first = client.fetch(&road("A2")).await.expect("first fetch");
    let second = client.fetch(&road("A2")).await.expect("second fetch");

    assert_eq!(first, second);
}

// ---------------------------------------------------------------------------
// Unknown roads
// ---------------------------------------------------------------------------

#[tokio::test]
async fn not_found_is_unknown_road_and_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/Road/A233"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "$type": "Tfl.Api.Presentation.Entities.ApiError, Tfl.Api.Presentation.Entities",
            "httpStatusCode": 404,
            "httpStatus": "NotFound",
            "message": "The following road id is not recognised: A233"
        })))
        .mount(&server)
        .await;

    let client = test_client_with_retries(&server.uri(), 3);
    let err = client.fetch(&road("A233")).await.unwrap_err();

    assert!(
        matches!(err, RoadStatusError::UnknownRoad { ref road_id } if road_id == "A233"),
        "expected UnknownRoad, got: {err:?}"
    );
    assert!(err.to_string().contains("A233"));
    assert_eq!(err.to_string(), "A233 is not a valid road");
    assert_eq!(request_count(&server).await, 1, "404 must not be retried");
}

#[tokio::test]
async fn empty_array_and_null_bodies_are_unknown_road() {
    for body in ["[]", "null"] {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/Road/A2"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(body.as_bytes(), "application/json"),
            )
            .mount(&server)
            .await;

        let client = test_client_with_retries(&server.uri(), 2);
        let err = client.fetch(&road("A2")).await.unwrap_err();

        assert!(
            matches!(err, RoadStatusError::UnknownRoad { .. }),
            "expected UnknownRoad for {body}, got: {err:?}"
        );
        assert_eq!(
            request_count(&server).await,
            1,
            "2xx bodies must not be retried"
        );
    }
}

#[tokio::test]
async fn blank_status_severity_is_unknown_road() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/Road/A2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "displayName": "A2",
            "statusSeverity": "",
            "statusSeverityDescription": "No Exceptional Delays"
        }])))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let err = client.fetch(&road("A2")).await.unwrap_err();

    assert!(
        matches!(err, RoadStatusError::UnknownRoad { .. }),
        "expected UnknownRoad, got: {err:?}"
    );
}

// ---------------------------------------------------------------------------
// Retry behaviour
// ---------------------------------------------------------------------------

#[tokio::test]
async fn transient_500_then_200_succeeds() {
    let server = MockServer::start().await;

    // Mounted first, so it answers the first request only.
    Mock::given(method("GET"))
        .and(path("/Road/A2"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/Road/A2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(a2_body()))
        .mount(&server)
        .await;

    let client = test_client_with_retries(&server.uri(), 2);
    let status = client.fetch(&road("A2")).await.expect("should succeed after retry");

    assert_eq!(status.status_severity(), "Good");
    assert!(request_count(&server).await >= 2);
}

#[tokio::test]
async fn rate_limited_then_200_succeeds() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/Road/A2"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/Road/A2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(a2_body()))
        .mount(&server)
        .await;

    let client = test_client_with_retries(&server.uri(), 2);
    let result = client.fetch(&road("A2")).await;

    assert!(result.is_ok(), "expected Ok, got: {result:?}");
    assert_eq!(request_count(&server).await, 3);
}

#[tokio::test]
async fn repeated_500_exhausts_retry_budget() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/Road/A2"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = test_client_with_retries(&server.uri(), 2);
    let err = client.fetch(&road("A2")).await.unwrap_err();

    assert!(
        matches!(err, RoadStatusError::Upstream { status: 500, .. }),
        "expected Upstream(500), got: {err:?}"
    );
    assert!(err.to_string().contains("500"));
    assert_eq!(request_count(&server).await, 3, "retries + 1 attempts");
}

#[tokio::test]
async fn client_error_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/Road/A2"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let client = test_client_with_retries(&server.uri(), 2);
    let err = client.fetch(&road("A2")).await.unwrap_err();

    assert!(matches!(err, RoadStatusError::Upstream { status: 403, .. }));
    assert_eq!(request_count(&server).await, 1);
}

#[tokio::test]
async fn connection_refused_is_network_failure() {
    // Port 1 on loopback is never listening in the test environment.
    let client = test_client_with_retries("http://127.0.0.1:1", 1);
    let err = client.fetch(&road("A2")).await.unwrap_err();

    assert!(
        matches!(err, RoadStatusError::Network { .. }),
        "expected Network, got: {err:?}"
    );
    assert!(!err.is_unknown_road());
}

// ---------------------------------------------------------------------------
// Body format, timeouts, cancellation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn malformed_body_is_invalid_response_format() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/Road/A2"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let client = test_client_with_retries(&server.uri(), 2);
    let err = client.fetch(&road("A2")).await.unwrap_err();

    assert!(
        matches!(err, RoadStatusError::InvalidResponseFormat { .. }),
        "expected InvalidResponseFormat, got: {err:?}"
    );
    assert_eq!(request_count(&server).await, 1);
}

/// Serves `200 OK` announcing a 500-byte body but sends only a few bytes
/// before closing, counting connections.
async fn truncated_body_server() -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind loopback listener");
    let addr = listener.local_addr().expect("listener address");
    let requests = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&requests);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let _ = socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 500\r\n\r\n[{\"displayName\"",
                )
                .await;
            let _ = socket.shutdown().await;
        }
    });

    (format!("http://{addr}"), requests)
}

#[tokio::test]
async fn truncated_success_body_is_not_retried() {
    let (base_url, requests) = truncated_body_server().await;

    let client = test_client_with_retries(&base_url, 2);
    let err = client.fetch(&road("A2")).await.unwrap_err();

    assert!(
        matches!(err, RoadStatusError::Network { .. }),
        "expected Network, got: {err:?}"
    );
    assert_eq!(requests.load(Ordering::SeqCst), 1, "2xx must not be retried");
}

#[tokio::test]
async fn request_timeout_is_terminal_timeout() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/Road/A2"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(a2_body())
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let client = RoadStatusClient::new(&ApiConfig {
        base_url: server.uri(),
        timeout_secs: 1,
        ..ApiConfig::default()
    })
    .expect("client construction should not fail")
    .with_retry_policy(RetryPolicy::new(2, Duration::ZERO, Duration::ZERO));

    let err = client.fetch(&road("A2")).await.unwrap_err();

    assert!(
        matches!(err, RoadStatusError::Timeout),
        "expected Timeout, got: {err:?}"
    );
    assert_eq!(request_count(&server).await, 1, "timeouts are not retried");
}

#[tokio::test]
async fn caller_deadline_is_timeout() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/Road/A2"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(a2_body())
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let cancellation = Cancellation::new().with_timeout(Duration::from_millis(100));
    let err = client
        .fetch_with(&road("A2"), &cancellation)
        .await
        .unwrap_err();

    assert!(
        matches!(err, RoadStatusError::Timeout),
        "expected Timeout, got: {err:?}"
    );
}

#[tokio::test]
async fn cancellation_during_backoff_returns_cancelled() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/Road/A2"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    // Long back-off so the cancel lands while the loop is sleeping.
    let client = RoadStatusClient::with_base_url(&server.uri())
        .expect("client construction should not fail")
        .with_retry_policy(RetryPolicy::new(2, Duration::from_secs(30), Duration::ZERO));

    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        canceller.cancel();
    });

    let err = client
        .fetch_with(&road("A2"), &Cancellation::with_token(token))
        .await
        .unwrap_err();

    assert!(
        matches!(err, RoadStatusError::Cancelled),
        "expected Cancelled, got: {err:?}"
    );
    assert_eq!(request_count(&server).await, 1);
}
