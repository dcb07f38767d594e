//! End-to-end token exchange tests.
//!
//! These tests run a local mock console with axum and exercise the init
//! path over real HTTP: request shape, error-entry propagation, and the
//! malformed-response failures.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};

use avatar_sdk::{AvatarSession, SdkError, SessionConfig};

#[derive(Clone, Default)]
struct ConsoleState {
    requests: Arc<AtomicUsize>,
    last_headers: Arc<Mutex<Option<HeaderMap>>>,
    last_body: Arc<Mutex<Option<Value>>>,
    response: Arc<Mutex<Value>>,
    status: Arc<Mutex<u16>>,
}

impl ConsoleState {
    fn new(status: u16, response: Value) -> Self {
        Self {
            status: Arc::new(Mutex::new(status)),
            response: Arc::new(Mutex::new(response)),
            ..Default::default()
        }
    }
}

async fn token_handler(
    State(state): State<ConsoleState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (axum::http::StatusCode, Json<Value>) {
    state.requests.fetch_add(1, Ordering::SeqCst);
    *state.last_headers.lock().unwrap() = Some(headers);
    *state.last_body.lock().unwrap() = Some(body);

    let status =
        axum::http::StatusCode::from_u16(*state.status.lock().unwrap()).expect("valid status");
    let response = state.response.lock().unwrap().clone();
    (status, Json(response))
}

/// Spawn the mock console and return its base URL.
async fn spawn_console(state: ConsoleState) -> String {
    let app = Router::new()
        .route("/session-tokens", post(token_handler))
        .with_state(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind console listener");
    let addr = listener.local_addr().expect("console address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve console");
    });
    format!("http://{addr}")
}

fn config(console: &str) -> SessionConfig {
    SessionConfig::new()
        .with_api_key("test-api-key")
        .with_console_endpoint(console)
        .with_expire_at(Utc.timestamp_opt(1_754_824_283, 0).unwrap())
}

/// Test that init sends one correctly shaped request and succeeds
#[tokio::test]
async fn test_init_success() {
    let state = ConsoleState::new(200, json!({"sessionToken": "session-token-123"}));
    let console = spawn_console(state.clone()).await;

    let session = AvatarSession::new(config(&console).with_model_version("v2"));
    session.init().await.expect("init must succeed");

    // Exactly one HTTP request per call.
    assert_eq!(state.requests.load(Ordering::SeqCst), 1);

    let headers = state.last_headers.lock().unwrap().take().expect("headers");
    assert_eq!(headers.get("x-api-key").unwrap(), "test-api-key");
    assert_eq!(headers.get("content-type").unwrap(), "application/json");

    let body = state.last_body.lock().unwrap().take().expect("body");
    assert_eq!(body["expireAt"], json!(1_754_824_283_i64));
    assert_eq!(body["modelVersion"], json!("v2"));
}

/// Test that init without a model version omits the field entirely
#[tokio::test]
async fn test_init_omits_absent_model_version() {
    let state = ConsoleState::new(200, json!({"sessionToken": "tok"}));
    let console = spawn_console(state.clone()).await;

    let session = AvatarSession::new(config(&console));
    session.init().await.expect("init must succeed");

    let body = state.last_body.lock().unwrap().take().expect("body");
    assert!(body.get("modelVersion").is_none());
}

/// Test that service-reported error entries surface with their detail
#[tokio::test]
async fn test_init_propagates_error_entries() {
    let state = ConsoleState::new(
        200,
        json!({
            "sessionToken": "",
            "errors": [{
                "status": 401,
                "code": "INVALID_ARGUMENT",
                "title": "Invalid Argument",
                "detail": "invalid api key"
            }]
        }),
    );
    let console = spawn_console(state).await;

    let session = AvatarSession::new(config(&console));
    let err = session.init().await.expect_err("init must fail");
    match err {
        SdkError::TokenRejected(detail) => {
            assert_eq!(
                detail,
                "Error 401 (INVALID_ARGUMENT): Invalid Argument - invalid api key"
            );
        }
        other => panic!("expected TokenRejected, got {other:?}"),
    }
}

/// Test that a non-2xx status fails with the raw status
#[tokio::test]
async fn test_init_non_success_status() {
    let state = ConsoleState::new(500, json!({}));
    let console = spawn_console(state).await;

    let session = AvatarSession::new(config(&console));
    let err = session.init().await.expect_err("init must fail");
    match err {
        SdkError::TokenStatus(status) => assert_eq!(status, 500),
        other => panic!("expected TokenStatus, got {other:?}"),
    }
}

/// Test that a 2xx response with an empty token is rejected
#[tokio::test]
async fn test_init_empty_token() {
    let state = ConsoleState::new(200, json!({"sessionToken": ""}));
    let console = spawn_console(state).await;

    let session = AvatarSession::new(config(&console));
    let err = session.init().await.expect_err("init must fail");
    assert!(matches!(err, SdkError::EmptyToken), "got {err:?}");
}

/// Test that init can be called again to refresh the token
#[tokio::test]
async fn test_init_refresh_issues_new_request() {
    let state = ConsoleState::new(200, json!({"sessionToken": "tok-1"}));
    let console = spawn_console(state.clone()).await;

    let session = AvatarSession::new(config(&console));
    session.init().await.expect("first init");
    *state.response.lock().unwrap() = json!({"sessionToken": "tok-2"});
    session.init().await.expect("second init");

    assert_eq!(state.requests.load(Ordering::SeqCst), 2);
}

/// Test that configuration preconditions fail before any I/O
#[tokio::test]
async fn test_init_missing_config_makes_no_request() {
    let state = ConsoleState::new(200, json!({"sessionToken": "tok"}));
    let console = spawn_console(state.clone()).await;

    let session = AvatarSession::new(config(&console).with_api_key(""));
    let err = session.init().await.expect_err("init must fail");
    assert!(err.to_string().contains("missing API key"));
    assert_eq!(state.requests.load(Ordering::SeqCst), 0);
}
