#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header::CONTENT_TYPE, Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use gaswatch_api::config::ServerConfig;
use gaswatch_api::engine::Monitor;
use gaswatch_api::router::build_app_router;
use gaswatch_api::state::AppState;
use gaswatch_api::ws::WsManager;
use gaswatch_events::EventBus;

/// Build a test `ServerConfig` with safe defaults.
///
/// Allows any CORS origin (matching the default) and uses a 30-second
/// request timeout.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["*".to_string()],
        request_timeout_secs: 30,
        snapshot_path: PathBuf::from("data.json"),
        snapshot_interval_secs: 300,
        history_capacity: 100,
        replica: None,
    }
}

/// Fresh in-memory application state.
pub fn test_state() -> AppState {
    let config = test_config();
    let event_bus = Arc::new(EventBus::default());
    let monitor = Arc::new(Monitor::new(
        Arc::clone(&event_bus),
        config.history_capacity,
    ));

    AppState {
        config: Arc::new(config),
        monitor,
        ws_manager: Arc::new(WsManager::new()),
        event_bus,
    }
}

/// Build the full application router with all middleware layers over
/// `state`.
///
/// Uses the same builder as `main.rs` so integration tests exercise the
/// production middleware stack (CORS, request ID, timeout, tracing, panic
/// recovery).
pub fn build_test_app(state: &AppState) -> Router {
    build_app_router(state.clone(), &test_config())
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Register a device through the HTTP surface.
pub async fn register(state: &AppState, device_id: &str) {
    let response = post_json(
        build_test_app(state),
        "/api/devices/register",
        serde_json::json!({"deviceId": device_id, "type": "MQ-2", "ipAddress": "10.0.0.7"}),
    )
    .await;
    assert_eq!(response.status(), axum::http::StatusCode::CREATED);
}
