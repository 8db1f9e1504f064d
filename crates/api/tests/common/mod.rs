#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use medassist_api::config::{AnalyzerMode, ServerConfig, StoreMode};
use medassist_api::router::build_app_router;
use medassist_api::state::AppState;
use medassist_db::{JobStore, MemoryJobStore};
use medassist_events::CompletionNotifier;
use tower::ServiceExt;

/// Build a test `ServerConfig` with safe defaults and the stub backends.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:8081".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        store: StoreMode::Memory,
        analyzer: AnalyzerMode::Stub,
        dispatch_interval_ms: 10,
    }
}

/// Everything a test needs to drive the app and inspect its collaborators.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryJobStore>,
    pub notifier: Arc<CompletionNotifier>,
}

/// Build the full application router (same middleware stack as
/// production) over a fresh in-memory store.
pub fn build_test_app() -> TestApp {
    let config = test_config();
    let store = Arc::new(MemoryJobStore::new());
    let notifier = Arc::new(CompletionNotifier::new());

    let state = AppState {
        store: Arc::clone(&store) as Arc<dyn JobStore>,
        config: Arc::new(config.clone()),
        notifier: Arc::clone(&notifier),
    };

    TestApp {
        router: build_app_router(state, &config),
        store,
        notifier,
    }
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
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
