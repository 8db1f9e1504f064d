//! Tests for the HTTP status source against a small local server.

use std::net::SocketAddr;

use assert_matches::assert_matches;
use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use medassist_client::{HttpStatusSource, SourceError, StatusSource};
use medassist_core::status::JobStatus;
use serde_json::json;

async fn analysis(Path(id): Path<String>) -> axum::response::Response {
    match id.as_str() {
        "missing" => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Analysis with id missing not found", "code": "NOT_FOUND" })),
        )
            .into_response(),
        "garbled" => (StatusCode::OK, "<html>maintenance</html>").into_response(),
        _ => Json(json!({
            "data": {
                "id": id,
                "status": "completed",
                "result_count": 7,
                "aggregate_confidence": 0.83,
                "title": "Chest pain",
                "owner_id": "doc-7"
            }
        }))
        .into_response(),
    }
}

async fn serve() -> SocketAddr {
    let app = Router::new().route("/api/v1/analyses/{id}", get(analysis));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

// ---------------------------------------------------------------------------
// Test: the data envelope is unwrapped into a snapshot
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fetch_parses_snapshot() {
    let addr = serve().await;
    let source = HttpStatusSource::new(format!("http://{addr}/")).unwrap();

    let snapshot = source.fetch("A1").await.unwrap();
    assert_eq!(snapshot.id, "A1");
    assert_eq!(snapshot.status, JobStatus::Completed);
    assert_eq!(snapshot.result_count, 7);
    assert_eq!(snapshot.aggregate_confidence, Some(0.83));
}

// ---------------------------------------------------------------------------
// Test: non-2xx and malformed bodies map to distinct errors
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fetch_reports_status_and_decode_errors() {
    let addr = serve().await;
    let source = HttpStatusSource::new(format!("http://{addr}")).unwrap();

    assert_matches!(
        source.fetch("missing").await,
        Err(SourceError::Status { status: 404 })
    );
    assert_matches!(source.fetch("garbled").await, Err(SourceError::Decode(_)));
}

// ---------------------------------------------------------------------------
// Test: an unreachable server is a transport error
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fetch_reports_transport_errors() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let source = HttpStatusSource::new(format!("http://{addr}")).unwrap();
    assert_matches!(source.fetch("A1").await, Err(SourceError::Transport(_)));
}
