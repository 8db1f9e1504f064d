pub mod analyses;
pub mod health;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /ws?owner_id=...                 WebSocket, joined to the owner's room
///
/// /analyses                        list (?owner_id), create
/// /analyses/{id}                   read-one status snapshot
/// /analyses/{id}/results           result records
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .nest("/analyses", analyses::router())
}
