//! Route definitions for the `/analyses` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::analyses;
use crate::state::AppState;

/// Routes mounted at `/analyses`.
///
/// ```text
/// GET    /                -> list_analyses
/// POST   /                -> create_analysis
/// GET    /{id}            -> get_analysis
/// GET    /{id}/results    -> get_results
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(analyses::list_analyses).post(analyses::create_analysis))
        .route("/{id}", get(analyses::get_analysis))
        .route("/{id}/results", get(analyses::get_results))
}
