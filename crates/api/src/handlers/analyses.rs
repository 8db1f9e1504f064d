//! Handlers for the `/analyses` resource.
//!
//! The status read endpoint is what status gates poll; the write side of the
//! lifecycle belongs to the dispatcher, so there is no client-facing status
//! update route.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use medassist_core::analysis::NewAnalysis;
use medassist_core::error::CoreError;
use medassist_db::models::analysis::Page;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Query parameters for `GET /api/v1/analyses`.
#[derive(Debug, Deserialize)]
pub struct AnalysisListQuery {
    pub owner_id: Option<String>,
    /// Maximum number of results. Defaults to 50, capped at 100.
    pub limit: Option<i64>,
    /// Number of results to skip. Defaults to 0.
    pub offset: Option<i64>,
}

fn not_found(id: String) -> AppError {
    AppError::Core(CoreError::NotFound {
        entity: "Analysis",
        id,
    })
}

/// POST /api/v1/analyses
///
/// Submit a clinical case. Returns 201 with the created job in `pending`
/// state; the dispatcher picks it up from there.
pub async fn create_analysis(
    State(state): State<AppState>,
    Json(input): Json<NewAnalysis>,
) -> AppResult<impl IntoResponse> {
    let analysis = state.store.create(&input).await?;

    tracing::info!(
        job_id = %analysis.id,
        owner_id = %analysis.owner_id,
        "Analysis submitted",
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: analysis })))
}

/// GET /api/v1/analyses?owner_id=...
pub async fn list_analyses(
    State(state): State<AppState>,
    Query(params): Query<AnalysisListQuery>,
) -> AppResult<impl IntoResponse> {
    let owner_id = params
        .owner_id
        .filter(|o| !o.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("owner_id query parameter is required".into()))?;

    let analyses = state
        .store
        .list_by_owner(&owner_id, Page::new(params.limit, params.offset))
        .await?;

    Ok(Json(DataResponse { data: analyses }))
}

/// GET /api/v1/analyses/{id}
///
/// Read-one status snapshot: `{id, status, result_count,
/// aggregate_confidence, title, owner_id}`.
pub async fn get_analysis(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let snapshot = state
        .store
        .snapshot(&id)
        .await?
        .ok_or_else(|| not_found(id))?;
    Ok(Json(DataResponse { data: snapshot }))
}

/// GET /api/v1/analyses/{id}/results
pub async fn get_results(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    if state.store.find(&id).await?.is_none() {
        return Err(not_found(id));
    }
    let results = state.store.results(&id).await?;
    Ok(Json(DataResponse { data: results }))
}
