//! Progress endpoints
//!
//! - `POST /api/v1/progress/sync`
//! - `GET /api/v1/progress/review?limit=N`
//! - `GET /api/v1/progress/summary`

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use super::identity::UserId;
use crate::models::{DueWord, ProgressPayload, ProgressSummary, SyncBatch, SyncOutcome};
use crate::services::progress_summary;
use crate::{ApiResult, AppState};

/// POST /api/v1/progress/sync
///
/// **Request:** `{"words": [...], "sessions": [...], "stats": {...}}`
/// **Response:** `{"updated_words", "conflicts", "skipped", "sync_timestamp"}`
///
/// Invalid entries are listed in `skipped`; they never fail the request.
pub async fn sync_progress(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Json(payload): Json<ProgressPayload>,
) -> ApiResult<Json<SyncOutcome>> {
    let batch = SyncBatch::from_payload(&payload);
    let outcome = state.merge_engine().sync(&user_id, &batch).await?;
    Ok(Json(outcome))
}

#[derive(Debug, Deserialize)]
pub struct ReviewQuery {
    pub limit: Option<u32>,
}

/// GET /api/v1/progress/review
pub async fn review_words(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Query(query): Query<ReviewQuery>,
) -> ApiResult<Json<Vec<DueWord>>> {
    let words = state
        .review_selector()
        .due_words(&user_id, query.limit)
        .await?;
    Ok(Json(words))
}

/// GET /api/v1/progress/summary
pub async fn summary(
    State(state): State<AppState>,
    UserId(user_id): UserId,
) -> ApiResult<Json<ProgressSummary>> {
    let summary = progress_summary::progress_summary(&state.db, &user_id).await?;
    Ok(Json(summary))
}

pub fn progress_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/progress/sync", post(sync_progress))
        .route("/api/v1/progress/review", get(review_words))
        .route("/api/v1/progress/summary", get(summary))
}
