//! Account endpoints
//!
//! - `POST /api/v1/auth/register`
//! - `POST /api/v1/auth/login`
//! - `GET /api/v1/auth/me`
//! - `DELETE /api/v1/auth/me`

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use super::identity::UserId;
use crate::models::{Account, Credential, LoginRequest, NewAccount};
use crate::services::Registration;
use crate::{ApiError, ApiResult, AppState};

/// POST /api/v1/auth/register
///
/// Optional `trial_data` is imported into the new account in the same
/// transaction. 409 when the email is taken.
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<NewAccount>,
) -> ApiResult<(StatusCode, Json<Registration>)> {
    let registration = state.account_service().register(&request).await?;
    Ok((StatusCode::CREATED, Json(registration)))
}

/// POST /api/v1/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Json<Account>> {
    let credential = Credential::try_from(request).map_err(ApiError::BadRequest)?;

    state
        .account_service()
        .authenticate(&credential)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::Unauthorized("invalid credentials".to_string()))
}

/// GET /api/v1/auth/me
pub async fn current_account(
    State(state): State<AppState>,
    UserId(user_id): UserId,
) -> ApiResult<Json<Account>> {
    Ok(Json(state.account_service().load(&user_id).await?))
}

/// DELETE /api/v1/auth/me
pub async fn delete_current_account(
    State(state): State<AppState>,
    UserId(user_id): UserId,
) -> ApiResult<StatusCode> {
    state.account_service().delete(&user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/auth/register", post(register))
        .route("/api/v1/auth/login", post(login))
        .route(
            "/api/v1/auth/me",
            get(current_account).delete(delete_current_account),
        )
}
