//! Authentication endpoints and the bearer-token extractor

use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{header, request::Parts},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::{
    db::users,
    error::{ApiError, ApiResult},
    AppState,
};
use smogwatch_common::auth;

/// Authenticated caller, extracted from the Authorization header.
///
/// Any handler taking this as an argument rejects unauthenticated requests
/// with 401 before the handler body runs.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i64,
    pub username: String,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("missing Authorization header".to_string()))?;

        let token = header_value
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::Unauthorized("expected Bearer token".to_string()))?;

        let claims = auth::validate_token(token, &state.config.jwt_secret)
            .map_err(|e| ApiError::Unauthorized(e.to_string()))?;

        Ok(AuthUser {
            user_id: claims.sub,
            username: claims.username,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let user = users::find_by_username(&state.db, &request.username)
        .await?
        .filter(|u| auth::verify_password(&request.password, &u.password_hash))
        .ok_or_else(|| ApiError::Unauthorized("invalid username or password".to_string()))?;

    let access_token = auth::issue_token(
        user.id,
        &user.username,
        &state.config.jwt_secret,
        state.config.token_ttl_seconds,
    )?;

    tracing::info!(username = %user.username, "login succeeded");

    Ok(Json(LoginResponse {
        access_token,
        token_type: "bearer".to_string(),
    }))
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub id: i64,
    pub name: String,
    pub username: String,
}

/// GET /api/auth/me
pub async fn me(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<MeResponse>> {
    let record = users::find_by_id(&state.db, user.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("user {} not found", user.user_id)))?;

    Ok(Json(MeResponse {
        id: record.id,
        name: record.name,
        username: record.username,
    }))
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/me", get(me))
}
