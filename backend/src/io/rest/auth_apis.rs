use axum::{
    extract::State,
    response::{IntoResponse, Json},
};
use shared::{HealthResponse, LoginRequest, LoginResponse};
use tracing::info;

use super::error::ApiError;
use super::extract::ApiJson;
use crate::AppState;

/// Exchange the admin password for a bearer token
pub async fn login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // never log the password itself
    info!("POST /api/login");

    let issued = state.auth_service.login(&request.password)?;
    Ok(Json(LoginResponse {
        ok: true,
        token: issued.token,
        expires_at: issued.expires_at.to_rfc3339(),
    }))
}

/// Liveness check reporting the storage backend in use
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        ok: true,
        storage: state.catalog_service.backend_name().to_string(),
    })
}
