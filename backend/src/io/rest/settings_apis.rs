use axum::{
    extract::State,
    response::{IntoResponse, Json},
};
use shared::UpdateSettingsRequest;
use tracing::info;

use super::admin_session::AdminSession;
use super::error::ApiError;
use super::extract::ApiJson;
use super::mappers::SettingsMapper;
use crate::AppState;

/// Get the catalog settings
pub async fn get_settings(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    info!("GET /api/settings");

    let settings = state.catalog_service.get_settings().await?;
    Ok(Json(SettingsMapper::to_dto(settings)))
}

/// Replace the category order and/or the price visibility
pub async fn update_settings(
    _admin: AdminSession,
    State(state): State<AppState>,
    ApiJson(request): ApiJson<UpdateSettingsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    info!("PUT /api/settings - request: {:?}", request);

    let settings = state
        .catalog_service
        .update_settings(SettingsMapper::to_command(request))
        .await?;
    Ok(Json(SettingsMapper::to_dto(settings)))
}
