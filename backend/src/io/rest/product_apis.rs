//! # REST API for Products
//!
//! Public catalog reads plus the admin-only product management endpoints.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use shared::{CreateProductRequest, OkResponse, ReorderRequest, UpdateProductRequest};
use tracing::info;

use super::admin_session::AdminSession;
use super::error::ApiError;
use super::extract::{ApiJson, ApiPath, ApiQuery};
use super::mappers::{ProductMapper, SettingsMapper};
use super::product_payload::ProductPayload;
use crate::domain::commands::products::CatalogFilter;
use crate::AppState;

/// Query string of the catalog listing endpoints
#[derive(Debug, Default, Deserialize)]
pub struct CatalogQuery {
    pub q: Option<String>,
    pub category: Option<String>,
}

impl CatalogQuery {
    fn into_filter(self, active_only: bool) -> CatalogFilter {
        CatalogFilter {
            q: self.q,
            category: self.category,
            active_only,
        }
    }
}

/// Public catalog: active products plus settings
pub async fn get_catalog(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<CatalogQuery>,
) -> Result<impl IntoResponse, ApiError> {
    info!("GET /api/catalog - query: {:?}", query);

    let view = state.catalog_service.get_catalog(&query.into_filter(true)).await?;
    Ok(Json(SettingsMapper::to_catalog_dto(view)))
}

/// Get a product by ID
pub async fn get_product(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    info!("GET /api/products/{}", id);

    let product = state.catalog_service.get_by_id(id).await?;
    Ok(Json(ProductMapper::to_dto(product)))
}

/// All products, inactive ones included
pub async fn list_admin_products(
    _admin: AdminSession,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<CatalogQuery>,
) -> Result<impl IntoResponse, ApiError> {
    info!("GET /api/admin/products - query: {:?}", query);

    let products = state.catalog_service.get_all(&query.into_filter(false)).await?;
    Ok(Json(ProductMapper::to_dto_list(products)))
}

/// Create a new product
pub async fn create_product(
    _admin: AdminSession,
    State(state): State<AppState>,
    payload: ProductPayload<CreateProductRequest>,
) -> Result<impl IntoResponse, ApiError> {
    info!(
        "POST /api/products - request: {:?}, image: {}",
        payload.request,
        payload.image.is_some()
    );

    let command = ProductMapper::to_create_command(payload.request);
    let product = state.catalog_service.create(command, payload.image).await?;
    Ok((StatusCode::CREATED, Json(ProductMapper::to_dto(product))))
}

/// Partially update a product
pub async fn update_product(
    _admin: AdminSession,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    payload: ProductPayload<UpdateProductRequest>,
) -> Result<impl IntoResponse, ApiError> {
    info!(
        "PUT /api/products/{} - request: {:?}, image: {}",
        id,
        payload.request,
        payload.image.is_some()
    );

    let command = ProductMapper::to_update_command(payload.request);
    let product = state.catalog_service.update(id, command, payload.image).await?;
    Ok(Json(ProductMapper::to_dto(product)))
}

/// Delete a product
pub async fn delete_product(
    _admin: AdminSession,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    info!("DELETE /api/products/{}", id);

    state.catalog_service.remove(id).await?;
    Ok(Json(OkResponse { ok: true }))
}

/// Reorder products by id list
pub async fn reorder_products(
    _admin: AdminSession,
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ReorderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    info!("POST /api/products/reorder - request: {:?}", request);

    state.catalog_service.reorder(&request.into_ids()).await?;
    Ok(Json(OkResponse { ok: true }))
}
