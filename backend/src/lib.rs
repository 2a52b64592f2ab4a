//! # Catalog Backend
//!
//! HTTP backend of a product catalog: a public storefront API, an
//! authenticated admin API and static serving of the storefront build.
//!
//! ## Architecture
//!
//! The backend follows a layered architecture:
//! ```text
//! IO Layer (REST handlers, extractors, error mapping)
//!     ↓
//! Domain Layer (catalog and auth services)
//!     ↓
//! Storage Layer (memory / JSON file / GitHub / SQLite / PostgreSQL / MongoDB, uploaded images)
//! ```
//!
//! ## Key Responsibilities
//!
//! - Initialize and configure the application state
//! - Set up the router with CORS, tracing and static file serving
//! - Fall back to in-memory storage when the configured backend is unavailable

pub mod config;
pub mod domain;
pub mod io;
pub mod storage;

use anyhow::Result;
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::domain::{AuthService, CatalogService};
use crate::io::rest::{auth_apis, product_apis, settings_apis, static_files};
use crate::storage::{connect_storage, LocalAssetStore};

/// Room for the non-file form fields and multipart framing
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Main application state that holds all services
#[derive(Clone)]
pub struct AppState {
    pub catalog_service: CatalogService,
    pub auth_service: AuthService,
}

/// Initialize the backend with all required services
pub async fn initialize_backend(config: &AppConfig) -> Result<AppState> {
    info!("Setting up storage ({})", config.storage.kind);
    let storage = connect_storage(&config.storage).await;

    tokio::fs::create_dir_all(&config.upload_dir).await?;
    let assets = Arc::new(LocalAssetStore::new(&config.upload_dir, "/uploads"));

    info!("Setting up domain model");
    let catalog_service =
        CatalogService::new(storage, assets).with_max_image_bytes(config.max_upload_bytes);
    let auth_service = AuthService::new(
        config.admin_password.clone(),
        &config.jwt_secret,
        config.jwt_expiration_minutes,
    );

    if config.seed_on_empty {
        catalog_service.seed_if_empty().await?;
    }

    info!("Setting up application state");
    Ok(AppState {
        catalog_service,
        auth_service,
    })
}

/// Create the Axum router with all routes configured
pub fn create_router(app_state: AppState, config: &AppConfig) -> Router {
    let api_routes = Router::new()
        .route("/login", post(auth_apis::login))
        .route("/catalog", get(product_apis::get_catalog))
        .route(
            "/settings",
            get(settings_apis::get_settings).put(settings_apis::update_settings),
        )
        .route("/admin/products", get(product_apis::list_admin_products))
        .route("/products", post(product_apis::create_product))
        .route("/products/reorder", post(product_apis::reorder_products))
        .route(
            "/products/:id",
            get(product_apis::get_product)
                .put(product_apis::update_product)
                .delete(product_apis::delete_product),
        )
        .fallback(static_files::api_not_found)
        .layer(DefaultBodyLimit::max(config.max_upload_bytes + FORM_OVERHEAD_BYTES));

    Router::new()
        .route("/healthz", get(auth_apis::health))
        .nest("/api", api_routes)
        .nest_service("/uploads", ServeDir::new(&config.upload_dir))
        .fallback_service(static_files::spa_service(&config.public_dir))
        .layer(middleware::from_fn(static_files::no_store_entry_page))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors(config.cors_origin.as_deref()))
        .with_state(app_state)
}

fn build_cors(origin: Option<&str>) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    match origin.map(str::parse::<HeaderValue>) {
        Some(Ok(origin)) => cors.allow_origin(origin),
        Some(Err(_)) => {
            warn!("CORS_ORIGIN is not a valid header value, allowing any origin");
            cors.allow_origin(Any)
        }
        None => cors.allow_origin(Any),
    }
}
