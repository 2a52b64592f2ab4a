//! Serving of the single-page storefront and uploaded images.

use axum::extract::Request;
use axum::http::header::CACHE_CONTROL;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::path::Path;
use tower_http::services::{ServeDir, ServeFile};

use super::error::ApiError;

/// Files from the public directory, falling back to `index.html` for client-side routes
pub fn spa_service(public_dir: &Path) -> ServeDir<ServeFile> {
    ServeDir::new(public_dir).fallback(ServeFile::new(public_dir.join("index.html")))
}

/// `/` and `/index.html` are never cached
pub async fn no_store_entry_page(req: Request, next: Next) -> Response {
    let is_entry_page = matches!(req.uri().path(), "/" | "/index.html");
    let mut response = next.run(req).await;
    if is_entry_page {
        response
            .headers_mut()
            .insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    }
    response
}

/// Unknown `/api` paths answer in the API error format instead of with the SPA
pub async fn api_not_found() -> Response {
    ApiError::NotFound("Not found".to_string()).into_response()
}
