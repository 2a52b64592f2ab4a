//! # REST API Interface Layer
//!
//! Provides the HTTP endpoints of the catalog.
//! This layer handles:
//! - JSON and multipart request decoding
//! - admin authentication via bearer tokens
//! - translation of domain errors into status codes and `{"error"}` bodies
//! - static serving of the storefront and uploaded images
//!
//! Handlers contain no business logic: they map DTOs from the `shared` crate
//! into domain commands, call the catalog service and map the result back.

pub mod admin_session;
pub mod auth_apis;
pub mod error;
pub mod extract;
pub mod mappers;
pub mod product_apis;
pub mod product_payload;
pub mod settings_apis;
pub mod static_files;

pub use admin_session::AdminSession;
pub use error::ApiError;
