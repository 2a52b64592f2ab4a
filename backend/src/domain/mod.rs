//! # Domain Module
//!
//! Contains all business logic of the product catalog.
//!
//! The domain works only against the storage traits, so the same rules apply
//! whether the catalog lives in memory, a JSON file, a GitHub repository or an
//! SQL database.
//!
//! ## Module Organization
//!
//! - **catalog_service**: product CRUD, filtering, reordering and settings
//! - **auth_service**: admin password check and JWT issuing/verification
//! - **price**: lenient parsing of prices typed into the admin form
//! - **commands**: input types the REST layer maps requests into
//! - **models**: products, settings, the catalog snapshot and uploads
//!
//! ## Business Rules
//!
//! - Every product has a trimmed, non-empty name of at most 120 characters
//! - New products are appended after the current last position
//! - Reordering yields positions 1..n with no gaps or duplicates
//! - A category used by a product is added to the settings list if unseen
//! - Uploaded images are removed when the write that needed them fails,
//!   when they are replaced, and when their product is deleted

pub mod auth_service;
pub mod catalog_service;
pub mod commands;
pub mod models;
pub mod price;

pub use auth_service::{AuthError, AuthService};
pub use catalog_service::{CatalogError, CatalogService};
