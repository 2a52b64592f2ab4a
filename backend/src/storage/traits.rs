//! # Storage Traits
//!
//! This module defines the storage abstraction traits that allow different
//! storage backends to be used interchangeably in the domain layer.

use async_trait::async_trait;

use crate::domain::models::catalog::{CatalogSettings, CatalogSnapshot, SettingsChange};
use crate::domain::models::product::{DomainProduct, ProductDraft};
use crate::domain::models::upload::{StoredAsset, UploadedImage};

/// Errors raised by any storage backend
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Catalog storage has not been loaded")]
    NotLoaded,
    #[error("Storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("Conflicting concurrent update: {0}")]
    Conflict(String),
    #[error("Invalid asset identifier: {0}")]
    InvalidAsset(String),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),
    #[error("Document encoding error: {0}")]
    Encoding(#[from] mongodb::bson::ser::Error),
}

impl From<reqwest::Error> for StorageError {
    fn from(error: reqwest::Error) -> Self {
        StorageError::Unavailable(error.to_string())
    }
}

/// Trait defining the interface for catalog storage operations
///
/// This trait abstracts away the specific storage implementation details,
/// allowing the catalog service to work with a JSON document, a GitHub
/// repository or an SQL database without modification.
#[async_trait]
pub trait CatalogStorage: Send + Sync {
    /// Static label for logs and the health endpoint
    fn backend_name(&self) -> &'static str;

    /// Connect to / read the backend. Must succeed before any other call.
    async fn load(&self) -> Result<(), StorageError>;

    /// All products, in no particular order
    async fn list_products(&self) -> Result<Vec<DomainProduct>, StorageError>;

    /// Retrieve a specific product by id
    async fn get_product(&self, id: i64) -> Result<Option<DomainProduct>, StorageError>;

    /// Persist a new product.
    ///
    /// In one atomic step the backend assigns the id, places the product after
    /// the current highest sort order, and appends its category to the
    /// settings if unseen. Concurrent inserts never share a position.
    async fn insert_product(&self, draft: ProductDraft) -> Result<DomainProduct, StorageError>;

    /// Overwrite an existing product and register its category, atomically.
    /// The stored sort order and creation time are kept.
    /// Returns the stored product, or `None` if no product has that id
    async fn update_product(
        &self,
        product: &DomainProduct,
    ) -> Result<Option<DomainProduct>, StorageError>;

    /// Delete a single product
    /// Returns true if the product was found and deleted, false otherwise
    async fn delete_product(&self, id: i64) -> Result<bool, StorageError>;

    /// Apply `(id, sort_order)` assignments atomically
    async fn reorder(&self, assignments: &[(i64, i64)]) -> Result<(), StorageError>;

    async fn get_settings(&self) -> Result<CatalogSettings, StorageError>;

    /// Apply `change` to the stored settings and return the result
    async fn update_settings(&self, change: SettingsChange) -> Result<CatalogSettings, StorageError>;
}

/// A place the whole catalog document can be read from and written to
///
/// Implementations only move bytes; caching and serialization of writers
/// are handled by [`super::snapshot::SnapshotStorage`].
#[async_trait]
pub trait SnapshotBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Read the current document. `None` means it has never been written.
    async fn fetch(&self) -> Result<Option<CatalogSnapshot>, StorageError>;

    /// Durably write the whole document
    async fn persist(&self, snapshot: &CatalogSnapshot) -> Result<(), StorageError>;
}

/// Storage for uploaded product images
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Store the image and return where it can be fetched from
    async fn store(&self, image: &UploadedImage) -> Result<StoredAsset, StorageError>;

    /// Delete a stored image. Deleting something already gone succeeds.
    async fn delete(&self, public_id: &str) -> Result<(), StorageError>;
}
