//! # Storage Module
//!
//! Handles all data persistence for the catalog.
//!
//! The catalog service only sees [`CatalogStorage`]; which adapter sits behind
//! it is decided once at startup from configuration.
//!
//! ## Backends
//!
//! - **Document backends** keep the whole catalog as one JSON document and
//!   share the cache-aside logic in [`snapshot::SnapshotStorage`]:
//!   memory, a local JSON file, or a file in a GitHub repository.
//! - **SQL backends** (SQLite, PostgreSQL via SQLx) store one row per product
//!   and run every mutation in a single transaction.
//! - **MongoDB** stores one document per product.
//!
//! ## Uploaded images
//!
//! [`AssetStore`] stores product images; [`assets::LocalAssetStore`] writes
//! them to the upload directory.

pub mod assets;
pub mod connection;
pub mod file;
pub mod github;
pub mod memory;
pub mod mongo;
pub mod postgres;
pub mod snapshot;
pub mod sqlite;
pub mod traits;

pub use assets::LocalAssetStore;
pub use connection::connect_storage;
pub use memory::MemoryStorage;
pub use snapshot::SnapshotStorage;
pub use traits::{AssetStore, CatalogStorage, SnapshotBackend, StorageError};
