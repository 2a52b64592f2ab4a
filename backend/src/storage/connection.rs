use std::sync::Arc;
use tracing::{error, info, warn};

use super::file::JsonFileBackend;
use super::github::GithubBackend;
use super::memory::MemoryStorage;
use super::mongo::MongoStorage;
use super::postgres::PostgresStorage;
use super::snapshot::SnapshotStorage;
use super::sqlite::SqliteStorage;
use super::traits::{CatalogStorage, StorageError};
use crate::config::{StorageConfig, StorageKind};

/// Build the configured backend without connecting to it
fn build_storage(config: &StorageConfig) -> Result<Arc<dyn CatalogStorage>, StorageError> {
    let missing = |what: &str| StorageError::Unavailable(format!("{} is not configured", what));

    let storage: Arc<dyn CatalogStorage> = match config.kind {
        StorageKind::Memory => Arc::new(MemoryStorage::in_memory()),
        StorageKind::File => Arc::new(SnapshotStorage::new(JsonFileBackend::new(&config.data_dir))),
        StorageKind::Sqlite => Arc::new(SqliteStorage::new(
            config.database_url.clone().ok_or_else(|| missing("DATABASE_URL"))?,
        )),
        StorageKind::Postgres => Arc::new(PostgresStorage::new(
            config.database_url.clone().ok_or_else(|| missing("DATABASE_URL"))?,
        )),
        StorageKind::Mongo => Arc::new(MongoStorage::new(
            config.database_url.clone().ok_or_else(|| missing("MONGO_URI"))?,
            config.mongo_database.clone(),
        )),
        StorageKind::Github => {
            let github = config.github.clone().ok_or_else(|| missing("GitHub storage"))?;
            Arc::new(SnapshotStorage::new(GithubBackend::new(github)?))
        }
    };

    Ok(storage)
}

/// Build and load the configured backend.
///
/// Never fails: when the configured backend cannot be built or loaded the
/// catalog runs from memory instead, and a warning says changes will be lost.
pub async fn connect_storage(config: &StorageConfig) -> Arc<dyn CatalogStorage> {
    let storage = match build_storage(config) {
        Ok(storage) => storage,
        Err(e) => {
            warn!(backend = %config.kind, error = %e, "Cannot set up catalog storage, using in-memory storage; changes will not persist");
            return in_memory_fallback().await;
        }
    };

    match storage.load().await {
        Ok(()) => {
            info!(backend = storage.backend_name(), "Catalog storage ready");
            storage
        }
        Err(e) => {
            warn!(backend = storage.backend_name(), error = %e, "Catalog storage unavailable, using in-memory storage; changes will not persist");
            in_memory_fallback().await
        }
    }
}

async fn in_memory_fallback() -> Arc<dyn CatalogStorage> {
    let memory = MemoryStorage::in_memory();
    if let Err(e) = memory.load().await {
        error!("In-memory catalog failed to initialize: {}", e);
    }
    Arc::new(memory)
}
