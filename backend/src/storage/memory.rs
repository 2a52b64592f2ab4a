use async_trait::async_trait;

use super::snapshot::SnapshotStorage;
use super::traits::{SnapshotBackend, StorageError};
use crate::domain::models::catalog::CatalogSnapshot;

/// Keeps the catalog only in the snapshot cache; nothing survives a restart
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryBackend;

#[async_trait]
impl SnapshotBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn fetch(&self) -> Result<Option<CatalogSnapshot>, StorageError> {
        Ok(None)
    }

    async fn persist(&self, _snapshot: &CatalogSnapshot) -> Result<(), StorageError> {
        Ok(())
    }
}

pub type MemoryStorage = SnapshotStorage<MemoryBackend>;

impl SnapshotStorage<MemoryBackend> {
    pub fn in_memory() -> Self {
        Self::new(MemoryBackend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::traits::CatalogStorage;

    #[tokio::test]
    async fn test_memory_storage_starts_empty() {
        let storage = MemoryStorage::in_memory();
        storage.load().await.unwrap();

        assert_eq!(storage.backend_name(), "memory");
        assert!(storage.list_products().await.unwrap().is_empty());
        assert!(storage.get_settings().await.unwrap().show_prices);
    }
}
