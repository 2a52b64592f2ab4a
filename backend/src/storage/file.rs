use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::traits::{SnapshotBackend, StorageError};
use crate::domain::models::catalog::CatalogSnapshot;

const CATALOG_FILE_NAME: &str = "catalog.json";

/// Catalog document kept as pretty-printed JSON in the data directory
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            path: data_dir.as_ref().join(CATALOG_FILE_NAME),
        }
    }

    fn temp_path(&self) -> PathBuf {
        self.path.with_extension("json.tmp")
    }
}

#[async_trait]
impl SnapshotBackend for JsonFileBackend {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn fetch(&self) -> Result<Option<CatalogSnapshot>, StorageError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Catalog file {:?} does not exist yet", self.path);
                return Ok(None);
            }
            Err(e) => {
                return Err(StorageError::Unavailable(format!(
                    "cannot read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        if raw.trim().is_empty() {
            return Ok(None);
        }

        let snapshot = serde_json::from_str(&raw).map_err(|e| {
            StorageError::Unavailable(format!("{} is not a valid catalog: {}", self.path.display(), e))
        })?;
        Ok(Some(snapshot))
    }

    async fn persist(&self, snapshot: &CatalogSnapshot) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_vec_pretty(snapshot)?;

        // Write to a sibling first so readers never see a half-written file
        let temp_path = self.temp_path();
        tokio::fs::write(&temp_path, json).await?;
        tokio::fs::rename(&temp_path, &self.path).await?;

        debug!("Catalog written to {:?}", self.path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::snapshot::SnapshotStorage;
    use crate::domain::models::catalog::SettingsChange;
    use crate::storage::traits::CatalogStorage;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_is_initialized() {
        let temp_dir = TempDir::new().unwrap();
        let data_dir = temp_dir.path().join("data");
        let storage = SnapshotStorage::new(JsonFileBackend::new(&data_dir));

        storage.load().await.unwrap();

        let raw = std::fs::read_to_string(data_dir.join("catalog.json")).unwrap();
        let written: CatalogSnapshot = serde_json::from_str(&raw).unwrap();
        assert_eq!(written, CatalogSnapshot::default());
        assert!(!data_dir.join("catalog.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_settings_survive_reload() {
        let temp_dir = TempDir::new().unwrap();

        let storage = SnapshotStorage::new(JsonFileBackend::new(temp_dir.path()));
        storage.load().await.unwrap();
        let settings = storage
            .update_settings(SettingsChange {
                categories_order: Some(vec!["Drinks".to_string()]),
                show_prices: Some(false),
            })
            .await
            .unwrap();
        assert_eq!(settings.categories_order, vec!["Drinks"]);

        let reopened = SnapshotStorage::new(JsonFileBackend::new(temp_dir.path()));
        reopened.load().await.unwrap();
        assert_eq!(reopened.get_settings().await.unwrap(), settings);
    }

    #[tokio::test]
    async fn test_unparseable_file_is_an_error_and_left_alone() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("catalog.json");
        std::fs::write(&path, "{ not json").unwrap();

        let storage = SnapshotStorage::new(JsonFileBackend::new(temp_dir.path()));
        let result = storage.load().await;

        assert!(matches!(result, Err(StorageError::Unavailable(_))));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ not json");
    }

    #[tokio::test]
    async fn test_partial_document_is_accepted() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join("catalog.json"),
            r#"{ "products": [ { "id": 3, "name": "Soda", "sortOrder": 1 } ] }"#,
        )
        .unwrap();

        let storage = SnapshotStorage::new(JsonFileBackend::new(temp_dir.path()));
        storage.load().await.unwrap();

        let products = storage.list_products().await.unwrap();
        assert_eq!(products.len(), 1);
        assert!(products[0].active);
        assert!(storage.get_settings().await.unwrap().show_prices);
    }
}
