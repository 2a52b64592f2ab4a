//! Cache-aside storage for backends that keep the catalog as one document.
//!
//! The whole catalog is cached in memory after `load()`. Every mutation works
//! on a clone of the cached snapshot, persists it through the backend, and
//! only swaps the cache once the write went through. Writers are serialized by
//! a mutex so two requests in this process never interleave their
//! read-modify-write cycles.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use super::traits::{CatalogStorage, SnapshotBackend, StorageError};
use crate::domain::models::catalog::{CatalogSettings, CatalogSnapshot, SettingsChange};
use crate::domain::models::product::{DomainProduct, ProductDraft};

pub struct SnapshotStorage<B> {
    backend: B,
    cache: RwLock<Option<CatalogSnapshot>>,
    write_lock: Mutex<()>,
}

impl<B: SnapshotBackend> SnapshotStorage<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            cache: RwLock::new(None),
            write_lock: Mutex::new(()),
        }
    }

    async fn snapshot(&self) -> Result<CatalogSnapshot, StorageError> {
        self.cache.read().await.clone().ok_or(StorageError::NotLoaded)
    }

    /// Run `change` against a copy of the cached snapshot and persist the result.
    ///
    /// `change` returns `None` when there is nothing to write; the backend is
    /// not touched in that case.
    async fn mutate<T, F>(&self, change: F) -> Result<Option<T>, StorageError>
    where
        F: FnOnce(&mut CatalogSnapshot) -> Option<T> + Send,
        T: Send,
    {
        let _guard = self.write_lock.lock().await;
        let mut next = self.snapshot().await?;

        let Some(outcome) = change(&mut next) else {
            return Ok(None);
        };

        if let Err(e) = self.backend.persist(&next).await {
            warn!(
                backend = self.backend.name(),
                error = %e,
                "Catalog write failed, keeping the previous snapshot"
            );
            return Err(e);
        }

        *self.cache.write().await = Some(next);
        Ok(Some(outcome))
    }
}

#[async_trait]
impl<B: SnapshotBackend> CatalogStorage for SnapshotStorage<B> {
    fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    async fn load(&self) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;

        let snapshot = match self.backend.fetch().await? {
            Some(snapshot) => snapshot,
            None => {
                info!(backend = self.backend.name(), "No catalog found, writing an empty one");
                let empty = CatalogSnapshot::default();
                self.backend.persist(&empty).await?;
                empty
            }
        };

        info!(
            backend = self.backend.name(),
            products = snapshot.products.len(),
            "Catalog loaded"
        );
        *self.cache.write().await = Some(snapshot);
        Ok(())
    }

    async fn list_products(&self) -> Result<Vec<DomainProduct>, StorageError> {
        let cache = self.cache.read().await;
        let snapshot = cache.as_ref().ok_or(StorageError::NotLoaded)?;
        Ok(snapshot.products.clone())
    }

    async fn get_product(&self, id: i64) -> Result<Option<DomainProduct>, StorageError> {
        let cache = self.cache.read().await;
        let snapshot = cache.as_ref().ok_or(StorageError::NotLoaded)?;
        Ok(snapshot.products.iter().find(|product| product.id == id).cloned())
    }

    async fn insert_product(&self, draft: ProductDraft) -> Result<DomainProduct, StorageError> {
        let inserted = self.mutate(move |snapshot| Some(snapshot.insert(draft))).await?;
        inserted.ok_or_else(|| StorageError::Unavailable("insert produced no product".to_string()))
    }

    async fn update_product(
        &self,
        product: &DomainProduct,
    ) -> Result<Option<DomainProduct>, StorageError> {
        let product = product.clone();
        self.mutate(move |snapshot| snapshot.replace(&product)).await
    }

    async fn delete_product(&self, id: i64) -> Result<bool, StorageError> {
        let deleted = self
            .mutate(move |snapshot| {
                let before = snapshot.products.len();
                snapshot.products.retain(|product| product.id != id);
                (snapshot.products.len() != before).then_some(())
            })
            .await?;

        Ok(deleted.is_some())
    }

    async fn reorder(&self, assignments: &[(i64, i64)]) -> Result<(), StorageError> {
        if assignments.is_empty() {
            return Ok(());
        }

        let positions: HashMap<i64, i64> = assignments.iter().copied().collect();
        self.mutate(move |snapshot| {
            for product in snapshot.products.iter_mut() {
                if let Some(sort_order) = positions.get(&product.id) {
                    product.sort_order = *sort_order;
                }
            }
            Some(())
        })
        .await?;

        Ok(())
    }

    async fn get_settings(&self) -> Result<CatalogSettings, StorageError> {
        let cache = self.cache.read().await;
        let snapshot = cache.as_ref().ok_or(StorageError::NotLoaded)?;
        Ok(snapshot.settings.clone())
    }

    async fn update_settings(&self, change: SettingsChange) -> Result<CatalogSettings, StorageError> {
        if change.is_empty() {
            return self.get_settings().await;
        }

        let updated = self
            .mutate(move |snapshot| {
                snapshot.settings.apply(change);
                Some(snapshot.settings.clone())
            })
            .await?;

        updated.ok_or_else(|| StorageError::Unavailable("settings update produced nothing".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Backend whose writes can be switched off, counting every write attempt
    #[derive(Default)]
    struct FlakyBackend {
        fail_writes: AtomicBool,
        writes: AtomicUsize,
        stored: std::sync::Mutex<Option<CatalogSnapshot>>,
    }

    #[async_trait]
    impl SnapshotBackend for Arc<FlakyBackend> {
        fn name(&self) -> &'static str {
            "flaky"
        }

        async fn fetch(&self) -> Result<Option<CatalogSnapshot>, StorageError> {
            Ok(self.stored.lock().unwrap().clone())
        }

        async fn persist(&self, snapshot: &CatalogSnapshot) -> Result<(), StorageError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(StorageError::Unavailable("disk on fire".to_string()));
            }
            *self.stored.lock().unwrap() = Some(snapshot.clone());
            Ok(())
        }
    }

    fn draft(name: &str, category: Option<&str>) -> ProductDraft {
        let now = Utc::now();
        ProductDraft {
            name: name.to_string(),
            description: None,
            category: category.map(str::to_string),
            codes: None,
            flavors: None,
            price_uv: None,
            price_up: None,
            price_fv: None,
            price_fp: None,
            image_url: None,
            image_public_id: None,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    async fn setup_test() -> (SnapshotStorage<Arc<FlakyBackend>>, Arc<FlakyBackend>) {
        let backend = Arc::new(FlakyBackend::default());
        let storage = SnapshotStorage::new(backend.clone());
        storage.load().await.unwrap();
        (storage, backend)
    }

    #[tokio::test]
    async fn test_reads_before_load_fail() {
        let storage = SnapshotStorage::new(Arc::new(FlakyBackend::default()));

        assert!(matches!(storage.list_products().await, Err(StorageError::NotLoaded)));
        assert!(matches!(storage.get_product(1).await, Err(StorageError::NotLoaded)));
        assert!(matches!(
            storage.insert_product(draft("Soda", None)).await,
            Err(StorageError::NotLoaded)
        ));
    }

    #[tokio::test]
    async fn test_load_writes_initial_document_when_missing() {
        let (storage, backend) = setup_test().await;

        assert_eq!(backend.writes.load(Ordering::SeqCst), 1);
        assert_eq!(backend.stored.lock().unwrap().clone(), Some(CatalogSnapshot::default()));
        assert!(storage.list_products().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_insert_assigns_ids_positions_and_categories() {
        let (storage, backend) = setup_test().await;

        let first = storage.insert_product(draft("Soda", Some("Drinks"))).await.unwrap();
        let second = storage.insert_product(draft("Chips", Some("Snacks"))).await.unwrap();

        assert_eq!((first.id, first.sort_order), (1, 1));
        assert_eq!((second.id, second.sort_order), (2, 2));
        let stored = backend.stored.lock().unwrap().clone().unwrap();
        assert_eq!(stored.products.len(), 2);
        assert_eq!(stored.settings.categories_order, vec!["Drinks", "Snacks"]);
        assert_eq!(storage.get_product(2).await.unwrap(), Some(second));
    }

    #[tokio::test]
    async fn test_failed_write_keeps_previous_snapshot() {
        let (storage, backend) = setup_test().await;
        let soda = storage.insert_product(draft("Soda", None)).await.unwrap();

        backend.fail_writes.store(true, Ordering::SeqCst);

        let result = storage.insert_product(draft("Chips", Some("Snacks"))).await;
        assert!(matches!(result, Err(StorageError::Unavailable(_))));

        let mut renamed = soda.clone();
        renamed.name = "Cola".to_string();
        assert!(storage.update_product(&renamed).await.is_err());
        assert!(storage.delete_product(soda.id).await.is_err());
        let change = SettingsChange {
            show_prices: Some(false),
            ..Default::default()
        };
        assert!(storage.update_settings(change).await.is_err());

        assert_eq!(storage.list_products().await.unwrap(), vec![soda]);
        assert_eq!(storage.get_settings().await.unwrap(), CatalogSettings::default());
    }

    #[tokio::test]
    async fn test_missing_ids_do_not_write() {
        let (storage, backend) = setup_test().await;
        let writes_before = backend.writes.load(Ordering::SeqCst);

        let ghost = draft("Ghost", None).into_product(42, 1);

        assert_eq!(storage.update_product(&ghost).await.unwrap(), None);
        assert!(!storage.delete_product(42).await.unwrap());
        storage.reorder(&[]).await.unwrap();
        storage.update_settings(SettingsChange::default()).await.unwrap();
        assert_eq!(backend.writes.load(Ordering::SeqCst), writes_before);
    }

    #[tokio::test]
    async fn test_update_keeps_position_set_by_reorder() {
        let (storage, _backend) = setup_test().await;
        let soda = storage.insert_product(draft("Soda", None)).await.unwrap();
        storage.insert_product(draft("Chips", None)).await.unwrap();
        storage.reorder(&[(2, 1), (1, 2)]).await.unwrap();

        // `soda` still carries the position it had before the reorder
        let mut renamed = soda.clone();
        renamed.name = "Cola".to_string();
        renamed.category = Some("Drinks".to_string());
        let stored = storage.update_product(&renamed).await.unwrap().unwrap();

        assert_eq!(stored.name, "Cola");
        assert_eq!(stored.sort_order, 2);
        assert_eq!(storage.get_settings().await.unwrap().categories_order, vec!["Drinks"]);
    }

    #[tokio::test]
    async fn test_reorder_applies_assignments() {
        let (storage, _backend) = setup_test().await;
        storage.insert_product(draft("A", None)).await.unwrap();
        storage.insert_product(draft("B", None)).await.unwrap();

        storage.reorder(&[(2, 1), (1, 2)]).await.unwrap();

        assert_eq!(storage.get_product(1).await.unwrap().unwrap().sort_order, 2);
        assert_eq!(storage.get_product(2).await.unwrap().unwrap().sort_order, 1);
    }

    #[tokio::test]
    async fn test_load_reads_existing_document() {
        let backend = Arc::new(FlakyBackend::default());
        let mut existing = CatalogSnapshot::default();
        existing.products.push(draft("Soda", None).into_product(5, 3));
        *backend.stored.lock().unwrap() = Some(existing);

        let storage = SnapshotStorage::new(backend.clone());
        storage.load().await.unwrap();

        assert_eq!(backend.writes.load(Ordering::SeqCst), 0);
        let inserted = storage.insert_product(draft("Chips", None)).await.unwrap();
        assert_eq!((inserted.id, inserted.sort_order), (6, 4));
    }

    /// Backend that takes a while to persist, so concurrent writers overlap
    #[derive(Default)]
    struct SlowBackend;

    #[async_trait]
    impl SnapshotBackend for SlowBackend {
        fn name(&self) -> &'static str {
            "slow"
        }

        async fn fetch(&self) -> Result<Option<CatalogSnapshot>, StorageError> {
            Ok(Some(CatalogSnapshot::default()))
        }

        async fn persist(&self, _snapshot: &CatalogSnapshot) -> Result<(), StorageError> {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_concurrent_inserts_get_distinct_positions_and_keep_categories() {
        let storage = SnapshotStorage::new(SlowBackend);
        storage.load().await.unwrap();

        let (a, b) = tokio::join!(
            storage.insert_product(draft("A", Some("Drinks"))),
            storage.insert_product(draft("B", Some("Snacks"))),
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_ne!(a.id, b.id);
        assert_ne!(a.sort_order, b.sort_order);
        let mut categories = storage.get_settings().await.unwrap().categories_order;
        categories.sort();
        assert_eq!(categories, vec!["Drinks", "Snacks"]);
    }
}
