//! # MongoDB Storage
//!
//! One document per product in `products`, the settings singleton in
//! `settings` and the product id sequence in `counters`.
//!
//! Category registration uses `$addToSet` so it never reads a stale copy of
//! the settings. Positions are computed from the highest stored `sortOrder`
//! while holding a per-process write lock; MongoDB standalone servers have no
//! multi-document transactions to lean on.

use async_trait::async_trait;
use mongodb::bson::{doc, to_document, Document};
use mongodb::options::{
    ClientOptions, FindOneAndUpdateOptions, FindOneOptions, FindOptions, IndexOptions, ReturnDocument,
    UpdateOptions,
};
use mongodb::{Client, Collection, Database, IndexModel};
use std::time::Duration;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info};

use super::traits::{CatalogStorage, StorageError};
use crate::domain::models::catalog::{CatalogSettings, SettingsChange};
use crate::domain::models::product::{DomainProduct, ProductDraft};

const DEFAULT_DATABASE: &str = "catalog";
const APP_NAME: &str = "catalog-backend";
const SERVER_SELECTION_TIMEOUT: Duration = Duration::from_secs(5);
const SETTINGS_ID: i32 = 1;
const PRODUCT_SEQUENCE: &str = "products";

struct Collections {
    products: Collection<DomainProduct>,
    settings: Collection<CatalogSettings>,
    counters: Collection<Document>,
}

/// Catalog stored in MongoDB
pub struct MongoStorage {
    uri: String,
    database: Option<String>,
    collections: OnceCell<Collections>,
    writer: Mutex<()>,
}

impl MongoStorage {
    pub fn new(uri: impl Into<String>, database: Option<String>) -> Self {
        Self {
            uri: uri.into(),
            database,
            collections: OnceCell::new(),
            writer: Mutex::new(()),
        }
    }

    fn collections(&self) -> Result<&Collections, StorageError> {
        self.collections.get().ok_or(StorageError::NotLoaded)
    }

    async fn connect(&self) -> Result<Database, mongodb::error::Error> {
        let mut options = ClientOptions::parse(&self.uri).await?;
        options.app_name = Some(APP_NAME.to_string());
        options.server_selection_timeout = Some(SERVER_SELECTION_TIMEOUT);
        let client = Client::with_options(options)?;

        let database = match &self.database {
            Some(name) => client.database(name),
            None => client
                .default_database()
                .unwrap_or_else(|| client.database(DEFAULT_DATABASE)),
        };
        database.run_command(doc! { "ping": 1 }, None).await?;
        Ok(database)
    }

    async fn setup(collections: &Collections) -> Result<(), mongodb::error::Error> {
        let unique_id = IndexModel::builder()
            .keys(doc! { "id": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        collections.products.create_index(unique_id, None).await?;

        let defaults = CatalogSettings::default();
        collections
            .settings
            .update_one(
                doc! { "_id": SETTINGS_ID },
                doc! { "$setOnInsert": {
                    "categoriesOrder": defaults.categories_order,
                    "showPrices": defaults.show_prices,
                } },
                upsert(),
            )
            .await?;

        // keep the sequence ahead of ids written before it existed
        let highest = collections
            .products
            .find_one(None, FindOneOptions::builder().sort(doc! { "id": -1 }).build())
            .await?
            .map(|product| product.id)
            .unwrap_or(0);
        collections
            .counters
            .update_one(
                doc! { "_id": PRODUCT_SEQUENCE },
                doc! { "$max": { "seq": highest } },
                upsert(),
            )
            .await?;
        Ok(())
    }

    async fn next_id(&self) -> Result<i64, StorageError> {
        let options = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::After)
            .build();
        let counter = self
            .collections()?
            .counters
            .find_one_and_update(doc! { "_id": PRODUCT_SEQUENCE }, doc! { "$inc": { "seq": 1_i64 } }, options)
            .await?
            .ok_or_else(|| StorageError::Unavailable("product id sequence is missing".to_string()))?;

        counter
            .get_i64("seq")
            .map_err(|e| StorageError::Unavailable(format!("product id sequence is corrupt: {}", e)))
    }

    async fn next_sort_order(&self) -> Result<i64, StorageError> {
        let last = self
            .collections()?
            .products
            .find_one(None, FindOneOptions::builder().sort(doc! { "sortOrder": -1 }).build())
            .await?;
        Ok(last.map(|product| product.sort_order).unwrap_or(0) + 1)
    }

    async fn register_category(&self, category: Option<&str>) -> Result<(), StorageError> {
        let Some(category) = category.filter(|category| !category.is_empty()) else {
            return Ok(());
        };
        self.collections()?
            .settings
            .update_one(
                doc! { "_id": SETTINGS_ID },
                doc! { "$addToSet": { "categoriesOrder": category } },
                upsert(),
            )
            .await?;
        Ok(())
    }
}

fn upsert() -> UpdateOptions {
    UpdateOptions::builder().upsert(true).build()
}

#[async_trait]
impl CatalogStorage for MongoStorage {
    fn backend_name(&self) -> &'static str {
        "mongo"
    }

    async fn load(&self) -> Result<(), StorageError> {
        if self.collections.initialized() {
            return Ok(());
        }

        let unavailable = |e: mongodb::error::Error| StorageError::Unavailable(format!("mongo: {}", e));

        let database = self.connect().await.map_err(unavailable)?;
        let collections = Collections {
            products: database.collection("products"),
            settings: database.collection("settings"),
            counters: database.collection("counters"),
        };
        Self::setup(&collections).await.map_err(unavailable)?;

        info!(database = %database.name(), "MongoDB catalog ready");
        let _ = self.collections.set(collections);
        Ok(())
    }

    async fn list_products(&self) -> Result<Vec<DomainProduct>, StorageError> {
        let options = FindOptions::builder().sort(doc! { "sortOrder": 1, "id": 1 }).build();
        let mut cursor = self.collections()?.products.find(None, options).await?;

        let mut products = Vec::new();
        while cursor.advance().await? {
            products.push(cursor.deserialize_current()?);
        }
        Ok(products)
    }

    async fn get_product(&self, id: i64) -> Result<Option<DomainProduct>, StorageError> {
        Ok(self.collections()?.products.find_one(doc! { "id": id }, None).await?)
    }

    async fn insert_product(&self, draft: ProductDraft) -> Result<DomainProduct, StorageError> {
        let _writer = self.writer.lock().await;

        let product = draft.into_product(self.next_id().await?, self.next_sort_order().await?);
        self.register_category(product.category.as_deref()).await?;
        self.collections()?.products.insert_one(&product, None).await?;

        debug!(id = product.id, "Product inserted into MongoDB");
        Ok(product)
    }

    async fn update_product(
        &self,
        product: &DomainProduct,
    ) -> Result<Option<DomainProduct>, StorageError> {
        let _writer = self.writer.lock().await;

        let mut fields = to_document(product)?;
        for kept in ["id", "sortOrder", "createdAt"] {
            fields.remove(kept);
        }

        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        let stored = self
            .collections()?
            .products
            .find_one_and_update(doc! { "id": product.id }, doc! { "$set": fields }, options)
            .await?;

        if let Some(stored) = &stored {
            self.register_category(stored.category.as_deref()).await?;
        }
        Ok(stored)
    }

    async fn delete_product(&self, id: i64) -> Result<bool, StorageError> {
        let result = self.collections()?.products.delete_one(doc! { "id": id }, None).await?;
        Ok(result.deleted_count > 0)
    }

    async fn reorder(&self, assignments: &[(i64, i64)]) -> Result<(), StorageError> {
        let _writer = self.writer.lock().await;
        let products = &self.collections()?.products;

        for &(id, sort_order) in assignments {
            products
                .update_one(doc! { "id": id }, doc! { "$set": { "sortOrder": sort_order } }, None)
                .await?;
        }
        Ok(())
    }

    async fn get_settings(&self) -> Result<CatalogSettings, StorageError> {
        let settings = self
            .collections()?
            .settings
            .find_one(doc! { "_id": SETTINGS_ID }, None)
            .await?;
        Ok(settings.unwrap_or_default())
    }

    async fn update_settings(&self, change: SettingsChange) -> Result<CatalogSettings, StorageError> {
        let mut fields = Document::new();
        if let Some(categories_order) = change.categories_order {
            fields.insert("categoriesOrder", categories_order);
        }
        if let Some(show_prices) = change.show_prices {
            fields.insert("showPrices", show_prices);
        }
        if fields.is_empty() {
            return self.get_settings().await;
        }

        let options = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::After)
            .build();
        let settings = self
            .collections()?
            .settings
            .find_one_and_update(doc! { "_id": SETTINGS_ID }, doc! { "$set": fields }, options)
            .await?;
        Ok(settings.unwrap_or_default())
    }
}

/// These run only when `CATALOG_TEST_MONGO_URI` points at a scratch server.
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{SubsecRound, Utc};

    async fn setup_test() -> Option<MongoStorage> {
        let uri = std::env::var("CATALOG_TEST_MONGO_URI").ok()?;
        let database = format!("catalog_test_{}", uuid::Uuid::new_v4().simple());
        let storage = MongoStorage::new(uri, Some(database));
        storage.load().await.unwrap();
        Some(storage)
    }

    fn draft(name: &str, category: &str) -> ProductDraft {
        let now = Utc::now().trunc_subsecs(3);
        ProductDraft {
            name: name.to_string(),
            description: Some("Cold".to_string()),
            category: Some(category.to_string()),
            codes: None,
            flavors: None,
            price_uv: Some(4.2),
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

    #[tokio::test]
    async fn test_calls_before_load_fail() {
        let storage = MongoStorage::new("mongodb://127.0.0.1:9", None);
        assert!(matches!(storage.list_products().await, Err(StorageError::NotLoaded)));
    }

    #[tokio::test]
    async fn test_mongo_crud_cycle() {
        let Some(storage) = setup_test().await else {
            return;
        };

        let soda = storage.insert_product(draft("Soda", "Drinks")).await.unwrap();
        let chips = storage.insert_product(draft("Chips", "Snacks")).await.unwrap();
        assert_eq!((soda.id, soda.sort_order), (1, 1));
        assert_eq!((chips.id, chips.sort_order), (2, 2));
        assert_eq!(storage.get_product(soda.id).await.unwrap(), Some(soda.clone()));
        assert_eq!(
            storage.get_settings().await.unwrap().categories_order,
            vec!["Drinks", "Snacks"]
        );

        storage.reorder(&[(chips.id, 1), (soda.id, 2)]).await.unwrap();
        let ids: Vec<i64> = storage.list_products().await.unwrap().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![chips.id, soda.id]);

        let mut renamed = soda.clone();
        renamed.name = "Cola".to_string();
        let stored = storage.update_product(&renamed).await.unwrap().unwrap();
        assert_eq!((stored.name.as_str(), stored.sort_order), ("Cola", 2));

        let mut ghost = soda.clone();
        ghost.id = 999;
        assert_eq!(storage.update_product(&ghost).await.unwrap(), None);

        assert!(storage.delete_product(soda.id).await.unwrap());
        assert!(!storage.delete_product(soda.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_mongo_concurrent_inserts_and_settings() {
        let Some(storage) = setup_test().await else {
            return;
        };

        let (first, second) = tokio::join!(
            storage.insert_product(draft("A", "Drinks")),
            storage.insert_product(draft("B", "Snacks")),
        );
        let mut orders = vec![first.unwrap().sort_order, second.unwrap().sort_order];
        orders.sort();
        assert_eq!(orders, vec![1, 2]);

        let settings = storage
            .update_settings(SettingsChange {
                show_prices: Some(false),
                ..SettingsChange::default()
            })
            .await
            .unwrap();
        assert!(!settings.show_prices);
        assert_eq!(settings.categories_order.len(), 2);
    }
}
