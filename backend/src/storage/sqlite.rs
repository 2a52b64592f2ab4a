use async_trait::async_trait;
use sqlx::migrate::MigrateDatabase;
use sqlx::sqlite::SqliteRow;
use sqlx::types::Json;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use tokio::sync::OnceCell;
use tracing::info;

use super::traits::{CatalogStorage, StorageError};
use crate::domain::models::catalog::{CatalogSettings, SettingsChange};
use crate::domain::models::product::{DomainProduct, ProductDraft};

const PRODUCT_COLUMNS: &str = "id, name, description, category, codes, flavors, \
     price_uv, price_up, price_fv, price_fp, image_url, image_public_id, \
     active, sort_order, created_at, updated_at";

/// Catalog stored in an SQLite database, one row per product
pub struct SqliteStorage {
    url: String,
    pool: OnceCell<SqlitePool>,
}

impl SqliteStorage {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            pool: OnceCell::new(),
        }
    }

    fn pool(&self) -> Result<&SqlitePool, StorageError> {
        self.pool.get().ok_or(StorageError::NotLoaded)
    }

    /// Set up the required database schema
    async fn setup_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS products (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                description TEXT,
                category TEXT,
                codes TEXT,
                flavors TEXT,
                price_uv REAL,
                price_up REAL,
                price_fv REAL,
                price_fp REAL,
                image_url TEXT,
                image_public_id TEXT,
                active BOOLEAN NOT NULL DEFAULT 1,
                sort_order INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_products_sort_order ON products(sort_order);")
            .execute(pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_products_active ON products(active);")
            .execute(pool)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS settings (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                categories TEXT NOT NULL DEFAULT '[]',
                show_prices BOOLEAN NOT NULL DEFAULT 1
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query("INSERT INTO settings (id, categories, show_prices) VALUES (1, '[]', 1) ON CONFLICT(id) DO NOTHING;")
            .execute(pool)
            .await?;

        Ok(())
    }

    async fn read_settings<'e, E>(executor: E) -> Result<CatalogSettings, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        let row = sqlx::query("SELECT categories, show_prices FROM settings WHERE id = 1")
            .fetch_optional(executor)
            .await?;

        let Some(row) = row else {
            return Ok(CatalogSettings::default());
        };

        let Json(categories_order): Json<Vec<String>> = row.try_get("categories")?;
        Ok(CatalogSettings {
            categories_order,
            show_prices: row.try_get("show_prices")?,
        })
    }

    async fn select_product(tx: &mut Transaction<'_, Sqlite>, id: i64) -> Result<DomainProduct, sqlx::Error> {
        let row = sqlx::query(&format!("SELECT {} FROM products WHERE id = ?", PRODUCT_COLUMNS))
            .bind(id)
            .fetch_one(&mut **tx)
            .await?;
        product_from_row(&row)
    }

    /// Append `category` to the settings inside the caller's transaction
    async fn register_category(
        tx: &mut Transaction<'_, Sqlite>,
        category: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        let Some(category) = category else {
            return Ok(());
        };

        let mut settings = Self::read_settings(&mut **tx).await?;
        if settings.ensure_category(category) {
            sqlx::query("UPDATE settings SET categories = ? WHERE id = 1")
                .bind(Json(&settings.categories_order))
                .execute(&mut **tx)
                .await?;
        }
        Ok(())
    }
}

fn product_from_row(row: &SqliteRow) -> Result<DomainProduct, sqlx::Error> {
    Ok(DomainProduct {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        category: row.try_get("category")?,
        codes: row.try_get("codes")?,
        flavors: row.try_get("flavors")?,
        price_uv: row.try_get("price_uv")?,
        price_up: row.try_get("price_up")?,
        price_fv: row.try_get("price_fv")?,
        price_fp: row.try_get("price_fp")?,
        image_url: row.try_get("image_url")?,
        image_public_id: row.try_get("image_public_id")?,
        active: row.try_get("active")?,
        sort_order: row.try_get("sort_order")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl CatalogStorage for SqliteStorage {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn load(&self) -> Result<(), StorageError> {
        if self.pool.initialized() {
            return Ok(());
        }

        let unavailable = |e: sqlx::Error| StorageError::Unavailable(format!("sqlite: {}", e));

        // Create database if it doesn't exist
        if !Sqlite::database_exists(&self.url).await.unwrap_or(false) {
            Sqlite::create_database(&self.url).await.map_err(unavailable)?;
        }

        let pool = SqlitePool::connect(&self.url).await.map_err(unavailable)?;
        Self::setup_schema(&pool).await.map_err(unavailable)?;

        info!("SQLite catalog ready at {}", self.url);
        // a concurrent load may have won the race; its pool is just as good
        let _ = self.pool.set(pool);
        Ok(())
    }

    async fn list_products(&self) -> Result<Vec<DomainProduct>, StorageError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM products ORDER BY sort_order ASC, id ASC",
            PRODUCT_COLUMNS
        ))
        .fetch_all(self.pool()?)
        .await?;

        Ok(rows
            .iter()
            .map(product_from_row)
            .collect::<Result<Vec<_>, sqlx::Error>>()?)
    }

    async fn get_product(&self, id: i64) -> Result<Option<DomainProduct>, StorageError> {
        let row = sqlx::query(&format!("SELECT {} FROM products WHERE id = ?", PRODUCT_COLUMNS))
            .bind(id)
            .fetch_optional(self.pool()?)
            .await?;

        Ok(row.as_ref().map(product_from_row).transpose()?)
    }

    async fn insert_product(&self, draft: ProductDraft) -> Result<DomainProduct, StorageError> {
        let mut tx = self.pool()?.begin().await?;

        // Writing first takes the database write lock, so the position and the
        // settings read below cannot interleave with another writer
        let result = sqlx::query(
            r#"
            INSERT INTO products (name, description, category, codes, flavors,
                price_uv, price_up, price_fv, price_fp, image_url, image_public_id,
                active, sort_order, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?,
                (SELECT COALESCE(MAX(sort_order), 0) + 1 FROM products), ?, ?)
            "#,
        )
        .bind(&draft.name)
        .bind(&draft.description)
        .bind(&draft.category)
        .bind(&draft.codes)
        .bind(&draft.flavors)
        .bind(draft.price_uv)
        .bind(draft.price_up)
        .bind(draft.price_fv)
        .bind(draft.price_fp)
        .bind(&draft.image_url)
        .bind(&draft.image_public_id)
        .bind(draft.active)
        .bind(draft.created_at)
        .bind(draft.updated_at)
        .execute(&mut *tx)
        .await?;

        let product = Self::select_product(&mut tx, result.last_insert_rowid()).await?;
        Self::register_category(&mut tx, product.category.as_deref()).await?;

        tx.commit().await?;
        Ok(product)
    }

    async fn update_product(
        &self,
        product: &DomainProduct,
    ) -> Result<Option<DomainProduct>, StorageError> {
        let mut tx = self.pool()?.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE products SET name = ?, description = ?, category = ?, codes = ?, flavors = ?,
                price_uv = ?, price_up = ?, price_fv = ?, price_fp = ?, image_url = ?,
                image_public_id = ?, active = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&product.name)
        .bind(&product.description)
        .bind(&product.category)
        .bind(&product.codes)
        .bind(&product.flavors)
        .bind(product.price_uv)
        .bind(product.price_up)
        .bind(product.price_fv)
        .bind(product.price_fp)
        .bind(&product.image_url)
        .bind(&product.image_public_id)
        .bind(product.active)
        .bind(product.updated_at)
        .bind(product.id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            // dropping the transaction rolls it back
            return Ok(None);
        }

        let stored = Self::select_product(&mut tx, product.id).await?;
        Self::register_category(&mut tx, stored.category.as_deref()).await?;

        tx.commit().await?;
        Ok(Some(stored))
    }

    async fn delete_product(&self, id: i64) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM products WHERE id = ?")
            .bind(id)
            .execute(self.pool()?)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn reorder(&self, assignments: &[(i64, i64)]) -> Result<(), StorageError> {
        let mut tx = self.pool()?.begin().await?;

        for (id, sort_order) in assignments {
            sqlx::query("UPDATE products SET sort_order = ? WHERE id = ?")
                .bind(sort_order)
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_settings(&self) -> Result<CatalogSettings, StorageError> {
        Ok(Self::read_settings(self.pool()?).await?)
    }

    async fn update_settings(&self, change: SettingsChange) -> Result<CatalogSettings, StorageError> {
        let mut tx = self.pool()?.begin().await?;

        sqlx::query(
            "UPDATE settings SET categories = COALESCE(?, categories), show_prices = COALESCE(?, show_prices) WHERE id = 1",
        )
        .bind(change.categories_order.map(Json))
        .bind(change.show_prices)
        .execute(&mut *tx)
        .await?;

        let settings = Self::read_settings(&mut *tx).await?;
        tx.commit().await?;
        Ok(settings)
    }
}
