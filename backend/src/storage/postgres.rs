use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tokio::sync::OnceCell;
use tracing::info;

use super::traits::{CatalogStorage, StorageError};
use crate::domain::models::catalog::{CatalogSettings, SettingsChange};
use crate::domain::models::product::{DomainProduct, ProductDraft};

const PRODUCT_COLUMNS: &str = "id, name, description, category, codes, flavors, \
     price_uv, price_up, price_fv, price_fp, image_url, image_public_id, \
     active, sort_order, created_at, updated_at";

const MAX_CONNECTIONS: u32 = 5;

/// Catalog stored in PostgreSQL, one row per product
pub struct PostgresStorage {
    url: String,
    pool: OnceCell<PgPool>,
}

impl PostgresStorage {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            pool: OnceCell::new(),
        }
    }

    fn pool(&self) -> Result<&PgPool, StorageError> {
        self.pool.get().ok_or(StorageError::NotLoaded)
    }

    async fn setup_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS products (
                id BIGSERIAL PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT,
                category TEXT,
                codes TEXT,
                flavors TEXT,
                price_uv DOUBLE PRECISION,
                price_up DOUBLE PRECISION,
                price_fv DOUBLE PRECISION,
                price_fp DOUBLE PRECISION,
                image_url TEXT,
                image_public_id TEXT,
                active BOOLEAN NOT NULL DEFAULT TRUE,
                sort_order BIGINT NOT NULL DEFAULT 0,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(pool)
        .await?;

        for index in [
            "CREATE INDEX IF NOT EXISTS idx_products_sort_order ON products(sort_order)",
            "CREATE INDEX IF NOT EXISTS idx_products_active ON products(active)",
            "CREATE INDEX IF NOT EXISTS idx_products_name ON products(LOWER(name))",
            "CREATE INDEX IF NOT EXISTS idx_products_category ON products(LOWER(category))",
        ] {
            sqlx::query(index).execute(pool).await?;
        }

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS settings (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                categories JSONB NOT NULL DEFAULT '[]'::jsonb,
                show_prices BOOLEAN NOT NULL DEFAULT TRUE
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query("INSERT INTO settings (id) VALUES (1) ON CONFLICT (id) DO NOTHING")
            .execute(pool)
            .await?;

        Ok(())
    }

    async fn read_settings<'e, E>(executor: E, lock: bool) -> Result<CatalogSettings, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Postgres>,
    {
        let sql = if lock {
            "SELECT categories, show_prices FROM settings WHERE id = 1 FOR UPDATE"
        } else {
            "SELECT categories, show_prices FROM settings WHERE id = 1"
        };
        let row = sqlx::query(sql).fetch_optional(executor).await?;

        let Some(row) = row else {
            return Ok(CatalogSettings::default());
        };

        let Json(categories_order): Json<Vec<String>> = row.try_get("categories")?;
        Ok(CatalogSettings {
            categories_order,
            show_prices: row.try_get("show_prices")?,
        })
    }

    async fn select_product(tx: &mut Transaction<'_, Postgres>, id: i64) -> Result<DomainProduct, sqlx::Error> {
        let row = sqlx::query(&format!("SELECT {} FROM products WHERE id = $1", PRODUCT_COLUMNS))
            .bind(id)
            .fetch_one(&mut **tx)
            .await?;
        product_from_row(&row)
    }

    async fn store_categories(
        tx: &mut Transaction<'_, Postgres>,
        mut settings: CatalogSettings,
        category: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        let Some(category) = category else {
            return Ok(());
        };
        if settings.ensure_category(category) {
            sqlx::query("UPDATE settings SET categories = $1 WHERE id = 1")
                .bind(Json(&settings.categories_order))
                .execute(&mut **tx)
                .await?;
        }
        Ok(())
    }
}

fn product_from_row(row: &PgRow) -> Result<DomainProduct, sqlx::Error> {
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
impl CatalogStorage for PostgresStorage {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn load(&self) -> Result<(), StorageError> {
        if self.pool.initialized() {
            return Ok(());
        }

        let unavailable = |e: sqlx::Error| StorageError::Unavailable(format!("postgres: {}", e));

        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect(&self.url)
            .await
            .map_err(unavailable)?;
        Self::setup_schema(&pool).await.map_err(unavailable)?;

        info!("PostgreSQL catalog ready");
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
        let row = sqlx::query(&format!("SELECT {} FROM products WHERE id = $1", PRODUCT_COLUMNS))
            .bind(id)
            .fetch_optional(self.pool()?)
            .await?;

        Ok(row.as_ref().map(product_from_row).transpose()?)
    }

    async fn insert_product(&self, draft: ProductDraft) -> Result<DomainProduct, StorageError> {
        let mut tx = self.pool()?.begin().await?;

        // The settings row lock serializes product writers for the whole transaction
        let settings = Self::read_settings(&mut *tx, true).await?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO products (name, description, category, codes, flavors,
                price_uv, price_up, price_fv, price_fp, image_url, image_public_id,
                active, sort_order, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12,
                (SELECT COALESCE(MAX(sort_order), 0) + 1 FROM products), $13, $14)
            RETURNING id
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
        .fetch_one(&mut *tx)
        .await?;

        let product = Self::select_product(&mut tx, id).await?;
        Self::store_categories(&mut tx, settings, product.category.as_deref()).await?;

        tx.commit().await?;
        Ok(product)
    }

    async fn update_product(
        &self,
        product: &DomainProduct,
    ) -> Result<Option<DomainProduct>, StorageError> {
        let mut tx = self.pool()?.begin().await?;
        let settings = Self::read_settings(&mut *tx, true).await?;

        let result = sqlx::query(
            r#"
            UPDATE products SET name = $1, description = $2, category = $3, codes = $4,
                flavors = $5, price_uv = $6, price_up = $7, price_fv = $8, price_fp = $9,
                image_url = $10, image_public_id = $11, active = $12, updated_at = $13
            WHERE id = $14
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
            return Ok(None);
        }

        let stored = Self::select_product(&mut tx, product.id).await?;
        Self::store_categories(&mut tx, settings, stored.category.as_deref()).await?;

        tx.commit().await?;
        Ok(Some(stored))
    }

    async fn delete_product(&self, id: i64) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(self.pool()?)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn reorder(&self, assignments: &[(i64, i64)]) -> Result<(), StorageError> {
        let mut tx = self.pool()?.begin().await?;

        for (id, sort_order) in assignments {
            sqlx::query("UPDATE products SET sort_order = $1 WHERE id = $2")
                .bind(sort_order)
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_settings(&self) -> Result<CatalogSettings, StorageError> {
        Ok(Self::read_settings(self.pool()?, false).await?)
    }

    async fn update_settings(&self, change: SettingsChange) -> Result<CatalogSettings, StorageError> {
        let row = sqlx::query(
            r#"
            UPDATE settings SET categories = COALESCE($1, categories), show_prices = COALESCE($2, show_prices)
            WHERE id = 1
            RETURNING categories, show_prices
            "#,
        )
        .bind(change.categories_order.map(Json))
        .bind(change.show_prices)
        .fetch_one(self.pool()?)
        .await?;

        let Json(categories_order): Json<Vec<String>> = row.try_get("categories")?;
        Ok(CatalogSettings {
            categories_order,
            show_prices: row.try_get("show_prices")?,
        })
    }
}
