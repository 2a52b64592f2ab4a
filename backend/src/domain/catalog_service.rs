use chrono::{DateTime, SubsecRound, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

use super::commands::products::{
    ActiveFlag, CatalogFilter, CreateProductCommand, RawPrice, UpdateProductCommand,
};
use super::commands::settings::UpdateSettingsCommand;
use super::models::catalog::{CatalogSettings, CatalogView, SettingsChange};
use super::models::product::{
    DomainProduct, ProductDraft, ProductValidationError, MAX_DESCRIPTION_LENGTH, MAX_NAME_LENGTH,
};
use super::models::upload::{StoredAsset, UploadedImage};
use super::price::normalize_price;
use crate::storage::{AssetStore, CatalogStorage, StorageError};

pub const DEFAULT_MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error(transparent)]
    Validation(#[from] ProductValidationError),
    #[error("Product not found: {0}")]
    NotFound(i64),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Service for managing the product catalog
///
/// Validates and normalizes input, plans reorders and owns the uploaded
/// images. Placing a new product last and registering its category happen
/// inside the storage write, so concurrent requests cannot undo each other.
#[derive(Clone)]
pub struct CatalogService {
    storage: Arc<dyn CatalogStorage>,
    assets: Arc<dyn AssetStore>,
    max_image_bytes: usize,
}

impl CatalogService {
    /// Create a new CatalogService over an already loaded storage backend
    pub fn new(storage: Arc<dyn CatalogStorage>, assets: Arc<dyn AssetStore>) -> Self {
        Self {
            storage,
            assets,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
        }
    }

    pub fn with_max_image_bytes(mut self, max_image_bytes: usize) -> Self {
        self.max_image_bytes = max_image_bytes;
        self
    }

    pub fn backend_name(&self) -> &'static str {
        self.storage.backend_name()
    }

    /// Products matching the filter, in display order
    pub async fn get_all(&self, filter: &CatalogFilter) -> Result<Vec<DomainProduct>, CatalogError> {
        info!("Listing products: {:?}", filter);

        let needle = filter
            .q
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_lowercase);
        let category = filter.category.as_deref().map(str::trim).filter(|c| !c.is_empty());

        let mut products = self.storage.list_products().await?;
        products.retain(|product| {
            (!filter.active_only || product.active)
                && category.map_or(true, |category| product.category.as_deref() == Some(category))
                && needle.as_deref().map_or(true, |needle| product.matches_query(needle))
        });
        sort_for_display(&mut products);

        info!("Found {} products", products.len());
        Ok(products)
    }

    /// Filtered products plus settings, as the storefront shows them
    pub async fn get_catalog(&self, filter: &CatalogFilter) -> Result<CatalogView, CatalogError> {
        let products = self.get_all(filter).await?;
        let settings = self.storage.get_settings().await?;
        Ok(CatalogView { products, settings })
    }

    pub async fn get_by_id(&self, id: i64) -> Result<DomainProduct, CatalogError> {
        match self.storage.get_product(id).await? {
            Some(product) => Ok(product),
            None => {
                warn!("Product not found: {}", id);
                Err(CatalogError::NotFound(id))
            }
        }
    }

    /// Create a new product, storing its image first when one was uploaded
    pub async fn create(
        &self,
        command: CreateProductCommand,
        image: Option<UploadedImage>,
    ) -> Result<DomainProduct, CatalogError> {
        info!("Creating product: name={:?}, category={:?}", command.name, command.category);

        let name = validate_name(command.name.as_deref())?;
        let description = validate_description(command.description)?;
        let active = resolve_active(command.active, true)?;
        if let Some(image) = &image {
            self.validate_image(image)?;
        }

        let now = timestamp();
        let mut draft = ProductDraft {
            name,
            description,
            category: clean_text(command.category),
            codes: clean_text(command.codes),
            flavors: clean_text(command.flavors),
            price_uv: normalize_price(command.price_uv.as_ref()),
            price_up: normalize_price(command.price_up.as_ref()),
            price_fv: normalize_price(command.price_fv.as_ref()),
            price_fp: normalize_price(command.price_fp.as_ref()),
            image_url: clean_text(command.image_url),
            image_public_id: None,
            active,
            created_at: now,
            updated_at: now,
        };

        let uploaded = self.store_image(image).await?;
        if let Some(asset) = &uploaded {
            draft.image_url = Some(asset.url.clone());
            draft.image_public_id = Some(asset.public_id.clone());
        }

        match self.storage.insert_product(draft).await {
            Ok(product) => {
                info!("Created product: {} with ID: {}", product.name, product.id);
                Ok(product)
            }
            Err(e) => {
                self.discard_uploaded(uploaded).await;
                Err(e.into())
            }
        }
    }

    /// Apply a partial update. Fields absent from the command keep their value.
    pub async fn update(
        &self,
        id: i64,
        command: UpdateProductCommand,
        image: Option<UploadedImage>,
    ) -> Result<DomainProduct, CatalogError> {
        info!("Updating product: {}", id);

        let current = self.get_by_id(id).await?;
        let mut product = current.clone();

        if let Some(name) = command.name {
            product.name = validate_name(Some(&name))?;
        }
        if let Some(description) = command.description {
            product.description = validate_description(description)?;
        }
        if let Some(category) = command.category {
            product.category = clean_text(category);
        }
        if let Some(codes) = command.codes {
            product.codes = clean_text(codes);
        }
        if let Some(flavors) = command.flavors {
            product.flavors = clean_text(flavors);
        }
        if let Some(price) = command.price_uv {
            product.price_uv = normalize_price(price.as_ref());
        }
        if let Some(price) = command.price_up {
            product.price_up = normalize_price(price.as_ref());
        }
        if let Some(price) = command.price_fv {
            product.price_fv = normalize_price(price.as_ref());
        }
        if let Some(price) = command.price_fp {
            product.price_fp = normalize_price(price.as_ref());
        }
        if command.active.is_some() {
            product.active = resolve_active(command.active, product.active)?;
        }
        if let Some(image_url) = command.image_url {
            let image_url = clean_text(image_url);
            // re-sending the current URL must not orphan the uploaded file
            if image_url != product.image_url {
                product.image_url = image_url;
                product.image_public_id = None;
            }
        }
        if let Some(image) = &image {
            self.validate_image(image)?;
        }

        let uploaded = self.store_image(image).await?;
        if let Some(asset) = &uploaded {
            product.image_url = Some(asset.url.clone());
            product.image_public_id = Some(asset.public_id.clone());
        }
        product.updated_at = timestamp();

        let stored = match self.storage.update_product(&product).await {
            Ok(Some(stored)) => stored,
            Ok(None) => {
                warn!("Product {} disappeared during update", id);
                self.discard_uploaded(uploaded).await;
                return Err(CatalogError::NotFound(id));
            }
            Err(e) => {
                self.discard_uploaded(uploaded).await;
                return Err(e.into());
            }
        };

        if let Some(previous) = current.image_public_id.as_deref() {
            if stored.image_public_id.as_deref() != Some(previous) {
                self.discard_asset(previous).await;
            }
        }

        info!("Updated product: {} with ID: {}", stored.name, stored.id);
        Ok(stored)
    }

    /// Delete a product, then its uploaded image
    pub async fn remove(&self, id: i64) -> Result<(), CatalogError> {
        info!("Deleting product: {}", id);

        let product = self.get_by_id(id).await?;
        if !self.storage.delete_product(id).await? {
            warn!("Product {} was already deleted", id);
            return Err(CatalogError::NotFound(id));
        }

        if let Some(public_id) = product.image_public_id.as_deref() {
            self.discard_asset(public_id).await;
        }

        info!("Deleted product: {}", id);
        Ok(())
    }

    /// Put the listed products first, in list order, numbering from 1
    pub async fn reorder(&self, ids: &[i64]) -> Result<(), CatalogError> {
        info!("Reordering products: {:?}", ids);

        let mut products = self.storage.list_products().await?;
        sort_for_display(&mut products);

        let assignments = plan_reorder(&products, ids);
        self.storage.reorder(&assignments).await?;

        info!("Reordered {} products", assignments.len());
        Ok(())
    }

    pub async fn get_settings(&self) -> Result<CatalogSettings, CatalogError> {
        Ok(self.storage.get_settings().await?)
    }

    pub async fn update_settings(
        &self,
        command: UpdateSettingsCommand,
    ) -> Result<CatalogSettings, CatalogError> {
        info!("Updating settings: {:?}", command);

        let change = SettingsChange {
            categories_order: command.categories_order.map(clean_categories),
            show_prices: command.show_prices,
        };
        Ok(self.storage.update_settings(change).await?)
    }

    /// Insert a demo product into an empty catalog. Returns whether it did.
    pub async fn seed_if_empty(&self) -> Result<bool, CatalogError> {
        if !self.storage.list_products().await?.is_empty() {
            return Ok(false);
        }

        info!("Catalog is empty, inserting a sample product");
        let command = CreateProductCommand {
            name: Some("Sample product".to_string()),
            description: Some("Created on first start. Edit or delete it from the admin panel.".to_string()),
            category: Some("General".to_string()),
            price_uv: Some(RawPrice::Number(9.9)),
            ..Default::default()
        };
        self.create(command, None).await?;
        Ok(true)
    }

    fn validate_image(&self, image: &UploadedImage) -> Result<(), ProductValidationError> {
        if image.len() > self.max_image_bytes {
            return Err(ProductValidationError::ImageTooLarge(self.max_image_bytes));
        }
        if !image.is_image() {
            return Err(ProductValidationError::UnsupportedImage);
        }
        Ok(())
    }

    async fn store_image(&self, image: Option<UploadedImage>) -> Result<Option<StoredAsset>, CatalogError> {
        match image {
            Some(image) => Ok(Some(self.assets.store(&image).await?)),
            None => Ok(None),
        }
    }

    async fn discard_uploaded(&self, uploaded: Option<StoredAsset>) {
        if let Some(asset) = uploaded {
            self.discard_asset(&asset.public_id).await;
        }
    }

    /// Best-effort delete; failures are logged, never returned
    async fn discard_asset(&self, public_id: &str) {
        if let Err(e) = self.assets.delete(public_id).await {
            warn!("Failed to delete uploaded image {}: {}", public_id, e);
        }
    }
}

fn timestamp() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

fn sort_for_display(products: &mut [DomainProduct]) {
    products.sort_by_key(|product| (product.sort_order, product.id));
}

/// Dense 1-based positions: listed known ids first, then everyone else in current order
fn plan_reorder(products_in_order: &[DomainProduct], ids: &[i64]) -> Vec<(i64, i64)> {
    let known: HashSet<i64> = products_in_order.iter().map(|product| product.id).collect();
    let mut placed = HashSet::new();

    let listed = ids
        .iter()
        .copied()
        .filter(|id| known.contains(id) && placed.insert(*id))
        .collect::<Vec<_>>();
    let rest = products_in_order
        .iter()
        .map(|product| product.id)
        .filter(|id| !placed.contains(id));

    listed.into_iter().chain(rest).zip(1..).collect()
}

fn clean_text(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

fn clean_categories(categories: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    categories
        .into_iter()
        .map(|category| category.trim().to_string())
        .filter(|category| !category.is_empty() && seen.insert(category.clone()))
        .collect()
}

fn validate_name(name: Option<&str>) -> Result<String, ProductValidationError> {
    let name = name.map(str::trim).unwrap_or_default();
    if name.is_empty() {
        return Err(ProductValidationError::EmptyName);
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(ProductValidationError::NameTooLong);
    }
    Ok(name.to_string())
}

fn validate_description(description: Option<String>) -> Result<Option<String>, ProductValidationError> {
    let description = clean_text(description);
    if description
        .as_deref()
        .is_some_and(|text| text.chars().count() > MAX_DESCRIPTION_LENGTH)
    {
        return Err(ProductValidationError::DescriptionTooLong);
    }
    Ok(description)
}

fn resolve_active(flag: Option<ActiveFlag>, default: bool) -> Result<bool, ProductValidationError> {
    match flag {
        None => Ok(default),
        Some(ActiveFlag::Value(value)) => Ok(value),
        Some(ActiveFlag::Invalid(text)) => Err(ProductValidationError::InvalidActiveFlag(text)),
    }
}
