use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MAX_NAME_LENGTH: usize = 120;
pub const MAX_DESCRIPTION_LENGTH: usize = 2000;

/// A catalog product as stored by every backend.
///
/// The serde representation is the on-disk document format shared by the
/// JSON file and GitHub backends, so missing fields fall back to defaults
/// instead of failing the whole document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainProduct {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub codes: Option<String>,
    pub flavors: Option<String>,
    #[serde(rename = "priceUV")]
    pub price_uv: Option<f64>,
    #[serde(rename = "priceUP")]
    pub price_up: Option<f64>,
    #[serde(rename = "priceFV")]
    pub price_fv: Option<f64>,
    #[serde(rename = "priceFP")]
    pub price_fp: Option<f64>,
    pub image_url: Option<String>,
    pub image_public_id: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub sort_order: i64,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

impl DomainProduct {
    /// Case-insensitive substring match across name, codes and category
    pub fn matches_query(&self, needle_lowercase: &str) -> bool {
        [Some(self.name.as_str()), self.codes.as_deref(), self.category.as_deref()]
            .into_iter()
            .flatten()
            .any(|haystack| haystack.to_lowercase().contains(needle_lowercase))
    }
}

/// A validated product that has not been given an id or a position yet
#[derive(Debug, Clone, PartialEq)]
pub struct ProductDraft {
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub codes: Option<String>,
    pub flavors: Option<String>,
    pub price_uv: Option<f64>,
    pub price_up: Option<f64>,
    pub price_fv: Option<f64>,
    pub price_fp: Option<f64>,
    pub image_url: Option<String>,
    pub image_public_id: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductDraft {
    pub fn into_product(self, id: i64, sort_order: i64) -> DomainProduct {
        DomainProduct {
            id,
            name: self.name,
            description: self.description,
            category: self.category,
            codes: self.codes,
            flavors: self.flavors,
            price_uv: self.price_uv,
            price_up: self.price_up,
            price_fv: self.price_fv,
            price_fp: self.price_fp,
            image_url: self.image_url,
            image_public_id: self.image_public_id,
            active: self.active,
            sort_order,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProductValidationError {
    #[error("Name is required")]
    EmptyName,
    #[error("Name must be at most {MAX_NAME_LENGTH} characters")]
    NameTooLong,
    #[error("Description must be at most {MAX_DESCRIPTION_LENGTH} characters")]
    DescriptionTooLong,
    #[error("Invalid value for active: {0}")]
    InvalidActiveFlag(String),
    #[error("Image exceeds the maximum upload size of {0} bytes")]
    ImageTooLarge(usize),
    #[error("Uploaded file is not an image")]
    UnsupportedImage,
}
