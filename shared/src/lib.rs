use serde::{Deserialize, Deserializer, Serialize};

/// Product as exposed to the storefront and admin clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: i64,
    /// Display name (1..=120 characters)
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    /// Free-text product codes, searched by the catalog filter
    pub codes: Option<String>,
    pub flavors: Option<String>,
    /// Unit price, regular
    #[serde(rename = "priceUV")]
    pub price_uv: Option<f64>,
    /// Unit price, promotional
    #[serde(rename = "priceUP")]
    pub price_up: Option<f64>,
    /// Box price, regular
    #[serde(rename = "priceFV")]
    pub price_fv: Option<f64>,
    /// Box price, promotional
    #[serde(rename = "priceFP")]
    pub price_fp: Option<f64>,
    pub image_url: Option<String>,
    /// Identifier of the uploaded asset behind `image_url`, if we own it
    pub image_public_id: Option<String>,
    pub active: bool,
    /// 1-based display position
    pub sort_order: i64,
    /// Creation timestamp (RFC 3339)
    pub created_at: String,
    /// Last update timestamp (RFC 3339)
    pub updated_at: String,
}

/// Singleton catalog settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Known categories in display order
    pub categories_order: Vec<String>,
    pub show_prices: bool,
}

/// Public catalog payload: the filtered product list plus settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogResponse {
    pub products: Vec<Product>,
    pub settings: Settings,
}

/// A price typed by an admin: either a JSON number or free text such as "4,70"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PriceInput {
    Number(f64),
    Text(String),
}

/// A boolean flag that may arrive as a real boolean or as form text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlagInput {
    Bool(bool),
    Number(i64),
    Text(String),
}

impl FlagInput {
    /// Interpret the flag; `None` means the value is not recognizable
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FlagInput::Bool(value) => Some(*value),
            FlagInput::Number(value) => Some(*value != 0),
            FlagInput::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "on" | "yes" => Some(true),
                "false" | "0" | "off" | "no" => Some(false),
                _ => None,
            },
        }
    }
}

/// Request body for POST /api/products (JSON or multipart fields)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub codes: Option<String>,
    pub flavors: Option<String>,
    #[serde(rename = "priceUV")]
    pub price_uv: Option<PriceInput>,
    #[serde(rename = "priceUP")]
    pub price_up: Option<PriceInput>,
    #[serde(rename = "priceFV")]
    pub price_fv: Option<PriceInput>,
    #[serde(rename = "priceFP")]
    pub price_fp: Option<PriceInput>,
    pub active: Option<FlagInput>,
    /// External image URL, ignored when an image file is uploaded
    pub image_url: Option<String>,
}

/// Request body for PUT /api/products/:id
///
/// Absent fields are left untouched. For the optional fields an explicit
/// `null` (or an empty form value) clears the stored value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub category: Option<Option<String>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub codes: Option<Option<String>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub flavors: Option<Option<String>>,
    #[serde(
        rename = "priceUV",
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub price_uv: Option<Option<PriceInput>>,
    #[serde(
        rename = "priceUP",
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub price_up: Option<Option<PriceInput>>,
    #[serde(
        rename = "priceFV",
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub price_fv: Option<Option<PriceInput>>,
    #[serde(
        rename = "priceFP",
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub price_fp: Option<Option<PriceInput>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<FlagInput>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub image_url: Option<Option<String>>,
}

/// Marks a field as present even when its value is `null`
fn present<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Request body for POST /api/products/reorder
///
/// Accepts a bare id array (`[3, 1, 2]`) or a wrapped one (`{"ids": [3, 1, 2]}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReorderRequest {
    Ids(Vec<i64>),
    Wrapped { ids: Vec<i64> },
}

impl ReorderRequest {
    pub fn into_ids(self) -> Vec<i64> {
        match self {
            ReorderRequest::Ids(ids) | ReorderRequest::Wrapped { ids } => ids,
        }
    }
}

/// Request body for PUT /api/settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSettingsRequest {
    pub categories_order: Option<Vec<String>>,
    pub show_prices: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub password: String,
}

/// Successful login: a bearer token for the admin endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub ok: bool,
    pub token: String,
    /// Token expiry (RFC 3339)
    pub expires_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    /// Name of the storage backend in use
    pub storage: String,
}

/// Error body returned by every failing endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
