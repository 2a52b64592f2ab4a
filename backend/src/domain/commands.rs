//! Domain-level command and query types
//! These structs are used by services inside the domain layer and are **not**
//! exposed over the public API. The REST layer maps the public DTOs defined in
//! the `shared` crate to these internal types.

pub mod products {
    /// A price exactly as an admin typed it, before normalization.
    #[derive(Debug, Clone, PartialEq)]
    pub enum RawPrice {
        Number(f64),
        Text(String),
    }

    /// The `active` flag as received; unrecognized text is kept for the error message.
    #[derive(Debug, Clone, PartialEq)]
    pub enum ActiveFlag {
        Value(bool),
        Invalid(String),
    }

    /// Input for creating a new product.
    #[derive(Debug, Clone, Default)]
    pub struct CreateProductCommand {
        pub name: Option<String>,
        pub description: Option<String>,
        pub category: Option<String>,
        pub codes: Option<String>,
        pub flavors: Option<String>,
        pub price_uv: Option<RawPrice>,
        pub price_up: Option<RawPrice>,
        pub price_fv: Option<RawPrice>,
        pub price_fp: Option<RawPrice>,
        pub active: Option<ActiveFlag>,
        pub image_url: Option<String>,
    }

    /// Partial update. The outer `Option` is "was the field sent", the inner
    /// one is the value (`None` clears it).
    #[derive(Debug, Clone, Default)]
    pub struct UpdateProductCommand {
        pub name: Option<String>,
        pub description: Option<Option<String>>,
        pub category: Option<Option<String>>,
        pub codes: Option<Option<String>>,
        pub flavors: Option<Option<String>>,
        pub price_uv: Option<Option<RawPrice>>,
        pub price_up: Option<Option<RawPrice>>,
        pub price_fv: Option<Option<RawPrice>>,
        pub price_fp: Option<Option<RawPrice>>,
        pub active: Option<ActiveFlag>,
        pub image_url: Option<Option<String>>,
    }

    /// Query parameters for listing products.
    #[derive(Debug, Clone, Default)]
    pub struct CatalogFilter {
        pub q: Option<String>,
        pub category: Option<String>,
        pub active_only: bool,
    }
}

pub mod settings {
    /// Replacement values for the catalog settings; `None` keeps the current value.
    #[derive(Debug, Clone, Default)]
    pub struct UpdateSettingsCommand {
        pub categories_order: Option<Vec<String>>,
        pub show_prices: Option<bool>,
    }
}
