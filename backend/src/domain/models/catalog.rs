use serde::{Deserialize, Serialize};

use super::product::{DomainProduct, ProductDraft};

/// Singleton catalog settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSettings {
    #[serde(default)]
    pub categories_order: Vec<String>,
    #[serde(default = "default_show_prices")]
    pub show_prices: bool,
}

fn default_show_prices() -> bool {
    true
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            categories_order: Vec::new(),
            show_prices: true,
        }
    }
}

impl CatalogSettings {
    /// Appends `category` if it is not known yet. Returns true when the list changed.
    pub fn ensure_category(&mut self, category: &str) -> bool {
        if category.is_empty() || self.categories_order.iter().any(|known| known == category) {
            return false;
        }
        self.categories_order.push(category.to_string());
        true
    }

    pub fn apply(&mut self, change: SettingsChange) {
        if let Some(categories_order) = change.categories_order {
            self.categories_order = categories_order;
        }
        if let Some(show_prices) = change.show_prices {
            self.show_prices = show_prices;
        }
    }
}

/// Fields of the settings to replace; `None` keeps the stored value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsChange {
    pub categories_order: Option<Vec<String>>,
    pub show_prices: Option<bool>,
}

impl SettingsChange {
    pub fn is_empty(&self) -> bool {
        self.categories_order.is_none() && self.show_prices.is_none()
    }
}

/// The whole catalog as one document: what the document backends persist
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSnapshot {
    #[serde(default)]
    pub products: Vec<DomainProduct>,
    #[serde(default)]
    pub settings: CatalogSettings,
}

impl CatalogSnapshot {
    pub fn next_id(&self) -> i64 {
        self.products.iter().map(|product| product.id).max().unwrap_or(0) + 1
    }

    pub fn next_sort_order(&self) -> i64 {
        self.products.iter().map(|product| product.sort_order).max().unwrap_or(0) + 1
    }

    /// Append `draft` after the last product and register its category
    pub fn insert(&mut self, draft: ProductDraft) -> DomainProduct {
        let product = draft.into_product(self.next_id(), self.next_sort_order());
        if let Some(category) = product.category.as_deref() {
            self.settings.ensure_category(category);
        }
        self.products.push(product.clone());
        product
    }

    /// Overwrite the stored product with the same id, keeping its position and
    /// creation time, and register its category. `None` if the id is unknown.
    pub fn replace(&mut self, product: &DomainProduct) -> Option<DomainProduct> {
        let slot = self.products.iter_mut().find(|existing| existing.id == product.id)?;
        *slot = DomainProduct {
            sort_order: slot.sort_order,
            created_at: slot.created_at,
            ..product.clone()
        };
        let stored = slot.clone();

        if let Some(category) = stored.category.as_deref() {
            self.settings.ensure_category(category);
        }
        Some(stored)
    }
}

/// Products and settings as served to the storefront
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogView {
    pub products: Vec<DomainProduct>,
    pub settings: CatalogSettings,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_partial_document_is_filled_in() {
        let snapshot: CatalogSnapshot = serde_json::from_value(json!({ "products": [] })).unwrap();
        assert_eq!(snapshot.settings, CatalogSettings::default());
        assert!(snapshot.settings.show_prices);

        let snapshot: CatalogSnapshot =
            serde_json::from_value(json!({ "settings": { "categoriesOrder": ["Drinks"] } })).unwrap();
        assert!(snapshot.products.is_empty());
        assert_eq!(snapshot.settings.categories_order, vec!["Drinks".to_string()]);
        assert!(snapshot.settings.show_prices);
    }

    #[test]
    fn test_ensure_category_only_appends_unseen() {
        let mut settings = CatalogSettings::default();

        assert!(settings.ensure_category("Drinks"));
        assert!(!settings.ensure_category("Drinks"));
        assert!(!settings.ensure_category(""));
        assert!(settings.ensure_category("Snacks"));
        assert_eq!(settings.categories_order, vec!["Drinks", "Snacks"]);
    }

    #[test]
    fn test_next_id_starts_at_one() {
        assert_eq!(CatalogSnapshot::default().next_id(), 1);
        assert_eq!(CatalogSnapshot::default().next_sort_order(), 1);
    }

    fn draft(name: &str, category: Option<&str>) -> ProductDraft {
        let now = chrono::Utc::now();
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

    #[test]
    fn test_insert_appends_after_highest_position() {
        let mut snapshot = CatalogSnapshot::default();
        let soda = snapshot.insert(draft("Soda", Some("Drinks")));
        snapshot.products[0].sort_order = 7;

        let chips = snapshot.insert(draft("Chips", Some("Snacks")));
        let water = snapshot.insert(draft("Water", Some("Drinks")));

        assert_eq!((soda.id, soda.sort_order), (1, 1));
        assert_eq!((chips.id, chips.sort_order), (2, 8));
        assert_eq!((water.id, water.sort_order), (3, 9));
        assert_eq!(snapshot.settings.categories_order, vec!["Drinks", "Snacks"]);
    }

    #[test]
    fn test_replace_keeps_position_and_registers_category() {
        let mut snapshot = CatalogSnapshot::default();
        let soda = snapshot.insert(draft("Soda", None));
        snapshot.products[0].sort_order = 4;

        let mut edited = soda.clone();
        edited.name = "Cola".to_string();
        edited.category = Some("Drinks".to_string());
        edited.sort_order = 99;

        let stored = snapshot.replace(&edited).unwrap();
        assert_eq!(stored.name, "Cola");
        assert_eq!(stored.sort_order, 4);
        assert_eq!(stored.created_at, soda.created_at);
        assert_eq!(snapshot.settings.categories_order, vec!["Drinks"]);

        edited.id = 42;
        assert_eq!(snapshot.replace(&edited), None);
    }

    #[test]
    fn test_apply_only_touches_given_fields() {
        let mut settings = CatalogSettings::default();
        settings.ensure_category("Drinks");

        settings.apply(SettingsChange {
            show_prices: Some(false),
            ..Default::default()
        });
        assert_eq!(settings.categories_order, vec!["Drinks"]);
        assert!(!settings.show_prices);

        settings.apply(SettingsChange {
            categories_order: Some(vec!["Snacks".to_string()]),
            ..Default::default()
        });
        assert_eq!(settings.categories_order, vec!["Snacks"]);
        assert!(!settings.show_prices);
    }
}
