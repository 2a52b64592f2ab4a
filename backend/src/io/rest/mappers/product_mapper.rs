use shared::{
    CatalogResponse, CreateProductRequest, FlagInput, PriceInput, Product as SharedProduct,
    Settings as SharedSettings, UpdateProductRequest, UpdateSettingsRequest,
};

use crate::domain::commands::products::{
    ActiveFlag, CreateProductCommand, RawPrice, UpdateProductCommand,
};
use crate::domain::commands::settings::UpdateSettingsCommand;
use crate::domain::models::catalog::{CatalogSettings, CatalogView};
use crate::domain::models::product::DomainProduct;

/// Mapper to convert between shared product DTOs and domain types.
pub struct ProductMapper;

impl ProductMapper {
    pub fn to_dto(domain: DomainProduct) -> SharedProduct {
        SharedProduct {
            id: domain.id,
            name: domain.name,
            description: domain.description,
            category: domain.category,
            codes: domain.codes,
            flavors: domain.flavors,
            price_uv: domain.price_uv,
            price_up: domain.price_up,
            price_fv: domain.price_fv,
            price_fp: domain.price_fp,
            image_url: domain.image_url,
            image_public_id: domain.image_public_id,
            active: domain.active,
            sort_order: domain.sort_order,
            created_at: domain.created_at.to_rfc3339(),
            updated_at: domain.updated_at.to_rfc3339(),
        }
    }

    pub fn to_dto_list(domain: Vec<DomainProduct>) -> Vec<SharedProduct> {
        domain.into_iter().map(Self::to_dto).collect()
    }

    pub fn to_create_command(request: CreateProductRequest) -> CreateProductCommand {
        CreateProductCommand {
            name: request.name,
            description: request.description,
            category: request.category,
            codes: request.codes,
            flavors: request.flavors,
            price_uv: request.price_uv.map(Self::to_raw_price),
            price_up: request.price_up.map(Self::to_raw_price),
            price_fv: request.price_fv.map(Self::to_raw_price),
            price_fp: request.price_fp.map(Self::to_raw_price),
            active: request.active.and_then(Self::to_active_flag),
            image_url: request.image_url,
        }
    }

    pub fn to_update_command(request: UpdateProductRequest) -> UpdateProductCommand {
        UpdateProductCommand {
            name: request.name,
            description: request.description,
            category: request.category,
            codes: request.codes,
            flavors: request.flavors,
            price_uv: request.price_uv.map(|price| price.map(Self::to_raw_price)),
            price_up: request.price_up.map(|price| price.map(Self::to_raw_price)),
            price_fv: request.price_fv.map(|price| price.map(Self::to_raw_price)),
            price_fp: request.price_fp.map(|price| price.map(Self::to_raw_price)),
            active: request.active.and_then(Self::to_active_flag),
            image_url: request.image_url,
        }
    }

    fn to_raw_price(input: PriceInput) -> RawPrice {
        match input {
            PriceInput::Number(value) => RawPrice::Number(value),
            PriceInput::Text(text) => RawPrice::Text(text),
        }
    }

    /// Blank form values mean "not sent"
    fn to_active_flag(input: FlagInput) -> Option<ActiveFlag> {
        if let FlagInput::Text(text) = &input {
            if text.trim().is_empty() {
                return None;
            }
        }

        Some(match input.as_bool() {
            Some(value) => ActiveFlag::Value(value),
            None => ActiveFlag::Invalid(match input {
                FlagInput::Text(text) => text,
                other => format!("{:?}", other),
            }),
        })
    }
}

/// Mapper for the catalog settings and the public catalog payload.
pub struct SettingsMapper;

impl SettingsMapper {
    pub fn to_dto(domain: CatalogSettings) -> SharedSettings {
        SharedSettings {
            categories_order: domain.categories_order,
            show_prices: domain.show_prices,
        }
    }

    pub fn to_command(request: UpdateSettingsRequest) -> UpdateSettingsCommand {
        UpdateSettingsCommand {
            categories_order: request.categories_order,
            show_prices: request.show_prices,
        }
    }

    pub fn to_catalog_dto(view: CatalogView) -> CatalogResponse {
        CatalogResponse {
            products: ProductMapper::to_dto_list(view.products),
            settings: Self::to_dto(view.settings),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_active_flag_counts_as_absent() {
        let request = CreateProductRequest {
            active: Some(FlagInput::Text(" ".to_string())),
            ..Default::default()
        };
        assert_eq!(ProductMapper::to_create_command(request).active, None);
    }

    #[test]
    fn test_form_flags_are_interpreted() {
        let request = UpdateProductRequest {
            active: Some(FlagInput::Text("off".to_string())),
            ..Default::default()
        };
        assert_eq!(
            ProductMapper::to_update_command(request).active,
            Some(ActiveFlag::Value(false))
        );

        let request = UpdateProductRequest {
            active: Some(FlagInput::Text("perhaps".to_string())),
            ..Default::default()
        };
        assert!(matches!(
            ProductMapper::to_update_command(request).active,
            Some(ActiveFlag::Invalid(_))
        ));
    }

    #[test]
    fn test_update_keeps_absent_and_null_apart() {
        let request = UpdateProductRequest {
            price_uv: Some(None),
            price_up: Some(Some(PriceInput::Text("3,50".to_string()))),
            ..Default::default()
        };
        let command = ProductMapper::to_update_command(request);

        assert_eq!(command.price_uv, Some(None));
        assert_eq!(command.price_up, Some(Some(RawPrice::Text("3,50".to_string()))));
        assert_eq!(command.price_fv, None);
    }
}
