pub mod product_mapper;

pub use product_mapper::{ProductMapper, SettingsMapper};
