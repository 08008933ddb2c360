//! # Product Catalog
//!
//! The bakery sells a handful of fixed-price products plus ad-hoc "Outros"
//! lines. The catalog is plain data; the register adapter may replace it from
//! configuration.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;
use crate::validation::{validate_item_name, validate_price};
use crate::AD_HOC_ITEM_NAME;

/// A product button on the register screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CatalogProduct {
    pub name: String,
    pub price: Money,
}

impl CatalogProduct {
    pub fn new(name: impl Into<String>, price: Money) -> Self {
        CatalogProduct {
            name: name.into(),
            price,
        }
    }
}

/// The products the bakery sells every day.
pub fn default_catalog() -> Vec<CatalogProduct> {
    vec![
        CatalogProduct::new("Pão de Sal", Money::from_cents(70)),
        CatalogProduct::new("Pão Doce Comum", Money::from_cents(70)),
        CatalogProduct::new("Pão Doce Especial", Money::from_cents(80)),
    ]
}

/// Checks a configured catalog.
///
/// Names must be valid, unique, and must not collide with the ad-hoc marker
/// (a catalog "Outros" would silently turn into an ad-hoc line).
pub fn validate_catalog(products: &[CatalogProduct]) -> Result<(), ValidationError> {
    let mut seen = std::collections::HashSet::new();

    for product in products {
        let name = validate_item_name(&product.name)?;
        validate_price(product.price)?;

        if name == AD_HOC_ITEM_NAME {
            return Err(ValidationError::InvalidFormat {
                field: "catalog".to_string(),
                reason: format!("'{}' is reserved for ad-hoc items", AD_HOC_ITEM_NAME),
            });
        }
        if !seen.insert(name.clone()) {
            return Err(ValidationError::InvalidFormat {
                field: "catalog".to_string(),
                reason: format!("duplicate product '{}'", name),
            });
        }
    }

    Ok(())
}

/// Finds a product by case-insensitive name or by 1-based position.
pub fn find_product<'a>(products: &'a [CatalogProduct], query: &str) -> Option<&'a CatalogProduct> {
    let query = query.trim();
    if let Ok(position) = query.parse::<usize>() {
        return position.checked_sub(1).and_then(|i| products.get(i));
    }
    products
        .iter()
        .find(|p| p.name.to_lowercase() == query.to_lowercase())
}
