//! # Cart Commands
//!
//! ## Cart Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart Lifecycle                                       │
//! │                                                                         │
//! │  ┌──────────┐     ┌──────────┐     ┌──────────┐     ┌──────────┐       │
//! │  │  Empty   │────►│ In Cart  │────►│ Payment  │────►│ Finalized│       │
//! │  │  Cart    │     │          │     │ selected │     │   Sale   │       │
//! │  └──────────┘     └──────────┘     └──────────┘     └──────────┘       │
//! │                        │                 │                              │
//! │                   add_product       finalize_sale                      │
//! │                   set_quantity      (sale.rs)                          │
//! │                   remove_item                                           │
//! │                        │                                                │
//! │                        ▼                                                │
//! │                   clear_cart ──────────────────────►                   │
//! │                                                      (back to empty)   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Line indexes are 0-based here; the CLI shows and accepts 1-based numbers.
//! Every mutation returns the whole cart plus the payment preview, so the
//! screen never shows a stale total.

use caixa_core::register::ChangePreview;
use caixa_core::{CartItem, Money, Register};
use serde::Serialize;
use tracing::debug;

use crate::commands::{parse_money, persist};
use crate::error::ApiError;
use crate::state::{ConfigState, RegisterState, StoreState};

/// Cart response including items, totals and the payment panel.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartResponse {
    pub items: Vec<CartItem>,
    pub item_count: usize,
    pub total_quantity: i64,
    pub total: Money,
    pub payment: ChangePreview,
}

impl From<&Register> for CartResponse {
    fn from(register: &Register) -> Self {
        let cart = register.cart();
        CartResponse {
            items: cart.items().to_vec(),
            item_count: cart.len(),
            total_quantity: cart.total_quantity(),
            total: cart.total(),
            payment: register.change_preview(),
        }
    }
}

/// Runs a cart mutation, persists, and renders the cart.
async fn mutate_cart<F>(
    register: &RegisterState,
    store: &StoreState,
    f: F,
) -> Result<CartResponse, ApiError>
where
    F: FnOnce(&mut Register) -> Result<(), ApiError>,
{
    let mut guard = register.lock().await;
    f(&mut *guard)?;
    persist(store, &guard).await;
    Ok(CartResponse::from(&*guard))
}

pub async fn get_cart(register: &RegisterState) -> CartResponse {
    debug!("get_cart command");
    register.with_register(|r| CartResponse::from(r)).await
}

/// Adds a catalog product, by name or button position.
pub async fn add_product(
    register: &RegisterState,
    store: &StoreState,
    config: &ConfigState,
    query: &str,
) -> Result<CartResponse, ApiError> {
    debug!(query = %query, "add_product command");

    let product = config
        .find_product(query)
        .ok_or_else(|| ApiError::not_found("Product", query.trim()))?
        .clone();

    mutate_cart(register, store, |r| {
        r.cart_mut().add_item(&product.name, product.price)?;
        Ok(())
    })
    .await
}

/// Adds a line with an explicit name and price.
///
/// The ad-hoc marker name ("Outros") makes it an ad-hoc line.
pub async fn add_item(
    register: &RegisterState,
    store: &StoreState,
    name: &str,
    price: &str,
) -> Result<CartResponse, ApiError> {
    debug!(name = %name, "add_item command");
    let price = parse_money(price)?;

    mutate_cart(register, store, |r| {
        r.cart_mut().add_item(name, price)?;
        Ok(())
    })
    .await
}

/// Adds an "Outros" line at the given price.
pub async fn add_ad_hoc(
    register: &RegisterState,
    store: &StoreState,
    price: &str,
) -> Result<CartResponse, ApiError> {
    debug!("add_ad_hoc command");
    let price = parse_money(price)?;

    mutate_cart(register, store, |r| {
        r.cart_mut().add_ad_hoc_item(price)?;
        Ok(())
    })
    .await
}

pub async fn remove_item(
    register: &RegisterState,
    store: &StoreState,
    index: usize,
) -> Result<CartResponse, ApiError> {
    debug!(index, "remove_item command");
    mutate_cart(register, store, |r| {
        r.cart_mut().remove_item(index)?;
        Ok(())
    })
    .await
}

/// Sets a line's quantity; zero or less removes the line.
pub async fn set_quantity(
    register: &RegisterState,
    store: &StoreState,
    index: usize,
    quantity: i64,
) -> Result<CartResponse, ApiError> {
    debug!(index, quantity, "set_quantity command");
    mutate_cart(register, store, |r| {
        r.cart_mut().set_quantity(index, quantity)?;
        Ok(())
    })
    .await
}

pub async fn rename_item(
    register: &RegisterState,
    store: &StoreState,
    index: usize,
    name: &str,
) -> Result<CartResponse, ApiError> {
    debug!(index, "rename_item command");
    mutate_cart(register, store, |r| {
        r.cart_mut().rename_ad_hoc_item(index, name)?;
        Ok(())
    })
    .await
}

pub async fn reprice_item(
    register: &RegisterState,
    store: &StoreState,
    index: usize,
    price: &str,
) -> Result<CartResponse, ApiError> {
    debug!(index, "reprice_item command");
    let price = parse_money(price)?;

    mutate_cart(register, store, |r| {
        r.cart_mut().reprice_ad_hoc_item(index, price)?;
        Ok(())
    })
    .await
}

/// Empties the cart and the payment selection.
pub async fn clear_cart(
    register: &RegisterState,
    store: &StoreState,
) -> Result<CartResponse, ApiError> {
    debug!("clear_cart command");
    mutate_cart(register, store, |r| {
        r.clear_sale();
        Ok(())
    })
    .await
}
