//! # Cart Engine
//!
//! The in-progress sale: an ordered list of lines, newest first.
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart Operations                                      │
//! │                                                                         │
//! │  Operator Action          Cart Call               Effect                │
//! │  ───────────────          ─────────               ──────                │
//! │                                                                         │
//! │  Tap "Pão de Sal" ───────► add_item() ──────────► merge or insert at 0 │
//! │                                                                         │
//! │  Tap "Outros" ───────────► add_ad_hoc_item() ───► always insert at 0   │
//! │                                                                         │
//! │  Edit quantity ──────────► set_quantity() ──────► qty ≤ 0 removes      │
//! │                                                                         │
//! │  Edit ad-hoc line ───────► rename/reprice ──────► ad-hoc lines only    │
//! │                                                                         │
//! │  Tap trash ──────────────► remove_item() ───────► fails on bad index   │
//! │                                                                         │
//! │  total() is derived on every call, never cached.                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Invariants
//! - `line_total == unit_price × quantity` for every line
//! - Standard lines are unique by name; ad-hoc lines never merge
//! - Ad-hoc lines have quantity 1
//! - At most 100 lines, at most 999 per line

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CartError, CoreResult, ValidationError};
use crate::money::Money;
use crate::validation::{validate_cart_size, validate_item_name, validate_price, validate_quantity};
use crate::{AD_HOC_ITEM_NAME, MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

// =============================================================================
// Cart Item
// =============================================================================

/// A line in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartItem {
    pub name: String,
    pub unit_price: Money,
    pub quantity: i64,
    pub line_total: Money,
    /// True for "Outros" lines: free name and price, quantity fixed at 1.
    pub is_ad_hoc: bool,
    #[ts(as = "String")]
    pub added_at: DateTime<Utc>,
}

impl CartItem {
    fn new(name: String, unit_price: Money, is_ad_hoc: bool) -> Self {
        CartItem {
            name,
            unit_price,
            quantity: 1,
            line_total: unit_price,
            is_ad_hoc,
            added_at: Utc::now(),
        }
    }

    fn set_quantity(&mut self, quantity: i64) -> CoreResult<()> {
        self.line_total = line_total(self.unit_price, quantity)?;
        self.quantity = quantity;
        Ok(())
    }

    fn set_unit_price(&mut self, price: Money) -> CoreResult<()> {
        self.line_total = line_total(price, self.quantity)?;
        self.unit_price = price;
        Ok(())
    }
}

fn line_total(price: Money, quantity: i64) -> CoreResult<Money> {
    price
        .checked_multiply_quantity(quantity)
        .ok_or_else(|| {
            ValidationError::OutOfRange {
                field: "line total".to_string(),
                min: 0,
                max: i64::MAX,
            }
            .into()
        })
}

// =============================================================================
// Cart
// =============================================================================

/// The cart for the sale currently being rung up.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    pub fn new() -> Self {
        Cart::default()
    }

    /// Adds one unit of a product.
    ///
    /// ## Behavior
    /// - Name equal to "Outros": a new ad-hoc line at the front, every time
    /// - Standard line with the same name exists: its quantity goes up by one
    ///   and it stays where it is
    /// - Otherwise: a new line at the front
    ///
    /// Returns the index of the line that was created or updated.
    pub fn add_item(&mut self, name: &str, price: Money) -> CoreResult<usize> {
        let name = validate_item_name(name)?;
        validate_price(price)?;

        if name == AD_HOC_ITEM_NAME {
            return self.insert_front(CartItem::new(name, price, true));
        }

        if let Some(index) = self
            .items
            .iter()
            .position(|item| !item.is_ad_hoc && item.name == name)
        {
            let item = &mut self.items[index];
            let new_qty = item.quantity + 1;
            if new_qty > MAX_ITEM_QUANTITY {
                return Err(CartError::QuantityTooLarge {
                    requested: new_qty,
                    max: MAX_ITEM_QUANTITY,
                }
                .into());
            }
            item.set_quantity(new_qty)?;
            return Ok(index);
        }

        self.insert_front(CartItem::new(name, price, false))
    }

    /// Adds an "Outros" line with the given price.
    pub fn add_ad_hoc_item(&mut self, price: Money) -> CoreResult<usize> {
        self.add_item(AD_HOC_ITEM_NAME, price)
    }

    fn insert_front(&mut self, item: CartItem) -> CoreResult<usize> {
        if validate_cart_size(self.items.len()).is_err() {
            return Err(CartError::CartTooLarge {
                max: MAX_CART_ITEMS,
            }
            .into());
        }
        self.items.insert(0, item);
        Ok(0)
    }

    /// Removes the line at `index`.
    pub fn remove_item(&mut self, index: usize) -> CoreResult<CartItem> {
        self.check_index(index)?;
        Ok(self.items.remove(index))
    }

    /// Sets the quantity of the line at `index`.
    ///
    /// `qty <= 0` removes the line, exactly like [`Cart::remove_item`].
    pub fn set_quantity(&mut self, index: usize, qty: i64) -> CoreResult<()> {
        self.check_index(index)?;

        if qty <= 0 {
            self.items.remove(index);
            return Ok(());
        }

        if self.items[index].is_ad_hoc && qty != 1 {
            return Err(CartError::AdHocQuantityFixed.into());
        }

        validate_quantity(qty)?;
        self.items[index].set_quantity(qty)
    }

    /// Renames an ad-hoc line. Standard lines are rejected untouched.
    pub fn rename_ad_hoc_item(&mut self, index: usize, name: &str) -> CoreResult<()> {
        self.check_ad_hoc(index)?;
        let name = validate_item_name(name)?;
        self.items[index].name = name;
        Ok(())
    }

    /// Changes the price of an ad-hoc line. Standard lines are rejected untouched.
    pub fn reprice_ad_hoc_item(&mut self, index: usize, price: Money) -> CoreResult<()> {
        self.check_ad_hoc(index)?;
        validate_price(price)?;
        self.items[index].set_unit_price(price)
    }

    fn check_index(&self, index: usize) -> Result<(), CartError> {
        if index >= self.items.len() {
            return Err(CartError::IndexOutOfRange {
                index,
                len: self.items.len(),
            });
        }
        Ok(())
    }

    fn check_ad_hoc(&self, index: usize) -> Result<(), CartError> {
        self.check_index(index)?;
        if !self.items[index].is_ad_hoc {
            return Err(CartError::NotAdHoc { index });
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn get(&self, index: usize) -> Option<&CartItem> {
        self.items.get(index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Total quantity across all lines.
    pub fn total_quantity(&self) -> i64 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    /// Sum of line totals. Saturates instead of wrapping.
    pub fn total(&self) -> Money {
        self.items.iter().map(|i| i.line_total).sum()
    }
}

/// Cart totals summary for responses.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartTotals {
    pub line_count: usize,
    pub total_quantity: i64,
    pub total: Money,
}

impl From<&Cart> for CartTotals {
    fn from(cart: &Cart) -> Self {
        CartTotals {
            line_count: cart.len(),
            total_quantity: cart.total_quantity(),
            total: cart.total(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
