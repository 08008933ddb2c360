//! # Validation Module
//!
//! Input checks run before any register state is touched.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Register adapter                                             │
//! │  ├── Parses operator text (amounts, shift names, indexes)              │
//! │  └── Rejects malformed input immediately                               │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Quantity / price / amount ranges                                  │
//! │  └── Names and free-text labels                                        │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Register processors                                          │
//! │  └── State-dependent rules (balance, active shift, split totals)       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::money::Money;
use crate::{MAX_AMOUNT, MAX_CART_ITEMS, MAX_ITEM_QUANTITY, UNSPECIFIED_LABEL};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest free-text field accepted (item names, supplier, reason).
pub const MAX_LABEL_LEN: usize = 120;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a cart item name and returns it trimmed.
///
/// ```rust
/// use caixa_core::validation::validate_item_name;
///
/// assert_eq!(validate_item_name("  Sonho ").unwrap(), "Sonho");
/// assert!(validate_item_name("   ").is_err());
/// ```
pub fn validate_item_name(name: &str) -> ValidationResult<String> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.chars().count() > MAX_LABEL_LEN {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: MAX_LABEL_LEN,
        });
    }

    Ok(name.to_string())
}

/// Normalizes an optional free-text label (supplier, withdrawal reason).
///
/// Blank input becomes "Não informado" instead of an error; the operator
/// is allowed to skip these fields.
pub fn normalize_label(field: &str, label: Option<&str>) -> ValidationResult<String> {
    let label = label.map(str::trim).unwrap_or("");

    if label.is_empty() {
        return Ok(UNSPECIFIED_LABEL.to_string());
    }

    if label.chars().count() > MAX_LABEL_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_LABEL_LEN,
        });
    }

    Ok(label.to_string())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (999)
///
/// Zero and negative values never reach here: the cart treats them as a
/// removal before validating.
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a unit price. Zero is allowed (free items).
///
/// ## Rules
/// - Must not be negative
/// - Must not exceed MAX_AMOUNT (R$ 10.000.000,00)
pub fn validate_price(price: Money) -> ValidationResult<()> {
    validate_non_negative_amount("price", price)
}

/// Validates an amount that must be strictly positive
/// (withdrawals, supplier payments).
pub fn validate_positive_amount(field: &str, amount: Money) -> ValidationResult<()> {
    if !amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }

    check_ceiling(field, amount, 1)
}

/// Validates an amount that may be zero but not negative
/// (cash received, split parts).
pub fn validate_non_negative_amount(field: &str, amount: Money) -> ValidationResult<()> {
    if amount.is_negative() {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_AMOUNT.cents(),
        });
    }

    check_ceiling(field, amount, 0)
}

fn check_ceiling(field: &str, amount: Money, min: i64) -> ValidationResult<()> {
    if amount > MAX_AMOUNT {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min,
            max: MAX_AMOUNT.cents(),
        });
    }

    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates that one more line fits in the cart.
pub fn validate_cart_size(current_items: usize) -> ValidationResult<()> {
    if current_items >= MAX_CART_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "cart items".to_string(),
            min: 0,
            max: MAX_CART_ITEMS as i64,
        });
    }

    Ok(())
}
