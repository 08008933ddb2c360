//! # Error Types
//!
//! Domain-specific error types for caixa-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  caixa-core errors (this file)                                         │
//! │  ├── ValidationError    - Bad operator input, rejected before mutation │
//! │  ├── PreconditionError  - Operation not allowed in the current state   │
//! │  ├── CartError          - Invalid cart line operation                  │
//! │  └── CoreError          - Umbrella over the three above                │
//! │                                                                         │
//! │  caixa-db errors         → DbError (storage)                           │
//! │  caixa-sync errors       → SyncError (delivery, never shown as failure)│
//! │  register app errors     → ApiError (what the operator sees)           │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → ApiError → Operator notification  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every error in this file is raised BEFORE any state is touched. A caller
//! that receives one can rely on the register being exactly as it was.

use thiserror::Error;

use crate::money::Money;
use crate::types::ShiftType;

// =============================================================================
// Core Error
// =============================================================================

/// Umbrella error for every register operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Precondition(#[from] PreconditionError),

    #[error(transparent)]
    Cart(#[from] CartError),
}

impl CoreError {
    /// Stable machine-readable kind, used by the adapter for error codes.
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::Validation(_) => "validation",
            CoreError::Precondition(_) => "precondition",
            CoreError::Cart(_) => "cart",
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Bad operator input.
///
/// ## User Workflow
/// ```text
/// Operator types R$ 3,00 received for a R$ 5,40 sale
///      │
///      ▼
/// finalize_sale()
///      │
///      ▼
/// InsufficientFunds { total: R$ 5,40, received: R$ 3,00 }
///      │
///      ▼
/// Notification: "Valor recebido insuficiente"; cart untouched
/// ```
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is missing or blank.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be strictly positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value could not be parsed.
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Finalizing a sale with nothing in the cart.
    #[error("cart is empty")]
    EmptyCart,

    /// Finalizing a sale before choosing cash or card.
    #[error("no payment method selected")]
    NoPaymentMethod,

    /// Cash received does not cover the sale total.
    #[error("received {received} does not cover total {total}")]
    InsufficientFunds { total: Money, received: Money },

    /// Withdrawal or cash-funded payment larger than the till holds.
    #[error("requested {requested} exceeds cash balance {balance}")]
    InsufficientCashBalance { requested: Money, balance: Money },

    /// Mixed supplier payment whose parts do not add up to the amount.
    #[error("cash {cash} + external {external} does not match amount {amount}")]
    SplitMismatch {
        amount: Money,
        cash: Money,
        external: Money,
    },
}

// =============================================================================
// Precondition Error
// =============================================================================

/// The register is not in a state that allows the operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PreconditionError {
    /// No shift is open.
    ///
    /// ## When This Occurs
    /// - Finalizing a sale before picking morning/afternoon
    /// - Withdrawal or supplier payment outside a shift
    /// - Closing when nothing is open
    #[error("no active shift")]
    NoActiveShift,

    /// Starting a shift while one is open and the reopen policy rejects it.
    #[error("{active} shift is already active")]
    ShiftAlreadyActive { active: ShiftType },

    /// A destructive operation was attempted without confirmation.
    #[error("{operation} requires confirmation")]
    ConfirmationRequired { operation: String },

    /// Wiping the ledger of the shift that is currently open.
    #[error("cannot reset {shift} while it is active")]
    ShiftInUse { shift: ShiftType },
}

// =============================================================================
// Cart Error
// =============================================================================

/// Invalid cart line operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CartError {
    /// Line index does not exist.
    #[error("cart line {index} out of range (cart has {len} lines)")]
    IndexOutOfRange { index: usize, len: usize },

    /// Rename/reprice attempted on a catalog product line.
    #[error("line {index} is not an ad-hoc item")]
    NotAdHoc { index: usize },

    /// Ad-hoc lines are always quantity 1.
    #[error("ad-hoc items have a fixed quantity of 1")]
    AdHocQuantityFixed,

    /// Too many distinct lines.
    #[error("cart cannot have more than {max} lines")]
    CartTooLarge { max: usize },

    /// Line quantity above the per-line cap.
    #[error("quantity {requested} exceeds maximum allowed ({max})")]
    QuantityTooLarge { requested: i64, max: i64 },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
