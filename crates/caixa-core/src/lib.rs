//! # caixa-core: Pure Register Logic for Caixa Freitas
//!
//! Everything the bakery register decides lives here: what goes in the cart,
//! which shift is open, how much cash should be in the till, and whether a
//! sale, supplier payment or withdrawal is allowed.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Caixa Freitas Architecture                         │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 apps/register (terminal adapter)                │   │
//! │  │    add, qty, pay, receive, finalize, withdraw, supplier, close  │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ caixa-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   money   │  │   cart    │  │  ledger   │  │ register  │  │   │
//! │  │   │   Money   │  │   Cart    │  │ShiftLedger│  │ Register  │  │   │
//! │  │   │  R$ 2,10  │  │ CartItem  │  │LedgerEvent│  │ processors│  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │           ┌────────────────────┴────────────────────┐                  │
//! │  ┌────────▼─────────┐                     ┌──────────▼─────────┐        │
//! │  │ caixa-db         │                     │ caixa-sync         │        │
//! │  │ snapshot, outbox │                     │ outbox delivery    │        │
//! │  └──────────────────┘                     └────────────────────┘        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - Integer-cent money with Brazilian real formatting
//! - [`types`] - Shift types, payment methods, outbox records
//! - [`cart`] - Cart Engine
//! - [`ledger`] - Per-shift ledgers and their event history
//! - [`register`] - Shift Manager and Transaction Processors
//! - [`catalog`] - Default bakery products
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use caixa_core::{Money, PaymentMethod, Register, ShiftType};
//!
//! let mut register = Register::new();
//! register.start_shift(ShiftType::Morning).unwrap();
//!
//! for _ in 0..3 {
//!     register.cart_mut().add_item("Pão de Sal", Money::from_cents(70)).unwrap();
//! }
//! register.select_payment(PaymentMethod::Cash);
//! register.set_received(Money::from_cents(500)).unwrap();
//!
//! let receipt = register.finalize_sale().unwrap();
//! assert_eq!(receipt.change, Money::from_cents(290));
//! assert_eq!(register.cash_balance(), Money::from_cents(210));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod catalog;
pub mod error;
pub mod ledger;
pub mod money;
pub mod register;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::{Cart, CartItem};
pub use catalog::CatalogProduct;
pub use error::{CartError, CoreError, CoreResult, PreconditionError, ValidationError};
pub use ledger::{LedgerBook, LedgerEvent, SaleLine, ShiftLedger, ShiftSummary, ShiftsOverview};
pub use money::Money;
pub use register::{
    PaymentSelection, Register, RegisterSnapshot, ReopenPolicy, SaleReceipt,
};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Name that marks a cart line as ad-hoc ("other" item).
///
/// Ad-hoc lines never merge with each other and keep a fixed quantity of 1.
pub const AD_HOC_ITEM_NAME: &str = "Outros";

/// Default supplier / withdrawal reason when the operator leaves it blank.
pub const UNSPECIFIED_LABEL: &str = "Não informado";

/// Maximum distinct lines allowed in a single cart.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity of a single cart line.
///
/// Guards against typing 1000 instead of 10.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Largest single amount the register accepts: R$ 10.000.000,00.
///
/// Applies to typed amounts, unit prices and transaction amounts. Line
/// totals and cart totals stay far below `i64` overflow under this cap.
pub const MAX_AMOUNT: Money = Money::from_cents(1_000_000_000);

/// Rounding tolerance for mixed supplier payments (one cent).
pub const SPLIT_TOLERANCE: Money = Money::from_cents(1);
