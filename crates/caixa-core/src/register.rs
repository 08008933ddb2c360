//! # Register
//!
//! The Shift Manager and the three Transaction Processors, over one explicit
//! state container.
//!
//! ## Shift State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │              start_shift(type)                                          │
//! │   ┌─────────┐ ─────────────────► ┌──────────────────┐                   │
//! │   │ NoShift │                    │ ActiveShift(type)│ ◄─┐               │
//! │   └─────────┘ ◄───────────────── └──────────────────┘   │ sales,        │
//! │              close_shift(true)            │              │ withdrawals,  │
//! │                                           └──────────────┘ payments     │
//! │                                                                         │
//! │  close_shift clears the cart and payment selection.                     │
//! │  Ledgers persist across open/close cycles.                              │
//! │  start_shift while active: ReopenPolicy decides (Reject by default).    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Processor Contract
//! Every processor validates everything first and only then mutates. An
//! `Err` means the register is exactly as it was before the call. On success
//! the caller receives the [`LedgerEvent`] to queue for sync.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::cart::Cart;
use crate::error::{CoreResult, PreconditionError, ValidationError};
use crate::ledger::{LedgerBook, LedgerEvent, SaleLine, ShiftLedger, ShiftSummary, ShiftsOverview};
use crate::money::Money;
use crate::types::{ActiveShift, PaymentMethod, ShiftType, SupplierFunding};
use crate::validation::{normalize_label, validate_non_negative_amount, validate_positive_amount};
use crate::SPLIT_TOLERANCE;

// =============================================================================
// Supporting Types
// =============================================================================

/// What `start_shift` does when a shift is already open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum ReopenPolicy {
    /// Refuse with `ShiftAlreadyActive`.
    #[default]
    Reject,
    /// Replace the open shift. Ledgers are untouched either way.
    Replace,
}

impl FromStr for ReopenPolicy {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "reject" => Ok(ReopenPolicy::Reject),
            "replace" => Ok(ReopenPolicy::Replace),
            other => Err(ValidationError::InvalidFormat {
                field: "reopen policy".to_string(),
                reason: format!("unknown policy '{}', expected reject or replace", other),
            }),
        }
    }
}

/// Payment choices for the sale being rung up.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentSelection {
    pub method: Option<PaymentMethod>,
    /// Cash handed over by the customer. Only meaningful for cash.
    pub received: Money,
}

/// Live change calculation for the payment panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ChangePreview {
    pub total: Money,
    pub method: Option<PaymentMethod>,
    pub received: Money,
    /// Change due, when cash covers the total.
    pub change: Option<Money>,
    /// Amount still missing, when cash does not cover the total.
    pub shortfall: Option<Money>,
}

/// Result of a finalized sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleReceipt {
    pub event: LedgerEvent,
    pub total: Money,
    pub change: Money,
}

/// Everything needed to restore the register after a restart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RegisterSnapshot {
    pub cart: Cart,
    pub payment: PaymentSelection,
    pub ledgers: LedgerBook,
    pub active_shift: Option<ActiveShift>,
    #[ts(as = "String")]
    pub saved_at: DateTime<Utc>,
}

// =============================================================================
// Register
// =============================================================================

/// The register: cart, payment selection, active shift and both ledgers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Register {
    cart: Cart,
    payment: PaymentSelection,
    ledgers: LedgerBook,
    active_shift: Option<ActiveShift>,
    reopen_policy: ReopenPolicy,
}

impl Register {
    pub fn new() -> Self {
        Register::default()
    }

    pub fn with_reopen_policy(mut self, policy: ReopenPolicy) -> Self {
        self.reopen_policy = policy;
        self
    }

    /// Restores a register from a persisted snapshot.
    pub fn from_snapshot(snapshot: RegisterSnapshot, policy: ReopenPolicy) -> Self {
        Register {
            cart: snapshot.cart,
            payment: snapshot.payment,
            ledgers: snapshot.ledgers,
            active_shift: snapshot.active_shift,
            reopen_policy: policy,
        }
    }

    /// Captures the current state for persistence.
    pub fn snapshot(&self) -> RegisterSnapshot {
        RegisterSnapshot {
            cart: self.cart.clone(),
            payment: self.payment.clone(),
            ledgers: self.ledgers.clone(),
            active_shift: self.active_shift.clone(),
            saved_at: Utc::now(),
        }
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn cart(&self) -> &Cart {
        &self.cart
    }

    /// Cart edits are allowed with or without an open shift; only
    /// finalizing needs one.
    pub fn cart_mut(&mut self) -> &mut Cart {
        &mut self.cart
    }

    pub fn payment(&self) -> &PaymentSelection {
        &self.payment
    }

    pub fn active_shift(&self) -> Option<&ActiveShift> {
        self.active_shift.as_ref()
    }

    pub fn reopen_policy(&self) -> ReopenPolicy {
        self.reopen_policy
    }

    pub fn ledgers(&self) -> &LedgerBook {
        &self.ledgers
    }

    pub fn ledger(&self, shift: ShiftType) -> &ShiftLedger {
        self.ledgers.get(shift)
    }

    /// Cash expected in the till for the active shift; zero with no shift.
    pub fn cash_balance(&self) -> Money {
        match &self.active_shift {
            Some(active) => self.ledgers.get(active.shift_type).cash_balance(),
            None => Money::zero(),
        }
    }

    pub fn summary(&self, shift: ShiftType) -> ShiftSummary {
        self.ledgers.get(shift).summary(shift)
    }

    pub fn overview(&self) -> ShiftsOverview {
        self.ledgers.overview()
    }

    fn require_shift(&self) -> Result<ShiftType, PreconditionError> {
        self.active_shift
            .as_ref()
            .map(|s| s.shift_type)
            .ok_or(PreconditionError::NoActiveShift)
    }

    // -------------------------------------------------------------------------
    // Shift Manager
    // -------------------------------------------------------------------------

    /// Opens a shift. Never touches that shift's ledger.
    ///
    /// Returns the shift that was replaced, if the reopen policy allowed
    /// replacing one.
    pub fn start_shift(&mut self, shift_type: ShiftType) -> CoreResult<Option<ActiveShift>> {
        if let Some(active) = &self.active_shift {
            if self.reopen_policy == ReopenPolicy::Reject {
                return Err(PreconditionError::ShiftAlreadyActive {
                    active: active.shift_type,
                }
                .into());
            }
        }

        Ok(self.active_shift.replace(ActiveShift::open(shift_type)))
    }

    /// Closes the active shift after explicit confirmation.
    ///
    /// Clears the cart and payment selection; ledger totals and history stay.
    pub fn close_shift(&mut self, confirmed: bool) -> CoreResult<ActiveShift> {
        self.require_shift()?;
        if !confirmed {
            return Err(PreconditionError::ConfirmationRequired {
                operation: "close shift".to_string(),
            }
            .into());
        }

        self.clear_sale();
        self.active_shift
            .take()
            .ok_or_else(|| PreconditionError::NoActiveShift.into())
    }

    /// Wipes one shift's ledger. Requires confirmation and a closed shift.
    pub fn reset_shift_data(&mut self, shift: ShiftType, confirmed: bool) -> CoreResult<()> {
        if !confirmed {
            return Err(PreconditionError::ConfirmationRequired {
                operation: format!("reset {} shift data", shift),
            }
            .into());
        }
        if self.active_shift.as_ref().map(|a| a.shift_type) == Some(shift) {
            return Err(PreconditionError::ShiftInUse { shift }.into());
        }

        self.ledgers.reset(shift);
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Payment Selection
    // -------------------------------------------------------------------------

    /// Chooses the payment method; resets any received amount.
    pub fn select_payment(&mut self, method: PaymentMethod) {
        self.payment.method = Some(method);
        self.payment.received = Money::zero();
    }

    /// Records the cash handed over by the customer.
    pub fn set_received(&mut self, amount: Money) -> CoreResult<()> {
        validate_non_negative_amount("received", amount)?;
        self.payment.received = amount;
        Ok(())
    }

    pub fn change_preview(&self) -> ChangePreview {
        let total = self.cart.total();
        let received = self.payment.received;
        let (change, shortfall) = match self.payment.method {
            Some(PaymentMethod::Cash) if received >= total => (Some(received - total), None),
            Some(PaymentMethod::Cash) => (None, Some(total - received)),
            Some(PaymentMethod::Card) => (Some(Money::zero()), None),
            None => (None, None),
        };

        ChangePreview {
            total,
            method: self.payment.method,
            received,
            change,
            shortfall,
        }
    }

    /// Empties the cart and forgets the payment selection.
    pub fn clear_sale(&mut self) {
        self.cart.clear();
        self.payment = PaymentSelection::default();
    }

    // -------------------------------------------------------------------------
    // Transaction Processors
    // -------------------------------------------------------------------------

    /// Finalizes the sale in the cart.
    ///
    /// ## User Workflow
    /// ```text
    /// Cart: 3x Pão de Sal (R$ 2,10), Cash, received R$ 5,00
    ///      │
    ///      ▼
    /// finalize_sale() ← THIS FUNCTION
    ///      │
    ///      ├── no shift?         → NoActiveShift
    ///      ├── empty cart?       → EmptyCart
    ///      ├── no method?        → NoPaymentMethod
    ///      ├── cash < total?     → InsufficientFunds
    ///      │
    ///      ▼
    /// Sale recorded, cash_sales += R$ 2,10, change R$ 2,90, cart cleared
    /// ```
    pub fn finalize_sale(&mut self) -> CoreResult<SaleReceipt> {
        let shift = self.require_shift()?;
        if self.cart.is_empty() {
            return Err(ValidationError::EmptyCart.into());
        }
        let method = self.payment.method.ok_or(ValidationError::NoPaymentMethod)?;

        let total = self.cart.total();
        let (received, change) = match method {
            PaymentMethod::Cash => {
                let received = self.payment.received;
                if received < total {
                    return Err(ValidationError::InsufficientFunds { total, received }.into());
                }
                (received, received - total)
            }
            PaymentMethod::Card => (total, Money::zero()),
        };

        let items = self
            .cart
            .items()
            .iter()
            .map(|item| SaleLine {
                name: item.name.clone(),
                quantity: item.quantity,
                unit_price: item.unit_price,
                total: item.line_total,
                is_ad_hoc: item.is_ad_hoc,
            })
            .collect();

        let event = LedgerEvent::Sale {
            id: Uuid::new_v4(),
            shift,
            occurred_at: Utc::now(),
            items,
            total,
            method,
            received,
            change,
        };

        self.ledgers.get_mut(shift).record(event.clone());
        self.clear_sale();

        Ok(SaleReceipt {
            event,
            total,
            change,
        })
    }

    /// Pays a supplier from the till, externally, or both.
    ///
    /// ## Rules
    /// - `amount > 0`
    /// - Cash: `amount <= cash balance`
    /// - External: no balance check
    /// - Mixed: `|cash + external - amount| <= R$ 0,01` and `cash <= cash balance`
    pub fn pay_supplier(
        &mut self,
        supplier: Option<&str>,
        amount: Money,
        funding: SupplierFunding,
    ) -> CoreResult<LedgerEvent> {
        let shift = self.require_shift()?;
        validate_positive_amount("payment amount", amount)?;
        let supplier = normalize_label("supplier", supplier)?;

        let (from_cash, external) = match funding {
            SupplierFunding::Cash => (amount, Money::zero()),
            SupplierFunding::External => (Money::zero(), amount),
            SupplierFunding::Mixed { cash, external } => {
                validate_non_negative_amount("cash part", cash)?;
                validate_non_negative_amount("external part", external)?;
                let split_total = cash.checked_add(external).ok_or(ValidationError::SplitMismatch {
                    amount,
                    cash,
                    external,
                })?;
                if (split_total - amount).abs() > SPLIT_TOLERANCE {
                    return Err(ValidationError::SplitMismatch {
                        amount,
                        cash,
                        external,
                    }
                    .into());
                }
                (cash, external)
            }
        };

        let balance = self.ledgers.get(shift).cash_balance();
        if from_cash > balance {
            return Err(ValidationError::InsufficientCashBalance {
                requested: from_cash,
                balance,
            }
            .into());
        }

        let event = LedgerEvent::SupplierPayment {
            id: Uuid::new_v4(),
            shift,
            occurred_at: Utc::now(),
            supplier,
            amount,
            source: funding.source(),
            from_cash,
            external,
        };

        self.ledgers.get_mut(shift).record(event.clone());
        Ok(event)
    }

    /// Takes cash out of the till (sangria).
    pub fn withdraw(&mut self, amount: Money, reason: Option<&str>) -> CoreResult<LedgerEvent> {
        let shift = self.require_shift()?;
        validate_positive_amount("withdrawal", amount)?;
        let reason = normalize_label("reason", reason)?;

        let balance = self.ledgers.get(shift).cash_balance();
        if amount > balance {
            return Err(ValidationError::InsufficientCashBalance {
                requested: amount,
                balance,
            }
            .into());
        }

        let event = LedgerEvent::Withdrawal {
            id: Uuid::new_v4(),
            shift,
            occurred_at: Utc::now(),
            amount,
            reason,
        };

        self.ledgers.get_mut(shift).record(event.clone());
        Ok(event)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
