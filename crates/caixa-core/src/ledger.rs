//! # Ledger State Store
//!
//! One running ledger per shift type. Ledgers survive sales, shift closes
//! and restarts; only an explicit, confirmed reset clears one.
//!
//! ## Ledger Anatomy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ShiftLedger (morning)                                                  │
//! │                                                                         │
//! │  cash_sales_total        + every cash sale                              │
//! │  card_sales_total        + every card/PIX sale                          │
//! │  cash_payments_out       + cash part of supplier payments               │
//! │  external_payments_out   + external part of supplier payments           │
//! │  withdrawals_total       + every withdrawal (sangria)                   │
//! │                                                                         │
//! │  cash_balance() = cash_sales_total                                      │
//! │                 - cash_payments_out                                     │
//! │                 - withdrawals_total        (derived, never stored)      │
//! │                                                                         │
//! │  history: [Sale, Withdrawal, SupplierPayment, Sale, ...]  append-only   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The ledger does not validate. The register checks balances and inputs,
//! builds the event, then calls [`ShiftLedger::record`]; totals and history
//! are updated together from that one event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::money::Money;
use crate::types::{OutboxKind, PaymentMethod, ShiftType, SupplierPaymentSource};

// =============================================================================
// Ledger Events
// =============================================================================

/// A line of a completed sale, frozen at finalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleLine {
    pub name: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub total: Money,
    pub is_ad_hoc: bool,
}

/// An immutable entry in a shift's history.
///
/// The serialized form doubles as the outbox payload, so the `type` tag
/// matches [`OutboxKind`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    Sale {
        #[ts(as = "String")]
        id: Uuid,
        shift: ShiftType,
        #[ts(as = "String")]
        occurred_at: DateTime<Utc>,
        items: Vec<SaleLine>,
        total: Money,
        method: PaymentMethod,
        /// Cash handed over; equal to `total` for card sales.
        received: Money,
        change: Money,
    },
    #[serde(rename = "payment")]
    SupplierPayment {
        #[ts(as = "String")]
        id: Uuid,
        shift: ShiftType,
        #[ts(as = "String")]
        occurred_at: DateTime<Utc>,
        supplier: String,
        amount: Money,
        source: SupplierPaymentSource,
        from_cash: Money,
        external: Money,
    },
    Withdrawal {
        #[ts(as = "String")]
        id: Uuid,
        shift: ShiftType,
        #[ts(as = "String")]
        occurred_at: DateTime<Utc>,
        amount: Money,
        reason: String,
    },
}

impl LedgerEvent {
    pub fn id(&self) -> Uuid {
        match self {
            LedgerEvent::Sale { id, .. }
            | LedgerEvent::SupplierPayment { id, .. }
            | LedgerEvent::Withdrawal { id, .. } => *id,
        }
    }

    pub fn shift(&self) -> ShiftType {
        match self {
            LedgerEvent::Sale { shift, .. }
            | LedgerEvent::SupplierPayment { shift, .. }
            | LedgerEvent::Withdrawal { shift, .. } => *shift,
        }
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            LedgerEvent::Sale { occurred_at, .. }
            | LedgerEvent::SupplierPayment { occurred_at, .. }
            | LedgerEvent::Withdrawal { occurred_at, .. } => *occurred_at,
        }
    }

    /// The outbox kind this event is queued under.
    pub fn kind(&self) -> OutboxKind {
        match self {
            LedgerEvent::Sale { .. } => OutboxKind::Sale,
            LedgerEvent::SupplierPayment { .. } => OutboxKind::Payment,
            LedgerEvent::Withdrawal { .. } => OutboxKind::Withdrawal,
        }
    }

    /// Total value moved by the event.
    pub fn amount(&self) -> Money {
        match self {
            LedgerEvent::Sale { total, .. } => *total,
            LedgerEvent::SupplierPayment { amount, .. } | LedgerEvent::Withdrawal { amount, .. } => {
                *amount
            }
        }
    }
}

// =============================================================================
// Shift Ledger
// =============================================================================

/// Cumulative totals and history for one shift type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ShiftLedger {
    cash_sales_total: Money,
    card_sales_total: Money,
    cash_payments_out: Money,
    external_payments_out: Money,
    withdrawals_total: Money,
    history: Vec<LedgerEvent>,
}

impl ShiftLedger {
    pub fn new() -> Self {
        ShiftLedger::default()
    }

    /// Rebuilds a ledger by recording every event in order.
    pub fn replay<I>(events: I) -> Self
    where
        I: IntoIterator<Item = LedgerEvent>,
    {
        let mut ledger = ShiftLedger::new();
        for event in events {
            ledger.record(event);
        }
        ledger
    }

    /// Physical cash expected in the till.
    pub fn cash_balance(&self) -> Money {
        self.cash_sales_total - self.cash_payments_out - self.withdrawals_total
    }

    pub fn cash_sales_total(&self) -> Money {
        self.cash_sales_total
    }

    pub fn card_sales_total(&self) -> Money {
        self.card_sales_total
    }

    pub fn total_sales(&self) -> Money {
        self.cash_sales_total + self.card_sales_total
    }

    pub fn cash_payments_out(&self) -> Money {
        self.cash_payments_out
    }

    pub fn external_payments_out(&self) -> Money {
        self.external_payments_out
    }

    pub fn withdrawals_total(&self) -> Money {
        self.withdrawals_total
    }

    /// Events in the order they happened.
    pub fn history(&self) -> &[LedgerEvent] {
        &self.history
    }

    pub fn sale_count(&self) -> usize {
        self.history
            .iter()
            .filter(|e| matches!(e, LedgerEvent::Sale { .. }))
            .count()
    }

    /// Applies an already-validated event to the totals and appends it.
    pub fn record(&mut self, event: LedgerEvent) {
        match &event {
            LedgerEvent::Sale { total, method, .. } => match method {
                PaymentMethod::Cash => self.cash_sales_total += *total,
                PaymentMethod::Card => self.card_sales_total += *total,
            },
            LedgerEvent::SupplierPayment {
                from_cash, external, ..
            } => {
                self.cash_payments_out += *from_cash;
                self.external_payments_out += *external;
            }
            LedgerEvent::Withdrawal { amount, .. } => {
                self.withdrawals_total += *amount;
            }
        }
        self.history.push(event);
    }

    pub fn summary(&self, shift_type: ShiftType) -> ShiftSummary {
        ShiftSummary {
            shift_type,
            display_name: shift_type.display_name().to_string(),
            cash_sales: self.cash_sales_total,
            card_sales: self.card_sales_total,
            total_sales: self.total_sales(),
            cash_payments_out: self.cash_payments_out,
            external_payments_out: self.external_payments_out,
            withdrawals: self.withdrawals_total,
            cash_balance: self.cash_balance(),
            sale_count: self.sale_count(),
            event_count: self.history.len(),
        }
    }
}

/// Report of one shift's ledger, as shown in the history screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ShiftSummary {
    pub shift_type: ShiftType,
    pub display_name: String,
    pub cash_sales: Money,
    pub card_sales: Money,
    pub total_sales: Money,
    pub cash_payments_out: Money,
    pub external_payments_out: Money,
    pub withdrawals: Money,
    pub cash_balance: Money,
    pub sale_count: usize,
    pub event_count: usize,
}

/// Sales per shift for the whole day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ShiftsOverview {
    pub morning_total: Money,
    pub afternoon_total: Money,
    pub day_total: Money,
}

// =============================================================================
// Ledger Book
// =============================================================================

/// Both shift ledgers, keyed by shift type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LedgerBook {
    morning: ShiftLedger,
    afternoon: ShiftLedger,
}

impl LedgerBook {
    pub fn new() -> Self {
        LedgerBook::default()
    }

    pub fn get(&self, shift: ShiftType) -> &ShiftLedger {
        match shift {
            ShiftType::Morning => &self.morning,
            ShiftType::Afternoon => &self.afternoon,
        }
    }

    pub(crate) fn get_mut(&mut self, shift: ShiftType) -> &mut ShiftLedger {
        match shift {
            ShiftType::Morning => &mut self.morning,
            ShiftType::Afternoon => &mut self.afternoon,
        }
    }

    /// Clears one shift's totals and history.
    pub(crate) fn reset(&mut self, shift: ShiftType) {
        *self.get_mut(shift) = ShiftLedger::new();
    }

    pub fn overview(&self) -> ShiftsOverview {
        let morning_total = self.morning.total_sales();
        let afternoon_total = self.afternoon.total_sales();
        ShiftsOverview {
            morning_total,
            afternoon_total,
            day_total: morning_total + afternoon_total,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sale(total: i64, method: PaymentMethod) -> LedgerEvent {
        LedgerEvent::Sale {
            id: Uuid::new_v4(),
            shift: ShiftType::Morning,
            occurred_at: Utc::now(),
            items: vec![SaleLine {
                name: "Pão de Sal".to_string(),
                quantity: 1,
                unit_price: Money::from_cents(total),
                total: Money::from_cents(total),
                is_ad_hoc: false,
            }],
            total: Money::from_cents(total),
            method,
            received: Money::from_cents(total),
            change: Money::zero(),
        }
    }

    fn withdrawal(amount: i64) -> LedgerEvent {
        LedgerEvent::Withdrawal {
            id: Uuid::new_v4(),
            shift: ShiftType::Morning,
            occurred_at: Utc::now(),
            amount: Money::from_cents(amount),
            reason: "Troco do banco".to_string(),
        }
    }

    fn payment(from_cash: i64, external: i64) -> LedgerEvent {
        LedgerEvent::SupplierPayment {
            id: Uuid::new_v4(),
            shift: ShiftType::Morning,
            occurred_at: Utc::now(),
            supplier: "Moinho".to_string(),
            amount: Money::from_cents(from_cash + external),
            source: SupplierPaymentSource::Mixed,
            from_cash: Money::from_cents(from_cash),
            external: Money::from_cents(external),
        }
    }

    #[test]
    fn test_cash_balance_formula() {
        let mut ledger = ShiftLedger::new();
        ledger.record(sale(5000, PaymentMethod::Cash));
        ledger.record(sale(3000, PaymentMethod::Card));
        ledger.record(withdrawal(1000));
        ledger.record(payment(1500, 2500));

        assert_eq!(ledger.cash_sales_total(), Money::from_cents(5000));
        assert_eq!(ledger.card_sales_total(), Money::from_cents(3000));
        assert_eq!(ledger.external_payments_out(), Money::from_cents(2500));
        // card sales and external payments never touch the till
        assert_eq!(ledger.cash_balance(), Money::from_cents(2500));
        assert_eq!(ledger.history().len(), 4);
        assert_eq!(ledger.sale_count(), 2);
    }

    #[test]
    fn test_replay_matches_incremental_record() {
        let events = vec![
            sale(1200, PaymentMethod::Cash),
            withdrawal(200),
            sale(700, PaymentMethod::Card),
            payment(300, 0),
        ];

        let mut incremental = ShiftLedger::new();
        for event in events.clone() {
            incremental.record(event);
        }

        assert_eq!(ShiftLedger::replay(events), incremental);
    }

    #[test]
    fn test_event_serialization_tags() {
        let json = serde_json::to_value(sale(210, PaymentMethod::Cash)).unwrap();
        assert_eq!(json["type"], "sale");
        assert_eq!(json["method"], "cash");
        assert_eq!(json["items"][0]["name"], "Pão de Sal");

        let json = serde_json::to_value(payment(100, 0)).unwrap();
        assert_eq!(json["type"], "payment");
        assert_eq!(payment(100, 0).kind(), OutboxKind::Payment);

        let json = serde_json::to_value(withdrawal(100)).unwrap();
        assert_eq!(json["type"], "withdrawal");
    }

    #[test]
    fn test_book_overview_and_reset() {
        let mut book = LedgerBook::new();
        book.get_mut(ShiftType::Morning).record(sale(1000, PaymentMethod::Cash));
        book.get_mut(ShiftType::Afternoon).record(sale(400, PaymentMethod::Card));

        let overview = book.overview();
        assert_eq!(overview.morning_total, Money::from_cents(1000));
        assert_eq!(overview.afternoon_total, Money::from_cents(400));
        assert_eq!(overview.day_total, Money::from_cents(1400));

        book.reset(ShiftType::Morning);
        assert_eq!(book.get(ShiftType::Morning), &ShiftLedger::new());
        assert_eq!(book.get(ShiftType::Afternoon).total_sales(), Money::from_cents(400));
    }

    #[test]
    fn test_summary() {
        let mut ledger = ShiftLedger::new();
        ledger.record(sale(900, PaymentMethod::Cash));
        ledger.record(withdrawal(100));

        let summary = ledger.summary(ShiftType::Morning);
        assert_eq!(summary.display_name, "☀️ Turno da Manhã");
        assert_eq!(summary.cash_balance, Money::from_cents(800));
        assert_eq!(summary.sale_count, 1);
        assert_eq!(summary.event_count, 2);
    }
}
