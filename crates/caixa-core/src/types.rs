//! # Domain Types
//!
//! Small value types shared by the register, storage and sync layers.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   ShiftType     │   │  PaymentMethod  │   │ SupplierFunding │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  Morning        │   │  Cash           │   │  Cash           │       │
//! │  │  Afternoon      │   │  Card (or PIX)  │   │  External       │       │
//! │  └─────────────────┘   └─────────────────┘   │  Mixed{..}      │       │
//! │                                              └─────────────────┘       │
//! │  ┌─────────────────┐   ┌─────────────────┐                             │
//! │  │  ActiveShift    │   │  OutboxEntry    │                             │
//! │  │  ─────────────  │   │  ─────────────  │                             │
//! │  │  shift_type     │   │  id (autoinc)   │                             │
//! │  │  display_name   │   │  kind           │                             │
//! │  │  started_at     │   │  payload (JSON) │                             │
//! │  └─────────────────┘   └─────────────────┘                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;

// =============================================================================
// Shift Type
// =============================================================================

/// The two operating sessions of the bakery day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ShiftType {
    Morning,
    Afternoon,
}

impl ShiftType {
    /// Both shift types, in day order.
    pub const ALL: [ShiftType; 2] = [ShiftType::Morning, ShiftType::Afternoon];

    pub fn as_str(&self) -> &'static str {
        match self {
            ShiftType::Morning => "morning",
            ShiftType::Afternoon => "afternoon",
        }
    }

    /// Name shown in the register header.
    pub fn display_name(&self) -> &'static str {
        match self {
            ShiftType::Morning => "☀️ Turno da Manhã",
            ShiftType::Afternoon => "🌅 Turno da Tarde",
        }
    }

    /// Code used by the remote relational backend (`turnos.tipo`).
    pub fn remote_code(&self) -> &'static str {
        match self {
            ShiftType::Morning => "manha",
            ShiftType::Afternoon => "tarde",
        }
    }
}

impl fmt::Display for ShiftType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShiftType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "morning" | "manha" | "manhã" => Ok(ShiftType::Morning),
            "afternoon" | "tarde" => Ok(ShiftType::Afternoon),
            other => Err(ValidationError::InvalidFormat {
                field: "shift".to_string(),
                reason: format!("unknown shift '{}', expected morning or afternoon", other),
            }),
        }
    }
}

// =============================================================================
// Active Shift
// =============================================================================

/// The shift currently open at the register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ActiveShift {
    pub shift_type: ShiftType,
    pub display_name: String,
    #[ts(as = "String")]
    pub started_at: DateTime<Utc>,
}

impl ActiveShift {
    pub fn open(shift_type: ShiftType) -> Self {
        ActiveShift {
            shift_type,
            display_name: shift_type.display_name().to_string(),
            started_at: Utc::now(),
        }
    }
}

// =============================================================================
// Payment Method
// =============================================================================

/// How the customer pays for a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Physical cash; change is computed.
    Cash,
    /// Card or PIX on an external terminal; no change.
    Card,
}

impl PaymentMethod {
    pub fn label(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "Dinheiro",
            PaymentMethod::Card => "Cartão/PIX",
        }
    }

    /// Code used by the remote relational backend (`vendas.metodo_pagamento`).
    pub fn remote_code(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "dinheiro",
            PaymentMethod::Card => "cartao",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cash" | "dinheiro" => Ok(PaymentMethod::Cash),
            "card" | "cartao" | "cartão" | "pix" => Ok(PaymentMethod::Card),
            other => Err(ValidationError::InvalidFormat {
                field: "payment method".to_string(),
                reason: format!("unknown method '{}', expected cash or card", other),
            }),
        }
    }
}

// =============================================================================
// Supplier Payments
// =============================================================================

/// Where the money for a supplier payment comes from (as recorded).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SupplierPaymentSource {
    /// Entirely from the till.
    Cash,
    /// Bank transfer, PIX, card: does not touch the till.
    External,
    /// Part till, part external.
    Mixed,
}

impl SupplierPaymentSource {
    /// Code used by the remote backend (`pagamentos_fornecedor.tipo_pagamento`).
    ///
    /// The backend has no mixed code; mixed payments are filed as cash.
    pub fn remote_code(&self) -> &'static str {
        match self {
            SupplierPaymentSource::Cash | SupplierPaymentSource::Mixed => "dinheiro",
            SupplierPaymentSource::External => "pix",
        }
    }
}

/// Funding requested by the operator for a supplier payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum SupplierFunding {
    Cash,
    External,
    Mixed { cash: Money, external: Money },
}

impl SupplierFunding {
    pub fn source(&self) -> SupplierPaymentSource {
        match self {
            SupplierFunding::Cash => SupplierPaymentSource::Cash,
            SupplierFunding::External => SupplierPaymentSource::External,
            SupplierFunding::Mixed { .. } => SupplierPaymentSource::Mixed,
        }
    }
}

// =============================================================================
// Sync Outbox
// =============================================================================

/// Kind of transaction waiting in the outbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum OutboxKind {
    Sale,
    Payment,
    Withdrawal,
}

impl OutboxKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboxKind::Sale => "sale",
            OutboxKind::Payment => "payment",
            OutboxKind::Withdrawal => "withdrawal",
        }
    }
}

impl fmt::Display for OutboxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A completed transaction waiting for remote delivery.
///
/// Entries are deleted once the endpoint acknowledges them; `synced` is
/// therefore false for everything still stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OutboxEntry {
    /// Auto-increment key; ascending order is delivery order.
    pub id: i64,
    pub kind: OutboxKind,
    /// The transaction record as JSON text.
    pub payload: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    pub synced: bool,
    pub attempts: i64,
    pub last_error: Option<String>,
    #[ts(as = "Option<String>")]
    pub attempted_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shift_type_parsing() {
        assert_eq!("morning".parse::<ShiftType>().unwrap(), ShiftType::Morning);
        assert_eq!("Manhã".parse::<ShiftType>().unwrap(), ShiftType::Morning);
        assert_eq!("tarde".parse::<ShiftType>().unwrap(), ShiftType::Afternoon);
        assert!("noite".parse::<ShiftType>().is_err());
    }

    #[test]
    fn test_shift_display_names() {
        assert_eq!(ShiftType::Morning.display_name(), "☀️ Turno da Manhã");
        assert_eq!(ShiftType::Afternoon.display_name(), "🌅 Turno da Tarde");
        assert_eq!(ActiveShift::open(ShiftType::Afternoon).display_name, "🌅 Turno da Tarde");
    }

    #[test]
    fn test_payment_method_parsing() {
        assert_eq!("cash".parse::<PaymentMethod>().unwrap(), PaymentMethod::Cash);
        assert_eq!("PIX".parse::<PaymentMethod>().unwrap(), PaymentMethod::Card);
        assert!("cheque".parse::<PaymentMethod>().is_err());
    }

    #[test]
    fn test_supplier_funding_serde() {
        let funding = SupplierFunding::Mixed {
            cash: Money::from_cents(2000),
            external: Money::from_cents(3000),
        };
        let json = serde_json::to_value(funding).unwrap();
        assert_eq!(json["source"], "mixed");
        assert_eq!(json["cash"], 2000);
        assert_eq!(funding.source(), SupplierPaymentSource::Mixed);
    }

    #[test]
    fn test_outbox_kind_serde() {
        assert_eq!(serde_json::to_string(&OutboxKind::Withdrawal).unwrap(), "\"withdrawal\"");
        assert_eq!(OutboxKind::Sale.to_string(), "sale");
    }
}
