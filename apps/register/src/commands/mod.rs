//! # Register Commands
//!
//! One function per operator action. The CLI dispatcher in [`crate::cli`]
//! parses a line and calls into here.
//!
//! ## Command Organization
//! ```text
//! commands/
//! ├── cart.rs        ◄─── add, other, remove, qty, rename, reprice, clear
//! ├── sale.rs        ◄─── pay, receive, finalize
//! ├── shift.rs       ◄─── start, close, reset, summary, overview, history
//! ├── supplier.rs    ◄─── supplier payments
//! ├── withdrawal.rs  ◄─── sangria
//! └── sync.rs        ◄─── sync status, sync now, pending outbox
//! ```
//!
//! ## Mutation Pattern
//! ```text
//! lock register ──► validate + mutate (caixa-core) ──► persist snapshot
//!      │                                                     │
//!      │            (transactions only) queue event ◄────────┘
//!      │                                                     │
//!      │            push mirror action (ordered) ◄───────────┘
//!      ▼
//! unlock ──► render response
//! ```
//! A core error returns before anything is persisted or queued.

pub mod cart;
pub mod sale;
pub mod shift;
pub mod supplier;
pub mod sync;
pub mod withdrawal;

use caixa_core::{LedgerEvent, Money, Register};
use serde::Serialize;

use crate::error::ApiError;
use crate::state::{StoreState, SyncState};

/// Parses an amount as the operator types it (`5`, `5,00`, `R$ 5,00`).
pub fn parse_money(input: &str) -> Result<Money, ApiError> {
    input.parse::<Money>().map_err(ApiError::from)
}

/// Writes the snapshot. Call while holding the register lock.
pub(crate) async fn persist(store: &StoreState, register: &Register) {
    store.persist(&register.snapshot()).await;
}

/// Persists and queues a finished transaction. Call while holding the
/// register lock so outbox order matches ledger order.
pub(crate) async fn commit_transaction(
    store: &StoreState,
    sync: &SyncState,
    register: &Register,
    event: &LedgerEvent,
) -> Option<i64> {
    persist(store, register).await;
    sync.queue_event(event, store).await
}

/// Response for the three transaction processors.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResponse {
    pub event: LedgerEvent,
    /// Cash in the till after the transaction.
    pub cash_balance: Money,
    /// Outbox id, absent when the event could not be queued.
    pub outbox_id: Option<i64>,
    /// Operator notification text.
    pub notice: String,
}
