//! # Sale Commands
//!
//! Payment selection and sale finalization.
//!
//! ## Sale Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Sale Flow                                       │
//! │                                                                         │
//! │  pay cash ──► receive 5,00 ──► finalize                                 │
//! │     │              │               │                                    │
//! │     │              │               ├── lock register                    │
//! │     │              │               ├── Register::finalize_sale          │
//! │     │              │               ├── persist snapshot                 │
//! │     │              │               ├── queue Sale in outbox             │
//! │     │              │               ├── push mirror action               │
//! │     │              │               └── unlock                           │
//! │     ▼              ▼               ▼                                    │
//! │  received=0   change preview   "Venda finalizada! Troco: R$ 2,90"       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use caixa_core::register::ChangePreview;
use caixa_core::PaymentMethod;
use caixa_sync::MirrorAction;
use tracing::{debug, info};

use crate::commands::{commit_transaction, parse_money, persist, TransactionResponse};
use crate::error::ApiError;
use crate::state::{RegisterState, StoreState, SyncState};

/// Chooses cash or card. Resets the received amount.
pub async fn select_payment(
    register: &RegisterState,
    store: &StoreState,
    method: &str,
) -> Result<ChangePreview, ApiError> {
    debug!(method = %method, "select_payment command");
    let method: PaymentMethod = method.parse()?;

    let mut guard = register.lock().await;
    guard.select_payment(method);
    persist(store, &guard).await;
    Ok(guard.change_preview())
}

/// Records the cash handed over by the customer.
pub async fn set_received(
    register: &RegisterState,
    store: &StoreState,
    amount: &str,
) -> Result<ChangePreview, ApiError> {
    debug!("set_received command");
    let amount = parse_money(amount)?;

    let mut guard = register.lock().await;
    guard.set_received(amount)?;
    persist(store, &guard).await;
    Ok(guard.change_preview())
}

/// Finalizes the sale in the cart.
///
/// ## Errors
/// - `PRECONDITION_FAILED` - no shift open
/// - `VALIDATION_ERROR` - empty cart, no payment method, not enough cash
///
/// On error the cart and payment selection are untouched.
pub async fn finalize_sale(
    register: &RegisterState,
    store: &StoreState,
    sync: &SyncState,
) -> Result<TransactionResponse, ApiError> {
    debug!("finalize_sale command");

    let mut guard = register.lock().await;
    let receipt = guard.finalize_sale()?;
    let outbox_id = commit_transaction(store, sync, &guard, &receipt.event).await;
    let cash_balance = guard.cash_balance();
    sync.mirror(MirrorAction::Event(receipt.event.clone()));
    drop(guard);

    info!(
        sale_id = %receipt.event.id(),
        total = %receipt.total,
        change = %receipt.change,
        "Sale finalized"
    );

    let notice = if receipt.change.is_positive() {
        format!("Venda finalizada! Troco: {}", receipt.change)
    } else {
        "Venda finalizada!".to_string()
    };

    Ok(TransactionResponse {
        event: receipt.event,
        cash_balance,
        outbox_id,
        notice,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::cart::{add_product, get_cart};
    use crate::commands::shift::start_shift;
    use crate::error::ErrorCode;
    use crate::state::tests::test_state;
    use caixa_core::{LedgerEvent, Money, OutboxKind};

    #[tokio::test]
    async fn test_morning_cash_sale_scenario() {
        let (state, db) = test_state().await;

        start_shift(&state.register, &state.store, &state.sync, "morning")
            .await
            .unwrap();
        for _ in 0..3 {
            add_product(&state.register, &state.store, &state.config, "Pão de Sal")
                .await
                .unwrap();
        }
        select_payment(&state.register, &state.store, "cash").await.unwrap();
        let preview = set_received(&state.register, &state.store, "5,00").await.unwrap();
        assert_eq!(preview.change, Some(Money::from_cents(290)));

        let response = finalize_sale(&state.register, &state.store, &state.sync)
            .await
            .unwrap();

        assert_eq!(response.cash_balance, Money::from_cents(210));
        assert_eq!(response.notice, "Venda finalizada! Troco: R$ 2,90");
        match &response.event {
            LedgerEvent::Sale { items, change, .. } => {
                assert_eq!(items.len(), 1);
                assert_eq!(items[0].name, "Pão de Sal");
                assert_eq!(items[0].quantity, 3);
                assert_eq!(items[0].total, Money::from_cents(210));
                assert_eq!(*change, Money::from_cents(290));
            }
            other => panic!("expected sale, got {:?}", other),
        }

        // Cart cleared, sale queued
        assert!(get_cart(&state.register).await.items.is_empty());
        let pending = db.outbox().pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].kind, OutboxKind::Sale);
        assert_eq!(Some(pending[0].id), response.outbox_id);
    }

    #[tokio::test]
    async fn test_card_sale_has_no_change() {
        let (state, _db) = test_state().await;
        start_shift(&state.register, &state.store, &state.sync, "tarde")
            .await
            .unwrap();
        add_product(&state.register, &state.store, &state.config, "3")
            .await
            .unwrap();
        select_payment(&state.register, &state.store, "pix").await.unwrap();

        let response = finalize_sale(&state.register, &state.store, &state.sync)
            .await
            .unwrap();
        assert_eq!(response.notice, "Venda finalizada!");
        // Card sales never touch the till
        assert_eq!(response.cash_balance, Money::zero());
    }

    #[tokio::test]
    async fn test_insufficient_cash_leaves_cart() {
        let (state, db) = test_state().await;
        start_shift(&state.register, &state.store, &state.sync, "morning")
            .await
            .unwrap();
        add_product(&state.register, &state.store, &state.config, "1")
            .await
            .unwrap();
        select_payment(&state.register, &state.store, "cash").await.unwrap();
        set_received(&state.register, &state.store, "0,50").await.unwrap();

        let err = finalize_sale(&state.register, &state.store, &state.sync)
            .await
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::ValidationError);
        assert_eq!(get_cart(&state.register).await.item_count, 1);
        assert_eq!(db.outbox().count_pending().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_finalize_without_shift() {
        let (state, _db) = test_state().await;
        add_product(&state.register, &state.store, &state.config, "1")
            .await
            .unwrap();
        select_payment(&state.register, &state.store, "card").await.unwrap();

        let err = finalize_sale(&state.register, &state.store, &state.sync)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::PreconditionFailed);
    }

    #[tokio::test]
    async fn test_selecting_method_resets_received() {
        let (state, _db) = test_state().await;
        select_payment(&state.register, &state.store, "cash").await.unwrap();
        set_received(&state.register, &state.store, "10").await.unwrap();

        let preview = select_payment(&state.register, &state.store, "cash").await.unwrap();
        assert_eq!(preview.received, Money::zero());

        let err = select_payment(&state.register, &state.store, "cheque")
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }
}
