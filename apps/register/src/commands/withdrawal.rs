//! # Withdrawal Commands
//!
//! Sangria: taking cash out of the till during a shift.

use caixa_sync::MirrorAction;
use tracing::{debug, info};

use crate::commands::{commit_transaction, parse_money, TransactionResponse};
use crate::error::ApiError;
use crate::state::{RegisterState, StoreState, SyncState};

/// Withdraws cash from the till.
///
/// ## Errors
/// - `PRECONDITION_FAILED` - no shift open
/// - `VALIDATION_ERROR` - amount not positive or above the cash balance
pub async fn withdraw(
    register: &RegisterState,
    store: &StoreState,
    sync: &SyncState,
    amount: &str,
    reason: Option<&str>,
) -> Result<TransactionResponse, ApiError> {
    debug!("withdraw command");
    let amount = parse_money(amount)?;

    let mut guard = register.lock().await;
    let event = guard.withdraw(amount, reason)?;
    let outbox_id = commit_transaction(store, sync, &guard, &event).await;
    let cash_balance = guard.cash_balance();
    sync.mirror(MirrorAction::Event(event.clone()));
    drop(guard);

    info!(
        withdrawal_id = %event.id(),
        amount = %amount,
        cash_balance = %cash_balance,
        "Withdrawal recorded"
    );

    Ok(TransactionResponse {
        event,
        cash_balance,
        outbox_id,
        notice: format!("Sangria de {} registrada", amount),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::cart::add_item;
    use crate::commands::sale::{finalize_sale, select_payment, set_received};
    use crate::commands::shift::{get_summary, start_shift};
    use crate::error::ErrorCode;
    use crate::state::tests::test_state;
    use crate::state::AppState;
    use caixa_core::{LedgerEvent, Money, OutboxKind};

    async fn with_ten_in_till() -> (AppState, caixa_db::Database) {
        let (state, db) = test_state().await;
        start_shift(&state.register, &state.store, &state.sync, "morning")
            .await
            .unwrap();
        add_item(&state.register, &state.store, "Bolo", "10,00")
            .await
            .unwrap();
        select_payment(&state.register, &state.store, "cash").await.unwrap();
        set_received(&state.register, &state.store, "10,00").await.unwrap();
        finalize_sale(&state.register, &state.store, &state.sync)
            .await
            .unwrap();
        (state, db)
    }

    #[tokio::test]
    async fn test_withdraw_within_balance() {
        let (state, db) = with_ten_in_till().await;

        let response = withdraw(&state.register, &state.store, &state.sync, "4,00", Some("troco"))
            .await
            .unwrap();

        assert_eq!(response.cash_balance, Money::from_cents(600));
        match &response.event {
            LedgerEvent::Withdrawal { reason, .. } => assert_eq!(reason, "troco"),
            other => panic!("expected withdrawal, got {:?}", other),
        }

        let pending = db.outbox().pending().await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[1].kind, OutboxKind::Withdrawal);
    }

    #[tokio::test]
    async fn test_over_balance_withdrawal_rejected() {
        let (state, db) = with_ten_in_till().await;
        let before = get_summary(&state.register, None).await.unwrap();

        let err = withdraw(&state.register, &state.store, &state.sync, "15,00", None)
            .await
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::ValidationError);
        assert_eq!(get_summary(&state.register, None).await.unwrap(), before);
        assert_eq!(db.outbox().count_pending().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_blank_reason_defaults() {
        let (state, _db) = with_ten_in_till().await;

        let response = withdraw(&state.register, &state.store, &state.sync, "1", Some("  "))
            .await
            .unwrap();
        match response.event {
            LedgerEvent::Withdrawal { reason, .. } => assert_eq!(reason, caixa_core::UNSPECIFIED_LABEL),
            other => panic!("expected withdrawal, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_degraded_session_keeps_working() {
        let (state, db) = with_ten_in_till().await;
        db.close().await;

        let response = withdraw(&state.register, &state.store, &state.sync, "2,00", None)
            .await
            .unwrap();

        assert_eq!(response.cash_balance, Money::from_cents(800));
        assert!(response.outbox_id.is_none());
        assert!(state.store.is_degraded());
    }
}
