//! # Supplier Payment Commands
//!
//! ## Funding Sources
//! ```text
//! ┌──────────┬────────────────────────────┬──────────────────────────────┐
//! │ source   │ touches the till           │ check                        │
//! ├──────────┼────────────────────────────┼──────────────────────────────┤
//! │ cash     │ whole amount               │ amount ≤ cash balance        │
//! │ external │ no (PIX, transfer, card)   │ none                         │
//! │ mixed    │ the cash part              │ cash + external ≈ amount     │
//! │          │                            │ (R$ 0,01), cash ≤ balance    │
//! └──────────┴────────────────────────────┴──────────────────────────────┘
//! ```

use caixa_core::SupplierFunding;
use caixa_sync::MirrorAction;
use tracing::{debug, info};

use crate::commands::{commit_transaction, parse_money, TransactionResponse};
use crate::error::ApiError;
use crate::state::{RegisterState, StoreState, SyncState};

/// Funding as typed by the operator.
#[derive(Debug, Clone, Copy, Default)]
pub struct FundingInput<'a> {
    pub source: &'a str,
    pub cash: Option<&'a str>,
    pub external: Option<&'a str>,
}

/// Turns operator input into a funding choice.
pub fn parse_funding(input: FundingInput<'_>) -> Result<SupplierFunding, ApiError> {
    match input.source.trim().to_lowercase().as_str() {
        "cash" | "dinheiro" | "" => Ok(SupplierFunding::Cash),
        "external" | "externo" | "pix" | "transfer" | "cartao" | "cartão" => {
            Ok(SupplierFunding::External)
        }
        "mixed" | "misto" => match (input.cash, input.external) {
            (Some(cash), Some(external)) => Ok(SupplierFunding::Mixed {
                cash: parse_money(cash)?,
                external: parse_money(external)?,
            }),
            _ => Err(ApiError::validation(
                "mixed payments need both the cash and the external part",
            )),
        },
        other => Err(ApiError::validation(format!(
            "unknown payment source '{}', expected cash, external or mixed",
            other
        ))),
    }
}

/// Pays a supplier.
///
/// ## Errors
/// - `PRECONDITION_FAILED` - no shift open
/// - `VALIDATION_ERROR` - bad amount, split mismatch, cash part above the balance
pub async fn pay_supplier(
    register: &RegisterState,
    store: &StoreState,
    sync: &SyncState,
    supplier: Option<&str>,
    amount: &str,
    funding: FundingInput<'_>,
) -> Result<TransactionResponse, ApiError> {
    debug!(source = %funding.source, "pay_supplier command");
    let amount = parse_money(amount)?;
    let funding = parse_funding(funding)?;

    let mut guard = register.lock().await;
    let event = guard.pay_supplier(supplier, amount, funding)?;
    let outbox_id = commit_transaction(store, sync, &guard, &event).await;
    let cash_balance = guard.cash_balance();
    sync.mirror(MirrorAction::Event(event.clone()));
    drop(guard);

    info!(
        payment_id = %event.id(),
        amount = %amount,
        source = ?funding.source(),
        "Supplier payment recorded"
    );

    Ok(TransactionResponse {
        event,
        cash_balance,
        outbox_id,
        notice: format!("Pagamento de {} registrado", amount),
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
    use caixa_core::{LedgerEvent, Money, OutboxKind, SupplierPaymentSource};

    async fn with_till(amount: &str) -> (AppState, caixa_db::Database) {
        let (state, db) = test_state().await;
        start_shift(&state.register, &state.store, &state.sync, "afternoon")
            .await
            .unwrap();
        add_item(&state.register, &state.store, "Encomenda", amount)
            .await
            .unwrap();
        select_payment(&state.register, &state.store, "cash").await.unwrap();
        set_received(&state.register, &state.store, amount).await.unwrap();
        finalize_sale(&state.register, &state.store, &state.sync)
            .await
            .unwrap();
        (state, db)
    }

    fn mixed<'a>(cash: &'a str, external: &'a str) -> FundingInput<'a> {
        FundingInput {
            source: "mixed",
            cash: Some(cash),
            external: Some(external),
        }
    }

    #[test]
    fn test_parse_funding() {
        assert_eq!(parse_funding(FundingInput::default()).unwrap(), SupplierFunding::Cash);
        assert_eq!(
            parse_funding(FundingInput {
                source: "pix",
                ..Default::default()
            })
            .unwrap(),
            SupplierFunding::External
        );
        assert_eq!(
            parse_funding(mixed("20", "30")).unwrap(),
            SupplierFunding::Mixed {
                cash: Money::from_cents(2000),
                external: Money::from_cents(3000),
            }
        );
        assert!(parse_funding(FundingInput {
            source: "mixed",
            cash: Some("20"),
            external: None,
        })
        .is_err());
        assert!(parse_funding(FundingInput {
            source: "boleto",
            ..Default::default()
        })
        .is_err());
    }

    #[tokio::test]
    async fn test_mixed_split_mismatch_rejected() {
        let (state, db) = with_till("100,00").await;
        let before = get_summary(&state.register, None).await.unwrap();

        let err = pay_supplier(
            &state.register,
            &state.store,
            &state.sync,
            Some("Moinho"),
            "50,00",
            mixed("20,00", "29,00"),
        )
        .await
        .unwrap_err();

        assert_eq!(err.code, ErrorCode::ValidationError);
        assert_eq!(get_summary(&state.register, None).await.unwrap(), before);
        assert_eq!(db.outbox().count_pending().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_mixed_payment_splits_totals() {
        let (state, db) = with_till("100,00").await;

        let response = pay_supplier(
            &state.register,
            &state.store,
            &state.sync,
            Some("Moinho"),
            "50,00",
            mixed("20,00", "30,00"),
        )
        .await
        .unwrap();

        assert_eq!(response.cash_balance, Money::from_cents(8000));
        let summary = get_summary(&state.register, None).await.unwrap();
        assert_eq!(summary.cash_payments_out, Money::from_cents(2000));
        assert_eq!(summary.external_payments_out, Money::from_cents(3000));

        match &response.event {
            LedgerEvent::SupplierPayment { source, supplier, .. } => {
                assert_eq!(*source, SupplierPaymentSource::Mixed);
                assert_eq!(supplier, "Moinho");
            }
            other => panic!("expected supplier payment, got {:?}", other),
        }
        let pending = db.outbox().pending().await.unwrap();
        assert_eq!(pending.last().unwrap().kind, OutboxKind::Payment);
    }

    #[tokio::test]
    async fn test_external_payment_skips_balance_check() {
        let (state, _db) = with_till("5,00").await;

        let response = pay_supplier(
            &state.register,
            &state.store,
            &state.sync,
            None,
            "500,00",
            FundingInput {
                source: "external",
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(response.cash_balance, Money::from_cents(500));
        match response.event {
            LedgerEvent::SupplierPayment { supplier, .. } => {
                assert_eq!(supplier, caixa_core::UNSPECIFIED_LABEL)
            }
            other => panic!("expected supplier payment, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cash_payment_over_balance_rejected() {
        let (state, _db) = with_till("5,00").await;

        let err = pay_supplier(
            &state.register,
            &state.store,
            &state.sync,
            Some("Leite"),
            "6,00",
            FundingInput::default(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }
}
