//! # Shift Commands
//!
//! Opening and closing shifts, wiping a shift's data, and the reports.
//!
//! ## Shift Lifecycle
//! ```text
//! start morning ──► sales, withdrawals, supplier payments ──► close --yes
//!      │                                                         │
//!      └── mirror: open remote shift                             └── mirror: close remote shift
//!
//! Ledgers survive close; only `reset <shift> --yes` wipes one.
//! ```

use caixa_core::{ActiveShift, LedgerEvent, Money, ShiftSummary, ShiftType, ShiftsOverview};
use caixa_sync::MirrorAction;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::commands::persist;
use crate::error::ApiError;
use crate::state::{RegisterState, StoreState, SyncState};

/// Current shift and its figures.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftResponse {
    pub active: Option<ActiveShift>,
    pub cash_balance: Money,
    pub summary: Option<ShiftSummary>,
    /// Shift that was open before a replacing `start`.
    pub replaced: Option<ShiftType>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosedShiftResponse {
    pub closed: ActiveShift,
    pub summary: ShiftSummary,
}

fn parse_shift(input: &str) -> Result<ShiftType, ApiError> {
    input.parse::<ShiftType>().map_err(ApiError::from)
}

/// Opens a shift. What happens when one is already open depends on the
/// configured reopen policy.
pub async fn start_shift(
    register: &RegisterState,
    store: &StoreState,
    sync: &SyncState,
    shift: &str,
) -> Result<ShiftResponse, ApiError> {
    debug!(shift = %shift, "start_shift command");
    let shift_type = parse_shift(shift)?;

    let mut guard = register.lock().await;
    let replaced = guard.start_shift(shift_type)?;
    persist(store, &guard).await;

    let response = ShiftResponse {
        active: guard.active_shift().cloned(),
        cash_balance: guard.cash_balance(),
        summary: Some(guard.summary(shift_type)),
        replaced: replaced.map(|r| r.shift_type),
    };
    sync.mirror(MirrorAction::ShiftOpened(shift_type));
    drop(guard);

    if let Some(previous) = response.replaced {
        warn!(previous = %previous, shift = %shift_type, "Open shift replaced");
    }
    info!(shift = %shift_type, "Shift started");

    Ok(response)
}

/// Closes the active shift. Requires `confirmed`.
pub async fn close_shift(
    register: &RegisterState,
    store: &StoreState,
    sync: &SyncState,
    confirmed: bool,
) -> Result<ClosedShiftResponse, ApiError> {
    debug!(confirmed, "close_shift command");

    let mut guard = register.lock().await;
    let cash_balance = guard.cash_balance();
    let closed = guard.close_shift(confirmed)?;
    persist(store, &guard).await;
    let summary = guard.summary(closed.shift_type);
    sync.mirror(MirrorAction::ShiftClosed {
        shift: closed.shift_type,
        cash_balance,
    });
    drop(guard);

    info!(
        shift = %closed.shift_type,
        cash_balance = %cash_balance,
        total_sales = %summary.total_sales,
        "Shift closed"
    );

    Ok(ClosedShiftResponse { closed, summary })
}

/// Wipes one shift's ledger. Requires `confirmed` and the shift closed.
pub async fn reset_shift_data(
    register: &RegisterState,
    store: &StoreState,
    shift: &str,
    confirmed: bool,
) -> Result<ShiftSummary, ApiError> {
    debug!(shift = %shift, confirmed, "reset_shift_data command");
    let shift_type = parse_shift(shift)?;

    let mut guard = register.lock().await;
    guard.reset_shift_data(shift_type, confirmed)?;
    persist(store, &guard).await;

    warn!(shift = %shift_type, "Shift data reset");
    Ok(guard.summary(shift_type))
}

pub async fn get_shift(register: &RegisterState) -> ShiftResponse {
    register
        .with_register(|r| ShiftResponse {
            active: r.active_shift().cloned(),
            cash_balance: r.cash_balance(),
            summary: r.active_shift().map(|a| r.summary(a.shift_type)),
            replaced: None,
        })
        .await
}

/// Report for `shift`, or the active shift when none is named.
pub async fn get_summary(
    register: &RegisterState,
    shift: Option<&str>,
) -> Result<ShiftSummary, ApiError> {
    let requested = shift.map(parse_shift).transpose()?;

    register
        .with_register(|r| -> Result<ShiftSummary, ApiError> {
            let shift_type = requested
                .or_else(|| r.active_shift().map(|a| a.shift_type))
                .ok_or_else(|| {
                    ApiError::from(caixa_core::CoreError::from(
                        caixa_core::PreconditionError::NoActiveShift,
                    ))
                })?;
            Ok(r.summary(shift_type))
        })
        .await
}

pub async fn get_overview(register: &RegisterState) -> ShiftsOverview {
    register.with_register(|r| r.overview()).await
}

/// Event history for a shift, most recent first.
pub async fn get_history(
    register: &RegisterState,
    shift: Option<&str>,
) -> Result<Vec<LedgerEvent>, ApiError> {
    let summary = get_summary(register, shift).await?;

    Ok(register
        .with_register(|r| {
            r.ledger(summary.shift_type)
                .history()
                .iter()
                .rev()
                .cloned()
                .collect::<Vec<_>>()
        })
        .await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::cart::{add_product, get_cart};
    use crate::commands::sale::{finalize_sale, select_payment};
    use crate::commands::withdrawal::withdraw;
    use crate::error::ErrorCode;
    use crate::state::tests::test_state;
    use crate::state::{ConfigState, RegisterState};
    use caixa_core::ReopenPolicy;

    async fn card_sale(state: &crate::state::AppState, product: &str) {
        add_product(&state.register, &state.store, &state.config, product)
            .await
            .unwrap();
        select_payment(&state.register, &state.store, "card").await.unwrap();
        finalize_sale(&state.register, &state.store, &state.sync)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_start_shift_reject_policy() {
        let (state, _db) = test_state().await;

        let response = start_shift(&state.register, &state.store, &state.sync, "morning")
            .await
            .unwrap();
        assert_eq!(response.active.unwrap().display_name, "☀️ Turno da Manhã");

        let err = start_shift(&state.register, &state.store, &state.sync, "afternoon")
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::PreconditionFailed);
    }

    #[tokio::test]
    async fn test_start_shift_replace_policy() {
        let (mut state, _db) = test_state().await;
        state.register = RegisterState::new(ReopenPolicy::Replace);
        state.config = std::sync::Arc::new(ConfigState {
            reopen_policy: ReopenPolicy::Replace,
            ..Default::default()
        });

        start_shift(&state.register, &state.store, &state.sync, "morning")
            .await
            .unwrap();
        let response = start_shift(&state.register, &state.store, &state.sync, "afternoon")
            .await
            .unwrap();

        assert_eq!(response.replaced, Some(ShiftType::Morning));
        assert_eq!(response.active.unwrap().shift_type, ShiftType::Afternoon);
    }

    #[tokio::test]
    async fn test_close_requires_confirmation() {
        let (state, _db) = test_state().await;
        start_shift(&state.register, &state.store, &state.sync, "morning")
            .await
            .unwrap();
        add_product(&state.register, &state.store, &state.config, "1")
            .await
            .unwrap();

        let err = close_shift(&state.register, &state.store, &state.sync, false)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfirmationRequired);
        assert!(get_shift(&state.register).await.active.is_some());

        let closed = close_shift(&state.register, &state.store, &state.sync, true)
            .await
            .unwrap();
        assert_eq!(closed.closed.shift_type, ShiftType::Morning);
        assert!(get_shift(&state.register).await.active.is_none());
        assert!(get_cart(&state.register).await.items.is_empty());
    }

    #[tokio::test]
    async fn test_ledger_survives_close_and_reopen() {
        let (state, _db) = test_state().await;
        start_shift(&state.register, &state.store, &state.sync, "morning")
            .await
            .unwrap();
        card_sale(&state, "Pão de Sal").await;
        close_shift(&state.register, &state.store, &state.sync, true)
            .await
            .unwrap();

        start_shift(&state.register, &state.store, &state.sync, "morning")
            .await
            .unwrap();
        let summary = get_summary(&state.register, None).await.unwrap();
        assert_eq!(summary.card_sales, Money::from_cents(70));
        assert_eq!(summary.sale_count, 1);
    }

    #[tokio::test]
    async fn test_reset_refused_while_active() {
        let (state, _db) = test_state().await;
        start_shift(&state.register, &state.store, &state.sync, "morning")
            .await
            .unwrap();
        card_sale(&state, "1").await;

        let err = reset_shift_data(&state.register, &state.store, "morning", true)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::PreconditionFailed);

        close_shift(&state.register, &state.store, &state.sync, true)
            .await
            .unwrap();
        let err = reset_shift_data(&state.register, &state.store, "morning", false)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfirmationRequired);

        let summary = reset_shift_data(&state.register, &state.store, "morning", true)
            .await
            .unwrap();
        assert_eq!(summary.total_sales, Money::zero());
        assert_eq!(summary.event_count, 0);
    }

    #[tokio::test]
    async fn test_overview_and_history() {
        let (state, _db) = test_state().await;
        start_shift(&state.register, &state.store, &state.sync, "morning")
            .await
            .unwrap();
        card_sale(&state, "1").await;
        card_sale(&state, "3").await;

        let history = get_history(&state.register, None).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].amount(), Money::from_cents(80));

        let overview = get_overview(&state.register).await;
        assert_eq!(overview.morning_total, Money::from_cents(150));
        assert_eq!(overview.afternoon_total, Money::zero());
        assert_eq!(overview.day_total, Money::from_cents(150));

        let afternoon = get_history(&state.register, Some("afternoon")).await.unwrap();
        assert!(afternoon.is_empty());
    }

    #[tokio::test]
    async fn test_summary_without_shift() {
        let (state, _db) = test_state().await;
        let err = get_summary(&state.register, None).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::PreconditionFailed);

        let err = withdraw(&state.register, &state.store, &state.sync, "1", None)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::PreconditionFailed);
    }
}
