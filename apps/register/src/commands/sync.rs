//! # Sync Commands
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Sync Commands                                    │
//! │                                                                         │
//! │  get_sync_status()   - online flag, pending count, last sync / error   │
//! │  sync_now()          - asks the agent for a pass                       │
//! │  get_pending()       - outbox entries still waiting, oldest first      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use caixa_core::OutboxEntry;
use caixa_sync::SyncStatus;
use serde::Serialize;
use tracing::debug;

use crate::error::ApiError;
use crate::state::{StoreState, SyncState};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatusResponse {
    /// False when the session has no outbox at all.
    pub enabled: bool,
    pub status: Option<SyncStatus>,
}

pub async fn get_sync_status(sync: &SyncState) -> SyncStatusResponse {
    debug!("get_sync_status command");
    let status = sync.status().await;
    SyncStatusResponse {
        enabled: status.is_some(),
        status,
    }
}

/// Requests an immediate pass. Returns whether an agent received it.
pub fn sync_now(sync: &SyncState) -> bool {
    debug!("sync_now command");
    sync.request_sync()
}

pub async fn get_pending(store: &StoreState) -> Result<Vec<OutboxEntry>, ApiError> {
    match store.database() {
        Some(db) => Ok(db.outbox().pending().await?),
        None => Ok(Vec::new()),
    }
}
