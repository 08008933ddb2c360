//! # Sync State
//!
//! Connects finished transactions to the outbox and the backend mirror.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync State Architecture                           │
//! │                                                                         │
//! │  command (register lock held)                                           │
//! │       │                                                                 │
//! │       ├── queue_event(event) ──► SyncAgentHandle::enqueue ──► outbox   │
//! │       │                               └── trigger pass                  │
//! │       │                                                                 │
//! │       └── mirror(action) ───────► MirrorQueue::push ──► RestBackend     │
//! │                                   (one task, in order, failures logged)│
//! │                                                                         │
//! │  Both happen before the lock is released, so outbox order and mirror   │
//! │  order follow ledger order.                                             │
//! │                                                                         │
//! │  Nothing here returns an error to the command: local truth stands.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use caixa_core::LedgerEvent;
use caixa_sync::{
    encode_event, MirrorAction, MirrorQueue, RemoteBackend, SyncAgentHandle, SyncError,
    SyncStatus,
};
use tracing::{debug, error, info, warn};

use crate::state::StoreState;

#[derive(Clone, Default)]
pub struct SyncState {
    agent: Option<SyncAgentHandle>,
    mirror: Option<MirrorQueue>,
}

impl SyncState {
    /// Starts the mirror task when a backend is given.
    pub fn new(agent: Option<SyncAgentHandle>, backend: Option<Arc<dyn RemoteBackend>>) -> Self {
        SyncState {
            agent,
            mirror: backend.map(MirrorQueue::spawn),
        }
    }

    /// No outbox and no backend (database unavailable).
    pub fn disabled() -> Self {
        SyncState::default()
    }

    pub fn agent(&self) -> Option<&SyncAgentHandle> {
        self.agent.as_ref()
    }

    /// Queues a ledger event for delivery.
    ///
    /// Returns the outbox id, or `None` when the event could not be queued.
    /// A storage failure here degrades the session like a snapshot failure.
    pub async fn queue_event(&self, event: &LedgerEvent, store: &StoreState) -> Option<i64> {
        let agent = self.agent.as_ref()?;

        let (kind, payload) = match encode_event(event) {
            Ok(encoded) => encoded,
            Err(e) => {
                error!(event_id = %event.id(), error = %e, "Failed to encode event for sync");
                return None;
            }
        };

        match agent.enqueue(kind, &payload).await {
            Ok(entry) => {
                debug!(outbox_id = entry.id, kind = %kind, "Event queued for sync");
                Some(entry.id)
            }
            Err(SyncError::DatabaseError(e)) => {
                store.mark_degraded(&e);
                None
            }
            Err(e) => {
                warn!(event_id = %event.id(), error = %e, "Failed to queue event for sync");
                None
            }
        }
    }

    /// Mirrors an action to the relational backend, if one is configured.
    pub fn mirror(&self, action: MirrorAction) {
        if let Some(queue) = &self.mirror {
            queue.push(action);
        }
    }

    pub async fn status(&self) -> Option<SyncStatus> {
        match &self.agent {
            Some(agent) => Some(agent.status().await),
            None => None,
        }
    }

    /// Whether the last probe or pass reached the endpoint.
    pub async fn is_online(&self) -> Option<bool> {
        self.status().await.map(|s| s.online)
    }

    pub fn request_sync(&self) -> bool {
        match &self.agent {
            Some(agent) => {
                agent.request_sync();
                true
            }
            None => false,
        }
    }

    /// Stops the agent after its current pass.
    pub async fn shutdown(&self) {
        if let Some(agent) = &self.agent {
            info!("Stopping sync agent...");
            if let Err(e) = agent.shutdown().await {
                debug!(error = %e, "Sync agent already stopped");
            }
        }
    }
}
