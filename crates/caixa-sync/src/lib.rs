//! # caixa-sync: Offline Outbox Delivery
//!
//! Keeps the register usable without a network: every completed transaction
//! is queued locally and delivered when the endpoint is reachable.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Sync Architecture                                │
//! │                                                                         │
//! │  register command ──► SyncAgentHandle::enqueue ──► sync_outbox (SQLite) │
//! │                              │ trigger                    │             │
//! │                              ▼                            │             │
//! │  ┌──────────────────────────────────────────────────┐     │             │
//! │  │                  SyncAgent                       │     │             │
//! │  │  interval · trigger · offline→online probe       │     │             │
//! │  └────────────────────────┬─────────────────────────┘     │             │
//! │                           ▼                               │             │
//! │  ┌────────────────┐  ┌────────────────┐                   │             │
//! │  │OutboxProcessor │─►│ HttpTransport  │──► POST endpoint  │             │
//! │  │ FIFO, stop on  │◄─┘ 2xx = ack      │                   │             │
//! │  │ first failure  │──── delete / mark_failed ─────────────┘             │
//! │  └────────────────┘                                                     │
//! │                                                                         │
//! │  Beside it, best-effort:                                                │
//! │  register command ──► MirrorQueue::push ──► RestBackend (PostgREST)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`agent`] - `SyncAgent` loop and the register-facing handle
//! - [`backend`] - relational backend mirror
//! - [`config`] - endpoint, mode, interval, backend credentials
//! - [`error`] - sync error types
//! - [`outbox`] - single-flight FIFO delivery pass
//! - [`protocol`] - wire envelope
//! - [`transport`] - HTTP delivery and connectivity probe
//!
//! ## Usage
//! ```rust,ignore
//! use caixa_sync::{SyncAgent, SyncConfig};
//!
//! let config = SyncConfig::load_or_default(None);
//! let handle = SyncAgent::new(config, db.clone())?.start().await?;
//!
//! let (kind, payload) = caixa_sync::encode_event(&event)?;
//! handle.enqueue(kind, &payload).await?;
//!
//! let status = handle.status().await;
//! println!("online: {}, pending: {}", status.online, status.pending_count);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod agent;
pub mod backend;
pub mod config;
pub mod error;
pub mod outbox;
pub mod protocol;
pub mod transport;

// =============================================================================
// Re-exports
// =============================================================================

pub use agent::{NoOpEmitter, SyncAgent, SyncAgentHandle, SyncEventEmitter, SyncStatus};
pub use backend::{
    mirror, MirrorAction, MirrorOutcome, MirrorQueue, RemoteBackend, RemoteSale, RemoteShift,
    RestBackend,
};
pub use config::{BackendSettings, SyncConfig, SyncMode, SyncSettings};
pub use error::{SyncError, SyncResult};
pub use outbox::{OutboxProcessor, SkipReason, SyncPass, SyncReport};
pub use protocol::{encode_event, SyncEnvelope};
pub use transport::{HttpTransport, SyncTransport};
