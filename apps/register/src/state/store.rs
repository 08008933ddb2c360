//! # Store State
//!
//! Local persistence for the register snapshot, with a degraded mode.
//!
//! ## Degraded Mode
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  persist(snapshot)                                                      │
//! │       │                                                                 │
//! │       ├── healthy, write ok      → Persisted                            │
//! │       ├── healthy, write fails   → error!, degraded = true → Skipped    │
//! │       └── degraded / no database → Skipped (state lives in memory)      │
//! │                                                                         │
//! │  Every command response carries `degraded` so the operator is told to   │
//! │  restart. Register operations keep working either way.                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use caixa_core::RegisterSnapshot;
use caixa_db::{Database, DbResult};
use tracing::{debug, error, warn};

/// Outcome of a snapshot write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    Persisted,
    /// In-memory session; nothing written.
    Skipped,
}

#[derive(Debug, Clone)]
pub struct StoreState {
    db: Option<Database>,
    degraded: Arc<AtomicBool>,
}

impl StoreState {
    pub fn new(db: Database) -> Self {
        StoreState {
            db: Some(db),
            degraded: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A session that could not open its database at all.
    pub fn in_memory() -> Self {
        StoreState {
            db: None,
            degraded: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn database(&self) -> Option<&Database> {
        self.db.as_ref()
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    /// Switches the session to in-memory mode.
    pub fn mark_degraded(&self, reason: &str) {
        if !self.degraded.swap(true, Ordering::SeqCst) {
            error!(
                reason = %reason,
                "Local storage failed, continuing in memory. Restart the register."
            );
        }
    }

    /// Loads the last saved snapshot.
    pub async fn load(&self) -> DbResult<Option<RegisterSnapshot>> {
        match &self.db {
            Some(db) => db.state().load().await,
            None => Ok(None),
        }
    }

    /// Writes the snapshot. Never fails: a storage error degrades the session.
    pub async fn persist(&self, snapshot: &RegisterSnapshot) -> PersistOutcome {
        let Some(db) = &self.db else {
            return PersistOutcome::Skipped;
        };
        if self.is_degraded() {
            debug!("Session degraded, snapshot kept in memory");
            return PersistOutcome::Skipped;
        }

        match db.state().save(snapshot).await {
            Ok(()) => PersistOutcome::Persisted,
            Err(e) => {
                warn!(error = %e, "Failed to persist register snapshot");
                self.mark_degraded(&e.to_string());
                PersistOutcome::Skipped
            }
        }
    }
}
