//! # Sync Agent
//!
//! Background task that decides *when* the outbox is drained.
//!
//! ## Triggers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        SyncAgent loop                                   │
//! │                                                                         │
//! │   interval (60 s, first tick at start) ──┐                              │
//! │   handle.enqueue() / request_sync()  ────┼──► OutboxProcessor::try_sync │
//! │   probe: offline → online            ────┘            │                 │
//! │                                                       ▼                 │
//! │   shutdown ──► loop exits between passes        SyncStatus updated      │
//! │                                                 emitter notified        │
//! │                                                                         │
//! │  A pass that finds another pass running is skipped, so overlapping     │
//! │  triggers collapse into one delivery.                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, Notify, RwLock};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use caixa_core::{OutboxEntry, OutboxKind};
use caixa_db::Database;

use crate::config::{SyncConfig, SyncMode};
use crate::error::{SyncError, SyncResult};
use crate::outbox::{OutboxProcessor, SkipReason, SyncPass};
use crate::transport::{HttpTransport, SyncTransport};

// =============================================================================
// Sync Status
// =============================================================================

/// Current sync status for external queries.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncStatus {
    pub mode: SyncMode,

    /// Result of the last connectivity probe or pass.
    pub online: bool,

    /// A pass is in flight.
    pub running: bool,

    pub pending_count: i64,

    /// End of the last pass that emptied the queue.
    pub last_sync: Option<DateTime<Utc>>,

    /// Failure that ended the last pass, cleared by a complete pass.
    pub last_error: Option<String>,
}

// =============================================================================
// Event Emitter Trait
// =============================================================================

/// Receives sync notifications for whatever UI is attached.
pub trait SyncEventEmitter: Send + Sync {
    fn emit_status(&self, status: &SyncStatus);

    fn emit_progress(&self, pending: i64, delivered: usize);

    fn emit_error(&self, message: &str);
}

/// No-op event emitter for headless runs and tests.
pub struct NoOpEmitter;

impl SyncEventEmitter for NoOpEmitter {
    fn emit_status(&self, _status: &SyncStatus) {}
    fn emit_progress(&self, _pending: i64, _delivered: usize) {}
    fn emit_error(&self, _message: &str) {}
}

// =============================================================================
// Sync Agent
// =============================================================================

pub struct SyncAgent {
    config: Arc<SyncConfig>,
    db: Database,
    /// Absent when no endpoint is configured; entries then only accumulate.
    processor: Option<OutboxProcessor>,
    status: Arc<RwLock<SyncStatus>>,
    emitter: Arc<dyn SyncEventEmitter>,
}

impl SyncAgent {
    /// Creates an agent delivering over HTTP to the configured endpoint.
    pub fn new(config: SyncConfig, db: Database) -> SyncResult<Self> {
        let transport: Option<Arc<dyn SyncTransport>> = match config.endpoint() {
            Some(endpoint) => Some(Arc::new(HttpTransport::new(
                endpoint,
                config.request_timeout(),
            )?)),
            None => {
                warn!("No sync endpoint configured, outbox will only accumulate");
                None
            }
        };

        Ok(Self::with_transport(config, db, transport, Arc::new(NoOpEmitter)))
    }

    /// Creates an agent with an explicit transport and emitter.
    pub fn with_transport(
        config: SyncConfig,
        db: Database,
        transport: Option<Arc<dyn SyncTransport>>,
        emitter: Arc<dyn SyncEventEmitter>,
    ) -> Self {
        let status = SyncStatus {
            mode: config.mode(),
            ..Default::default()
        };

        SyncAgent {
            processor: transport.map(|t| OutboxProcessor::new(db.clone(), t)),
            config: Arc::new(config),
            db,
            status: Arc::new(RwLock::new(status)),
            emitter,
        }
    }

    /// Starts the background loop (when sync is enabled) and returns the
    /// handle the register uses to enqueue and query status.
    pub async fn start(self) -> SyncResult<SyncAgentHandle> {
        let trigger = Arc::new(Notify::new());

        let pending = self.db.outbox().count_pending().await?;
        self.status.write().await.pending_count = pending;

        let shutdown_tx = match (&self.processor, self.config.is_sync_enabled()) {
            (Some(processor), true) => {
                info!(
                    mode = %self.config.mode(),
                    pending,
                    interval_secs = self.config.sync.interval_secs,
                    "Starting sync agent"
                );

                let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
                tokio::spawn(Self::run(
                    processor.clone(),
                    self.config.clone(),
                    self.status.clone(),
                    self.emitter.clone(),
                    trigger.clone(),
                    shutdown_rx,
                ));
                Some(shutdown_tx)
            }
            (_, false) => {
                info!(pending, "Sync is disabled (mode: offline)");
                None
            }
            (None, true) => {
                info!(pending, "Sync agent idle: no endpoint");
                None
            }
        };

        Ok(SyncAgentHandle {
            db: self.db,
            trigger,
            status: self.status,
            shutdown_tx,
        })
    }

    /// Main loop.
    async fn run(
        processor: OutboxProcessor,
        config: Arc<SyncConfig>,
        status: Arc<RwLock<SyncStatus>>,
        emitter: Arc<dyn SyncEventEmitter>,
        trigger: Arc<Notify>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        let mut interval = tokio::time::interval(config.interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut probe = tokio::time::interval(config.probe_interval());
        probe.set_missed_tick_behavior(MissedTickBehavior::Delay);
        probe.tick().await;

        let mut was_online = processor.is_online().await;
        status.write().await.online = was_online;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    debug!("Periodic sync");
                    Self::run_pass(&processor, &status, emitter.as_ref()).await;
                }

                _ = trigger.notified() => {
                    debug!("Sync requested");
                    Self::run_pass(&processor, &status, emitter.as_ref()).await;
                }

                _ = probe.tick() => {
                    let online = processor.is_online().await;
                    if online != was_online {
                        let snapshot = {
                            let mut s = status.write().await;
                            s.online = online;
                            s.clone()
                        };
                        emitter.emit_status(&snapshot);

                        if online {
                            info!("Connection restored, syncing");
                            Self::run_pass(&processor, &status, emitter.as_ref()).await;
                        } else {
                            info!("Connection lost, outbox will wait");
                        }
                    }
                    was_online = online;
                }

                _ = shutdown_rx.recv() => {
                    info!("Sync agent received shutdown");
                    break;
                }
            }
        }

        info!("Sync agent stopped");
    }

    async fn run_pass(
        processor: &OutboxProcessor,
        status: &RwLock<SyncStatus>,
        emitter: &dyn SyncEventEmitter,
    ) {
        status.write().await.running = true;

        let result = processor.try_sync().await;

        let snapshot = {
            let mut s = status.write().await;
            s.running = false;

            match &result {
                Ok(SyncPass::Ran(report)) => {
                    s.online = true;
                    s.pending_count = report.remaining;
                    if report.is_complete() {
                        s.last_sync = Some(Utc::now());
                        s.last_error = None;
                    } else {
                        s.last_error = report.error.clone();
                    }
                }
                Ok(SyncPass::Skipped {
                    reason: SkipReason::Offline,
                }) => {
                    s.online = false;
                }
                Ok(SyncPass::Skipped {
                    reason: SkipReason::AlreadyRunning,
                }) => {
                    // The pass in flight reports when it ends.
                    s.running = true;
                }
                Err(e) => {
                    error!(error = %e, "Sync pass failed on local storage");
                    s.last_error = Some(e.to_string());
                }
            }

            s.clone()
        };

        emitter.emit_status(&snapshot);
        if let Ok(SyncPass::Ran(report)) = &result {
            emitter.emit_progress(report.remaining, report.delivered);
            if let Some(message) = &report.error {
                emitter.emit_error(message);
            }
        }
    }
}

// =============================================================================
// Agent Handle (for the register)
// =============================================================================

/// Handle for the register: enqueue, trigger and status.
#[derive(Clone)]
pub struct SyncAgentHandle {
    db: Database,
    trigger: Arc<Notify>,
    status: Arc<RwLock<SyncStatus>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
}

impl SyncAgentHandle {
    /// Appends an entry and asks for a pass.
    ///
    /// Durability does not depend on the network: the entry is committed
    /// before this returns, whether or not the agent is running.
    pub async fn enqueue(&self, kind: OutboxKind, payload: &str) -> SyncResult<OutboxEntry> {
        let entry = self.db.outbox().enqueue(kind, payload).await?;

        let pending = self.db.outbox().count_pending().await?;
        self.status.write().await.pending_count = pending;

        self.request_sync();
        Ok(entry)
    }

    /// Asks the agent for a pass as soon as possible. Requests made while a
    /// pass is queued collapse into it.
    pub fn request_sync(&self) {
        self.trigger.notify_one();
    }

    pub async fn status(&self) -> SyncStatus {
        self.status.read().await.clone()
    }

    pub fn is_active(&self) -> bool {
        self.shutdown_tx.as_ref().is_some_and(|tx| !tx.is_closed())
    }

    /// Signals the agent to stop after the current pass.
    pub async fn shutdown(&self) -> SyncResult<()> {
        match &self.shutdown_tx {
            Some(tx) => tx.send(()).await.map_err(|_| SyncError::ShuttingDown),
            None => Ok(()),
        }
    }
}
