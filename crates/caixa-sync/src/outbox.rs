//! # Outbox Processor
//!
//! Drains the `sync_outbox` table to the sync endpoint.
//!
//! ## Pass Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        try_sync()                                       │
//! │                                                                         │
//! │  1. Guard: another pass running?  → Skipped(AlreadyRunning)             │
//! │  2. Probe: network reachable?     → Skipped(Offline)                    │
//! │                                                                         │
//! │  3. SELECT * FROM sync_outbox WHERE synced = 0 ORDER BY id              │
//! │                                                                         │
//! │      id │ kind       │ attempts                                         │
//! │     ────┼────────────┼──────────                                        │
//! │      12 │ sale       │ 0      ──► POST ──► 2xx ──► DELETE id 12         │
//! │      13 │ withdrawal │ 0      ──► POST ──► 503 ──► attempts += 1, STOP  │
//! │      14 │ sale       │ 0          (not attempted this pass)             │
//! │                                                                         │
//! │  4. Ran(SyncReport { delivered: 1, remaining: 2, stopped_at: 13 })      │
//! │                                                                         │
//! │  Entries never overtake each other: the remote side receives them in   │
//! │  the order the register produced them.                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use caixa_core::{OutboxEntry, OutboxKind};
use caixa_db::Database;

use crate::error::SyncResult;
use crate::protocol::SyncEnvelope;
use crate::transport::SyncTransport;

// =============================================================================
// Pass Results
// =============================================================================

/// Outcome of one pass that actually ran.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Entries acknowledged and removed.
    pub delivered: usize,
    /// Entries still queued after the pass.
    pub remaining: i64,
    /// Entry whose failure ended the pass.
    pub stopped_at: Option<i64>,
    /// Error that ended the pass.
    pub error: Option<String>,
}

impl SyncReport {
    pub fn is_complete(&self) -> bool {
        self.stopped_at.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Offline,
    AlreadyRunning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncPass {
    Skipped { reason: SkipReason },
    Ran(SyncReport),
}

// =============================================================================
// Outbox Processor
// =============================================================================

/// Single-flight delivery of the outbox. Cheap to clone; clones share the
/// running flag.
#[derive(Clone)]
pub struct OutboxProcessor {
    db: Database,
    transport: Arc<dyn SyncTransport>,
    running: Arc<AtomicBool>,
}

/// Clears the running flag when a pass ends, including on early return.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl OutboxProcessor {
    pub fn new(db: Database, transport: Arc<dyn SyncTransport>) -> Self {
        OutboxProcessor {
            db,
            transport,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub async fn is_online(&self) -> bool {
        self.transport.is_online().await
    }

    /// Appends an entry. Delivery is the caller's next step (see
    /// `SyncAgentHandle::enqueue`, which also triggers a pass).
    pub async fn enqueue(&self, kind: OutboxKind, payload: &str) -> SyncResult<OutboxEntry> {
        Ok(self.db.outbox().enqueue(kind, payload).await?)
    }

    pub async fn pending_count(&self) -> SyncResult<i64> {
        Ok(self.db.outbox().count_pending().await?)
    }

    /// Runs one delivery pass.
    ///
    /// `Err` is reserved for local storage failures; delivery failures end
    /// the pass normally and show up in the report.
    pub async fn try_sync(&self) -> SyncResult<SyncPass> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Sync pass already running, skipping");
            return Ok(SyncPass::Skipped {
                reason: SkipReason::AlreadyRunning,
            });
        }
        let _guard = RunningGuard(&self.running);

        if !self.transport.is_online().await {
            debug!("Offline, waiting for connection");
            return Ok(SyncPass::Skipped {
                reason: SkipReason::Offline,
            });
        }

        let outbox = self.db.outbox();
        let entries = outbox.pending().await?;

        if entries.is_empty() {
            debug!("No pending outbox entries");
            return Ok(SyncPass::Ran(SyncReport::default()));
        }

        info!(count = entries.len(), "Processing outbox");

        let mut report = SyncReport::default();

        for entry in &entries {
            let result = match SyncEnvelope::from_entry(entry) {
                Ok(envelope) => self.transport.deliver(&envelope).await,
                Err(e) => Err(e),
            };

            match result {
                Ok(()) => {
                    outbox.delete(entry.id).await?;
                    report.delivered += 1;
                    debug!(id = entry.id, kind = %entry.kind, "Entry synced and removed");
                }
                Err(e) => {
                    warn!(
                        id = entry.id,
                        kind = %entry.kind,
                        attempts = entry.attempts + 1,
                        error = %e,
                        "Delivery failed, stopping pass"
                    );
                    outbox.mark_failed(entry.id, &e.to_string()).await?;
                    report.stopped_at = Some(entry.id);
                    report.error = Some(e.to_string());
                    break;
                }
            }
        }

        report.remaining = outbox.count_pending().await?;

        info!(
            delivered = report.delivered,
            remaining = report.remaining,
            "Sync pass finished"
        );

        Ok(SyncPass::Ran(report))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::SyncError;
    use async_trait::async_trait;
    use caixa_db::DbConfig;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::sync::Notify;

    /// Transport that answers from a script and records what it delivered.
    /// An exhausted script acknowledges everything.
    #[derive(Default)]
    pub(crate) struct ScriptedTransport {
        pub(crate) offline: AtomicBool,
        pub(crate) script: Mutex<VecDeque<SyncResult<()>>>,
        pub(crate) delivered: Mutex<Vec<SyncEnvelope>>,
        pub(crate) attempts: Mutex<Vec<serde_json::Value>>,
        /// When set, `deliver` signals `entered` and waits for `release`.
        pub(crate) gate: Option<(Arc<Notify>, Arc<Notify>)>,
    }

    impl ScriptedTransport {
        pub(crate) fn failing_first(err: SyncError) -> Self {
            let t = ScriptedTransport::default();
            t.script.lock().unwrap().push_back(Err(err));
            t
        }

        pub(crate) fn delivered_payloads(&self) -> Vec<serde_json::Value> {
            self.delivered
                .lock()
                .unwrap()
                .iter()
                .map(|e| e.payload.clone())
                .collect()
        }
    }

    #[async_trait]
    impl SyncTransport for ScriptedTransport {
        async fn deliver(&self, envelope: &SyncEnvelope) -> SyncResult<()> {
            if let Some((entered, release)) = &self.gate {
                entered.notify_one();
                release.notified().await;
            }
            self.attempts.lock().unwrap().push(envelope.payload.clone());
            let next = self.script.lock().unwrap().pop_front().unwrap_or(Ok(()));
            if next.is_ok() {
                self.delivered.lock().unwrap().push(envelope.clone());
            }
            next
        }

        async fn is_online(&self) -> bool {
            !self.offline.load(Ordering::SeqCst)
        }
    }

    async fn setup(transport: ScriptedTransport) -> (OutboxProcessor, Arc<ScriptedTransport>) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let transport = Arc::new(transport);
        (OutboxProcessor::new(db, transport.clone()), transport)
    }

    async fn enqueue_abc(processor: &OutboxProcessor) -> Vec<OutboxEntry> {
        let mut out = Vec::new();
        for n in ["A", "B", "C"] {
            let payload = format!(r#"{{"n":"{}"}}"#, n);
            out.push(processor.enqueue(OutboxKind::Sale, &payload).await.unwrap());
        }
        out
    }

    #[tokio::test]
    async fn test_delivers_everything_in_order() {
        let (processor, transport) = setup(ScriptedTransport::default()).await;
        enqueue_abc(&processor).await;

        let pass = processor.try_sync().await.unwrap();
        assert_eq!(
            pass,
            SyncPass::Ran(SyncReport {
                delivered: 3,
                remaining: 0,
                stopped_at: None,
                error: None,
            })
        );

        let names: Vec<_> = transport
            .delivered_payloads()
            .iter()
            .map(|p| p["n"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["A", "B", "C"]);
        assert!(!processor.is_running());
    }

    #[tokio::test]
    async fn test_first_failure_stops_pass() {
        let (processor, transport) = setup(ScriptedTransport::failing_first(
            SyncError::Rejected {
                status: 500,
                body: String::new(),
            },
        ))
        .await;
        let entries = enqueue_abc(&processor).await;

        let pass = processor.try_sync().await.unwrap();
        let SyncPass::Ran(report) = pass else {
            panic!("expected a pass to run");
        };
        assert_eq!(report.delivered, 0);
        assert_eq!(report.remaining, 3);
        assert_eq!(report.stopped_at, Some(entries[0].id));
        assert!(!report.is_complete());

        // B and C were never attempted.
        assert_eq!(transport.attempts.lock().unwrap().len(), 1);

        let pending = processor.db.outbox().pending().await.unwrap();
        let ids: Vec<_> = pending.iter().map(|e| e.id).collect();
        assert_eq!(ids, entries.iter().map(|e| e.id).collect::<Vec<_>>());
        assert_eq!(pending[0].attempts, 1);
        assert!(pending[0].last_error.as_deref().unwrap().contains("HTTP 500"));
        assert_eq!(pending[1].attempts, 0);

        // Recovery: next pass delivers all three in original order.
        let pass = processor.try_sync().await.unwrap();
        assert!(matches!(pass, SyncPass::Ran(ref r) if r.delivered == 3 && r.remaining == 0));
        let names: Vec<_> = transport
            .delivered_payloads()
            .iter()
            .map(|p| p["n"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn test_failure_mid_queue_keeps_delivered_prefix() {
        let transport = ScriptedTransport::default();
        {
            let mut script = transport.script.lock().unwrap();
            script.push_back(Ok(()));
            script.push_back(Err(SyncError::ConnectionFailed("reset".into())));
        }
        let (processor, _transport) = setup(transport).await;
        let entries = enqueue_abc(&processor).await;

        let SyncPass::Ran(report) = processor.try_sync().await.unwrap() else {
            panic!("expected a pass to run");
        };
        assert_eq!(report.delivered, 1);
        assert_eq!(report.remaining, 2);
        assert_eq!(report.stopped_at, Some(entries[1].id));

        let pending = processor.db.outbox().pending().await.unwrap();
        assert_eq!(pending[0].id, entries[1].id);
        assert_eq!(pending[1].id, entries[2].id);
    }

    #[tokio::test]
    async fn test_offline_skips_without_touching_queue() {
        let transport = ScriptedTransport::default();
        transport.offline.store(true, Ordering::SeqCst);
        let (processor, transport) = setup(transport).await;
        enqueue_abc(&processor).await;

        let pass = processor.try_sync().await.unwrap();
        assert_eq!(
            pass,
            SyncPass::Skipped {
                reason: SkipReason::Offline
            }
        );
        assert!(transport.attempts.lock().unwrap().is_empty());
        assert_eq!(processor.pending_count().await.unwrap(), 3);
        assert!(!processor.is_running());
    }

    #[tokio::test]
    async fn test_corrupt_payload_blocks_queue() {
        let (processor, transport) = setup(ScriptedTransport::default()).await;
        let bad = processor.enqueue(OutboxKind::Sale, "{oops").await.unwrap();
        processor.enqueue(OutboxKind::Sale, "{}").await.unwrap();

        let SyncPass::Ran(report) = processor.try_sync().await.unwrap() else {
            panic!("expected a pass to run");
        };
        assert_eq!(report.stopped_at, Some(bad.id));
        assert_eq!(report.remaining, 2);
        assert!(transport.attempts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_overlapping_pass_is_skipped() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let transport = ScriptedTransport {
            gate: Some((entered.clone(), release.clone())),
            ..Default::default()
        };
        let (processor, _transport) = setup(transport).await;
        processor.enqueue(OutboxKind::Withdrawal, "{}").await.unwrap();

        let first = {
            let processor = processor.clone();
            tokio::spawn(async move { processor.try_sync().await })
        };

        entered.notified().await;
        assert!(processor.is_running());
        let second = processor.try_sync().await.unwrap();
        assert_eq!(
            second,
            SyncPass::Skipped {
                reason: SkipReason::AlreadyRunning
            }
        );

        release.notify_one();
        let first = first.await.unwrap().unwrap();
        assert!(matches!(first, SyncPass::Ran(ref r) if r.delivered == 1));
        assert!(!processor.is_running());
    }
}
