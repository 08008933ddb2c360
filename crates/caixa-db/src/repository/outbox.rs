//! # Sync Outbox Repository
//!
//! Durable FIFO of completed transactions waiting for remote delivery.
//!
//! ## Entry Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  finalize_sale / withdraw / pay_supplier                                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  enqueue(kind, payload)  → INSERT, id = next AUTOINCREMENT              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  pending()               → SELECT ... WHERE synced = 0 ORDER BY id      │
//! │       │                                                                 │
//! │       ├── delivered  → delete(id)                                       │
//! │       └── failed     → mark_failed(id, error); pass stops here          │
//! │                                                                         │
//! │  Entries are deleted, not flagged, on acknowledgement: whatever is      │
//! │  in the table is still owed to the remote side.                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The ledger mutation and the enqueue are separate writes. If the enqueue
//! fails the transaction still stands locally and is simply never sent.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use caixa_core::{OutboxEntry, OutboxKind};

#[derive(Debug, sqlx::FromRow)]
struct OutboxRow {
    id: i64,
    kind: OutboxKind,
    payload: String,
    created_at: DateTime<Utc>,
    synced: bool,
    attempts: i64,
    last_error: Option<String>,
    attempted_at: Option<DateTime<Utc>>,
}

impl From<OutboxRow> for OutboxEntry {
    fn from(row: OutboxRow) -> Self {
        OutboxEntry {
            id: row.id,
            kind: row.kind,
            payload: row.payload,
            created_at: row.created_at,
            synced: row.synced,
            attempts: row.attempts,
            last_error: row.last_error,
            attempted_at: row.attempted_at,
        }
    }
}

const SELECT_COLUMNS: &str =
    "SELECT id, kind, payload, created_at, synced, attempts, last_error, attempted_at FROM sync_outbox";

/// Repository for sync outbox operations.
#[derive(Debug, Clone)]
pub struct OutboxRepository {
    pool: SqlitePool,
}

impl OutboxRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OutboxRepository { pool }
    }

    /// Appends a transaction to the queue.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let payload = serde_json::to_string(&event)?;
    /// db.outbox().enqueue(event.kind(), &payload).await?;
    /// ```
    pub async fn enqueue(&self, kind: OutboxKind, payload: &str) -> DbResult<OutboxEntry> {
        let created_at = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO sync_outbox (kind, payload, created_at, synced, attempts)
            VALUES (?1, ?2, ?3, 0, 0)
            "#,
        )
        .bind(kind)
        .bind(payload)
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        debug!(id, kind = %kind, "Queued for sync");

        Ok(OutboxEntry {
            id,
            kind,
            payload: payload.to_string(),
            created_at,
            synced: false,
            attempts: 0,
            last_error: None,
            attempted_at: None,
        })
    }

    /// All undelivered entries, oldest first.
    pub async fn pending(&self) -> DbResult<Vec<OutboxEntry>> {
        let sql = format!("{} WHERE synced = 0 ORDER BY id ASC", SELECT_COLUMNS);
        let rows: Vec<OutboxRow> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;

        Ok(rows.into_iter().map(OutboxEntry::from).collect())
    }

    pub async fn get(&self, id: i64) -> DbResult<Option<OutboxEntry>> {
        let sql = format!("{} WHERE id = ?1", SELECT_COLUMNS);
        let row: Option<OutboxRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(OutboxEntry::from))
    }

    /// Removes a delivered entry. Returns false if it was already gone.
    pub async fn delete(&self, id: i64) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM sync_outbox WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Records a failed delivery attempt; the entry stays queued.
    pub async fn mark_failed(&self, id: i64, error: &str) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE sync_outbox SET
                attempts = attempts + 1,
                last_error = ?2,
                attempted_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn count_pending(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sync_outbox WHERE synced = 0")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_enqueue_assigns_increasing_ids() {
        let db = test_db().await;
        let repo = db.outbox();

        let a = repo.enqueue(OutboxKind::Sale, r#"{"n":1}"#).await.unwrap();
        let b = repo.enqueue(OutboxKind::Withdrawal, r#"{"n":2}"#).await.unwrap();

        assert!(b.id > a.id);
        assert!(!a.synced);
        assert_eq!(repo.count_pending().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_pending_is_fifo() {
        let db = test_db().await;
        let repo = db.outbox();

        for (kind, n) in [
            (OutboxKind::Sale, 1),
            (OutboxKind::Payment, 2),
            (OutboxKind::Withdrawal, 3),
        ] {
            repo.enqueue(kind, &format!(r#"{{"n":{}}}"#, n)).await.unwrap();
        }

        let pending = repo.pending().await.unwrap();
        let kinds: Vec<_> = pending.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![OutboxKind::Sale, OutboxKind::Payment, OutboxKind::Withdrawal]
        );
        assert_eq!(pending[1].payload, r#"{"n":2}"#);
    }

    #[tokio::test]
    async fn test_delete_and_ids_not_reused() {
        let db = test_db().await;
        let repo = db.outbox();

        let first = repo.enqueue(OutboxKind::Sale, "{}").await.unwrap();
        assert!(repo.delete(first.id).await.unwrap());
        assert!(!repo.delete(first.id).await.unwrap());

        let second = repo.enqueue(OutboxKind::Sale, "{}").await.unwrap();
        assert!(second.id > first.id);
        assert_eq!(repo.count_pending().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_mark_failed_keeps_entry() {
        let db = test_db().await;
        let repo = db.outbox();

        let entry = repo.enqueue(OutboxKind::Payment, "{}").await.unwrap();
        repo.mark_failed(entry.id, "HTTP 503").await.unwrap();
        repo.mark_failed(entry.id, "connection refused").await.unwrap();

        let stored = repo.get(entry.id).await.unwrap().unwrap();
        assert_eq!(stored.attempts, 2);
        assert_eq!(stored.last_error.as_deref(), Some("connection refused"));
        assert!(stored.attempted_at.is_some());
        assert_eq!(repo.pending().await.unwrap().len(), 1);
    }
}
