//! # Register State Repository
//!
//! A single row in `app_state` holds the whole register snapshot as JSON.
//! Every successful command overwrites it; startup reads it back.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use caixa_core::RegisterSnapshot;

/// Key of the one snapshot row.
const SNAPSHOT_KEY: &str = "app_state";

#[derive(Debug, Clone)]
pub struct StateRepository {
    pool: SqlitePool,
}

impl StateRepository {
    pub fn new(pool: SqlitePool) -> Self {
        StateRepository { pool }
    }

    /// Overwrites the stored snapshot.
    pub async fn save(&self, snapshot: &RegisterSnapshot) -> DbResult<()> {
        let json = serde_json::to_string(snapshot)?;

        sqlx::query(
            r#"
            INSERT INTO app_state (key, snapshot, saved_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                snapshot = excluded.snapshot,
                saved_at = excluded.saved_at
            "#,
        )
        .bind(SNAPSHOT_KEY)
        .bind(&json)
        .bind(snapshot.saved_at)
        .execute(&self.pool)
        .await?;

        debug!(bytes = json.len(), "Register snapshot saved");
        Ok(())
    }

    /// Loads the stored snapshot, if any.
    pub async fn load(&self) -> DbResult<Option<RegisterSnapshot>> {
        let json: Option<String> =
            sqlx::query_scalar("SELECT snapshot FROM app_state WHERE key = ?1")
                .bind(SNAPSHOT_KEY)
                .fetch_optional(&self.pool)
                .await?;

        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Removes the stored snapshot.
    pub async fn clear(&self) -> DbResult<()> {
        sqlx::query("DELETE FROM app_state WHERE key = ?1")
            .bind(SNAPSHOT_KEY)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::{Database, DbConfig};
    use caixa_core::{Money, PaymentMethod, Register, ReopenPolicy, ShiftType};

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_load_empty() {
        let db = test_db().await;
        assert!(db.state().load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_snapshot_round_trip_restores_register() {
        let db = test_db().await;

        let mut register = Register::new();
        register.start_shift(ShiftType::Morning).unwrap();
        register.cart_mut().add_item("Pão de Sal", Money::from_cents(70)).unwrap();
        register.select_payment(PaymentMethod::Card);
        register.finalize_sale().unwrap();
        register.cart_mut().add_item("Pão Doce Comum", Money::from_cents(70)).unwrap();

        db.state().save(&register.snapshot()).await.unwrap();

        let snapshot = db.state().load().await.unwrap().unwrap();
        let restored = Register::from_snapshot(snapshot, ReopenPolicy::Reject);
        assert_eq!(restored, register);
    }

    #[tokio::test]
    async fn test_save_overwrites_single_row() {
        let db = test_db().await;
        let mut register = Register::new();

        db.state().save(&register.snapshot()).await.unwrap();
        register.start_shift(ShiftType::Afternoon).unwrap();
        db.state().save(&register.snapshot()).await.unwrap();

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM app_state")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(rows, 1);

        let loaded = db.state().load().await.unwrap().unwrap();
        assert_eq!(
            loaded.active_shift.map(|s| s.shift_type),
            Some(ShiftType::Afternoon)
        );

        db.state().clear().await.unwrap();
        assert!(db.state().load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_is_serialization_error() {
        let db = test_db().await;
        sqlx::query("INSERT INTO app_state (key, snapshot, saved_at) VALUES ('app_state', '{oops', '')")
            .execute(db.pool())
            .await
            .unwrap();

        let err = db.state().load().await.unwrap_err();
        assert!(matches!(err, DbError::Serialization(_)));
    }
}
