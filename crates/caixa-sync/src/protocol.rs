//! # Sync Protocol
//!
//! The envelope POSTed to the sync endpoint, one per outbox entry.
//!
//! ## Wire Format
//! ```json
//! {
//!   "type": "sale",
//!   "payload": { "type": "sale", "id": "…", "total": 210, … },
//!   "createdAt": "2026-03-02T11:04:00Z",
//!   "synced": false
//! }
//! ```
//! `payload` is the serialized ledger event, embedded as JSON rather than a
//! string so the endpoint can read it without double decoding. Amounts are
//! integer centavos.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use caixa_core::{LedgerEvent, OutboxEntry, OutboxKind};

use crate::error::{SyncError, SyncResult};

/// One outbox entry on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncEnvelope {
    #[serde(rename = "type")]
    pub kind: OutboxKind,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
    pub synced: bool,
}

impl SyncEnvelope {
    /// Builds the envelope for a stored entry.
    ///
    /// Fails if the stored payload is not valid JSON.
    pub fn from_entry(entry: &OutboxEntry) -> SyncResult<Self> {
        let payload: Value = serde_json::from_str(&entry.payload).map_err(|e| {
            SyncError::DeserializationFailed(format!("outbox entry {}: {}", entry.id, e))
        })?;

        Ok(SyncEnvelope {
            kind: entry.kind,
            payload,
            created_at: entry.created_at,
            synced: entry.synced,
        })
    }
}

/// Serializes a ledger event into the `(kind, payload)` pair the outbox stores.
pub fn encode_event(event: &LedgerEvent) -> SyncResult<(OutboxKind, String)> {
    let payload = serde_json::to_string(event)?;
    Ok((event.kind(), payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use caixa_core::{Money, ShiftType};
    use uuid::Uuid;

    fn withdrawal() -> LedgerEvent {
        LedgerEvent::Withdrawal {
            id: Uuid::new_v4(),
            shift: ShiftType::Morning,
            occurred_at: Utc::now(),
            amount: Money::from_cents(1500),
            reason: "Troco".into(),
        }
    }

    #[test]
    fn test_envelope_wire_shape() {
        let event = withdrawal();
        let (kind, payload) = encode_event(&event).unwrap();
        assert_eq!(kind, OutboxKind::Withdrawal);

        let entry = OutboxEntry {
            id: 7,
            kind,
            payload,
            created_at: Utc::now(),
            synced: false,
            attempts: 0,
            last_error: None,
            attempted_at: None,
        };

        let envelope = SyncEnvelope::from_entry(&entry).unwrap();
        let json = serde_json::to_value(&envelope).unwrap();

        assert_eq!(json["type"], "withdrawal");
        assert_eq!(json["synced"], false);
        assert!(json.get("createdAt").is_some());
        assert_eq!(json["payload"]["amount"], 1500);
        assert_eq!(json["payload"]["reason"], "Troco");

        let back: LedgerEvent = serde_json::from_value(json["payload"].clone()).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_corrupt_payload_is_rejected() {
        let entry = OutboxEntry {
            id: 3,
            kind: OutboxKind::Sale,
            payload: "{not json".into(),
            created_at: Utc::now(),
            synced: false,
            attempts: 0,
            last_error: None,
            attempted_at: None,
        };

        let err = SyncEnvelope::from_entry(&entry).unwrap_err();
        assert!(matches!(err, SyncError::DeserializationFailed(_)));
        assert!(err.to_string().contains("outbox entry 3"));
    }
}
