//! # HTTP Transport
//!
//! Delivers envelopes to the sync endpoint and probes connectivity.
//!
//! ## Delivery Contract
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  POST {endpoint}  Content-Type: application/json  body = SyncEnvelope   │
//! │       │                                                                 │
//! │       ├── 2xx            → Ok(())        entry may be deleted           │
//! │       ├── other status   → Rejected      entry stays, pass stops        │
//! │       └── no response    → ConnectionFailed / Timeout                   │
//! │                                                                         │
//! │  HEAD {probe}      any HTTP response → online                           │
//! │                    no response       → offline                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::config::parse_http_url;
use crate::error::{SyncError, SyncResult};
use crate::protocol::SyncEnvelope;

/// Probe timeout when no request timeout is configured.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// Transport Trait
// =============================================================================

/// Something that can carry envelopes to the remote side.
#[async_trait]
pub trait SyncTransport: Send + Sync {
    /// Delivers one envelope. `Ok` means the remote acknowledged it.
    async fn deliver(&self, envelope: &SyncEnvelope) -> SyncResult<()>;

    /// Whether the network currently looks reachable.
    async fn is_online(&self) -> bool;
}

// =============================================================================
// HTTP Transport
// =============================================================================

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    endpoint: Url,
    probe_timeout: Duration,
}

impl HttpTransport {
    /// Creates a transport for `endpoint`.
    ///
    /// `timeout` bounds every delivery; `None` leaves requests unbounded.
    pub fn new(endpoint: &str, timeout: Option<Duration>) -> SyncResult<Self> {
        let endpoint = parse_http_url(endpoint)?;

        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| SyncError::InvalidConfig(format!("Failed to create HTTP client: {}", e)))?;

        Ok(HttpTransport {
            client,
            endpoint,
            probe_timeout: timeout.unwrap_or(PROBE_TIMEOUT),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl SyncTransport for HttpTransport {
    async fn deliver(&self, envelope: &SyncEnvelope) -> SyncResult<()> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(envelope)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            debug!(kind = %envelope.kind, status = status.as_u16(), "Envelope delivered");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        warn!(
            kind = %envelope.kind,
            status = status.as_u16(),
            "Sync endpoint rejected envelope"
        );
        Err(SyncError::Rejected {
            status: status.as_u16(),
            body: body.trim().to_string(),
        })
    }

    async fn is_online(&self) -> bool {
        // Any response counts: the endpoint may not implement HEAD.
        self.client
            .head(self.endpoint.clone())
            .timeout(self.probe_timeout)
            .send()
            .await
            .is_ok()
    }
}
