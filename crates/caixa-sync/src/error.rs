//! # Sync Error Types
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Transport     │  │     Protocol            │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  Connection     │  │  SerializationFailed    │ │
//! │  │  InvalidUrl     │  │  Timeout        │  │  DeserializationFailed  │ │
//! │  │  ConfigLoad     │  │  Rejected (4xx/ │  │  UnexpectedResponse     │ │
//! │  │                 │  │  5xx)           │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  None of these reach the operator as a failed command. The register    │
//! │  only shows "offline" and the pending count.                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("Invalid sync configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// The request never produced an HTTP response.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timed out")]
    Timeout,

    /// The remote side answered with a non-2xx status.
    ///
    /// ## When This Occurs
    /// - Endpoint misconfigured (404)
    /// - Backend key revoked (401/403)
    /// - Remote outage (5xx)
    #[error("Remote rejected the request (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },

    // =========================================================================
    // Protocol Errors
    // =========================================================================
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),

    /// A 2xx response without the expected body (e.g. no row returned).
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    // =========================================================================
    // Storage Errors
    // =========================================================================
    #[error("Database error: {0}")]
    DatabaseError(String),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Sync agent is shutting down")]
    ShuttingDown,
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<caixa_db::DbError> for SyncError {
    fn from(err: caixa_db::DbError) -> Self {
        SyncError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::SerializationFailed(err.to_string())
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidUrl(err.to_string())
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SyncError::Timeout
        } else if err.is_decode() {
            SyncError::DeserializationFailed(err.to_string())
        } else if err.is_builder() {
            SyncError::InvalidConfig(err.to_string())
        } else {
            SyncError::ConnectionFailed(err.to_string())
        }
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl SyncError {
    /// Whether a later pass may succeed without anyone changing anything.
    ///
    /// ## Retryable
    /// - Network failures, timeouts
    /// - 408, 429 and 5xx responses
    ///
    /// ## Non-Retryable
    /// - Configuration errors
    /// - Other 4xx responses (the payload or credentials are wrong)
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::ConnectionFailed(_) | SyncError::Timeout => true,
            SyncError::Rejected { status, .. } => {
                *status >= 500 || *status == 408 || *status == 429
            }
            _ => false,
        }
    }

    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::InvalidUrl(_)
                | SyncError::ConfigLoadFailed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(SyncError::ConnectionFailed("refused".into()).is_retryable());
        assert!(SyncError::Timeout.is_retryable());
        assert!(SyncError::Rejected { status: 503, body: String::new() }.is_retryable());
        assert!(SyncError::Rejected { status: 429, body: String::new() }.is_retryable());

        assert!(!SyncError::Rejected { status: 400, body: String::new() }.is_retryable());
        assert!(!SyncError::InvalidConfig("bad".into()).is_retryable());
        assert!(!SyncError::DeserializationFailed("bad".into()).is_retryable());
    }

    #[test]
    fn test_config_errors() {
        assert!(SyncError::InvalidUrl("x".into()).is_config_error());
        assert!(SyncError::ConfigLoadFailed("x".into()).is_config_error());
        assert!(!SyncError::Timeout.is_config_error());
    }

    #[test]
    fn test_error_display() {
        let err = SyncError::Rejected {
            status: 404,
            body: "not found".into(),
        };
        assert_eq!(
            err.to_string(),
            "Remote rejected the request (HTTP 404): not found"
        );
    }
}
