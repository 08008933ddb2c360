//! # API Error Type
//!
//! Unified error type for register commands.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Caixa Freitas                          │
//! │                                                                         │
//! │  Operator                    Rust Backend                               │
//! │  ────────                    ────────────                               │
//! │                                                                         │
//! │  withdraw 15,00 troco                                                   │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  Command Function                                                │  │
//! │  │  Result<T, ApiError>                                             │  │
//! │  │         │                                                        │  │
//! │  │         ▼                                                        │  │
//! │  │  Core rejects? ─── ValidationError::InsufficientCashBalance ─┐   │  │
//! │  │         │                                                    │   │  │
//! │  │         ▼                                                    ▼   │  │
//! │  │  Storage fails? ── logged, session degraded (NOT an error)  ApiError │
//! │  │         │                                                        │  │
//! │  │         ▼                                                        │  │
//! │  │  Sync fails? ───── logged, online=false notice (NOT an error)    │  │
//! │  │         │                                                        │  │
//! │  │         ▼                                                        │  │
//! │  │  Success ──────────────────────────────────────────────────────►│  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │                                                                         │
//! │  {"ok":false,"error":{"code":"VALIDATION_ERROR","message":"..."}}      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use caixa_core::{CoreError, PreconditionError};
use caixa_db::DbError;
use caixa_sync::SyncError;
use serde::Serialize;

/// API error returned from register commands.
///
/// ## Serialization
/// This is what the operator's screen receives when a command fails:
/// ```json
/// {
///   "code": "PRECONDITION_FAILED",
///   "message": "no active shift"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message for display
    pub message: String,
}

/// Error codes for command responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Bad operator input (amounts, names, quantities)
    ValidationError,

    /// Operation not allowed in the current register state
    PreconditionFailed,

    /// Destructive operation issued without `--yes`
    ConfirmationRequired,

    /// Invalid cart line operation
    CartError,

    /// Unknown command or malformed arguments
    InvalidCommand,

    /// Catalog product not found
    NotFound,

    /// Local storage failed
    DatabaseError,

    /// Sync subsystem failed
    SyncError,

    /// Configuration could not be loaded
    ConfigError,

    /// Anything else
    Internal,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(resource: &str, id: &str) -> Self {
        ApiError::new(ErrorCode::NotFound, format!("{} not found: {}", resource, id))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    pub fn invalid_command(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::InvalidCommand, message)
    }

    pub fn config(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ConfigError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }
}

/// Converts core errors to API errors.
impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        match err {
            CoreError::Validation(_) => ApiError::new(ErrorCode::ValidationError, message),
            CoreError::Precondition(PreconditionError::ConfirmationRequired { .. }) => {
                ApiError::new(ErrorCode::ConfirmationRequired, message)
            }
            CoreError::Precondition(_) => ApiError::new(ErrorCode::PreconditionFailed, message),
            CoreError::Cart(_) => ApiError::new(ErrorCode::CartError, message),
        }
    }
}

impl From<caixa_core::ValidationError> for ApiError {
    fn from(err: caixa_core::ValidationError) -> Self {
        ApiError::from(CoreError::from(err))
    }
}

/// Converts database errors to API errors.
impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => ApiError::not_found(&entity, &id),
            DbError::ConnectionFailed(_) => {
                ApiError::new(ErrorCode::DatabaseError, "Database connection failed")
            }
            DbError::MigrationFailed(_) => {
                ApiError::new(ErrorCode::DatabaseError, "Database migration failed")
            }
            DbError::PoolExhausted => {
                ApiError::new(ErrorCode::DatabaseError, "Database pool exhausted")
            }
            DbError::QueryFailed(e) | DbError::Serialization(e) | DbError::Internal(e) => {
                // Log the actual error but return a generic message
                tracing::error!("Database operation failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
        }
    }
}

/// Converts sync errors to API errors.
///
/// Only reached by explicit sync commands; transaction commands never fail
/// because of sync.
impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        if err.is_config_error() {
            return ApiError::config(err.to_string());
        }
        match err {
            SyncError::DatabaseError(e) => {
                tracing::error!("Sync storage failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
            other => ApiError::new(ErrorCode::SyncError, other.to_string()),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

#[cfg(test)]
mod tests {
    use super::*;
    use caixa_core::{CartError, Money, ValidationError};

    #[test]
    fn test_core_error_codes() {
        let err: ApiError = CoreError::from(PreconditionError::NoActiveShift).into();
        assert_eq!(err.code, ErrorCode::PreconditionFailed);
        assert_eq!(err.message, "no active shift");

        let err: ApiError = CoreError::from(PreconditionError::ConfirmationRequired {
            operation: "close shift".into(),
        })
        .into();
        assert_eq!(err.code, ErrorCode::ConfirmationRequired);

        let err: ApiError = CoreError::from(CartError::IndexOutOfRange { index: 4, len: 1 }).into();
        assert_eq!(err.code, ErrorCode::CartError);

        let err: ApiError = ValidationError::InsufficientCashBalance {
            requested: Money::from_cents(1500),
            balance: Money::from_cents(1000),
        }
        .into();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }

    #[test]
    fn test_db_error_hides_details() {
        let err: ApiError = DbError::QueryFailed("disk I/O error".into()).into();
        assert_eq!(err.code, ErrorCode::DatabaseError);
        assert!(!err.message.contains("disk"));
    }

    #[test]
    fn test_serialized_shape() {
        let err = ApiError::not_found("Product", "Sonho");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "NOT_FOUND");
        assert_eq!(json["message"], "Product not found: Sonho");
    }
}
