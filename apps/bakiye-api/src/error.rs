//! Error types for the balance service.
//!
//! ## Status Mapping
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  404  dealer / intent / record not found                               │
//! │  400  validation, malformed or badly signed notification               │
//! │  409  duplicate key, concurrent modification after retries             │
//! │  422  insufficient balance, inactive dealer, provider rejection        │
//! │  503  provider unavailable (generic retry message)                     │
//! │  500  everything else (details logged, not returned)                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use bakiye_core::{GatewayProvider, ValidationError};
use bakiye_db::DbError;
use bakiye_gateway::GatewayError;

// =============================================================================
// ReconcileError
// =============================================================================

/// Failure of one reconciliation.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// No intent with this invoice id. The notification is dropped.
    #[error("Unknown payment intent: {0}")]
    UnknownIntent(String),

    /// A notification for an intent that belongs to another provider.
    #[error("Invoice {invoice_id} belongs to {expected}, notification came from {actual}")]
    ProviderMismatch {
        invoice_id: String,
        expected: GatewayProvider,
        actual: GatewayProvider,
    },

    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

// =============================================================================
// ApiError
// =============================================================================

/// Error body returned to HTTP clients.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: ErrorDetail<'a>,
}

#[derive(Serialize)]
struct ErrorDetail<'a> {
    code: &'a str,
    message: &'a str,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        ApiError {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad_request", message)
    }

    pub fn internal(message: impl std::fmt::Display) -> Self {
        error!(error = %message, "Internal error");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", "Internal server error")
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}): {}", self.status, self.code, self.message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: &self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::new(StatusCode::BAD_REQUEST, "validation", err.to_string())
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { .. } | DbError::DealerNotFound(_) => {
                ApiError::new(StatusCode::NOT_FOUND, "not_found", err.to_string())
            }
            DbError::Validation(e) => e.into(),
            DbError::UniqueViolation { .. } => ApiError::new(StatusCode::CONFLICT, "duplicate", err.to_string()),
            DbError::ConcurrentModification { .. } | DbError::Busy(_) => ApiError::new(
                StatusCode::CONFLICT,
                "concurrent_modification",
                "The balance is being modified concurrently, please retry",
            ),
            DbError::InvalidTransition { .. } => {
                ApiError::new(StatusCode::CONFLICT, "invalid_transition", err.to_string())
            }
            DbError::InsufficientBalance { .. } => {
                ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, "insufficient_balance", err.to_string())
            }
            DbError::DealerInactive(_) => {
                ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, "dealer_inactive", err.to_string())
            }
            DbError::BalanceOverflow(_) => {
                ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, "balance_overflow", err.to_string())
            }
            other => ApiError::internal(other),
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Unavailable { provider, reason } => {
                error!(%provider, %reason, "Payment provider unavailable");
                ApiError::new(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "gateway_unavailable",
                    "The payment provider is temporarily unavailable, please retry later",
                )
            }
            GatewayError::Rejected { .. } => {
                ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, "gateway_rejected", err.to_string())
            }
            GatewayError::InvalidSignature { .. } => {
                ApiError::new(StatusCode::BAD_REQUEST, "invalid_signature", err.to_string())
            }
            GatewayError::MalformedNotification(_) => {
                ApiError::new(StatusCode::BAD_REQUEST, "malformed_notification", err.to_string())
            }
            GatewayError::Config(_) => {
                ApiError::new(StatusCode::BAD_REQUEST, "gateway_not_configured", err.to_string())
            }
        }
    }
}

impl From<ReconcileError> for ApiError {
    fn from(err: ReconcileError) -> Self {
        match err {
            ReconcileError::UnknownIntent(_) => ApiError::new(StatusCode::NOT_FOUND, "unknown_intent", err.to_string()),
            ReconcileError::ProviderMismatch { .. } => {
                ApiError::new(StatusCode::BAD_REQUEST, "provider_mismatch", err.to_string())
            }
            ReconcileError::Db(e) => e.into(),
            ReconcileError::Gateway(e) => e.into(),
        }
    }
}

/// Handler result alias.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use bakiye_core::Money;

    #[test]
    fn test_db_error_mapping() {
        let cases = [
            (DbError::DealerNotFound("B".into()), StatusCode::NOT_FOUND),
            (
                DbError::ConcurrentModification { dealer_id: "B".into() },
                StatusCode::CONFLICT,
            ),
            (
                DbError::InsufficientBalance {
                    dealer_id: "B".into(),
                    balance: Money::zero().to_string(),
                    requested: Money::from_major(5).to_string(),
                },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                DbError::Validation(ValidationError::Required { field: "amount".into() }),
                StatusCode::BAD_REQUEST,
            ),
            (DbError::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
    }

    #[test]
    fn test_gateway_unavailable_hides_details() {
        let err = ApiError::from(GatewayError::Unavailable {
            provider: GatewayProvider::ProviderA,
            reason: "connect to 10.0.0.5:443 refused".into(),
        });
        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(!err.message.contains("10.0.0.5"));
    }

    #[test]
    fn test_internal_error_hides_details() {
        let err = ApiError::from(DbError::QueryFailed("SELECT secret".into()));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "Internal server error");
    }
}
