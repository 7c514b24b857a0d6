//! # Error Types
//!
//! Domain-specific error types for bakiye-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  bakiye-core      CoreError, ValidationError   (this file)              │
//! │  bakiye-db        DbError                      ledger / storage         │
//! │  bakiye-gateway   GatewayError                 provider traffic         │
//! │  bakiye-api       ReconcileError, ApiError     what HTTP callers see    │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ApiError → HTTP          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations detected without touching storage.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A debit would take the balance below zero under the reject policy.
    #[error("Insufficient balance for dealer {dealer_id}: balance {balance}, requested {requested}")]
    InsufficientBalance {
        dealer_id: String,
        balance: String,
        requested: String,
    },

    /// Intent state machine violation (terminal intents never reopen).
    #[error("Invalid intent transition for {invoice_id}: {from} -> {to}")]
    InvalidTransition {
        invoice_id: String,
        from: String,
        to: String,
    },

    /// Arithmetic overflow on a balance.
    #[error("Balance overflow for dealer {0}")]
    BalanceOverflow(String),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    #[error("{field} must be positive")]
    MustBePositive { field: String },

    #[error("{field} must not be zero")]
    MustBeNonZero { field: String },

    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientBalance {
            dealer_id: "D-7".to_string(),
            balance: "10.00".to_string(),
            requested: "25.00".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Insufficient balance for dealer D-7: balance 10.00, requested 25.00"
        );

        let err = ValidationError::MustBeNonZero {
            field: "amount".to_string(),
        };
        assert_eq!(err.to_string(), "amount must not be zero");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "dealer_id".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
