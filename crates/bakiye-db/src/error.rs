//! # Database Error Types
//!
//! Error types for storage and ledger operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  sqlx::Error                 CoreError (overdraft, overflow, input)    │
//! │       │                            │                                    │
//! │       └──────────────┬─────────────┘                                    │
//! │                      ▼                                                  │
//! │  DbError (this module) ← categorized, retryable or not                  │
//! │       │                                                                 │
//! │       ├── ConcurrentModification / Busy → retried by the ledger writer │
//! │       ▼                                                                 │
//! │  ApiError (bakiye-api) ← status code + message for the panel           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use bakiye_core::{CoreError, ValidationError};
use thiserror::Error;

/// Storage and ledger errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// No balance account for the dealer.
    #[error("Dealer not found: {0}")]
    DealerNotFound(String),

    /// The dealer exists but is deactivated.
    #[error("Dealer is inactive: {0}")]
    DealerInactive(String),

    /// A debit would overdraw the account under the reject policy.
    #[error("Insufficient balance for dealer {dealer_id}: balance {balance}, requested {requested}")]
    InsufficientBalance {
        dealer_id: String,
        balance: String,
        requested: String,
    },

    /// The balance moved between read and compare-and-swap.
    ///
    /// Retried by the ledger writer; surfaces only once retries run out.
    #[error("Concurrent modification of dealer {dealer_id}")]
    ConcurrentModification { dealer_id: String },

    /// SQLite reported the database as busy or locked.
    #[error("Database busy: {0}")]
    Busy(String),

    /// Arithmetic overflow on a balance.
    #[error("Balance overflow for dealer {0}")]
    BalanceOverflow(String),

    /// Intent state machine violation.
    #[error("Invalid intent transition for {invoice_id}: {from} -> {to}")]
    InvalidTransition {
        invoice_id: String,
        from: String,
        to: String,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Unique constraint violation.
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Whether the ledger writer may retry the whole unit of work.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DbError::ConcurrentModification { .. } | DbError::Busy(_))
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → constraint type, or Busy for SQLITE_BUSY/LOCKED
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();
                // Primary result codes 5 (BUSY) and 6 (LOCKED), plus extended
                // codes such as 517 (BUSY_SNAPSHOT) and 262 (LOCKED_SHAREDCACHE).
                let busy_code = db_err
                    .code()
                    .and_then(|code| code.parse::<i32>().ok())
                    .map(|code| matches!(code & 0xff, 5 | 6))
                    .unwrap_or(false);

                if busy_code || msg.contains("database is locked") || msg.contains("database table is locked") {
                    DbError::Busy(msg.to_string())
                } else if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

impl From<CoreError> for DbError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InsufficientBalance {
                dealer_id,
                balance,
                requested,
            } => DbError::InsufficientBalance {
                dealer_id,
                balance,
                requested,
            },
            CoreError::InvalidTransition { invoice_id, from, to } => {
                DbError::InvalidTransition { invoice_id, from, to }
            }
            CoreError::BalanceOverflow(dealer_id) => DbError::BalanceOverflow(dealer_id),
            CoreError::Validation(e) => DbError::Validation(e),
        }
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(DbError::ConcurrentModification {
            dealer_id: "D".to_string()
        }
        .is_retryable());
        assert!(DbError::Busy("database is locked".to_string()).is_retryable());
        assert!(!DbError::DealerNotFound("D".to_string()).is_retryable());
        assert!(!DbError::duplicate("invoice_id", "INV-1").is_retryable());
    }

    #[test]
    fn test_core_error_mapping() {
        let err: DbError = CoreError::InsufficientBalance {
            dealer_id: "D".to_string(),
            balance: "1.00".to_string(),
            requested: "2.00".to_string(),
        }
        .into();
        assert!(matches!(err, DbError::InsufficientBalance { .. }));

        let err: DbError = CoreError::BalanceOverflow("D".to_string()).into();
        assert!(matches!(err, DbError::BalanceOverflow(_)));
    }
}
