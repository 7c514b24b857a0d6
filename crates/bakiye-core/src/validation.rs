//! # Validation Module
//!
//! Input validation for ledger and top-up requests.
//!
//! ## Validation Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Layer 1: HTTP extractor (axum)    - type validation (deserialization)  │
//! │  Layer 2: THIS MODULE              - business rule validation           │
//! │  Layer 3: SQLite                   - NOT NULL / UNIQUE / CHECK / FK     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::money::Money;
use crate::{MAX_PAGE_SIZE, MAX_TOPUP_AMOUNT};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validates a dealer or company identifier.
///
/// ## Rules
/// - Must not be empty
/// - At most 64 characters
/// - Letters, digits, `-` and `_` only
pub fn validate_identifier(field: &str, value: &str) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.len() > 64 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 64,
        });
    }

    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates a top-up amount (strictly positive, bounded).
///
/// ```rust
/// use bakiye_core::money::Money;
/// use bakiye_core::validation::validate_topup_amount;
///
/// assert!(validate_topup_amount(Money::from_major(250)).is_ok());
/// assert!(validate_topup_amount(Money::zero()).is_err());
/// ```
pub fn validate_topup_amount(amount: Money) -> ValidationResult<()> {
    if !amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "amount".to_string(),
        });
    }

    if amount > MAX_TOPUP_AMOUNT {
        return Err(ValidationError::OutOfRange {
            field: "amount".to_string(),
            min: 1,
            max: MAX_TOPUP_AMOUNT.minor(),
        });
    }

    Ok(())
}

/// Validates a ledger mutation amount. Sign is free, zero is not.
pub fn validate_mutation_amount(amount: Money) -> ValidationResult<()> {
    if amount.is_zero() {
        return Err(ValidationError::MustBeNonZero {
            field: "amount".to_string(),
        });
    }
    Ok(())
}

/// Validates and normalizes paging input. Returns `(page, page_size)`.
///
/// Pages are 1-based; a missing page size falls back to 20.
pub fn validate_paging(page: Option<u32>, page_size: Option<u32>) -> ValidationResult<(u32, u32)> {
    let page = page.unwrap_or(1);
    if page == 0 {
        return Err(ValidationError::MustBePositive {
            field: "page".to_string(),
        });
    }

    let page_size = page_size.unwrap_or(20);
    if page_size == 0 || page_size > MAX_PAGE_SIZE {
        return Err(ValidationError::OutOfRange {
            field: "page_size".to_string(),
            min: 1,
            max: MAX_PAGE_SIZE as i64,
        });
    }

    Ok((page, page_size))
}

/// Validates a month/year pair for rollups.
pub fn validate_period(year: i32, month: u32) -> ValidationResult<()> {
    if !(1..=12).contains(&month) {
        return Err(ValidationError::OutOfRange {
            field: "month".to_string(),
            min: 1,
            max: 12,
        });
    }
    if !(2000..=2999).contains(&year) {
        return Err(ValidationError::OutOfRange {
            field: "year".to_string(),
            min: 2000,
            max: 2999,
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
