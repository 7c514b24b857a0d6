//! # Money Module
//!
//! Provides the `Money` type for dealer balances and ledger amounts.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  With floats:                                                           │
//! │    0.1 + 0.2 = 0.30000000000000004                                      │
//! │                                                                         │
//! │  A ledger chain built on floats drifts:                                 │
//! │    balance_before + amount != balance_after after enough entries        │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Minor Units (kuruş)                              │
//! │    750.00 is stored as 75000                                            │
//! │    Every ledger row satisfies before + amount == after exactly          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use bakiye_core::money::Money;
//!
//! let balance = Money::from_minor(50_000);           // 500.00
//! let topup: Money = "250.00".parse().unwrap();     // 250.00
//! assert_eq!((balance + topup).to_string(), "750.00");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::types::CommissionRate;

/// Number of minor units in one major unit.
pub const MINOR_PER_MAJOR: i64 = 100;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (kuruş).
///
/// ## Design Decisions
/// - **i64 (signed)**: ledger amounts are negative for debits
/// - **Single field tuple struct**: zero-cost abstraction over i64
/// - **Stored as INTEGER**: SQLite keeps the exact value
///
/// ## Where Money is Used
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │                                                                         │
/// │  PaymentIntent.requested_amount ──► LedgerEntry.amount                  │
/// │                                          │                              │
/// │  CommissionRecord.commission_amount ─────┤ (negated: debit)             │
/// │                                          ▼                              │
/// │              balance_before + amount = balance_after                    │
/// │                                          │                              │
/// │                                          ▼                              │
/// │                       BalanceAccount.current_balance                    │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from minor units.
    ///
    /// ```rust
    /// use bakiye_core::money::Money;
    ///
    /// let amount = Money::from_minor(30_000); // 300.00
    /// assert_eq!(amount.minor(), 30_000);
    /// ```
    #[inline]
    pub const fn from_minor(minor: i64) -> Self {
        Money(minor)
    }

    /// Creates a Money value from major and minor parts.
    ///
    /// For negative amounts only the major part carries the sign:
    /// `from_major_minor(-5, 50)` is -5.50.
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * MINOR_PER_MAJOR - minor)
        } else {
            Money(major * MINOR_PER_MAJOR + minor)
        }
    }

    /// Creates a whole amount (no fractional part).
    #[inline]
    pub const fn from_major(major: i64) -> Self {
        Money(major * MINOR_PER_MAJOR)
    }

    /// Returns the value in minor units.
    #[inline]
    pub const fn minor(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion (truncated toward zero).
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / MINOR_PER_MAJOR
    }

    /// Returns the fractional portion as an absolute value (0-99).
    #[inline]
    pub const fn minor_part(&self) -> i64 {
        (self.0 % MINOR_PER_MAJOR).abs()
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Addition that reports overflow instead of wrapping.
    ///
    /// The ledger writer uses this for `balance_before + amount` so a corrupt
    /// or hostile amount can never wrap a balance around.
    #[inline]
    pub const fn checked_add(self, other: Money) -> Option<Money> {
        match self.0.checked_add(other.0) {
            Some(v) => Some(Money(v)),
            None => None,
        }
    }

    #[inline]
    pub const fn checked_sub(self, other: Money) -> Option<Money> {
        match self.0.checked_sub(other.0) {
            Some(v) => Some(Money(v)),
            None => None,
        }
    }

    /// Applies a percentage rate with half-up rounding on minor units.
    ///
    /// ## Implementation
    /// Integer math: `(|amount| * bps + 5000) / 10000`, sign restored after.
    /// Rounding away from zero keeps debits and credits symmetric.
    ///
    /// ```rust
    /// use bakiye_core::money::Money;
    /// use bakiye_core::types::CommissionRate;
    ///
    /// let gross = Money::from_major(1000);
    /// let commission = gross.apply_rate(CommissionRate::from_percentage(10.0));
    /// assert_eq!(commission.to_string(), "100.00");
    /// ```
    pub fn apply_rate(&self, rate: CommissionRate) -> Money {
        // i128 keeps large balances from overflowing the intermediate product
        let magnitude = (self.0.unsigned_abs() as i128 * rate.bps() as i128 + 5000) / 10000;
        let magnitude = magnitude as i64;
        if self.0 < 0 {
            Money(-magnitude)
        } else {
            Money(magnitude)
        }
    }

    /// Parses a decimal string such as `"250"`, `"250.5"` or `"250,50"`.
    ///
    /// ## Rules
    /// - Optional leading `-`
    /// - `.` or `,` as the decimal separator
    /// - At most two fractional digits (no silent rounding of money)
    pub fn parse_decimal(input: &str) -> Result<Money, ValidationError> {
        let invalid = |reason: &str| ValidationError::InvalidFormat {
            field: "amount".to_string(),
            reason: reason.to_string(),
        };

        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::Required {
                field: "amount".to_string(),
            });
        }

        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };

        let normalized = digits.replace(',', ".");
        let mut parts = normalized.splitn(2, '.');
        let whole = parts.next().unwrap_or("");
        let fraction = parts.next().unwrap_or("");

        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid("no digits"));
        }
        if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid("must be a decimal number"));
        }
        if fraction.len() > 2 {
            return Err(invalid("at most two decimal places are allowed"));
        }

        let whole_value: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid("amount is too large"))?
        };
        let fraction_value: i64 = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<i64>().map_err(|_| invalid("bad fraction"))? * 10,
            _ => fraction.parse::<i64>().map_err(|_| invalid("bad fraction"))?,
        };

        let minor = whole_value
            .checked_mul(MINOR_PER_MAJOR)
            .and_then(|v| v.checked_add(fraction_value))
            .ok_or_else(|| invalid("amount is too large"))?;

        Ok(Money(if negative { -minor } else { minor }))
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Plain decimal form with two fractional digits: `750.00`, `-5.50`.
///
/// Providers that take decimal amounts receive exactly this string.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.minor_part())
    }
}

impl FromStr for Money {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Money::parse_decimal(s)
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_minor_and_parts() {
        let money = Money::from_minor(75_050);
        assert_eq!(money.minor(), 75_050);
        assert_eq!(money.major(), 750);
        assert_eq!(money.minor_part(), 50);
    }

    #[test]
    fn test_from_major_minor_negative() {
        assert_eq!(Money::from_major_minor(-5, 50).minor(), -550);
        assert_eq!(Money::from_major_minor(5, 50).minor(), 550);
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_minor(75_000).to_string(), "750.00");
        assert_eq!(Money::from_minor(5).to_string(), "0.05");
        assert_eq!(Money::from_minor(-550).to_string(), "-5.50");
        assert_eq!(Money::zero().to_string(), "0.00");
    }

    #[test]
    fn test_parse_decimal_forms() {
        assert_eq!(Money::parse_decimal("250").unwrap().minor(), 25_000);
        assert_eq!(Money::parse_decimal("250.5").unwrap().minor(), 25_050);
        assert_eq!(Money::parse_decimal("250,50").unwrap().minor(), 25_050);
        assert_eq!(Money::parse_decimal(" -12.34 ").unwrap().minor(), -1_234);
        assert_eq!(Money::parse_decimal(".75").unwrap().minor(), 75);
    }

    #[test]
    fn test_parse_decimal_rejects_bad_input() {
        assert!(matches!(
            Money::parse_decimal(""),
            Err(ValidationError::Required { .. })
        ));
        assert!(Money::parse_decimal("12.345").is_err());
        assert!(Money::parse_decimal("12a").is_err());
        assert!(Money::parse_decimal("1.2.3").is_err());
        assert!(Money::parse_decimal("-").is_err());
        assert!(Money::parse_decimal("99999999999999999999").is_err());
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_minor(50_000);
        let b = Money::from_minor(25_000);
        assert_eq!((a + b).minor(), 75_000);
        assert_eq!((a - b).minor(), 25_000);
        assert_eq!((-b).minor(), -25_000);

        let total: Money = vec![a, b, -b].into_iter().sum();
        assert_eq!(total, a);
    }

    #[test]
    fn test_checked_add_overflow() {
        let max = Money::from_minor(i64::MAX);
        assert!(max.checked_add(Money::from_minor(1)).is_none());
        assert_eq!(
            Money::from_minor(1).checked_add(Money::from_minor(2)),
            Some(Money::from_minor(3))
        );
    }

    #[test]
    fn test_apply_rate_rounding() {
        // 1000.00 at 10% = 100.00
        let gross = Money::from_major(1000);
        assert_eq!(gross.apply_rate(CommissionRate::from_bps(1000)).minor(), 10_000);

        // 0.05 at 10% = 0.005 -> rounds half-up to 0.01
        let small = Money::from_minor(5);
        assert_eq!(small.apply_rate(CommissionRate::from_bps(1000)).minor(), 1);

        // Negative amounts round symmetrically
        let negative = Money::from_minor(-5);
        assert_eq!(negative.apply_rate(CommissionRate::from_bps(1000)).minor(), -1);
    }
}
