//! # Reporting Types
//!
//! Filters, pages and the monthly rollup fold used by the read-only query
//! side. Nothing here touches storage: the database crate turns a
//! [`HistoryFilter`] into SQL and hands entries back to
//! [`MonthlyRollup::fold`].

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::{LedgerEntry, LedgerKind};
use crate::validation::{validate_paging, validate_period, ValidationResult};

// =============================================================================
// History Sort
// =============================================================================

/// Sort order for ledger history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum HistorySort {
    DateAsc,
    #[default]
    DateDesc,
    AmountAsc,
    AmountDesc,
}

impl HistorySort {
    pub const fn as_str(&self) -> &'static str {
        match self {
            HistorySort::DateAsc => "date_asc",
            HistorySort::DateDesc => "date_desc",
            HistorySort::AmountAsc => "amount_asc",
            HistorySort::AmountDesc => "amount_desc",
        }
    }
}

impl fmt::Display for HistorySort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HistorySort {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "date_asc" => Ok(HistorySort::DateAsc),
            "date_desc" => Ok(HistorySort::DateDesc),
            "amount_asc" => Ok(HistorySort::AmountAsc),
            "amount_desc" => Ok(HistorySort::AmountDesc),
            _ => Err(ValidationError::NotAllowed {
                field: "sort".to_string(),
                allowed: vec![
                    "date_asc".to_string(),
                    "date_desc".to_string(),
                    "amount_asc".to_string(),
                    "amount_desc".to_string(),
                ],
            }),
        }
    }
}

// =============================================================================
// History Filter
// =============================================================================

/// Ledger history query.
///
/// Every criterion is optional; an empty filter pages through the whole
/// ledger newest first. Date bounds are `[from, to)`, amount bounds are
/// inclusive and compare the signed amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryFilter {
    pub dealer_id: Option<String>,
    pub company_id: Option<String>,
    pub kind: Option<LedgerKind>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub min_amount: Option<Money>,
    pub max_amount: Option<Money>,
    pub sort: HistorySort,
    pub page: u32,
    pub page_size: u32,
}

impl Default for HistoryFilter {
    fn default() -> Self {
        Self {
            dealer_id: None,
            company_id: None,
            kind: None,
            from: None,
            to: None,
            min_amount: None,
            max_amount: None,
            sort: HistorySort::default(),
            page: 1,
            page_size: 20,
        }
    }
}

impl HistoryFilter {
    pub fn for_dealer(dealer_id: impl Into<String>) -> Self {
        Self {
            dealer_id: Some(dealer_id.into()),
            ..Self::default()
        }
    }

    /// Checks ranges and paging.
    pub fn validate(&self) -> ValidationResult<()> {
        validate_paging(Some(self.page), Some(self.page_size))?;

        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from > to {
                return Err(ValidationError::InvalidFormat {
                    field: "from".to_string(),
                    reason: "must not be after 'to'".to_string(),
                });
            }
        }
        if let (Some(min), Some(max)) = (self.min_amount, self.max_amount) {
            if min > max {
                return Err(ValidationError::InvalidFormat {
                    field: "min_amount".to_string(),
                    reason: "must not exceed max_amount".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Row offset of the requested page.
    pub fn offset(&self) -> i64 {
        (self.page.saturating_sub(1) as i64) * self.page_size as i64
    }
}

// =============================================================================
// Page
// =============================================================================

/// One page of results plus the totals a paginator needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, page: u32, page_size: u32) -> Self {
        let total_pages = if total <= 0 || page_size == 0 {
            0
        } else {
            ((total as u64 + page_size as u64 - 1) / page_size as u64) as u32
        };
        Self {
            items,
            total,
            page,
            page_size,
            total_pages,
        }
    }
}

// =============================================================================
// Monthly Rollup
// =============================================================================

/// A calendar month in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub year: i32,
    pub month: u32,
}

impl Period {
    pub fn new(year: i32, month: u32) -> ValidationResult<Self> {
        validate_period(year, month)?;
        Ok(Self { year, month })
    }

    /// `[start, end)` of the month.
    pub fn bounds(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        let (next_year, next_month) = if self.month == 12 {
            (self.year + 1, 1)
        } else {
            (self.year, self.month + 1)
        };
        (
            month_start(self.year, self.month),
            month_start(next_year, next_month),
        )
    }
}

fn month_start(year: i32, month: u32) -> DateTime<Utc> {
    // Period::new has already checked the month, so day 1 always exists.
    let date = NaiveDate::from_ymd_opt(year, month, 1).unwrap_or_default();
    Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN))
}

/// Balance movement of one dealer over one month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyRollup {
    pub dealer_id: String,
    pub year: i32,
    pub month: u32,
    pub opening_balance: Money,
    /// Sum of positive amounts.
    pub credits: Money,
    /// Sum of negative amounts, reported as a positive figure.
    pub debits: Money,
    /// `credits - debits`
    pub net_change: Money,
    pub closing_balance: Money,
    pub entry_count: u32,
}

impl MonthlyRollup {
    /// Folds the month's entries (ascending id) onto the opening balance.
    ///
    /// `opening_balance` is the `balance_after` of the newest entry before
    /// the period, or zero when there is none. The closing balance is the
    /// newest entry's `balance_after`, or the opening balance for an empty
    /// month.
    pub fn fold(
        dealer_id: impl Into<String>,
        period: Period,
        opening_balance: Money,
        entries: &[LedgerEntry],
    ) -> Self {
        let mut credits = Money::zero();
        let mut debits = Money::zero();

        for entry in entries {
            if entry.amount.is_negative() {
                debits += entry.amount.abs();
            } else {
                credits += entry.amount;
            }
        }

        let closing_balance = entries
            .last()
            .map(|e| e.balance_after)
            .unwrap_or(opening_balance);

        Self {
            dealer_id: dealer_id.into(),
            year: period.year,
            month: period.month,
            opening_balance,
            credits,
            debits,
            net_change: credits - debits,
            closing_balance,
            entry_count: entries.len() as u32,
        }
    }

    /// `opening + net_change == closing` holds for any unbroken chain.
    pub fn is_consistent(&self) -> bool {
        self.opening_balance + self.net_change == self.closing_balance
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
