//! # Commission Calculator
//!
//! Pure commission math for billable test events.
//!
//! ## Rate Resolution
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   dealer-specific rate?  ──yes──►  use it                               │
//! │          │ no                                                           │
//! │          ▼                                                              │
//! │   company default rate?  ──yes──►  use it                               │
//! │          │ no                                                           │
//! │          ▼                                                              │
//! │   system default rate                                                   │
//! │                                                                         │
//! │   whichever wins is clamped to [0%, 100%]                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The caller writes the resulting amount as one `commission_debit` ledger
//! mutation. A zero commission produces a record but callers skip the ledger
//! entry to keep the history free of zero rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{CommissionRate, CommissionRecord};

/// Where a resolved rate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateSource {
    Dealer,
    Company,
    System,
}

/// Persisted rate configuration for one dealer, as raw basis points.
///
/// Raw values are kept unclamped so that misconfigured rows are visible to
/// [`RateConfig::resolve`], which clamps and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RateConfig {
    pub dealer_bps: Option<i64>,
    pub company_bps: Option<i64>,
    pub system_default_bps: i64,
}

/// The rate actually applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedRate {
    pub rate: CommissionRate,
    pub source: RateSource,
    /// The configured value was outside `[0, 10000]` bps.
    pub clamped: bool,
}

impl RateConfig {
    pub fn resolve(&self) -> ResolvedRate {
        let (raw, source) = match (self.dealer_bps, self.company_bps) {
            (Some(bps), _) => (bps, RateSource::Dealer),
            (None, Some(bps)) => (bps, RateSource::Company),
            (None, None) => (self.system_default_bps, RateSource::System),
        };
        let (rate, clamped) = CommissionRate::clamped(raw);
        ResolvedRate {
            rate,
            source,
            clamped,
        }
    }
}

/// A completed test transaction that owes commission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillableEvent {
    pub test_id: String,
    pub dealer_id: String,
    pub company_id: String,
    pub gross_amount: Money,
}

/// Commission owed on `gross_amount` at the resolved rate.
///
/// ```rust
/// use bakiye_core::commission::{commission_amount, RateConfig};
/// use bakiye_core::money::Money;
///
/// let config = RateConfig { dealer_bps: None, company_bps: None, system_default_bps: 1000 };
/// let (amount, _) = commission_amount(Money::from_major(1000), &config).unwrap();
/// assert_eq!(amount.to_string(), "100.00");
/// ```
pub fn commission_amount(gross_amount: Money, config: &RateConfig) -> CoreResult<(Money, ResolvedRate)> {
    if gross_amount.is_negative() {
        return Err(ValidationError::MustBePositive {
            field: "gross_amount".to_string(),
        }
        .into());
    }

    let resolved = config.resolve();
    Ok((gross_amount.apply_rate(resolved.rate), resolved))
}

/// Builds the commission record for one billable event.
///
/// `ledger_entry_id` is left empty; storage fills it once the debit exists.
pub fn compute_commission(
    event: &BillableEvent,
    config: &RateConfig,
    at: DateTime<Utc>,
) -> CoreResult<(CommissionRecord, ResolvedRate)> {
    let (amount, resolved) = commission_amount(event.gross_amount, config)?;

    let record = CommissionRecord {
        test_id: event.test_id.clone(),
        dealer_id: event.dealer_id.clone(),
        company_id: event.company_id.clone(),
        rate_bps: resolved.rate.bps() as i64,
        gross_amount: event.gross_amount,
        commission_amount: amount,
        ledger_entry_id: None,
        created_at: at,
    };

    Ok((record, resolved))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn event(gross: Money) -> BillableEvent {
        BillableEvent {
            test_id: "T-1".to_string(),
            dealer_id: "D-1".to_string(),
            company_id: "C-1".to_string(),
            gross_amount: gross,
        }
    }

    #[test]
    fn test_ten_percent_of_thousand() {
        let config = RateConfig {
            dealer_bps: Some(1000),
            company_bps: None,
            system_default_bps: 0,
        };
        let (record, resolved) = compute_commission(&event(Money::from_major(1000)), &config, Utc::now()).unwrap();
        assert_eq!(record.commission_amount, Money::from_major(100));
        assert_eq!(record.commission_amount.to_string(), "100.00");
        assert_eq!(record.rate_bps, 1000);
        assert_eq!(resolved.source, RateSource::Dealer);
        assert!(record.ledger_entry_id.is_none());
    }

    #[test]
    fn test_rate_resolution_order() {
        let dealer_wins = RateConfig {
            dealer_bps: Some(500),
            company_bps: Some(700),
            system_default_bps: 900,
        };
        assert_eq!(dealer_wins.resolve().rate.bps(), 500);

        let company_wins = RateConfig {
            dealer_bps: None,
            ..dealer_wins
        };
        assert_eq!(company_wins.resolve().rate.bps(), 700);
        assert_eq!(company_wins.resolve().source, RateSource::Company);

        let system = RateConfig {
            dealer_bps: None,
            company_bps: None,
            system_default_bps: 900,
        };
        assert_eq!(system.resolve().source, RateSource::System);
    }

    #[test]
    fn test_out_of_range_rates_are_clamped() {
        let too_high = RateConfig {
            dealer_bps: Some(25_000),
            company_bps: None,
            system_default_bps: 0,
        };
        let resolved = too_high.resolve();
        assert_eq!(resolved.rate.bps(), 10_000);
        assert!(resolved.clamped);

        let (amount, _) = commission_amount(Money::from_major(80), &too_high).unwrap();
        assert_eq!(amount, Money::from_major(80));

        let negative = RateConfig {
            dealer_bps: None,
            company_bps: Some(-300),
            system_default_bps: 0,
        };
        let (amount, resolved) = commission_amount(Money::from_major(80), &negative).unwrap();
        assert!(amount.is_zero());
        assert!(resolved.clamped);
    }

    #[test]
    fn test_zero_gross_yields_zero_commission() {
        let config = RateConfig {
            dealer_bps: Some(1500),
            company_bps: None,
            system_default_bps: 0,
        };
        let (record, _) = compute_commission(&event(Money::zero()), &config, Utc::now()).unwrap();
        assert!(record.commission_amount.is_zero());
    }

    #[test]
    fn test_negative_gross_is_rejected() {
        let config = RateConfig::default();
        assert!(commission_amount(Money::from_minor(-1), &config).is_err());
    }
}
