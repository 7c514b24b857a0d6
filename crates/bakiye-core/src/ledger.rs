//! # Ledger Rules
//!
//! The arithmetic half of a balance mutation. Storage does the locking and
//! the writes; this module decides what the new balance is, or why there
//! must not be one.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::LedgerEntry;
use crate::validation::validate_mutation_amount;

/// What to do when a mutation would take a balance below zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverdraftPolicy {
    /// Refuse the mutation with `InsufficientBalance`.
    #[default]
    Reject,
    /// Let the balance go negative.
    Allow,
}

/// Computes `balance_before + amount` under the overdraft policy.
///
/// Credits are never refused, even on an already negative balance: refusing
/// a confirmed card payment would lose money instead of protecting it.
pub fn next_balance(
    dealer_id: &str,
    balance_before: Money,
    amount: Money,
    policy: OverdraftPolicy,
) -> CoreResult<Money> {
    validate_mutation_amount(amount)?;

    let balance_after = balance_before
        .checked_add(amount)
        .ok_or_else(|| CoreError::BalanceOverflow(dealer_id.to_string()))?;

    if amount.is_negative() && balance_after.is_negative() && policy == OverdraftPolicy::Reject {
        return Err(CoreError::InsufficientBalance {
            dealer_id: dealer_id.to_string(),
            balance: balance_before.to_string(),
            requested: amount.abs().to_string(),
        });
    }

    Ok(balance_after)
}

/// A break in one dealer's ledger chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChainViolation {
    /// `balance_after != balance_before + amount`
    Unbalanced { entry_id: i64 },
    /// `balance_before` does not continue the previous entry.
    Broken {
        entry_id: i64,
        expected_before: Money,
        actual_before: Money,
    },
    /// `created_at` is earlier than the previous entry's.
    OutOfOrder { entry_id: i64, previous_entry_id: i64 },
}

/// Checks the arithmetic and chain invariants over one dealer's entries,
/// which must be in ascending id order. Dates must not go backwards along
/// the chain.
///
/// The first entry's `balance_before` is accepted as the chain start.
pub fn verify_chain(entries: &[LedgerEntry]) -> Vec<ChainViolation> {
    let mut violations = Vec::new();
    let mut previous: Option<&LedgerEntry> = None;

    for entry in entries {
        if !entry.is_balanced() {
            violations.push(ChainViolation::Unbalanced { entry_id: entry.id });
        }
        if let Some(previous) = previous {
            if previous.balance_after != entry.balance_before {
                violations.push(ChainViolation::Broken {
                    entry_id: entry.id,
                    expected_before: previous.balance_after,
                    actual_before: entry.balance_before,
                });
            }
            if entry.created_at < previous.created_at {
                violations.push(ChainViolation::OutOfOrder {
                    entry_id: entry.id,
                    previous_entry_id: previous.id,
                });
            }
        }
        previous = Some(entry);
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LedgerKind;
    use chrono::Utc;

    fn entry(id: i64, before: i64, amount: i64, after: i64) -> LedgerEntry {
        LedgerEntry {
            id,
            dealer_id: "D".to_string(),
            amount: Money::from_minor(amount),
            balance_before: Money::from_minor(before),
            balance_after: Money::from_minor(after),
            kind: LedgerKind::ManualTopup,
            external_reference: None,
            description: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_manual_topup_arithmetic() {
        let after = next_balance(
            "D",
            Money::from_major(500),
            Money::from_major(250),
            OverdraftPolicy::Reject,
        )
        .unwrap();
        assert_eq!(after.to_string(), "750.00");
    }

    #[test]
    fn test_overdraft_reject_and_allow() {
        let before = Money::from_major(10);
        let debit = Money::from_major(-25);

        assert!(matches!(
            next_balance("D", before, debit, OverdraftPolicy::Reject),
            Err(CoreError::InsufficientBalance { .. })
        ));
        assert_eq!(
            next_balance("D", before, debit, OverdraftPolicy::Allow).unwrap(),
            Money::from_major(-15)
        );
    }

    #[test]
    fn test_credit_on_negative_balance_is_accepted() {
        let after = next_balance(
            "D",
            Money::from_major(-50),
            Money::from_major(20),
            OverdraftPolicy::Reject,
        )
        .unwrap();
        assert_eq!(after, Money::from_major(-30));
    }

    #[test]
    fn test_zero_and_overflow() {
        assert!(matches!(
            next_balance("D", Money::zero(), Money::zero(), OverdraftPolicy::Allow),
            Err(CoreError::Validation(_))
        ));
        assert!(matches!(
            next_balance(
                "D",
                Money::from_minor(i64::MAX),
                Money::from_minor(1),
                OverdraftPolicy::Allow
            ),
            Err(CoreError::BalanceOverflow(_))
        ));
    }

    #[test]
    fn test_verify_chain() {
        let good = vec![entry(1, 0, 500, 500), entry(2, 500, -200, 300), entry(5, 300, 50, 350)];
        assert!(verify_chain(&good).is_empty());

        let bad = vec![entry(1, 0, 500, 500), entry(2, 400, 100, 500), entry(3, 500, 10, 600)];
        let violations = verify_chain(&bad);
        assert_eq!(violations.len(), 2);
        assert!(matches!(violations[0], ChainViolation::Broken { entry_id: 2, .. }));
        assert_eq!(violations[1], ChainViolation::Unbalanced { entry_id: 3 });
    }

    #[test]
    fn test_verify_chain_dates() {
        let mut entries = vec![entry(1, 0, 500, 500), entry(2, 500, 100, 600), entry(3, 600, 10, 610)];
        entries[1].created_at = entries[0].created_at;
        entries[2].created_at = entries[0].created_at + chrono::Duration::seconds(1);
        assert!(verify_chain(&entries).is_empty());

        entries[1].created_at = entries[0].created_at - chrono::Duration::milliseconds(1);
        assert_eq!(
            verify_chain(&entries),
            vec![ChainViolation::OutOfOrder {
                entry_id: 2,
                previous_entry_id: 1
            }]
        );
    }
}
