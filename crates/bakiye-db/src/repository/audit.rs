//! # Consistency Audit
//!
//! Operator check that the ledger and the balances still agree. Reports
//! findings; never rewrites a balance or an entry.
//!
//! ## Checks
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  per dealer                                                             │
//! │    • every entry: balance_after == balance_before + amount              │
//! │    • chain: balance_before == previous balance_after (id order)         │
//! │    • created_at never decreases along the chain                         │
//! │    • first entry starts at zero                                         │
//! │    • current_balance == newest balance_after (or zero, no entries)      │
//! │  per intent                                                             │
//! │    • success ⇒ exactly one gateway entry with that invoice id           │
//! │      and the requested amount                                           │
//! │    • gateway entry ⇒ a success intent with that invoice id              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::error::DbResult;
use bakiye_core::ledger::{verify_chain, ChainViolation};
use bakiye_core::{LedgerEntry, Money};

/// One inconsistency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditFinding {
    /// `current_balance` differs from the newest entry's `balance_after`.
    BalanceMismatch {
        dealer_id: String,
        account_balance: Money,
        ledger_balance: Money,
    },
    /// The dealer's first entry does not start at zero.
    ChainStart {
        dealer_id: String,
        entry_id: i64,
        balance_before: Money,
    },
    /// Arithmetic or chain break inside a dealer's entries.
    Chain {
        dealer_id: String,
        violation: ChainViolation,
    },
    /// A success intent without its credit.
    MissingTopupEntry { invoice_id: String },
    /// A success intent credited more than once.
    DuplicateTopupEntry { invoice_id: String, count: i64 },
    /// A success intent credited with a different amount.
    TopupAmountMismatch {
        invoice_id: String,
        requested: Money,
        credited: Money,
    },
    /// A gateway credit with no success intent behind it.
    OrphanGatewayEntry {
        entry_id: i64,
        external_reference: Option<String>,
    },
}

/// Result of one audit run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    pub accounts_checked: u32,
    pub entries_checked: u32,
    pub intents_checked: u32,
    pub findings: Vec<AuditFinding>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }
}

/// Read-only invariant checks over the whole ledger.
#[derive(Debug, Clone)]
pub struct ConsistencyAudit {
    pool: SqlitePool,
}

impl ConsistencyAudit {
    pub fn new(pool: SqlitePool) -> Self {
        ConsistencyAudit { pool }
    }

    /// Runs every check and returns the findings.
    pub async fn audit(&self) -> DbResult<AuditReport> {
        let mut findings = Vec::new();

        let accounts: Vec<(String, Money)> =
            sqlx::query_as("SELECT dealer_id, current_balance FROM balance_accounts ORDER BY dealer_id")
                .fetch_all(&self.pool)
                .await?;

        let mut entries_checked = 0u32;
        for (dealer_id, account_balance) in &accounts {
            let entries: Vec<LedgerEntry> = sqlx::query_as(
                r#"
                SELECT id, dealer_id, amount, balance_before, balance_after, kind,
                       external_reference, description, created_at
                FROM ledger_entries
                WHERE dealer_id = ?1
                ORDER BY id
                "#,
            )
            .bind(dealer_id)
            .fetch_all(&self.pool)
            .await?;
            entries_checked += entries.len() as u32;

            if let Some(first) = entries.first() {
                if !first.balance_before.is_zero() {
                    findings.push(AuditFinding::ChainStart {
                        dealer_id: dealer_id.clone(),
                        entry_id: first.id,
                        balance_before: first.balance_before,
                    });
                }
            }

            findings.extend(verify_chain(&entries).into_iter().map(|violation| AuditFinding::Chain {
                dealer_id: dealer_id.clone(),
                violation,
            }));

            let ledger_balance = entries.last().map(|e| e.balance_after).unwrap_or_default();
            if ledger_balance != *account_balance {
                findings.push(AuditFinding::BalanceMismatch {
                    dealer_id: dealer_id.clone(),
                    account_balance: *account_balance,
                    ledger_balance,
                });
            }
        }

        let intents: Vec<(String, Money, i64, Option<Money>)> = sqlx::query_as(
            r#"
            SELECT i.invoice_id,
                   i.requested_amount,
                   COUNT(l.id),
                   SUM(l.amount)
            FROM payment_intents i
            LEFT JOIN ledger_entries l
                   ON l.external_reference = i.invoice_id
                  AND l.kind IN ('gateway_topup_provider_a', 'gateway_topup_provider_b')
            WHERE i.status = 'success'
            GROUP BY i.invoice_id, i.requested_amount
            ORDER BY i.invoice_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        for (invoice_id, requested, count, credited) in &intents {
            match count {
                0 => findings.push(AuditFinding::MissingTopupEntry {
                    invoice_id: invoice_id.clone(),
                }),
                1 => {
                    let credited = credited.unwrap_or_default();
                    if credited != *requested {
                        findings.push(AuditFinding::TopupAmountMismatch {
                            invoice_id: invoice_id.clone(),
                            requested: *requested,
                            credited,
                        });
                    }
                }
                n => findings.push(AuditFinding::DuplicateTopupEntry {
                    invoice_id: invoice_id.clone(),
                    count: *n,
                }),
            }
        }

        let orphans: Vec<(i64, Option<String>)> = sqlx::query_as(
            r#"
            SELECT l.id, l.external_reference
            FROM ledger_entries l
            LEFT JOIN payment_intents i
                   ON i.invoice_id = l.external_reference
                  AND i.status = 'success'
            WHERE l.kind IN ('gateway_topup_provider_a', 'gateway_topup_provider_b')
              AND i.invoice_id IS NULL
            ORDER BY l.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        findings.extend(
            orphans
                .into_iter()
                .map(|(entry_id, external_reference)| AuditFinding::OrphanGatewayEntry {
                    entry_id,
                    external_reference,
                }),
        );

        let report = AuditReport {
            accounts_checked: accounts.len() as u32,
            entries_checked,
            intents_checked: intents.len() as u32,
            findings,
        };

        if report.is_clean() {
            info!(
                accounts = report.accounts_checked,
                entries = report.entries_checked,
                intents = report.intents_checked,
                "Ledger audit clean"
            );
        } else {
            warn!(findings = report.findings.len(), "Ledger audit found inconsistencies");
        }

        Ok(report)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
