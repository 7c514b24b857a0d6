//! # Commission Repository
//!
//! Commission rate configuration and billed commissions.
//!
//! ## Billing a Test
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN                                                                  │
//! │   1. touch the dealer row (write lock, company id, active flag)         │
//! │   2. record for test_id exists?  ──yes──► ROLLBACK, return it           │
//! │   3. dealer inactive?            ──yes──► DealerInactive                │
//! │   4. resolve rate (dealer → company → system), compute commission      │
//! │   5. INSERT commission_records                                          │
//! │   6. commission > 0?  ──yes──► LedgerWriter::apply_in(commission_debit) │
//! │                                 UPDATE record SET ledger_entry_id       │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use std::fmt;
use tracing::{info, warn};

use crate::error::{DbError, DbResult};
use crate::repository::ledger::{LedgerWriter, Mutation};
use crate::retry::retry_on_conflict;
use bakiye_core::commission::{compute_commission, BillableEvent, RateConfig, ResolvedRate};
use bakiye_core::validation::validate_identifier;
use bakiye_core::{CommissionRecord, LedgerKind, Money};

/// Level a configured rate applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RateScope {
    Dealer,
    Company,
}

impl fmt::Display for RateScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateScope::Dealer => f.write_str("dealer"),
            RateScope::Company => f.write_str("company"),
        }
    }
}

/// Result of billing one test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingOutcome {
    pub record: CommissionRecord,
    /// `false` when the test had already been billed.
    pub created: bool,
    /// Rate details; `None` for an already billed test.
    pub resolved: Option<ResolvedRate>,
}

/// Repository for commission rates and records.
#[derive(Debug, Clone)]
pub struct CommissionRepository {
    pool: SqlitePool,
    ledger: LedgerWriter,
}

impl CommissionRepository {
    pub fn new(pool: SqlitePool, ledger: LedgerWriter) -> Self {
        CommissionRepository { pool, ledger }
    }

    /// Sets a dealer or company rate in raw basis points.
    ///
    /// Out-of-range values are stored as given and clamped when resolved.
    pub async fn set_rate(&self, scope: RateScope, scope_id: &str, rate_bps: i64) -> DbResult<()> {
        validate_identifier("scope_id", scope_id)?;

        sqlx::query(
            r#"
            INSERT INTO commission_rates (scope, scope_id, rate_bps, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (scope, scope_id) DO UPDATE SET
                rate_bps = excluded.rate_bps,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(scope)
        .bind(scope_id)
        .bind(rate_bps)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        info!(%scope, scope_id, rate_bps, "Commission rate set");
        Ok(())
    }

    /// Removes a configured rate so resolution falls through to the next level.
    pub async fn clear_rate(&self, scope: RateScope, scope_id: &str) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM commission_rates WHERE scope = ?1 AND scope_id = ?2")
            .bind(scope)
            .bind(scope_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Rate configuration that applies to a dealer of a company.
    pub async fn rate_config(
        &self,
        dealer_id: &str,
        company_id: &str,
        system_default_bps: i64,
    ) -> DbResult<RateConfig> {
        let mut conn = self.pool.acquire().await?;
        rate_config_in(&mut conn, dealer_id, company_id, system_default_bps).await
    }

    /// Gets the record of a billed test.
    pub async fn get_record(&self, test_id: &str) -> DbResult<Option<CommissionRecord>> {
        let mut conn = self.pool.acquire().await?;
        get_record_in(&mut conn, test_id).await
    }

    /// A dealer's commission records, newest first.
    pub async fn list_for_dealer(&self, dealer_id: &str, limit: u32) -> DbResult<Vec<CommissionRecord>> {
        let records = sqlx::query_as::<_, CommissionRecord>(
            r#"
            SELECT test_id, dealer_id, company_id, rate_bps, gross_amount,
                   commission_amount, ledger_entry_id, created_at
            FROM commission_records
            WHERE dealer_id = ?1
            ORDER BY created_at DESC, test_id
            LIMIT ?2
            "#,
        )
        .bind(dealer_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    /// Bills commission for one completed test. Idempotent per `test_id`.
    ///
    /// ## Errors
    /// - `DealerNotFound` / `DealerInactive`
    /// - `InsufficientBalance` - the debit would overdraw under `Reject`
    /// - `Validation` - bad identifiers or a negative gross amount
    pub async fn bill(
        &self,
        test_id: &str,
        dealer_id: &str,
        gross_amount: Money,
        system_default_bps: i64,
    ) -> DbResult<BillingOutcome> {
        validate_identifier("test_id", test_id)?;
        validate_identifier("dealer_id", dealer_id)?;

        let retry = self.ledger.config().retry;
        let outcome = retry_on_conflict(&retry, "bill_commission", move || {
            self.bill_once(test_id, dealer_id, gross_amount, system_default_bps)
        })
        .await?;

        if outcome.created {
            info!(
                test_id,
                dealer_id,
                gross = %outcome.record.gross_amount,
                commission = %outcome.record.commission_amount,
                rate_bps = outcome.record.rate_bps,
                ledger_entry_id = ?outcome.record.ledger_entry_id,
                "Commission billed"
            );
        } else {
            info!(test_id, dealer_id, "Test already billed, returning existing record");
        }

        Ok(outcome)
    }

    async fn bill_once(
        &self,
        test_id: &str,
        dealer_id: &str,
        gross_amount: Money,
        system_default_bps: i64,
    ) -> DbResult<BillingOutcome> {
        let mut tx = self.pool.begin().await?;

        let account: Option<(String, bool)> = sqlx::query_as(
            r#"
            UPDATE balance_accounts SET updated_at = ?2
            WHERE dealer_id = ?1
            RETURNING company_id, is_active
            "#,
        )
        .bind(dealer_id)
        .bind(Utc::now())
        .fetch_optional(&mut *tx)
        .await?;

        let (company_id, is_active) = account.ok_or_else(|| DbError::DealerNotFound(dealer_id.to_string()))?;

        if let Some(existing) = get_record_in(&mut tx, test_id).await? {
            tx.rollback().await?;
            return Ok(BillingOutcome {
                record: existing,
                created: false,
                resolved: None,
            });
        }

        if !is_active {
            return Err(DbError::DealerInactive(dealer_id.to_string()));
        }

        let config = rate_config_in(&mut tx, dealer_id, &company_id, system_default_bps).await?;
        let event = BillableEvent {
            test_id: test_id.to_string(),
            dealer_id: dealer_id.to_string(),
            company_id,
            gross_amount,
        };
        let (mut record, resolved) = compute_commission(&event, &config, Utc::now())?;

        if resolved.clamped {
            warn!(
                dealer_id,
                source = ?resolved.source,
                applied_bps = resolved.rate.bps(),
                "Configured commission rate out of range, clamped"
            );
        }

        sqlx::query(
            r#"
            INSERT INTO commission_records (
                test_id, dealer_id, company_id, rate_bps, gross_amount,
                commission_amount, ledger_entry_id, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL, ?7)
            "#,
        )
        .bind(&record.test_id)
        .bind(&record.dealer_id)
        .bind(&record.company_id)
        .bind(record.rate_bps)
        .bind(record.gross_amount)
        .bind(record.commission_amount)
        .bind(record.created_at)
        .execute(&mut *tx)
        .await?;

        if record.commission_amount.is_positive() {
            let debit = Mutation::new(dealer_id, -record.commission_amount, LedgerKind::CommissionDebit)
                .reference(test_id)
                .description(format!(
                    "Commission {} bps on {}",
                    resolved.rate.bps(),
                    record.gross_amount
                ));
            let entry = self.ledger.apply_in(&mut tx, &debit).await?;

            sqlx::query("UPDATE commission_records SET ledger_entry_id = ?2 WHERE test_id = ?1")
                .bind(test_id)
                .bind(entry.id)
                .execute(&mut *tx)
                .await?;
            record.ledger_entry_id = Some(entry.id);
        }

        tx.commit().await?;

        Ok(BillingOutcome {
            record,
            created: true,
            resolved: Some(resolved),
        })
    }
}

async fn rate_config_in(
    conn: &mut SqliteConnection,
    dealer_id: &str,
    company_id: &str,
    system_default_bps: i64,
) -> DbResult<RateConfig> {
    let rows: Vec<(RateScope, i64)> = sqlx::query_as(
        r#"
        SELECT scope, rate_bps FROM commission_rates
        WHERE (scope = 'dealer' AND scope_id = ?1)
           OR (scope = 'company' AND scope_id = ?2)
        "#,
    )
    .bind(dealer_id)
    .bind(company_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut config = RateConfig {
        dealer_bps: None,
        company_bps: None,
        system_default_bps,
    };
    for (scope, bps) in rows {
        match scope {
            RateScope::Dealer => config.dealer_bps = Some(bps),
            RateScope::Company => config.company_bps = Some(bps),
        }
    }
    Ok(config)
}

async fn get_record_in(conn: &mut SqliteConnection, test_id: &str) -> DbResult<Option<CommissionRecord>> {
    let record = sqlx::query_as::<_, CommissionRecord>(
        r#"
        SELECT test_id, dealer_id, company_id, rate_bps, gross_amount,
               commission_amount, ledger_entry_id, created_at
        FROM commission_records
        WHERE test_id = ?1
        "#,
    )
    .bind(test_id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(record)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use bakiye_core::commission::RateSource;

    async fn funded_db() -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.accounts().create_account("BAYI-1", "FIRMA-1", "Bayi").await.unwrap();
        db.ledger()
            .apply_mutation(&Mutation::manual_topup("BAYI-1", Money::from_major(500)))
            .await
            .unwrap();
        db
    }

    #[tokio::test]
    async fn test_bill_writes_record_and_debit() {
        let db = funded_db().await;
        let commissions = db.commissions();
        commissions.set_rate(RateScope::Dealer, "BAYI-1", 1000).await.unwrap();

        let outcome = commissions
            .bill("TEST-1", "BAYI-1", Money::from_major(1000), 500)
            .await
            .unwrap();

        assert!(outcome.created);
        assert_eq!(outcome.record.commission_amount.to_string(), "100.00");
        assert_eq!(outcome.resolved.unwrap().source, RateSource::Dealer);
        assert!(outcome.record.ledger_entry_id.is_some());
        assert_eq!(db.accounts().get_balance("BAYI-1").await.unwrap(), Money::from_major(400));
    }

    #[tokio::test]
    async fn test_bill_is_idempotent_per_test() {
        let db = funded_db().await;
        let commissions = db.commissions();

        let first = commissions
            .bill("TEST-1", "BAYI-1", Money::from_major(200), 1000)
            .await
            .unwrap();
        let second = commissions
            .bill("TEST-1", "BAYI-1", Money::from_major(200), 1000)
            .await
            .unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.record, second.record);
        assert_eq!(db.accounts().get_balance("BAYI-1").await.unwrap(), Money::from_major(480));
    }

    #[tokio::test]
    async fn test_company_rate_and_clamping() {
        let db = funded_db().await;
        let commissions = db.commissions();
        commissions.set_rate(RateScope::Company, "FIRMA-1", 15_000).await.unwrap();

        let outcome = commissions
            .bill("TEST-1", "BAYI-1", Money::from_major(50), 0)
            .await
            .unwrap();
        let resolved = outcome.resolved.unwrap();
        assert_eq!(resolved.source, RateSource::Company);
        assert!(resolved.clamped);
        assert_eq!(outcome.record.rate_bps, 10_000);
        assert_eq!(outcome.record.commission_amount, Money::from_major(50));

        assert!(commissions.clear_rate(RateScope::Company, "FIRMA-1").await.unwrap());
        let config = commissions.rate_config("BAYI-1", "FIRMA-1", 300).await.unwrap();
        assert_eq!(config.resolve().source, RateSource::System);
    }

    #[tokio::test]
    async fn test_zero_commission_has_no_entry() {
        let db = funded_db().await;
        let outcome = db
            .commissions()
            .bill("TEST-0", "BAYI-1", Money::from_major(100), 0)
            .await
            .unwrap();

        assert!(outcome.record.commission_amount.is_zero());
        assert!(outcome.record.ledger_entry_id.is_none());
        assert_eq!(db.accounts().get_balance("BAYI-1").await.unwrap(), Money::from_major(500));
        assert!(db.commissions().get_record("TEST-0").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_overdraw_rolls_back_record() {
        let db = funded_db().await;
        let result = db
            .commissions()
            .bill("TEST-BIG", "BAYI-1", Money::from_major(10_000), 1000)
            .await;

        assert!(matches!(result, Err(DbError::InsufficientBalance { .. })));
        assert!(db.commissions().get_record("TEST-BIG").await.unwrap().is_none());
        assert_eq!(db.accounts().get_balance("BAYI-1").await.unwrap(), Money::from_major(500));
    }

    #[tokio::test]
    async fn test_inactive_and_unknown_dealer() {
        let db = funded_db().await;
        db.accounts().set_active("BAYI-1", false).await.unwrap();

        assert!(matches!(
            db.commissions().bill("TEST-1", "BAYI-1", Money::from_major(10), 1000).await,
            Err(DbError::DealerInactive(_))
        ));
        assert!(matches!(
            db.commissions().bill("TEST-2", "BAYI-404", Money::from_major(10), 1000).await,
            Err(DbError::DealerNotFound(_))
        ));
    }
}
