//! # Ledger Writer
//!
//! The single path through which any dealer balance changes.
//!
//! ## Unit of Work
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN                                                                  │
//! │   1. UPDATE balance_accounts SET current_balance = current_balance      │
//! │        WHERE dealer_id = ? RETURNING current_balance                    │
//! │        └── takes the write lock; no row → DealerNotFound                │
//! │      created_at = max(now, newest entry's created_at), read under lock  │
//! │   2. balance_after = balance_before + amount                            │
//! │        └── checked; overdraft policy; zero amount refused               │
//! │   3. INSERT INTO ledger_entries (...)                                   │
//! │   4. UPDATE balance_accounts SET current_balance = balance_after        │
//! │        WHERE dealer_id = ? AND current_balance = balance_before         │
//! │        └── 0 rows → ConcurrentModification                              │
//! │  COMMIT                    (any error: the transaction is dropped and   │
//! │                             rolls back, nothing is half-applied)        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! [`LedgerWriter::apply_mutation`] runs the unit in its own transaction and
//! retries `ConcurrentModification`/`Busy` with backoff.
//! [`LedgerWriter::apply_in`] runs steps 1-4 on a caller's transaction so
//! that an intent transition or commission record commits with its entry.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::balance::compare_and_swap_balance;
use crate::retry::{retry_on_conflict, RetryPolicy};
use bakiye_core::ledger::next_balance;
use bakiye_core::{LedgerEntry, LedgerKind, Money, OverdraftPolicy};

// =============================================================================
// Configuration
// =============================================================================

/// Behavior of every ledger writer handed out by the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LedgerConfig {
    pub overdraft: OverdraftPolicy,
    pub retry: RetryPolicy,
}

// =============================================================================
// Mutation
// =============================================================================

/// One requested balance change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutation {
    pub dealer_id: String,
    /// Signed; negative for debits. Never zero.
    pub amount: Money,
    pub kind: LedgerKind,
    pub external_reference: Option<String>,
    pub description: Option<String>,
}

impl Mutation {
    pub fn new(dealer_id: impl Into<String>, amount: Money, kind: LedgerKind) -> Self {
        Self {
            dealer_id: dealer_id.into(),
            amount,
            kind,
            external_reference: None,
            description: None,
        }
    }

    /// Operator top-up.
    pub fn manual_topup(dealer_id: impl Into<String>, amount: Money) -> Self {
        Self::new(dealer_id, amount, LedgerKind::ManualTopup)
    }

    pub fn reference(mut self, reference: impl Into<String>) -> Self {
        self.external_reference = Some(reference.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

// =============================================================================
// Ledger Writer
// =============================================================================

/// Appends ledger entries and moves balances, atomically.
#[derive(Debug, Clone)]
pub struct LedgerWriter {
    pool: SqlitePool,
    config: LedgerConfig,
}

impl LedgerWriter {
    pub fn new(pool: SqlitePool, config: LedgerConfig) -> Self {
        LedgerWriter { pool, config }
    }

    pub fn config(&self) -> LedgerConfig {
        self.config
    }

    /// Applies one mutation in its own transaction.
    ///
    /// ## Errors
    /// - `DealerNotFound` - no balance account
    /// - `InsufficientBalance` - debit past zero under `OverdraftPolicy::Reject`
    /// - `Validation` - zero amount
    /// - `ConcurrentModification` / `Busy` - only after the retry budget is spent
    /// - `UniqueViolation` - the gateway or commission reference was already booked
    pub async fn apply_mutation(&self, mutation: &Mutation) -> DbResult<LedgerEntry> {
        let entry = retry_on_conflict(&self.config.retry, "apply_mutation", move || {
            self.apply_once(mutation)
        })
        .await?;

        info!(
            dealer_id = %entry.dealer_id,
            entry_id = entry.id,
            kind = %entry.kind,
            amount = %entry.amount,
            balance_after = %entry.balance_after,
            "Ledger mutation applied"
        );

        Ok(entry)
    }

    async fn apply_once(&self, mutation: &Mutation) -> DbResult<LedgerEntry> {
        let mut tx = self.pool.begin().await?;
        let entry = self.apply_in(&mut tx, mutation).await?;
        tx.commit().await?;
        Ok(entry)
    }

    /// Applies one mutation on the caller's connection or transaction.
    ///
    /// Does not commit and does not retry; the caller owns both.
    pub async fn apply_in(&self, conn: &mut SqliteConnection, mutation: &Mutation) -> DbResult<LedgerEntry> {
        let balance_before: Option<Money> = sqlx::query_scalar(
            r#"
            UPDATE balance_accounts SET current_balance = current_balance
            WHERE dealer_id = ?1
            RETURNING current_balance
            "#,
        )
        .bind(&mutation.dealer_id)
        .fetch_optional(&mut *conn)
        .await?;

        let balance_before =
            balance_before.ok_or_else(|| DbError::DealerNotFound(mutation.dealer_id.clone()))?;

        // Stamped under the lock, so date order per dealer is chain order.
        let now = entry_timestamp(&mut *conn, &mutation.dealer_id).await?;

        let balance_after = next_balance(
            &mutation.dealer_id,
            balance_before,
            mutation.amount,
            self.config.overdraft,
        )?;

        debug!(
            dealer_id = %mutation.dealer_id,
            %balance_before,
            %balance_after,
            kind = %mutation.kind,
            "Writing ledger entry"
        );

        let id = sqlx::query(
            r#"
            INSERT INTO ledger_entries (
                dealer_id, amount, balance_before, balance_after,
                kind, external_reference, description, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&mutation.dealer_id)
        .bind(mutation.amount)
        .bind(balance_before)
        .bind(balance_after)
        .bind(mutation.kind)
        .bind(&mutation.external_reference)
        .bind(&mutation.description)
        .bind(now)
        .execute(&mut *conn)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate(
                "external_reference",
                mutation.external_reference.as_deref().unwrap_or_default(),
            ),
            other => other,
        })?
        .last_insert_rowid();

        if !compare_and_swap_balance(&mut *conn, &mutation.dealer_id, balance_before, balance_after).await? {
            return Err(DbError::ConcurrentModification {
                dealer_id: mutation.dealer_id.clone(),
            });
        }

        Ok(LedgerEntry {
            id,
            dealer_id: mutation.dealer_id.clone(),
            amount: mutation.amount,
            balance_before,
            balance_after,
            kind: mutation.kind,
            external_reference: mutation.external_reference.clone(),
            description: mutation.description.clone(),
            created_at: now,
        })
    }
}

/// Current time, but never earlier than the dealer's newest entry.
///
/// Must run after the dealer row is locked.
async fn entry_timestamp(conn: &mut SqliteConnection, dealer_id: &str) -> DbResult<DateTime<Utc>> {
    let previous: Option<DateTime<Utc>> = sqlx::query_scalar(
        r#"
        SELECT created_at FROM ledger_entries
        WHERE dealer_id = ?1
        ORDER BY id DESC
        LIMIT 1
        "#,
    )
    .bind(dealer_id)
    .fetch_optional(&mut *conn)
    .await?;

    let now = Utc::now();
    Ok(previous.map_or(now, |previous| previous.max(now)))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use std::sync::Arc;
    use std::time::Duration;

    async fn db_with(dealer: &str) -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.accounts().create_account(dealer, "FIRMA-1", "Test Bayi").await.unwrap();
        db
    }

    #[tokio::test]
    async fn test_manual_topup_scenario() {
        let db = db_with("BAYI-1").await;
        let ledger = db.ledger();

        ledger
            .apply_mutation(&Mutation::manual_topup("BAYI-1", Money::from_major(500)))
            .await
            .unwrap();

        let entry = ledger
            .apply_mutation(
                &Mutation::manual_topup("BAYI-1", Money::parse_decimal("250.00").unwrap())
                    .description("Havale"),
            )
            .await
            .unwrap();

        assert_eq!(entry.balance_before.to_string(), "500.00");
        assert_eq!(entry.amount.to_string(), "250.00");
        assert_eq!(entry.balance_after.to_string(), "750.00");
        assert_eq!(entry.kind, LedgerKind::ManualTopup);
        assert!(entry.is_balanced());
        assert_eq!(
            db.accounts().get_balance("BAYI-1").await.unwrap().to_string(),
            "750.00"
        );
    }

    #[tokio::test]
    async fn test_unknown_dealer_writes_nothing() {
        let db = db_with("BAYI-1").await;
        let result = db
            .ledger()
            .apply_mutation(&Mutation::manual_topup("BAYI-404", Money::from_major(10)))
            .await;

        assert!(matches!(result, Err(DbError::DealerNotFound(_))));
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ledger_entries")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_overdraft_rejected_and_rolled_back() {
        let db = db_with("BAYI-1").await;
        let ledger = db.ledger();
        ledger
            .apply_mutation(&Mutation::manual_topup("BAYI-1", Money::from_major(10)))
            .await
            .unwrap();

        let debit = Mutation::new("BAYI-1", Money::from_major(-25), LedgerKind::CommissionDebit).reference("T-1");
        assert!(matches!(
            ledger.apply_mutation(&debit).await,
            Err(DbError::InsufficientBalance { .. })
        ));

        assert_eq!(db.accounts().get_balance("BAYI-1").await.unwrap(), Money::from_major(10));
    }

    #[tokio::test]
    async fn test_overdraft_allowed_when_configured() {
        let db = db_with("BAYI-1").await;
        let ledger = LedgerWriter::new(
            db.pool().clone(),
            LedgerConfig {
                overdraft: OverdraftPolicy::Allow,
                ..LedgerConfig::default()
            },
        );

        let entry = ledger
            .apply_mutation(&Mutation::new("BAYI-1", Money::from_major(-5), LedgerKind::CommissionDebit))
            .await
            .unwrap();
        assert_eq!(entry.balance_after, Money::from_major(-5));
    }

    #[tokio::test]
    async fn test_zero_amount_rejected() {
        let db = db_with("BAYI-1").await;
        let result = db
            .ledger()
            .apply_mutation(&Mutation::manual_topup("BAYI-1", Money::zero()))
            .await;
        assert!(matches!(result, Err(DbError::Validation(_))));
    }

    #[tokio::test]
    async fn test_gateway_reference_is_unique() {
        let db = db_with("BAYI-1").await;
        let ledger = db.ledger();
        let credit = Mutation::new("BAYI-1", Money::from_major(100), LedgerKind::GatewayTopupProviderA)
            .reference("INV-1");

        ledger.apply_mutation(&credit).await.unwrap();
        assert!(matches!(
            ledger.apply_mutation(&credit).await,
            Err(DbError::UniqueViolation { .. })
        ));
        assert_eq!(db.accounts().get_balance("BAYI-1").await.unwrap(), Money::from_major(100));
    }

    #[tokio::test]
    async fn test_chain_across_entries() {
        let db = db_with("BAYI-1").await;
        let ledger = db.ledger();
        for amount in [500, -120, 75, -55] {
            let kind = if amount > 0 {
                LedgerKind::ManualTopup
            } else {
                LedgerKind::CommissionDebit
            };
            ledger
                .apply_mutation(&Mutation::new("BAYI-1", Money::from_major(amount), kind))
                .await
                .unwrap();
        }

        let entries: Vec<LedgerEntry> = sqlx::query_as(
            "SELECT id, dealer_id, amount, balance_before, balance_after, kind,
                    external_reference, description, created_at
             FROM ledger_entries WHERE dealer_id = ?1 ORDER BY id",
        )
        .bind("BAYI-1")
        .fetch_all(db.pool())
        .await
        .unwrap();

        assert!(bakiye_core::ledger::verify_chain(&entries).is_empty());
        assert_eq!(entries.first().unwrap().balance_before, Money::zero());
        assert_eq!(
            entries.last().unwrap().balance_after,
            db.accounts().get_balance("BAYI-1").await.unwrap()
        );
    }

    /// File database with several connections contending for one dealer.
    async fn contended_db(dir: &tempfile::TempDir) -> Database {
        let config = DbConfig::new(dir.path().join("ledger.db"))
            .max_connections(8)
            .busy_timeout(Duration::from_secs(10))
            .ledger(LedgerConfig {
                overdraft: OverdraftPolicy::Reject,
                retry: RetryPolicy {
                    max_attempts: 20,
                    initial_interval: Duration::from_millis(2),
                    max_interval: Duration::from_millis(50),
                },
            });
        let db = Database::new(config).await.unwrap();
        db.accounts().create_account("BAYI-1", "FIRMA-1", "Bayi").await.unwrap();
        db
    }

    #[tokio::test]
    async fn test_concurrent_topups_all_land() {
        let dir = tempfile::tempdir().unwrap();
        let db = contended_db(&dir).await;
        db.ledger()
            .apply_mutation(&Mutation::manual_topup("BAYI-1", Money::from_major(100)))
            .await
            .unwrap();

        let ledger = Arc::new(db.ledger());
        let n = 32;
        let mut handles = Vec::new();
        for _ in 0..n {
            let ledger = Arc::clone(&ledger);
            handles.push(tokio::spawn(async move {
                ledger
                    .apply_mutation(&Mutation::manual_topup("BAYI-1", Money::from_minor(1_25)))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let expected = Money::from_major(100) + Money::from_minor(1_25 * n);
        assert_eq!(db.accounts().get_balance("BAYI-1").await.unwrap(), expected);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ledger_entries WHERE dealer_id = ?1")
            .bind("BAYI-1")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, n + 1);

        let report = db.audit().audit().await.unwrap();
        assert!(report.is_clean(), "{:?}", report.findings);
    }

    #[tokio::test]
    async fn test_concurrent_entries_keep_date_order() {
        let dir = tempfile::tempdir().unwrap();
        let db = contended_db(&dir).await;

        let ledger = Arc::new(db.ledger());
        let mut handles = Vec::new();
        for _ in 0..64 {
            let ledger = Arc::clone(&ledger);
            handles.push(tokio::spawn(async move {
                ledger
                    .apply_mutation(&Mutation::manual_topup("BAYI-1", Money::from_major(1)))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let by_id: Vec<i64> = sqlx::query_scalar("SELECT id FROM ledger_entries WHERE dealer_id = ?1 ORDER BY id")
            .bind("BAYI-1")
            .fetch_all(db.pool())
            .await
            .unwrap();
        let by_date: Vec<i64> =
            sqlx::query_scalar("SELECT id FROM ledger_entries WHERE dealer_id = ?1 ORDER BY created_at, id")
                .bind("BAYI-1")
                .fetch_all(db.pool())
                .await
                .unwrap();
        assert_eq!(by_id.len(), 64);
        assert_eq!(by_date, by_id);

        let report = db.audit().audit().await.unwrap();
        assert!(report.is_clean(), "{:?}", report.findings);
    }
}
