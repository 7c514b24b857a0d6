//! # Balance Store
//!
//! One row per dealer holding the current balance.
//!
//! The balance column has exactly one writer: [`compare_and_swap_balance`],
//! called by the ledger writer inside its transaction. Everything public
//! here either reads or manages the account lifecycle (create, activate,
//! deactivate). Accounts are never deleted.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use bakiye_core::validation::validate_identifier;
use bakiye_core::{BalanceAccount, Money, ValidationError};

const ACCOUNT_COLUMNS: &str = r#"
    dealer_id,
    company_id,
    display_name,
    current_balance,
    is_active,
    created_at,
    updated_at
"#;

/// Repository for dealer balance accounts.
#[derive(Debug, Clone)]
pub struct BalanceStore {
    pool: SqlitePool,
}

impl BalanceStore {
    pub fn new(pool: SqlitePool) -> Self {
        BalanceStore { pool }
    }

    /// Opens a balance account at zero.
    ///
    /// Any opening balance must be booked as a ledger entry afterwards so
    /// the chain starts at zero.
    pub async fn create_account(
        &self,
        dealer_id: &str,
        company_id: &str,
        display_name: &str,
    ) -> DbResult<BalanceAccount> {
        validate_identifier("dealer_id", dealer_id)?;
        validate_identifier("company_id", company_id)?;
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(ValidationError::Required {
                field: "display_name".to_string(),
            }
            .into());
        }

        let now = Utc::now();
        let account = BalanceAccount {
            dealer_id: dealer_id.trim().to_string(),
            company_id: company_id.trim().to_string(),
            display_name: display_name.to_string(),
            current_balance: Money::zero(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO balance_accounts (
                dealer_id, company_id, display_name,
                current_balance, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&account.dealer_id)
        .bind(&account.company_id)
        .bind(&account.display_name)
        .bind(account.current_balance)
        .bind(account.is_active)
        .bind(account.created_at)
        .bind(account.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("dealer_id", &account.dealer_id),
            other => other,
        })?;

        info!(
            dealer_id = %account.dealer_id,
            company_id = %account.company_id,
            "Balance account created"
        );

        Ok(account)
    }

    /// Gets an account, or `DealerNotFound`.
    pub async fn get_account(&self, dealer_id: &str) -> DbResult<BalanceAccount> {
        self.find_account(dealer_id)
            .await?
            .ok_or_else(|| DbError::DealerNotFound(dealer_id.to_string()))
    }

    /// Gets an account if it exists.
    pub async fn find_account(&self, dealer_id: &str) -> DbResult<Option<BalanceAccount>> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM balance_accounts WHERE dealer_id = ?1");
        let account = sqlx::query_as::<_, BalanceAccount>(&sql)
            .bind(dealer_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(account)
    }

    /// Current balance of a dealer.
    pub async fn get_balance(&self, dealer_id: &str) -> DbResult<Money> {
        let balance: Option<Money> =
            sqlx::query_scalar("SELECT current_balance FROM balance_accounts WHERE dealer_id = ?1")
                .bind(dealer_id)
                .fetch_optional(&self.pool)
                .await?;

        debug!(dealer_id, found = balance.is_some(), "Balance lookup");

        balance.ok_or_else(|| DbError::DealerNotFound(dealer_id.to_string()))
    }

    /// Activates or deactivates an account. History is untouched.
    pub async fn set_active(&self, dealer_id: &str, active: bool) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE balance_accounts SET
                is_active = ?2,
                updated_at = ?3
            WHERE dealer_id = ?1
            "#,
        )
        .bind(dealer_id)
        .bind(active)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::DealerNotFound(dealer_id.to_string()));
        }

        info!(dealer_id, active, "Account activity changed");
        Ok(())
    }

    /// Lists accounts, optionally for one company, ordered by dealer id.
    pub async fn list_accounts(&self, company_id: Option<&str>) -> DbResult<Vec<BalanceAccount>> {
        let sql = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM balance_accounts
             WHERE (?1 IS NULL OR company_id = ?1)
             ORDER BY dealer_id"
        );
        let accounts = sqlx::query_as::<_, BalanceAccount>(&sql)
            .bind(company_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(accounts)
    }

    /// Highest balances among active dealers.
    pub async fn top_balances(&self, limit: u32) -> DbResult<Vec<BalanceAccount>> {
        let sql = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM balance_accounts
             WHERE is_active = 1
             ORDER BY current_balance DESC, dealer_id
             LIMIT ?1"
        );
        let accounts = sqlx::query_as::<_, BalanceAccount>(&sql)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
        Ok(accounts)
    }
}

/// Swaps `current_balance` from `expected` to `new`.
///
/// Returns `false` when the stored balance is no longer `expected`. Only
/// the ledger writer calls this, inside the transaction that also inserts
/// the matching ledger entry.
pub(crate) async fn compare_and_swap_balance(
    conn: &mut SqliteConnection,
    dealer_id: &str,
    expected: Money,
    new: Money,
) -> DbResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE balance_accounts SET
            current_balance = ?3,
            updated_at = ?4
        WHERE dealer_id = ?1 AND current_balance = ?2
        "#,
    )
    .bind(dealer_id)
    .bind(expected)
    .bind(new)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

// =============================================================================
// Unit Tests
// =============================================================================
