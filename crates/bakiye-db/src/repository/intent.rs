//! # Payment Intent Repository
//!
//! Storage for outbound gateway attempts.
//!
//! ## Intent Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. CREATE        create() → PaymentIntent { status: pending }          │
//! │  2. TOKEN         set_gateway_token() once the provider answers         │
//! │  3. RESOLVE       transition_in() inside the reconcile transaction:     │
//! │                     UPDATE ... SET status = ? WHERE status = 'pending'  │
//! │                     └── 0 rows: someone else already resolved it        │
//! │  4. (OPERATOR)    list_stale() feeds the sweep                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use bakiye_core::{GatewayProvider, IntentStatus, Money, PaymentIntent};

const INTENT_COLUMNS: &str = r#"
    invoice_id,
    dealer_id,
    requested_amount,
    provider,
    status,
    gateway_token,
    failure_reason,
    created_at,
    resolved_at
"#;

/// Repository for payment intents.
#[derive(Debug, Clone)]
pub struct IntentRepository {
    pool: SqlitePool,
}

impl IntentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        IntentRepository { pool }
    }

    /// Records a new pending intent.
    ///
    /// `invoice_id` must be globally unique; a reused id is a
    /// `UniqueViolation`, an unknown dealer a `DealerNotFound`.
    pub async fn create(
        &self,
        invoice_id: &str,
        dealer_id: &str,
        requested_amount: Money,
        provider: GatewayProvider,
    ) -> DbResult<PaymentIntent> {
        let intent = PaymentIntent {
            invoice_id: invoice_id.to_string(),
            dealer_id: dealer_id.to_string(),
            requested_amount,
            provider,
            status: IntentStatus::Pending,
            gateway_token: None,
            failure_reason: None,
            created_at: Utc::now(),
            resolved_at: None,
        };

        sqlx::query(
            r#"
            INSERT INTO payment_intents (
                invoice_id, dealer_id, requested_amount, provider,
                status, gateway_token, failure_reason, created_at, resolved_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&intent.invoice_id)
        .bind(&intent.dealer_id)
        .bind(intent.requested_amount)
        .bind(intent.provider)
        .bind(intent.status)
        .bind(&intent.gateway_token)
        .bind(&intent.failure_reason)
        .bind(intent.created_at)
        .bind(intent.resolved_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("invoice_id", invoice_id),
            DbError::ForeignKeyViolation { .. } => DbError::DealerNotFound(dealer_id.to_string()),
            other => other,
        })?;

        info!(
            invoice_id,
            dealer_id,
            amount = %requested_amount,
            %provider,
            "Payment intent created"
        );

        Ok(intent)
    }

    /// Gets an intent if it exists.
    pub async fn get(&self, invoice_id: &str) -> DbResult<Option<PaymentIntent>> {
        let mut conn = self.pool.acquire().await?;
        get_in(&mut conn, invoice_id).await
    }

    /// Stores the provider token on a still-pending intent.
    pub async fn set_gateway_token(&self, invoice_id: &str, token: &str) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE payment_intents SET gateway_token = ?2
            WHERE invoice_id = ?1 AND status = 'pending'
            "#,
        )
        .bind(invoice_id)
        .bind(token)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("PaymentIntent (pending)", invoice_id));
        }

        debug!(invoice_id, "Gateway token stored");
        Ok(())
    }

    /// Pending intents created before `older_than`, oldest first.
    pub async fn list_stale(&self, older_than: DateTime<Utc>, limit: u32) -> DbResult<Vec<PaymentIntent>> {
        let sql = format!(
            "SELECT {INTENT_COLUMNS} FROM payment_intents
             WHERE status = 'pending' AND created_at < ?1
             ORDER BY created_at, invoice_id
             LIMIT ?2"
        );
        let intents = sqlx::query_as::<_, PaymentIntent>(&sql)
            .bind(older_than)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
        Ok(intents)
    }

    /// A dealer's intents, newest first.
    pub async fn list_for_dealer(&self, dealer_id: &str, limit: u32) -> DbResult<Vec<PaymentIntent>> {
        let sql = format!(
            "SELECT {INTENT_COLUMNS} FROM payment_intents
             WHERE dealer_id = ?1
             ORDER BY created_at DESC, invoice_id
             LIMIT ?2"
        );
        let intents = sqlx::query_as::<_, PaymentIntent>(&sql)
            .bind(dealer_id)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
        Ok(intents)
    }
}

/// Reads an intent on the caller's connection or transaction.
pub async fn get_in(conn: &mut SqliteConnection, invoice_id: &str) -> DbResult<Option<PaymentIntent>> {
    let sql = format!("SELECT {INTENT_COLUMNS} FROM payment_intents WHERE invoice_id = ?1");
    let intent = sqlx::query_as::<_, PaymentIntent>(&sql)
        .bind(invoice_id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(intent)
}

/// Moves a pending intent to a terminal status.
///
/// Returns `false` when the intent is no longer pending (or does not
/// exist): exactly one of any number of racing callers sees `true`.
/// Requesting `pending` as the target is an `InvalidTransition`.
pub async fn transition_in(
    conn: &mut SqliteConnection,
    invoice_id: &str,
    to: IntentStatus,
    failure_reason: Option<&str>,
) -> DbResult<bool> {
    if !IntentStatus::Pending.can_transition_to(to) {
        return Err(DbError::InvalidTransition {
            invoice_id: invoice_id.to_string(),
            from: IntentStatus::Pending.to_string(),
            to: to.to_string(),
        });
    }

    let result = sqlx::query(
        r#"
        UPDATE payment_intents SET
            status = ?2,
            failure_reason = ?3,
            resolved_at = ?4
        WHERE invoice_id = ?1 AND status = 'pending'
        "#,
    )
    .bind(invoice_id)
    .bind(to)
    .bind(failure_reason)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

// =============================================================================
// Unit Tests
// =============================================================================
