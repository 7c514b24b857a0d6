//! Commission billing for completed tests.

use tracing::debug;

use crate::error::ApiResult;
use bakiye_core::validation::validate_identifier;
use bakiye_core::{Money, ValidationError};
use bakiye_db::{BillingOutcome, Database};

#[derive(Debug, Clone)]
pub struct CommissionService {
    db: Database,
    default_rate_bps: i64,
}

impl CommissionService {
    pub fn new(db: Database, default_rate_bps: i64) -> Self {
        CommissionService { db, default_rate_bps }
    }

    /// Bills one test. Re-billing the same `test_id` returns the first record.
    pub async fn bill_test(&self, test_id: &str, dealer_id: &str, gross_amount: Money) -> ApiResult<BillingOutcome> {
        validate_identifier("test_id", test_id)?;
        if gross_amount.is_negative() {
            return Err(ValidationError::MustBePositive {
                field: "gross_amount".to_string(),
            }
            .into());
        }

        debug!(test_id, dealer_id, gross = %gross_amount, "Billing test commission");
        let outcome = self
            .db
            .commissions()
            .bill(test_id, dealer_id, gross_amount, self.default_rate_bps)
            .await?;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use bakiye_db::{DbConfig, Mutation};

    async fn service() -> (Database, CommissionService) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.accounts().create_account("BAYI-1", "FIRMA-1", "Bayi").await.unwrap();
        db.ledger()
            .apply_mutation(&Mutation::manual_topup("BAYI-1", Money::from_major(100)))
            .await
            .unwrap();
        (db.clone(), CommissionService::new(db, 1000))
    }

    #[tokio::test]
    async fn test_bill_is_idempotent() {
        let (db, commissions) = service().await;

        let first = commissions.bill_test("TEST-1", "BAYI-1", Money::from_major(200)).await.unwrap();
        assert!(first.created);
        assert_eq!(first.record.commission_amount, Money::from_major(20));

        let again = commissions.bill_test("TEST-1", "BAYI-1", Money::from_major(200)).await.unwrap();
        assert!(!again.created);
        assert_eq!(again.record, first.record);

        assert_eq!(db.accounts().get_balance("BAYI-1").await.unwrap(), Money::from_major(80));
    }

    #[tokio::test]
    async fn test_insufficient_balance_is_unprocessable() {
        let (db, commissions) = service().await;

        let err = commissions
            .bill_test("TEST-2", "BAYI-1", Money::from_major(5_000))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(db.accounts().get_balance("BAYI-1").await.unwrap(), Money::from_major(100));
        assert!(db.commissions().get_record("TEST-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_negative_gross_rejected() {
        let (_db, commissions) = service().await;
        let err = commissions
            .bill_test("TEST-3", "BAYI-1", Money::from_minor(-1))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }
}
