//! # Top-up Service
//!
//! ```text
//! manual      ──► validate ──► LedgerWriter (manual_topup) ──► new balance
//!
//! provider_a  ──► validate ──► intent (pending) ──► adapter.create_payment_request
//! provider_b                        │                    │
//!                                   │          ok        ├──► store token, return payload
//!                                   │          rejected  ├──► reconcile(failed), 422
//!                                   │          timeout   └──► stays pending, 503
//!                                   ▼
//!                         credited later by the reconciliation engine
//! ```

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::services::reconciliation::ReconciliationEngine;
use bakiye_core::validation::validate_topup_amount;
use bakiye_core::{GatewayOutcome, GatewayProvider, LedgerEntry, Money, PaymentIntent};
use bakiye_db::{Database, DbError, Mutation};
use bakiye_gateway::{BuyerInfo, CreatedPayment, GatewayError, GatewayRegistry, PaymentRequest};

/// Prefix of generated invoice ids.
const INVOICE_PREFIX: &str = "BKY";

/// How the dealer pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopupMethod {
    Manual,
    ProviderA,
    ProviderB,
}

impl TopupMethod {
    pub fn provider(&self) -> Option<GatewayProvider> {
        match self {
            TopupMethod::Manual => None,
            TopupMethod::ProviderA => Some(GatewayProvider::ProviderA),
            TopupMethod::ProviderB => Some(GatewayProvider::ProviderB),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TopupRequest {
    pub dealer_id: String,
    pub amount: Money,
    pub method: TopupMethod,
    pub buyer: Option<BuyerInfo>,
    pub description: Option<String>,
}

/// Result of starting a top-up.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum TopupResponse {
    /// Credited immediately.
    Manual { entry: LedgerEntry },
    /// Waiting for the provider; the dealer completes payment through the payload.
    Gateway {
        intent: PaymentIntent,
        payment: CreatedPayment,
    },
}

#[derive(Debug, Clone)]
pub struct TopupService {
    db: Database,
    gateways: GatewayRegistry,
    engine: ReconciliationEngine,
}

impl TopupService {
    pub fn new(db: Database, gateways: GatewayRegistry, engine: ReconciliationEngine) -> Self {
        TopupService { db, gateways, engine }
    }

    pub async fn initiate(&self, request: TopupRequest) -> ApiResult<TopupResponse> {
        validate_topup_amount(request.amount)?;

        let account = self.db.accounts().get_account(&request.dealer_id).await?;
        if !account.is_active {
            return Err(DbError::DealerInactive(account.dealer_id).into());
        }

        match request.method.provider() {
            None => self.manual(request).await,
            Some(provider) => self.via_gateway(provider, request).await,
        }
    }

    async fn manual(&self, request: TopupRequest) -> ApiResult<TopupResponse> {
        let mut mutation = Mutation::manual_topup(&request.dealer_id, request.amount);
        if let Some(description) = request.description.filter(|d| !d.trim().is_empty()) {
            mutation = mutation.description(description);
        }
        let entry = self.db.ledger().apply_mutation(&mutation).await?;
        Ok(TopupResponse::Manual { entry })
    }

    async fn via_gateway(&self, provider: GatewayProvider, request: TopupRequest) -> ApiResult<TopupResponse> {
        let adapter = self.gateways.get(provider)?;

        let invoice_id = format!("{}{}", INVOICE_PREFIX, Uuid::new_v4().simple());
        let intent = self
            .db
            .intents()
            .create(&invoice_id, &request.dealer_id, request.amount, provider)
            .await?;

        let mut payment_request = PaymentRequest::new(&invoice_id, &request.dealer_id, request.amount)
            .buyer(request.buyer.unwrap_or_default());
        if let Some(description) = request.description.filter(|d| !d.trim().is_empty()) {
            payment_request.description = description;
        }

        match adapter.create_payment_request(&payment_request).await {
            Ok(payment) => {
                self.db.intents().set_gateway_token(&invoice_id, &payment.token).await?;
                info!(invoice_id, dealer_id = %request.dealer_id, %provider, "Gateway top-up started");
                let intent = PaymentIntent {
                    gateway_token: Some(payment.token.clone()),
                    ..intent
                };
                Ok(TopupResponse::Gateway { intent, payment })
            }
            Err(GatewayError::Rejected { reason, .. }) => {
                warn!(invoice_id, %provider, %reason, "Provider rejected payment request");
                self.engine
                    .reconcile(&invoice_id, &GatewayOutcome::failed(reason.clone()))
                    .await?;
                Err(GatewayError::rejected(provider, reason).into())
            }
            Err(e) => {
                // The provider may still have registered the payment; a later
                // callback or sweep settles the intent.
                warn!(invoice_id, %provider, error = %e, "Payment request outcome unknown, intent left pending");
                Err(ApiError::from(e))
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::provider_a_config;
    use axum::http::StatusCode;
    use bakiye_core::IntentStatus;
    use bakiye_db::DbConfig;
    use bakiye_gateway::{GatewayConfig, PresentationPayload};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn service(server: &MockServer) -> (Database, TopupService) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.accounts().create_account("BAYI-1", "FIRMA-1", "Bayi").await.unwrap();
        let gateways = GatewayRegistry::from_config(&GatewayConfig {
            provider_a: Some(provider_a_config(&server.uri())),
            ..Default::default()
        })
        .unwrap();
        let engine = ReconciliationEngine::new(db.clone(), gateways.clone());
        (db.clone(), TopupService::new(db, gateways, engine))
    }

    fn request(method: TopupMethod, amount: i64) -> TopupRequest {
        TopupRequest {
            dealer_id: "BAYI-1".into(),
            amount: Money::from_major(amount),
            method,
            buyer: None,
            description: None,
        }
    }

    #[tokio::test]
    async fn test_manual_topups_accumulate() {
        let server = MockServer::start().await;
        let (db, topups) = service(&server).await;

        topups.initiate(request(TopupMethod::Manual, 500)).await.unwrap();
        let response = topups.initiate(request(TopupMethod::Manual, 250)).await.unwrap();

        match response {
            TopupResponse::Manual { entry } => assert_eq!(entry.balance_after, Money::from_major(750)),
            other => panic!("unexpected response {:?}", other),
        }
        assert_eq!(db.accounts().get_balance("BAYI-1").await.unwrap().to_string(), "750.00");
    }

    #[tokio::test]
    async fn test_invalid_amount_and_inactive_dealer() {
        let server = MockServer::start().await;
        let (db, topups) = service(&server).await;

        let err = topups.initiate(request(TopupMethod::Manual, 0)).await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        db.accounts().set_active("BAYI-1", false).await.unwrap();
        let err = topups.initiate(request(TopupMethod::Manual, 10)).await.unwrap_err();
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.code, "dealer_inactive");
    }

    #[tokio::test]
    async fn test_unconfigured_provider() {
        let server = MockServer::start().await;
        let (_db, topups) = service(&server).await;

        let err = topups.initiate(request(TopupMethod::ProviderB, 10)).await.unwrap_err();
        assert_eq!(err.code, "gateway_not_configured");
    }

    #[tokio::test]
    async fn test_gateway_topup_creates_pending_intent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/get-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "success",
                "token": "tok-123"
            })))
            .mount(&server)
            .await;
        let (db, topups) = service(&server).await;

        let response = topups.initiate(request(TopupMethod::ProviderA, 250)).await.unwrap();
        let TopupResponse::Gateway { intent, payment } = response else {
            panic!("expected gateway response");
        };

        assert!(intent.invoice_id.starts_with("BKY"));
        assert_eq!(intent.status, IntentStatus::Pending);
        assert_eq!(payment.token, "tok-123");
        assert!(matches!(
            payment.presentation_payload,
            PresentationPayload::IframeUrl { ref url } if url.ends_with("/tok-123")
        ));

        let stored = db.intents().get(&intent.invoice_id).await.unwrap().unwrap();
        assert_eq!(stored.gateway_token.as_deref(), Some("tok-123"));
        assert_eq!(db.accounts().get_balance("BAYI-1").await.unwrap(), Money::zero());
    }

    #[tokio::test]
    async fn test_rejected_request_fails_intent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/get-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "failed",
                "reason": "merchant blocked"
            })))
            .mount(&server)
            .await;
        let (db, topups) = service(&server).await;

        let err = topups.initiate(request(TopupMethod::ProviderA, 250)).await.unwrap_err();
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);

        let intents = db.intents().list_for_dealer("BAYI-1", 10).await.unwrap();
        assert_eq!(intents.len(), 1);
        assert_eq!(intents[0].status, IntentStatus::Failed);
        assert_eq!(intents[0].failure_reason.as_deref(), Some("merchant blocked"));
    }

    #[tokio::test]
    async fn test_unavailable_provider_leaves_intent_pending() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/get-token"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;
        let (db, topups) = service(&server).await;

        let err = topups.initiate(request(TopupMethod::ProviderA, 250)).await.unwrap_err();
        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);

        let intents = db.intents().list_for_dealer("BAYI-1", 10).await.unwrap();
        assert_eq!(intents.len(), 1);
        assert_eq!(intents[0].status, IntentStatus::Pending);
    }
}
