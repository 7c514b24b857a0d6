//! # Provider A: Token + Iframe Gateway
//!
//! ## Payment Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  1. POST token_url (form)                                               │
//! │       merchant_id, user_ip, merchant_oid, email, payment_amount (minor),│
//! │       user_basket (base64 JSON), installment flags, currency,           │
//! │       test_mode, paytr_token = sign(fields..., salt)                    │
//! │                                                                         │
//! │  2. ← {"status":"success","token":"..."}                               │
//! │     ← {"status":"failed","reason":"..."}      → Rejected               │
//! │                                                                         │
//! │  3. Dealer pays inside iframe_base_url/{token}                          │
//! │                                                                         │
//! │  4. Provider → POST /api/callbacks/provider-a                           │
//! │       merchant_oid, status, total_amount, hash                          │
//! │       hash = sign(merchant_oid, salt, status, total_amount)             │
//! │     ← "OK"                                                              │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::adapter::{
    field, http_client, CreatedPayment, GatewayNotification, NotificationFields, PaymentGatewayAdapter,
    PaymentRequest, PresentationPayload,
};
use crate::config::{parse_url, GatewayConfig, ProviderAConfig};
use crate::error::{GatewayError, GatewayResult};
use crate::signer::{ConcatHmacSha256, RequestSigner};
use bakiye_core::{GatewayOutcome, GatewayProvider, Money};

const PROVIDER: GatewayProvider = GatewayProvider::ProviderA;

/// Single payment, no installments.
const NO_INSTALLMENT: &str = "1";
const MAX_INSTALLMENT: &str = "0";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    status: String,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
    #[serde(default)]
    payment_status: Option<String>,
    #[serde(default)]
    fail_message: Option<String>,
    #[serde(default)]
    err_msg: Option<String>,
}

/// Provider A adapter.
#[derive(Debug)]
pub struct TokenGateway {
    config: ProviderAConfig,
    ok_url: String,
    fail_url: String,
    client: reqwest::Client,
    signer: ConcatHmacSha256,
}

impl TokenGateway {
    pub fn new(config: ProviderAConfig, shared: &GatewayConfig) -> GatewayResult<Self> {
        config.validate()?;
        let signer = ConcatHmacSha256::new(config.merchant_key.as_bytes())?;
        Ok(TokenGateway {
            ok_url: shared.return_url("ok")?.to_string(),
            fail_url: shared.return_url("fail")?.to_string(),
            client: http_client(shared.request_timeout())?,
            signer,
            config,
        })
    }

    /// Replaces the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> GatewayResult<Self> {
        self.client = http_client(timeout)?;
        Ok(self)
    }

    fn iframe_url(&self, token: &str) -> GatewayResult<String> {
        let mut url = parse_url("provider_a.iframe_base_url", &self.config.iframe_base_url)?;
        url.path_segments_mut()
            .map_err(|_| GatewayError::Config("provider_a.iframe_base_url cannot be a base".to_string()))?
            .pop_if_empty()
            .push(token);
        Ok(url.to_string())
    }

    fn test_mode(&self) -> &'static str {
        if self.config.test_mode {
            "1"
        } else {
            "0"
        }
    }
}

#[async_trait]
impl PaymentGatewayAdapter for TokenGateway {
    fn provider(&self) -> GatewayProvider {
        PROVIDER
    }

    fn signer(&self) -> &dyn RequestSigner {
        &self.signer
    }

    async fn create_payment_request(&self, request: &PaymentRequest) -> GatewayResult<CreatedPayment> {
        let payment_amount = request.amount.minor().to_string();
        let basket = serde_json::json!([[request.description, request.amount.to_string(), 1]]);
        let user_basket = STANDARD.encode(basket.to_string());
        let timeout_limit = self.config.timeout_limit_mins.to_string();
        let test_mode = self.test_mode();

        let paytr_token = self.signer.sign(&[
            self.config.merchant_id.as_str(),
            request.buyer.ip.as_str(),
            request.invoice_id.as_str(),
            request.buyer.email.as_str(),
            payment_amount.as_str(),
            user_basket.as_str(),
            NO_INSTALLMENT,
            MAX_INSTALLMENT,
            self.config.currency.as_str(),
            test_mode,
            self.config.merchant_salt.as_str(),
        ]);

        let form: Vec<(&str, &str)> = vec![
            ("merchant_id", self.config.merchant_id.as_str()),
            ("user_ip", request.buyer.ip.as_str()),
            ("merchant_oid", request.invoice_id.as_str()),
            ("email", request.buyer.email.as_str()),
            ("payment_amount", payment_amount.as_str()),
            ("paytr_token", paytr_token.as_str()),
            ("user_basket", user_basket.as_str()),
            ("no_installment", NO_INSTALLMENT),
            ("max_installment", MAX_INSTALLMENT),
            ("user_name", request.buyer.name.as_str()),
            ("user_address", request.buyer.address.as_str()),
            ("user_phone", request.buyer.phone.as_str()),
            ("merchant_ok_url", self.ok_url.as_str()),
            ("merchant_fail_url", self.fail_url.as_str()),
            ("timeout_limit", timeout_limit.as_str()),
            ("currency", self.config.currency.as_str()),
            ("test_mode", test_mode),
        ];

        debug!(invoice_id = %request.invoice_id, amount = %request.amount, "Requesting provider A token");

        let response = self
            .client
            .post(&self.config.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| GatewayError::unavailable(PROVIDER, e))?
            .error_for_status()
            .map_err(|e| GatewayError::unavailable(PROVIDER, e))?;

        let body: TokenResponse = response.json().await.map_err(|e| GatewayError::Unavailable {
            provider: PROVIDER,
            reason: format!("unreadable token response: {}", e),
        })?;

        match (body.status.as_str(), body.token) {
            ("success", Some(token)) if !token.is_empty() => {
                info!(invoice_id = %request.invoice_id, "Provider A token issued");
                Ok(CreatedPayment {
                    presentation_payload: PresentationPayload::IframeUrl {
                        url: self.iframe_url(&token)?,
                    },
                    token,
                })
            }
            _ => {
                let reason = body.reason.unwrap_or_else(|| format!("status '{}'", body.status));
                warn!(invoice_id = %request.invoice_id, %reason, "Provider A rejected token request");
                Err(GatewayError::rejected(PROVIDER, reason))
            }
        }
    }

    fn verify_notification(&self, fields: &NotificationFields) -> GatewayResult<GatewayNotification> {
        let invoice_id = field(fields, "merchant_oid")?;
        let status = field(fields, "status")?;
        let total_amount = field(fields, "total_amount")?;
        let hash = field(fields, "hash")?;

        if !self
            .signer
            .verify(&[invoice_id, self.config.merchant_salt.as_str(), status, total_amount], hash)
        {
            warn!(invoice_id, "Provider A notification hash mismatch");
            return Err(GatewayError::InvalidSignature { provider: PROVIDER });
        }

        let reported_amount = total_amount
            .parse::<i64>()
            .map(Money::from_minor)
            .map_err(|_| GatewayError::MalformedNotification(format!("total_amount '{}'", total_amount)))?;

        let outcome = match status {
            "success" => GatewayOutcome::Success,
            "failed" => GatewayOutcome::Failed {
                reason: fields
                    .get("failed_reason_msg")
                    .map(|r| r.trim().to_string())
                    .filter(|r| !r.is_empty()),
            },
            other => {
                return Err(GatewayError::MalformedNotification(format!("status '{}'", other)));
            }
        };

        Ok(GatewayNotification {
            invoice_id: invoice_id.to_string(),
            outcome,
            reported_amount: Some(reported_amount),
        })
    }

    async fn fetch_status(&self, invoice_id: &str) -> GatewayResult<Option<GatewayOutcome>> {
        let paytr_token = self
            .signer
            .sign(&[self.config.merchant_id.as_str(), invoice_id, self.config.merchant_salt.as_str()]);
        let form = [
            ("merchant_id", self.config.merchant_id.as_str()),
            ("merchant_oid", invoice_id),
            ("paytr_token", paytr_token.as_str()),
        ];

        let response = self
            .client
            .post(&self.config.status_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| GatewayError::unavailable(PROVIDER, e))?
            .error_for_status()
            .map_err(|e| GatewayError::unavailable(PROVIDER, e))?;

        let body: StatusResponse = response.json().await.map_err(|e| GatewayError::Unavailable {
            provider: PROVIDER,
            reason: format!("unreadable status response: {}", e),
        })?;

        if body.status != "success" {
            let reason = body.err_msg.unwrap_or_else(|| format!("status '{}'", body.status));
            return Err(GatewayError::rejected(PROVIDER, reason));
        }

        let outcome = match body.payment_status.as_deref() {
            Some("success") => Some(GatewayOutcome::Success),
            Some("failed") => Some(GatewayOutcome::Failed {
                reason: body.fail_message,
            }),
            _ => None,
        };
        debug!(invoice_id, ?outcome, "Provider A status queried");
        Ok(outcome)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
