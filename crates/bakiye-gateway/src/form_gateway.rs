//! # Provider B: Authorize + Hosted Form Gateway
//!
//! ## Payment Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  1. POST auth_url (JSON client credentials)                             │
//! │     ← {"access_token": "...", "expires_in": 3600}                       │
//! │     Token is cached until shortly before expiry.                        │
//! │                                                                         │
//! │  2. Render an auto-submitting form to payment_page_url:                 │
//! │       clientid, oid, amount (decimal), currency, okUrl, failUrl,        │
//! │       rnd (nonce), token,                                               │
//! │       hash = sign(clientid | oid | amount | okUrl | failUrl | rnd |     │
//! │                   currency)                                             │
//! │                                                                         │
//! │  3. Hosted page → POST /api/callbacks/provider-b                        │
//! │       order_id, result ("00" = approved), amount, rnd,                  │
//! │       hash = sign(order_id | result | amount | rnd)                     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! There is no status API; `fetch_status` always answers `None`.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::adapter::{
    field, http_client, CreatedPayment, GatewayNotification, NotificationFields, PaymentGatewayAdapter,
    PaymentRequest, PresentationPayload,
};
use crate::config::{GatewayConfig, ProviderBConfig};
use crate::error::{GatewayError, GatewayResult};
use crate::signer::{JoinedHmacSha512, RequestSigner};
use bakiye_core::{GatewayOutcome, GatewayProvider, Money};

const PROVIDER: GatewayProvider = GatewayProvider::ProviderB;

/// Route the hosted page posts results to.
pub const CALLBACK_PATH: &str = "/api/callbacks/provider-b";

/// Result code for an approved payment.
const APPROVED: &str = "00";

/// Refresh the access token this long before it expires.
const REFRESH_MARGIN_SECS: u64 = 60;

/// Lifetime assumed when the provider omits `expires_in`.
const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 300;

#[derive(Debug, Deserialize)]
struct AuthResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: Instant,
}

impl AccessToken {
    fn needs_refresh(&self) -> bool {
        Instant::now() + Duration::from_secs(REFRESH_MARGIN_SECS) >= self.expires_at
    }
}

/// Provider B adapter.
#[derive(Debug)]
pub struct FormGateway {
    config: ProviderBConfig,
    callback_url: String,
    client: reqwest::Client,
    signer: JoinedHmacSha512,
    token: RwLock<Option<AccessToken>>,
}

impl FormGateway {
    pub fn new(config: ProviderBConfig, shared: &GatewayConfig) -> GatewayResult<Self> {
        config.validate()?;
        let signer = JoinedHmacSha512::new(config.store_key.as_bytes())?;
        Ok(FormGateway {
            callback_url: shared.callback_url(CALLBACK_PATH)?.to_string(),
            client: http_client(shared.request_timeout())?,
            signer,
            config,
            token: RwLock::new(None),
        })
    }

    /// Replaces the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> GatewayResult<Self> {
        self.client = http_client(timeout)?;
        Ok(self)
    }

    /// Cached access token, authorizing again when it is about to expire.
    async fn access_token(&self) -> GatewayResult<String> {
        {
            let cached = self.token.read().await;
            if let Some(token) = cached.as_ref().filter(|t| !t.needs_refresh()) {
                return Ok(token.value.clone());
            }
        }

        let fresh = self.authorize().await?;
        let value = fresh.value.clone();
        *self.token.write().await = Some(fresh);
        Ok(value)
    }

    async fn authorize(&self) -> GatewayResult<AccessToken> {
        let credentials = serde_json::json!({
            "grant_type": "client_credentials",
            "client_id": self.config.client_id,
            "client_secret": self.config.client_secret,
        });

        let response = self
            .client
            .post(&self.config.auth_url)
            .json(&credentials)
            .send()
            .await
            .map_err(|e| GatewayError::unavailable(PROVIDER, e))?
            .error_for_status()
            .map_err(|e| GatewayError::unavailable(PROVIDER, e))?;

        let body: AuthResponse = response.json().await.map_err(|e| GatewayError::Unavailable {
            provider: PROVIDER,
            reason: format!("unreadable authorization response: {}", e),
        })?;

        match body.access_token.filter(|t| !t.is_empty()) {
            Some(value) => {
                let lifetime = body.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
                debug!(lifetime_secs = lifetime, "Provider B access token issued");
                Ok(AccessToken {
                    value,
                    expires_at: Instant::now() + Duration::from_secs(lifetime),
                })
            }
            None => {
                let reason = body
                    .error_description
                    .or(body.error)
                    .unwrap_or_else(|| "no access token in response".to_string());
                warn!(%reason, "Provider B authorization refused");
                Err(GatewayError::rejected(PROVIDER, reason))
            }
        }
    }
}

#[async_trait]
impl PaymentGatewayAdapter for FormGateway {
    fn provider(&self) -> GatewayProvider {
        PROVIDER
    }

    fn signer(&self) -> &dyn RequestSigner {
        &self.signer
    }

    async fn create_payment_request(&self, request: &PaymentRequest) -> GatewayResult<CreatedPayment> {
        let access_token = self.access_token().await?;
        let amount = request.amount.to_string();
        let rnd = Uuid::new_v4().simple().to_string();
        let callback = self.callback_url.as_str();

        let hash = self.signer.sign(&[
            self.config.client_id.as_str(),
            request.invoice_id.as_str(),
            amount.as_str(),
            callback,
            callback,
            rnd.as_str(),
            self.config.currency_code.as_str(),
        ]);

        let fields: [(&str, &str); 11] = [
            ("clientid", self.config.client_id.as_str()),
            ("oid", request.invoice_id.as_str()),
            ("amount", amount.as_str()),
            ("currency", self.config.currency_code.as_str()),
            ("okUrl", callback),
            ("failUrl", callback),
            ("rnd", rnd.as_str()),
            ("lang", self.config.lang.as_str()),
            ("storetype", "3d_pay_hosting"),
            ("token", access_token.as_str()),
            ("hash", hash.as_str()),
        ];

        info!(invoice_id = %request.invoice_id, amount = %request.amount, "Provider B payment form prepared");

        Ok(CreatedPayment {
            token: rnd.clone(),
            presentation_payload: PresentationPayload::HtmlForm {
                html: auto_submit_form(&self.config.payment_page_url, &fields),
            },
        })
    }

    fn verify_notification(&self, fields: &NotificationFields) -> GatewayResult<GatewayNotification> {
        let invoice_id = field(fields, "order_id")?;
        let result = field(fields, "result")?;
        let amount = field(fields, "amount")?;
        let rnd = field(fields, "rnd")?;
        let hash = field(fields, "hash")?;

        if !self.signer.verify(&[invoice_id, result, amount, rnd], hash) {
            warn!(invoice_id, "Provider B notification hash mismatch");
            return Err(GatewayError::InvalidSignature { provider: PROVIDER });
        }

        let reported_amount = Money::parse_decimal(amount)
            .map_err(|_| GatewayError::MalformedNotification(format!("amount '{}'", amount)))?;

        let outcome = if result == APPROVED {
            GatewayOutcome::Success
        } else {
            let reason = fields
                .get("error_message")
                .map(|m| m.trim())
                .filter(|m| !m.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("result code {}", result));
            GatewayOutcome::Failed { reason: Some(reason) }
        };

        Ok(GatewayNotification {
            invoice_id: invoice_id.to_string(),
            outcome,
            reported_amount: Some(reported_amount),
        })
    }

    async fn fetch_status(&self, _invoice_id: &str) -> GatewayResult<Option<GatewayOutcome>> {
        Ok(None)
    }
}

// =============================================================================
// HTML
// =============================================================================

fn auto_submit_form(action: &str, fields: &[(&str, &str)]) -> String {
    let mut html = String::with_capacity(256 + fields.len() * 64);
    html.push_str("<!DOCTYPE html><html><body onload=\"document.forms[0].submit()\">");
    html.push_str(&format!("<form method=\"post\" action=\"{}\">", escape_html(action)));
    for (name, value) in fields {
        html.push_str(&format!(
            "<input type=\"hidden\" name=\"{}\" value=\"{}\">",
            escape_html(name),
            escape_html(value)
        ));
    }
    html.push_str("<noscript><button type=\"submit\">Devam</button></noscript></form></body></html>");
    html
}

fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

// =============================================================================
// Unit Tests
// =============================================================================
