//! # Payment Gateway Adapter
//!
//! The seam between the reconciliation layer and a concrete provider.
//!
//! ## Adapter Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  initiate top-up                                                        │
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │  create_payment_request() ───► provider ───► CreatedPayment             │
//! │                                               { token, presentation }   │
//! │                                                                         │
//! │  provider notification (form POST)                                      │
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │  verify_notification() ───► GatewayNotification                         │
//! │                               { invoice_id, outcome, reported_amount }  │
//! │                                                                         │
//! │  operator sweep                                                         │
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │  fetch_status() ───► Some(outcome) | None (unknown / unsupported)       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::error::{GatewayError, GatewayResult};
use crate::signer::RequestSigner;
use bakiye_core::{GatewayOutcome, GatewayProvider, Money};

/// Form fields of an inbound notification.
pub type NotificationFields = HashMap<String, String>;

// =============================================================================
// Request / Response Types
// =============================================================================

/// Card holder details some providers require.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyerInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    /// Client IP as seen by the panel.
    #[serde(default)]
    pub ip: String,
}

/// One outbound payment request.
#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub invoice_id: String,
    pub dealer_id: String,
    pub amount: Money,
    pub buyer: BuyerInfo,
    pub description: String,
}

impl PaymentRequest {
    pub fn new(invoice_id: impl Into<String>, dealer_id: impl Into<String>, amount: Money) -> Self {
        let dealer_id = dealer_id.into();
        PaymentRequest {
            invoice_id: invoice_id.into(),
            description: format!("Bakiye yukleme {}", dealer_id),
            dealer_id,
            amount,
            buyer: BuyerInfo::default(),
        }
    }

    pub fn buyer(mut self, buyer: BuyerInfo) -> Self {
        self.buyer = buyer;
        self
    }
}

/// What the panel shows the dealer to complete payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PresentationPayload {
    /// Embed this URL in an iframe.
    IframeUrl { url: String },
    /// Render this self-submitting form.
    HtmlForm { html: String },
}

/// Provider answer to `create_payment_request`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedPayment {
    /// Provider token stored on the intent.
    pub token: String,
    pub presentation_payload: PresentationPayload,
}

/// A verified provider notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayNotification {
    pub invoice_id: String,
    pub outcome: GatewayOutcome,
    /// Amount the provider says it captured, if it reports one.
    pub reported_amount: Option<Money>,
}

// =============================================================================
// Adapter Trait
// =============================================================================

#[async_trait]
pub trait PaymentGatewayAdapter: Send + Sync {
    fn provider(&self) -> GatewayProvider;

    /// Signing strategy for this provider's requests and notifications.
    fn signer(&self) -> &dyn RequestSigner;

    /// Registers the payment with the provider.
    ///
    /// ## Errors
    /// - `Unavailable`: network error, timeout, non-2xx
    /// - `Rejected`: the provider declined the request
    async fn create_payment_request(&self, request: &PaymentRequest) -> GatewayResult<CreatedPayment>;

    /// Checks the notification hash and extracts the outcome.
    ///
    /// ## Errors
    /// - `InvalidSignature`: hash mismatch, nothing may be applied
    /// - `MalformedNotification`: missing or unparseable field
    fn verify_notification(&self, fields: &NotificationFields) -> GatewayResult<GatewayNotification>;

    /// Asks the provider for a final outcome. `None` when the payment is
    /// still open or the provider has no status API.
    async fn fetch_status(&self, invoice_id: &str) -> GatewayResult<Option<GatewayOutcome>>;

    /// Body the provider expects in reply to a processed notification.
    fn acknowledgement(&self) -> &'static str {
        "OK"
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// HTTP client shared by the adapters: rustls, bounded by `timeout`.
pub(crate) fn http_client(timeout: Duration) -> GatewayResult<reqwest::Client> {
    reqwest::Client::builder()
        .use_rustls_tls()
        .timeout(timeout)
        .connect_timeout(timeout)
        .build()
        .map_err(|e| GatewayError::Config(format!("failed to build HTTP client: {}", e)))
}

/// Required notification field.
pub(crate) fn field<'a>(fields: &'a NotificationFields, name: &str) -> GatewayResult<&'a str> {
    fields
        .get(name)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| GatewayError::missing_field(name))
}
