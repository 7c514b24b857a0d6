//! # Gateway Configuration
//!
//! Credentials and endpoints for each provider. A provider without a
//! section is simply not registered; top-ups through it are refused.
//!
//! ## Configuration File Format
//! ```toml
//! [gateway]
//! request_timeout_secs = 15
//! callback_base_url = "https://panel.example.com"
//! return_base_url = "https://panel.example.com/bakiye"
//!
//! [gateway.provider_a]
//! merchant_id = "123456"
//! merchant_key = "..."
//! merchant_salt = "..."
//! token_url = "https://provider-a.example/api/get-token"
//! status_url = "https://provider-a.example/api/status"
//! iframe_base_url = "https://provider-a.example/guvenli"
//!
//! [gateway.provider_b]
//! client_id = "..."
//! client_secret = "..."
//! store_key = "..."
//! auth_url = "https://provider-b.example/oauth/token"
//! payment_page_url = "https://provider-b.example/pay"
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::error::{GatewayError, GatewayResult};

/// Shared gateway settings plus optional per-provider sections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Upper bound on every outbound provider call.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Public base URL providers post notifications to.
    #[serde(default = "default_callback_base_url")]
    pub callback_base_url: String,

    /// Where the dealer's browser lands after the hosted page.
    #[serde(default = "default_return_base_url")]
    pub return_base_url: String,

    #[serde(default)]
    pub provider_a: Option<ProviderAConfig>,

    #[serde(default)]
    pub provider_b: Option<ProviderBConfig>,
}

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_callback_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_return_base_url() -> String {
    "http://localhost:8080/bakiye".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        GatewayConfig {
            request_timeout_secs: default_request_timeout_secs(),
            callback_base_url: default_callback_base_url(),
            return_base_url: default_return_base_url(),
            provider_a: None,
            provider_b: None,
        }
    }
}

impl GatewayConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Absolute callback URL for a route path such as
    /// `/api/callbacks/provider-b`.
    pub fn callback_url(&self, path: &str) -> GatewayResult<Url> {
        parse_url("callback_base_url", &self.callback_base_url)?
            .join(path)
            .map_err(|e| GatewayError::Config(format!("callback path '{}': {}", path, e)))
    }

    /// Browser return URL, e.g. `ok` or `fail` under `return_base_url`.
    pub fn return_url(&self, outcome: &str) -> GatewayResult<Url> {
        let mut base = parse_url("return_base_url", &self.return_base_url)?;
        base.path_segments_mut()
            .map_err(|_| GatewayError::Config("return_base_url cannot be a base".to_string()))?
            .pop_if_empty()
            .push(outcome);
        Ok(base)
    }

    /// Checks every URL and required credential.
    pub fn validate(&self) -> GatewayResult<()> {
        if self.request_timeout_secs == 0 {
            return Err(GatewayError::Config("request_timeout_secs must be positive".to_string()));
        }
        parse_url("callback_base_url", &self.callback_base_url)?;
        parse_url("return_base_url", &self.return_base_url)?;
        if let Some(a) = &self.provider_a {
            a.validate()?;
        }
        if let Some(b) = &self.provider_b {
            b.validate()?;
        }
        Ok(())
    }
}

// =============================================================================
// Provider A (token + iframe)
// =============================================================================

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderAConfig {
    pub merchant_id: String,
    pub merchant_key: String,
    pub merchant_salt: String,
    pub token_url: String,
    pub status_url: String,
    pub iframe_base_url: String,

    /// Sends `test_mode=1` on every request.
    #[serde(default)]
    pub test_mode: bool,

    #[serde(default = "default_provider_a_currency")]
    pub currency: String,

    /// Minutes the iframe stays valid.
    #[serde(default = "default_timeout_limit")]
    pub timeout_limit_mins: u32,
}

fn default_provider_a_currency() -> String {
    "TL".to_string()
}

fn default_timeout_limit() -> u32 {
    30
}

impl ProviderAConfig {
    pub fn validate(&self) -> GatewayResult<()> {
        require("provider_a.merchant_id", &self.merchant_id)?;
        require("provider_a.merchant_key", &self.merchant_key)?;
        require("provider_a.merchant_salt", &self.merchant_salt)?;
        parse_url("provider_a.token_url", &self.token_url)?;
        parse_url("provider_a.status_url", &self.status_url)?;
        parse_url("provider_a.iframe_base_url", &self.iframe_base_url)?;
        Ok(())
    }
}

impl std::fmt::Debug for ProviderAConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderAConfig")
            .field("merchant_id", &self.merchant_id)
            .field("merchant_key", &"***")
            .field("merchant_salt", &"***")
            .field("token_url", &self.token_url)
            .field("status_url", &self.status_url)
            .field("iframe_base_url", &self.iframe_base_url)
            .field("test_mode", &self.test_mode)
            .finish()
    }
}

// =============================================================================
// Provider B (authorize + hosted form)
// =============================================================================

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderBConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Key for form and notification hashes.
    pub store_key: String,
    pub auth_url: String,
    pub payment_page_url: String,

    /// ISO 4217 numeric code; 949 is Turkish lira.
    #[serde(default = "default_currency_code")]
    pub currency_code: String,

    #[serde(default = "default_lang")]
    pub lang: String,
}

fn default_currency_code() -> String {
    "949".to_string()
}

fn default_lang() -> String {
    "tr".to_string()
}

impl ProviderBConfig {
    pub fn validate(&self) -> GatewayResult<()> {
        require("provider_b.client_id", &self.client_id)?;
        require("provider_b.client_secret", &self.client_secret)?;
        require("provider_b.store_key", &self.store_key)?;
        parse_url("provider_b.auth_url", &self.auth_url)?;
        parse_url("provider_b.payment_page_url", &self.payment_page_url)?;
        Ok(())
    }
}

impl std::fmt::Debug for ProviderBConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderBConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .field("store_key", &"***")
            .field("auth_url", &self.auth_url)
            .field("payment_page_url", &self.payment_page_url)
            .field("currency_code", &self.currency_code)
            .finish()
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn require(field: &str, value: &str) -> GatewayResult<()> {
    if value.trim().is_empty() {
        return Err(GatewayError::Config(format!("{} is required", field)));
    }
    Ok(())
}

pub(crate) fn parse_url(field: &str, value: &str) -> GatewayResult<Url> {
    let url = Url::parse(value).map_err(|e| GatewayError::Config(format!("{} '{}': {}", field, value, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(GatewayError::Config(format!(
            "{} must be http or https, got '{}'",
            field, other
        ))),
    }
}
