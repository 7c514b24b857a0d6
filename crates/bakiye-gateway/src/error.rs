//! # Gateway Error Types
//!
//! ## Error Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Gateway Error Categories                           │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │   Transport     │  │   Business      │  │     Inbound             │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Unavailable    │  │  Rejected       │  │  InvalidSignature       │ │
//! │  │  (network,      │  │  (provider said │  │  MalformedNotification  │ │
//! │  │   timeout, 5xx) │  │   no)           │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  Unavailable leaves an intent pending; Rejected fails it.              │
//! │  Neither is retried inside this crate.                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use bakiye_core::GatewayProvider;
use thiserror::Error;

/// Result type alias for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

#[derive(Debug, Error)]
pub enum GatewayError {
    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// Network error, timeout or non-2xx answer. Outcome unknown.
    #[error("Gateway {provider} unavailable: {reason}")]
    Unavailable { provider: GatewayProvider, reason: String },

    // =========================================================================
    // Business Errors
    // =========================================================================
    /// The provider refused the request.
    #[error("Gateway {provider} rejected the request: {reason}")]
    Rejected { provider: GatewayProvider, reason: String },

    // =========================================================================
    // Inbound Errors
    // =========================================================================
    /// Notification hash did not match.
    #[error("Invalid notification signature from {provider}")]
    InvalidSignature { provider: GatewayProvider },

    /// Notification is missing a field or carries an unparseable value.
    #[error("Malformed notification: {0}")]
    MalformedNotification(String),

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("Gateway configuration error: {0}")]
    Config(String),
}

impl GatewayError {
    /// Maps a transport failure to `Unavailable`.
    pub fn unavailable(provider: GatewayProvider, err: reqwest::Error) -> Self {
        let reason = if err.is_timeout() {
            "request timed out".to_string()
        } else if let Some(status) = err.status() {
            format!("HTTP {}", status)
        } else {
            err.to_string()
        };
        GatewayError::Unavailable { provider, reason }
    }

    pub fn rejected(provider: GatewayProvider, reason: impl Into<String>) -> Self {
        GatewayError::Rejected {
            provider,
            reason: reason.into(),
        }
    }

    pub fn missing_field(field: &str) -> Self {
        GatewayError::MalformedNotification(format!("missing field '{}'", field))
    }

    /// True when the provider's answer is unknown and a later status query
    /// or notification may still resolve the payment.
    pub fn is_outcome_unknown(&self) -> bool {
        matches!(self, GatewayError::Unavailable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_unknown_only_for_unavailable() {
        let unavailable = GatewayError::Unavailable {
            provider: GatewayProvider::ProviderA,
            reason: "HTTP 502".into(),
        };
        assert!(unavailable.is_outcome_unknown());
        assert!(!GatewayError::rejected(GatewayProvider::ProviderB, "card declined").is_outcome_unknown());
        assert!(!GatewayError::missing_field("hash").is_outcome_unknown());
    }

    #[test]
    fn test_messages() {
        let err = GatewayError::rejected(GatewayProvider::ProviderA, "limit exceeded");
        assert_eq!(err.to_string(), "Gateway provider_a rejected the request: limit exceeded");
        assert_eq!(
            GatewayError::missing_field("merchant_oid").to_string(),
            "Malformed notification: missing field 'merchant_oid'"
        );
    }
}
