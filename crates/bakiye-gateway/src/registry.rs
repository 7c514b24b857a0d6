//! # Gateway Registry
//!
//! Looks up the adapter for an intent's `provider`.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::adapter::PaymentGatewayAdapter;
use crate::config::GatewayConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::form_gateway::FormGateway;
use crate::token_gateway::TokenGateway;
use bakiye_core::GatewayProvider;

#[derive(Clone, Default)]
pub struct GatewayRegistry {
    adapters: HashMap<GatewayProvider, Arc<dyn PaymentGatewayAdapter>>,
}

impl GatewayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds adapters for every provider section present in `config`.
    pub fn from_config(config: &GatewayConfig) -> GatewayResult<Self> {
        config.validate()?;
        let mut registry = GatewayRegistry::new();
        if let Some(a) = &config.provider_a {
            registry.register(Arc::new(TokenGateway::new(a.clone(), config)?));
        }
        if let Some(b) = &config.provider_b {
            registry.register(Arc::new(FormGateway::new(b.clone(), config)?));
        }
        info!(providers = ?registry.providers(), "Payment gateways registered");
        Ok(registry)
    }

    /// Adds or replaces the adapter for its provider.
    pub fn register(&mut self, adapter: Arc<dyn PaymentGatewayAdapter>) -> &mut Self {
        self.adapters.insert(adapter.provider(), adapter);
        self
    }

    pub fn get(&self, provider: GatewayProvider) -> GatewayResult<Arc<dyn PaymentGatewayAdapter>> {
        self.adapters
            .get(&provider)
            .cloned()
            .ok_or_else(|| GatewayError::Config(format!("gateway {} is not configured", provider)))
    }

    pub fn is_configured(&self, provider: GatewayProvider) -> bool {
        self.adapters.contains_key(&provider)
    }

    /// Configured providers in a stable order.
    pub fn providers(&self) -> Vec<GatewayProvider> {
        let mut providers: Vec<_> = self.adapters.keys().copied().collect();
        providers.sort_by_key(|p| p.as_str());
        providers
    }
}

impl std::fmt::Debug for GatewayRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayRegistry")
            .field("providers", &self.providers())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ProviderAConfig, ProviderBConfig};

    fn config() -> GatewayConfig {
        GatewayConfig {
            provider_b: Some(ProviderBConfig {
                client_id: "c".into(),
                client_secret: "s".into(),
                store_key: "k".into(),
                auth_url: "https://b.example/oauth/token".into(),
                payment_page_url: "https://b.example/pay".into(),
                currency_code: "949".into(),
                lang: "tr".into(),
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_only_configured_providers_resolve() {
        let registry = GatewayRegistry::from_config(&config()).unwrap();
        assert_eq!(registry.providers(), vec![GatewayProvider::ProviderB]);
        assert_eq!(
            registry.get(GatewayProvider::ProviderB).unwrap().provider(),
            GatewayProvider::ProviderB
        );
        assert!(matches!(
            registry.get(GatewayProvider::ProviderA),
            Err(GatewayError::Config(_))
        ));
    }

    #[test]
    fn test_invalid_section_fails_startup() {
        let mut config = config();
        config.provider_a = Some(ProviderAConfig {
            merchant_id: "1".into(),
            merchant_key: "".into(),
            merchant_salt: "salt".into(),
            token_url: "https://a.example/token".into(),
            status_url: "https://a.example/status".into(),
            iframe_base_url: "https://a.example/iframe".into(),
            test_mode: false,
            currency: "TL".into(),
            timeout_limit_mins: 30,
        });
        assert!(GatewayRegistry::from_config(&config).is_err());
        assert!(GatewayRegistry::new().providers().is_empty());
    }
}
