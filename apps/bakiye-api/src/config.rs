//! # Service Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     BAKIYE__SERVER__PORT=9090                                          │
//! │     BAKIYE__GATEWAY__PROVIDER_A__MERCHANT_KEY=...                      │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     $BAKIYE_CONFIG, or                                                 │
//! │     ~/.config/bakiye/bakiye.toml (Linux)                               │
//! │     ~/Library/Application Support/com.bakiye.bakiye/bakiye.toml (macOS)│
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 8080
//!
//! [database]
//! path = "/var/lib/bakiye/bakiye.db"
//!
//! [ledger]
//! overdraft = "reject"   # reject | allow
//! max_attempts = 8
//!
//! [commission]
//! default_rate_bps = 1000
//!
//! [reconciliation]
//! stale_after_secs = 1800
//!
//! [gateway]
//! request_timeout_secs = 15
//! callback_base_url = "https://panel.example.com"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

use bakiye_core::{OverdraftPolicy, MAX_RATE_BPS};
use bakiye_db::{DbConfig, LedgerConfig, RetryPolicy};
use bakiye_gateway::{GatewayConfig, GatewayError};

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "BAKIYE_CONFIG";

/// Prefix of per-key environment overrides (`BAKIYE__SECTION__KEY`).
pub const ENV_PREFIX: &str = "BAKIYE";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.into(),
    }
}

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub max_connections: u32,
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            path: PathBuf::from("./bakiye.db"),
            max_connections: 8,
            busy_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerSettings {
    pub overdraft: OverdraftPolicy,
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        LedgerSettings {
            overdraft: OverdraftPolicy::default(),
            max_attempts: retry.max_attempts,
            initial_backoff_ms: retry.initial_interval.as_millis() as u64,
            max_backoff_ms: retry.max_interval.as_millis() as u64,
        }
    }
}

impl LedgerSettings {
    pub fn ledger_config(&self) -> LedgerConfig {
        LedgerConfig {
            overdraft: self.overdraft,
            retry: RetryPolicy {
                max_attempts: self.max_attempts,
                initial_interval: Duration::from_millis(self.initial_backoff_ms),
                max_interval: Duration::from_millis(self.max_backoff_ms),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommissionSettings {
    /// Rate used when neither dealer nor company has one. 1000 = 10%.
    pub default_rate_bps: i64,
}

impl Default for CommissionSettings {
    fn default() -> Self {
        CommissionSettings { default_rate_bps: 1000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconciliationSettings {
    /// Pending intents older than this are swept.
    pub stale_after_secs: u64,
    /// Upper bound on intents examined per sweep.
    pub sweep_batch: u32,
}

impl Default for ReconciliationSettings {
    fn default() -> Self {
        ReconciliationSettings {
            stale_after_secs: 1800,
            sweep_batch: 100,
        }
    }
}

impl ReconciliationSettings {
    pub fn stale_after(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.stale_after_secs as i64)
    }
}

// =============================================================================
// AppConfig
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub ledger: LedgerSettings,
    pub commission: CommissionSettings,
    pub reconciliation: ReconciliationSettings,
    pub gateway: GatewayConfig,
}

impl AppConfig {
    /// Loads defaults, the config file and environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let (file, required) = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => (Some(PathBuf::from(path)), true),
            Err(_) => (default_config_path(), false),
        };
        Self::load_from(file, required)
    }

    /// Loads with an explicit file. A missing optional file is skipped.
    pub fn load_from(file: Option<PathBuf>, required: bool) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder().add_source(config::Config::try_from(&AppConfig::default())?);

        if let Some(path) = &file {
            debug!(path = %path.display(), required, "Reading config file");
            builder = builder.add_source(config::File::from(path.as_path()).required(required));
        }

        let config: AppConfig = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;

        info!(
            bind = %config.server.bind_address(),
            database = %config.database.path.display(),
            overdraft = ?config.ledger.overdraft,
            provider_a = config.gateway.provider_a.is_some(),
            provider_b = config.gateway.provider_b.is_some(),
            "Configuration loaded"
        );

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(invalid("server.port", "must be non-zero"));
        }
        if self.database.path.as_os_str().is_empty() {
            return Err(invalid("database.path", "is required"));
        }
        if self.database.max_connections == 0 {
            return Err(invalid("database.max_connections", "must be at least 1"));
        }
        if self.ledger.max_attempts == 0 {
            return Err(invalid("ledger.max_attempts", "must be at least 1"));
        }
        if self.ledger.initial_backoff_ms > self.ledger.max_backoff_ms {
            return Err(invalid("ledger.initial_backoff_ms", "exceeds ledger.max_backoff_ms"));
        }
        if !(0..=MAX_RATE_BPS as i64).contains(&self.commission.default_rate_bps) {
            return Err(invalid(
                "commission.default_rate_bps",
                format!("must be between 0 and {}", MAX_RATE_BPS),
            ));
        }
        if self.reconciliation.stale_after_secs == 0 {
            return Err(invalid("reconciliation.stale_after_secs", "must be positive"));
        }
        if self.reconciliation.sweep_batch == 0 {
            return Err(invalid("reconciliation.sweep_batch", "must be at least 1"));
        }
        self.gateway.validate()?;
        Ok(())
    }

    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database.path)
            .max_connections(self.database.max_connections)
            .busy_timeout(Duration::from_millis(self.database.busy_timeout_ms))
            .ledger(self.ledger.ledger_config())
    }
}

/// Platform config location, e.g. `~/.config/bakiye/bakiye.toml`.
fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("com", "bakiye", "bakiye").map(|dirs| dirs.config_dir().join("bakiye.toml"))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.ledger.ledger_config(), LedgerConfig::default());
    }

    #[test]
    fn test_missing_optional_file_is_skipped() {
        let config = AppConfig::load_from(Some(PathBuf::from("/nonexistent/bakiye.toml")), false).unwrap();
        assert_eq!(config.server.port, 8080);
        assert!(AppConfig::load_from(Some(PathBuf::from("/nonexistent/bakiye.toml")), true).is_err());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[server]
port = 9191

[ledger]
overdraft = "allow"
max_attempts = 3

[commission]
default_rate_bps = 750

[gateway]
request_timeout_secs = 5

[gateway.provider_b]
client_id = "c"
client_secret = "s"
store_key = "k"
auth_url = "https://b.example/oauth/token"
payment_page_url = "https://b.example/pay"
"#
        )
        .unwrap();

        let config = AppConfig::load_from(Some(file.path().to_path_buf()), true).unwrap();
        assert_eq!(config.server.port, 9191);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.ledger.overdraft, OverdraftPolicy::Allow);
        assert_eq!(config.ledger.ledger_config().retry.max_attempts, 3);
        assert_eq!(config.commission.default_rate_bps, 750);
        assert_eq!(config.gateway.request_timeout_secs, 5);
        assert_eq!(
            config.gateway.provider_b.as_ref().map(|b| b.currency_code.as_str()),
            Some("949")
        );
        assert!(config.gateway.provider_a.is_none());
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let mut config = AppConfig::default();
        config.commission.default_rate_bps = 12_000;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue { .. })));

        let mut config = AppConfig::default();
        config.ledger.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.gateway.callback_base_url = "not a url".into();
        assert!(matches!(config.validate(), Err(ConfigError::Gateway(_))));
    }
}
