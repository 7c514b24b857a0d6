//! # Bakiye API
//!
//! HTTP service for dealer prepaid balances: top-ups through two card
//! providers or manual entry, commission billing, reporting and payment
//! reconciliation.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Bakiye API Server                              │
//! │                                                                         │
//! │  ┌────────────────┐  ┌──────────────────────┐  ┌────────────────────┐  │
//! │  │  TopupService  │  │ ReconciliationEngine │  │ CommissionService  │  │
//! │  │                │  │                      │  │                    │  │
//! │  │ • manual       │  │ • reconcile          │  │ • bill_test        │  │
//! │  │ • gateway      │─►│ • handle_notification│  │                    │  │
//! │  └───────┬────────┘  │ • sweep_stale        │  └─────────┬──────────┘  │
//! │          │           └──────────┬───────────┘            │             │
//! │          ▼                      ▼                        ▼             │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │ bakiye-gateway: GatewayRegistry (provider A / provider B)        │  │
//! │  │ bakiye-db:      LedgerWriter, IntentRepository, queries, audit   │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! See [`config`]: defaults, then `$BAKIYE_CONFIG` or the platform config
//! file, then `BAKIYE__SECTION__KEY` environment variables.

pub mod config;
pub mod error;
pub mod routes;
pub mod services;
pub mod state;

pub use config::AppConfig;
pub use error::{ApiError, ApiResult, ReconcileError};
pub use state::{AppState, SharedState};

use axum::Router;

/// The full application router.
pub fn app(state: SharedState) -> Router {
    routes::router(state)
}

// =============================================================================
// Test Support
// =============================================================================
