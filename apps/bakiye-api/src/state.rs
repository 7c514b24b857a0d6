//! Shared application state.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::{CommissionService, ReconciliationEngine, TopupService};
use bakiye_db::Database;
use bakiye_gateway::GatewayRegistry;

/// Everything a handler needs, built once at startup.
#[derive(Debug)]
pub struct AppState {
    pub db: Database,
    pub gateways: GatewayRegistry,
    pub engine: ReconciliationEngine,
    pub topups: TopupService,
    pub commissions: CommissionService,
    pub config: AppConfig,
}

/// Handle passed to axum.
pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(config: AppConfig, db: Database, gateways: GatewayRegistry) -> Self {
        let engine = ReconciliationEngine::new(db.clone(), gateways.clone());
        let topups = TopupService::new(db.clone(), gateways.clone(), engine.clone());
        let commissions = CommissionService::new(db.clone(), config.commission.default_rate_bps);
        AppState {
            db,
            gateways,
            engine,
            topups,
            commissions,
            config,
        }
    }

    pub fn shared(self) -> SharedState {
        Arc::new(self)
    }
}
