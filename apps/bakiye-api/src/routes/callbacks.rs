//! Provider notification endpoints.
//!
//! ```text
//! form POST ──► adapter.verify_notification ──► engine.reconcile ──► "OK"
//!                    │                              │
//!                    │ bad hash / field → 400       ├─ duplicate      → "OK"
//!                    │                              ├─ unknown intent → "OK" (dropped)
//!                    │                              └─ db error       → 500 (provider retries)
//! ```
//!
//! Providers retry until they get their acknowledgement, so every
//! notification that was verified and settled, even as a no-op, is
//! acknowledged.

use std::collections::HashMap;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Form;
use tracing::{info, warn};

use crate::error::{ApiResult, ReconcileError};
use crate::state::SharedState;
use bakiye_core::GatewayProvider;

pub async fn provider_a(
    State(state): State<SharedState>,
    Form(fields): Form<HashMap<String, String>>,
) -> ApiResult<(StatusCode, &'static str)> {
    notify(&state, GatewayProvider::ProviderA, fields).await
}

pub async fn provider_b(
    State(state): State<SharedState>,
    Form(fields): Form<HashMap<String, String>>,
) -> ApiResult<(StatusCode, &'static str)> {
    notify(&state, GatewayProvider::ProviderB, fields).await
}

async fn notify(
    state: &SharedState,
    provider: GatewayProvider,
    fields: HashMap<String, String>,
) -> ApiResult<(StatusCode, &'static str)> {
    let ack = state.gateways.get(provider)?.acknowledgement();

    match state.engine.handle_notification(provider, &fields).await {
        Ok(result) => {
            info!(
                invoice_id = %result.invoice_id,
                %provider,
                status = %result.status,
                applied = result.applied,
                "Notification settled"
            );
            Ok((StatusCode::OK, ack))
        }
        Err(ReconcileError::UnknownIntent(invoice_id)) => {
            warn!(%invoice_id, %provider, "Acknowledging notification for unknown intent");
            Ok((StatusCode::OK, ack))
        }
        Err(e) => Err(e.into()),
    }
}
