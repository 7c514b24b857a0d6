//! # HTTP Routes
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  /api/dealers                    POST   create account                  │
//! │  /api/dealers/{id}/balance       GET    current balance                 │
//! │  /api/dealers/{id}/rollup        GET    monthly rollup                  │
//! │  /api/balances/top               GET    highest active balances         │
//! │  /api/topups                     POST   manual or gateway top-up        │
//! │  /api/callbacks/provider-a       POST   provider A notification (form)  │
//! │  /api/callbacks/provider-b       POST   provider B notification (form)  │
//! │  /api/history                    GET    ledger history                  │
//! │  /api/commissions                POST   bill a test                     │
//! │  /api/reconciliation/sweep       POST   resolve stale intents           │
//! │  /api/reconciliation/audit       GET    consistency audit               │
//! │  /health                         GET    liveness + database             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! JSON bodies are camelCase. Amounts go in as decimal strings (`"250.00"`)
//! and come out as integer minor units next to a formatted string where a
//! human reads them.

mod callbacks;
mod dealers;
mod operations;
mod reports;
mod topups;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tracing::warn;

use crate::state::SharedState;

/// Builds the service router.
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/dealers", post(dealers::create_dealer))
        .route("/api/dealers/{id}/balance", get(dealers::balance))
        .route("/api/dealers/{id}/rollup", get(reports::monthly_rollup))
        .route("/api/balances/top", get(reports::top_balances))
        .route("/api/history", get(reports::history))
        .route("/api/topups", post(topups::initiate_topup))
        .route("/api/callbacks/provider-a", post(callbacks::provider_a))
        .route("/api/callbacks/provider-b", post(callbacks::provider_b))
        .route("/api/commissions", post(operations::bill_commission))
        .route("/api/reconciliation/sweep", post(operations::sweep))
        .route("/api/reconciliation/audit", get(operations::audit))
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    database: bool,
}

async fn health(State(state): State<SharedState>) -> (StatusCode, Json<HealthResponse>) {
    let database = state.db.health_check().await;
    if !database {
        warn!("Health check: database unreachable");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "degraded",
                database,
            }),
        );
    }
    (StatusCode::OK, Json(HealthResponse { status: "ok", database }))
}

// =============================================================================
// Route Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{json_request, read_json, test_state};
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_health() {
        let state = test_state(Default::default()).await;
        let app = router(state.clone());

        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["database"], true);

        state.db.close().await;
        let response = router(state)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let state = test_state(Default::default()).await;
        let response = router(state)
            .oneshot(json_request("POST", "/api/nothing", serde_json::json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
