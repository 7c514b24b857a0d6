//! Commission billing and operator reconciliation routes.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::services::SweepReport;
use crate::state::SharedState;
use bakiye_core::{CommissionRecord, Money};
use bakiye_db::AuditReport;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillCommissionRequest {
    pub test_id: String,
    pub dealer_id: String,
    /// Decimal string.
    pub gross_amount: String,
}

#[derive(Debug, Serialize)]
pub struct BillCommissionResponse {
    pub record: CommissionRecord,
    /// `false` when the test had already been billed.
    pub created: bool,
}

pub async fn bill_commission(
    State(state): State<SharedState>,
    Json(request): Json<BillCommissionRequest>,
) -> ApiResult<(StatusCode, Json<BillCommissionResponse>)> {
    let gross: Money = request.gross_amount.parse()?;
    let outcome = state
        .commissions
        .bill_test(&request.test_id, &request.dealer_id, gross)
        .await?;

    let status = if outcome.created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((
        status,
        Json(BillCommissionResponse {
            record: outcome.record,
            created: outcome.created,
        }),
    ))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepRequest {
    /// Overrides `reconciliation.stale_after_secs`.
    #[serde(default)]
    pub older_than_secs: Option<i64>,
}

pub async fn sweep(State(state): State<SharedState>, Json(request): Json<SweepRequest>) -> ApiResult<Json<SweepReport>> {
    let settings = &state.config.reconciliation;
    let older_than = request
        .older_than_secs
        .map(chrono::Duration::seconds)
        .unwrap_or_else(|| settings.stale_after());
    let report = state.engine.sweep_stale(older_than, settings.sweep_batch).await?;
    Ok(Json(report))
}

pub async fn audit(State(state): State<SharedState>) -> ApiResult<Json<AuditReport>> {
    Ok(Json(state.db.audit().audit().await?))
}

#[cfg(test)]
mod tests {
    use crate::routes::router;
    use crate::state::SharedState;
    use crate::test_support::{json_request, provider_a_config, read_json, test_state};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use bakiye_core::{GatewayProvider, Money};
    use bakiye_db::Mutation;
    use bakiye_gateway::GatewayConfig;
    use tower::ServiceExt;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn post(state: &SharedState, uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        let response = router(state.clone()).oneshot(json_request("POST", uri, body)).await.unwrap();
        let status = response.status();
        (status, read_json(response).await)
    }

    #[tokio::test]
    async fn test_bill_commission_route() {
        let state = test_state(Default::default()).await;
        state
            .db
            .ledger()
            .apply_mutation(&Mutation::manual_topup("BAYI-1", Money::from_major(100)))
            .await
            .unwrap();

        let request = serde_json::json!({"testId": "TEST-1", "dealerId": "BAYI-1", "grossAmount": "1000.00"});
        let (status, body) = post(&state, "/api/commissions", request.clone()).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["created"], true);
        assert_eq!(body["record"]["commission_amount"], 10_000);

        let (status, body) = post(&state, "/api/commissions", request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["created"], false);
        assert_eq!(state.db.accounts().get_balance("BAYI-1").await.unwrap(), Money::zero());

        let (status, body) = post(
            &state,
            "/api/commissions",
            serde_json::json!({"testId": "TEST-2", "dealerId": "BAYI-1", "grossAmount": "10.00"}),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["code"], "insufficient_balance");
    }

    #[tokio::test]
    async fn test_sweep_and_audit_routes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/status"))
            .and(body_string_contains("merchant_oid=INV-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "success",
                "payment_status": "failed",
                "fail_message": "3D dogrulama basarisiz"
            })))
            .mount(&server)
            .await;

        let state = test_state(GatewayConfig {
            provider_a: Some(provider_a_config(&server.uri())),
            ..Default::default()
        })
        .await;
        state
            .db
            .intents()
            .create("INV-1", "BAYI-1", Money::from_major(250), GatewayProvider::ProviderA)
            .await
            .unwrap();

        // Default threshold: nothing is stale yet.
        let (status, body) = post(&state, "/api/reconciliation/sweep", serde_json::json!({})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["checked"], 0);

        let (_, body) = post(&state, "/api/reconciliation/sweep", serde_json::json!({"olderThanSecs": -1})).await;
        assert_eq!(body["checked"], 1);
        assert_eq!(body["resolved"][0]["status"], "failed");

        let response = router(state.clone())
            .oneshot(Request::get("/api/reconciliation/audit").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["accountsChecked"], 1);
        // Only successful intents need a matching credit.
        assert_eq!(body["intentsChecked"], 0);
        assert_eq!(body["findings"].as_array().unwrap().len(), 0);
    }
}
