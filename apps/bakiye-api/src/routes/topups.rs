//! Top-up initiation.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::error::ApiResult;
use crate::services::{TopupMethod, TopupRequest, TopupResponse};
use crate::state::SharedState;
use bakiye_core::Money;
use bakiye_gateway::BuyerInfo;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopupBody {
    pub dealer_id: String,
    /// Decimal string, e.g. `"250.00"`.
    pub amount: String,
    pub method: TopupMethod,
    #[serde(default)]
    pub buyer: Option<BuyerInfo>,
    #[serde(default)]
    pub description: Option<String>,
}

pub async fn initiate_topup(
    State(state): State<SharedState>,
    Json(body): Json<TopupBody>,
) -> ApiResult<(StatusCode, Json<TopupResponse>)> {
    let amount: Money = body.amount.parse()?;
    let response = state
        .topups
        .initiate(TopupRequest {
            dealer_id: body.dealer_id,
            amount,
            method: body.method,
            buyer: body.buyer,
            description: body.description,
        })
        .await?;

    let status = match response {
        TopupResponse::Manual { .. } => StatusCode::CREATED,
        TopupResponse::Gateway { .. } => StatusCode::ACCEPTED,
    };
    Ok((status, Json(response)))
}

#[cfg(test)]
mod tests {
    use crate::routes::router;
    use crate::test_support::{
        form_body, json_request, provider_a_config, read_json, signed_provider_a_callback, test_state,
    };
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use bakiye_gateway::GatewayConfig;
    use tower::ServiceExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_manual_topup_scenario() {
        let state = test_state(Default::default()).await;

        for amount in ["500.00", "250.00"] {
            let response = router(state.clone())
                .oneshot(json_request(
                    "POST",
                    "/api/topups",
                    serde_json::json!({"dealerId": "BAYI-1", "amount": amount, "method": "manual"}),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::CREATED);
        }

        let response = router(state)
            .oneshot(Request::get("/api/dealers/BAYI-1/balance").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = read_json(response).await;
        assert_eq!(body["formatted"], "750.00");
        assert_eq!(body["balance"], 75_000);
    }

    #[tokio::test]
    async fn test_bad_amount_is_400() {
        let state = test_state(Default::default()).await;
        for amount in ["abc", "-5.00", "0"] {
            let response = router(state.clone())
                .oneshot(json_request(
                    "POST",
                    "/api/topups",
                    serde_json::json!({"dealerId": "BAYI-1", "amount": amount, "method": "manual"}),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "amount {}", amount);
        }
    }

    #[tokio::test]
    async fn test_timeout_then_late_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/get-token"))
            .respond_with(ResponseTemplate::new(200).set_delay(std::time::Duration::from_secs(5)))
            .mount(&server)
            .await;

        let gateway = GatewayConfig {
            request_timeout_secs: 1,
            provider_a: Some(provider_a_config(&server.uri())),
            ..Default::default()
        };
        let state = test_state(gateway).await;

        let response = router(state.clone())
            .oneshot(json_request(
                "POST",
                "/api/topups",
                serde_json::json!({"dealerId": "BAYI-1", "amount": "250.00", "method": "provider_a"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = read_json(response).await;
        assert_eq!(body["error"]["code"], "gateway_unavailable");

        let intents = state.db.intents().list_for_dealer("BAYI-1", 10).await.unwrap();
        assert_eq!(intents.len(), 1);
        let invoice_id = intents[0].invoice_id.clone();

        // The provider captured the payment anyway and reports it late.
        let fields = signed_provider_a_callback(&invoice_id, "success", "25000");
        let response = router(state.clone())
            .oneshot(
                Request::post("/api/callbacks/provider-a")
                    .header("content-type", "application/x-www-form-urlencoded")
                    .body(Body::from(form_body(&fields)))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        assert_eq!(
            state.db.accounts().get_balance("BAYI-1").await.unwrap().to_string(),
            "250.00"
        );
    }
}
