//! Dealer account routes.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::state::SharedState;
use bakiye_core::{BalanceAccount, Money};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDealerRequest {
    pub dealer_id: String,
    pub company_id: String,
    pub display_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    pub dealer_id: String,
    /// Minor units.
    pub balance: Money,
    pub formatted: String,
}

pub async fn create_dealer(
    State(state): State<SharedState>,
    Json(request): Json<CreateDealerRequest>,
) -> ApiResult<(StatusCode, Json<BalanceAccount>)> {
    let account = state
        .db
        .accounts()
        .create_account(&request.dealer_id, &request.company_id, &request.display_name)
        .await?;
    Ok((StatusCode::CREATED, Json(account)))
}

pub async fn balance(State(state): State<SharedState>, Path(dealer_id): Path<String>) -> ApiResult<Json<BalanceResponse>> {
    let balance = state.db.queries().balance(&dealer_id).await?;
    Ok(Json(BalanceResponse {
        dealer_id,
        balance,
        formatted: balance.to_string(),
    }))
}
