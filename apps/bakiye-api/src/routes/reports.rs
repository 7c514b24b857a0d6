//! Read-only reporting routes.

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::ApiResult;
use crate::state::SharedState;
use bakiye_core::report::{HistoryFilter, HistorySort, MonthlyRollup, Page};
use bakiye_core::validation::validate_paging;
use bakiye_core::{BalanceAccount, LedgerEntry, LedgerKind, Money, ValidationError, MAX_PAGE_SIZE};

/// Default number of rows for `/api/balances/top`.
const DEFAULT_TOP_LIMIT: u32 = 10;

/// `/api/history` query string. Amounts are decimal strings.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    pub dealer_id: Option<String>,
    pub company_id: Option<String>,
    pub kind: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub min_amount: Option<String>,
    pub max_amount: Option<String>,
    pub sort: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl HistoryQuery {
    pub fn into_filter(self) -> Result<HistoryFilter, ValidationError> {
        let (page, page_size) = validate_paging(self.page, self.page_size)?;
        Ok(HistoryFilter {
            dealer_id: non_empty(self.dealer_id),
            company_id: non_empty(self.company_id),
            kind: non_empty(self.kind).map(|k| k.parse::<LedgerKind>()).transpose()?,
            from: self.from,
            to: self.to,
            min_amount: non_empty(self.min_amount).map(|a| a.parse::<Money>()).transpose()?,
            max_amount: non_empty(self.max_amount).map(|a| a.parse::<Money>()).transpose()?,
            sort: non_empty(self.sort).map(|s| s.parse::<HistorySort>()).transpose()?.unwrap_or_default(),
            page,
            page_size,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

pub async fn history(
    State(state): State<SharedState>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<Page<LedgerEntry>>> {
    let filter = query.into_filter()?;
    Ok(Json(state.db.queries().history(&filter).await?))
}

#[derive(Debug, Deserialize)]
pub struct RollupQuery {
    pub year: i32,
    pub month: u32,
}

pub async fn monthly_rollup(
    State(state): State<SharedState>,
    Path(dealer_id): Path<String>,
    Query(query): Query<RollupQuery>,
) -> ApiResult<Json<MonthlyRollup>> {
    let rollup = state
        .db
        .queries()
        .monthly_rollup(&dealer_id, query.year, query.month)
        .await?;
    Ok(Json(rollup))
}

#[derive(Debug, Default, Deserialize)]
pub struct TopQuery {
    pub limit: Option<u32>,
}

pub async fn top_balances(
    State(state): State<SharedState>,
    Query(query): Query<TopQuery>,
) -> ApiResult<Json<Vec<BalanceAccount>>> {
    let limit = query.limit.unwrap_or(DEFAULT_TOP_LIMIT).clamp(1, MAX_PAGE_SIZE);
    Ok(Json(state.db.queries().top_balances(limit).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::router;
    use crate::test_support::{read_json, test_state};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use bakiye_db::Mutation;
    use chrono::Datelike;
    use tower::ServiceExt;

    async fn get(state: &SharedState, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = router(state.clone())
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        (status, read_json(response).await)
    }

    async fn seeded() -> SharedState {
        let state = test_state(Default::default()).await;
        state.db.accounts().create_account("BAYI-2", "FIRMA-2", "Diger").await.unwrap();
        let ledger = state.db.ledger();
        ledger
            .apply_mutation(&Mutation::manual_topup("BAYI-1", Money::from_major(500)))
            .await
            .unwrap();
        ledger
            .apply_mutation(&Mutation::manual_topup("BAYI-1", Money::from_major(250)))
            .await
            .unwrap();
        ledger
            .apply_mutation(
                &Mutation::new("BAYI-1", Money::from_major(-20), LedgerKind::CommissionDebit).reference("T-1"),
            )
            .await
            .unwrap();
        ledger
            .apply_mutation(&Mutation::manual_topup("BAYI-2", Money::from_major(1_000)))
            .await
            .unwrap();
        state
    }

    #[test]
    fn test_history_query_parsing() {
        let filter = HistoryQuery {
            kind: Some("commission_debit".into()),
            min_amount: Some("-50.00".into()),
            sort: Some("amount_asc".into()),
            dealer_id: Some("  ".into()),
            ..Default::default()
        }
        .into_filter()
        .unwrap();
        assert_eq!(filter.kind, Some(LedgerKind::CommissionDebit));
        assert_eq!(filter.min_amount, Some(Money::from_major(-50)));
        assert_eq!(filter.sort, HistorySort::AmountAsc);
        assert_eq!(filter.dealer_id, None);
        assert_eq!((filter.page, filter.page_size), (1, 20));

        let bad = HistoryQuery {
            sort: Some("sideways".into()),
            ..Default::default()
        };
        assert!(bad.into_filter().is_err());
    }

    #[tokio::test]
    async fn test_history_filters_and_pages() {
        let state = seeded().await;

        let (status, body) = get(&state, "/api/history?dealerId=BAYI-1&pageSize=2").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 3);
        assert_eq!(body["totalPages"], 2);
        assert_eq!(body["items"].as_array().unwrap().len(), 2);
        // Newest first by default.
        assert_eq!(body["items"][0]["kind"], "commission_debit");

        let (_, body) = get(&state, "/api/history?kind=manual_topup&sort=amount_desc").await;
        assert_eq!(body["total"], 3);
        assert_eq!(body["items"][0]["dealer_id"], "BAYI-2");

        let (_, body) = get(&state, "/api/history?companyId=FIRMA-2").await;
        assert_eq!(body["total"], 1);

        let (status, body) = get(&state, "/api/history?pageSize=1000").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "validation");
    }

    #[tokio::test]
    async fn test_rollup_and_top_balances() {
        let state = seeded().await;
        let now = Utc::now();

        let (status, body) = get(
            &state,
            &format!("/api/dealers/BAYI-1/rollup?year={}&month={}", now.year(), now.month()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["openingBalance"], 0);
        assert_eq!(body["credits"], 75_000);
        assert_eq!(body["debits"], 2_000);
        assert_eq!(body["closingBalance"], 73_000);
        assert_eq!(body["entryCount"], 3);

        let (status, _) = get(&state, "/api/dealers/BAYI-1/rollup?year=2026&month=13").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = get(&state, "/api/balances/top?limit=1").await;
        assert_eq!(status, StatusCode::OK);
        let top = body.as_array().unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0]["dealer_id"], "BAYI-2");
    }
}
