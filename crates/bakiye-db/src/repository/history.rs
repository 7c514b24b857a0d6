//! # Balance Query Service
//!
//! Read-only reporting over the ledger. Nothing in this module writes.
//!
//! ## Query Shapes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  history(filter)                                                        │
//! │    SELECT ... FROM ledger_entries                                       │
//! │    WHERE [dealer] [company] [kind] [from..to) [min..=max amount]        │
//! │    ORDER BY <sort>, id  LIMIT page_size OFFSET (page-1)*page_size       │
//! │    + COUNT(*) with the same WHERE for total / total_pages               │
//! │                                                                         │
//! │  monthly_rollup(dealer, year, month)                                    │
//! │    opening = balance_after of newest entry before the month (or 0)     │
//! │    entries in [month start, next month start) folded in id order        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::balance::BalanceStore;
use bakiye_core::report::{HistoryFilter, HistorySort, MonthlyRollup, Page, Period};
use bakiye_core::{BalanceAccount, LedgerEntry, LedgerKind, Money};

const ENTRY_COLUMNS: &str = "id, dealer_id, amount, balance_before, balance_after, kind, \
                             external_reference, description, created_at";

/// Read-only ledger reporting.
#[derive(Debug, Clone)]
pub struct BalanceQueryService {
    pool: SqlitePool,
}

impl BalanceQueryService {
    pub fn new(pool: SqlitePool) -> Self {
        BalanceQueryService { pool }
    }

    /// One page of ledger history.
    pub async fn history(&self, filter: &HistoryFilter) -> DbResult<Page<LedgerEntry>> {
        filter.validate()?;

        let mut count_query: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT COUNT(*) FROM ledger_entries");
        push_filters(&mut count_query, filter);
        let total: i64 = count_query.build_query_scalar().fetch_one(&self.pool).await?;

        let mut page_query: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {ENTRY_COLUMNS} FROM ledger_entries"));
        push_filters(&mut page_query, filter);
        page_query.push(order_clause(filter.sort));
        page_query.push(" LIMIT ");
        page_query.push_bind(filter.page_size as i64);
        page_query.push(" OFFSET ");
        page_query.push_bind(filter.offset());

        let items: Vec<LedgerEntry> = page_query.build_query_as().fetch_all(&self.pool).await?;

        debug!(
            dealer_id = ?filter.dealer_id,
            sort = %filter.sort,
            page = filter.page,
            returned = items.len(),
            total,
            "History query"
        );

        Ok(Page::new(items, total, filter.page, filter.page_size))
    }

    /// Opening, movement and closing of one dealer for one month.
    pub async fn monthly_rollup(&self, dealer_id: &str, year: i32, month: u32) -> DbResult<MonthlyRollup> {
        let period = Period::new(year, month)?;
        let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM balance_accounts WHERE dealer_id = ?1")
            .bind(dealer_id)
            .fetch_optional(&self.pool)
            .await?;
        if exists.is_none() {
            return Err(DbError::DealerNotFound(dealer_id.to_string()));
        }

        let (start, end) = period.bounds();

        let opening: Option<Money> = sqlx::query_scalar(
            r#"
            SELECT balance_after FROM ledger_entries
            WHERE dealer_id = ?1 AND created_at < ?2
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(dealer_id)
        .bind(start)
        .fetch_optional(&self.pool)
        .await?;

        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM ledger_entries
             WHERE dealer_id = ?1 AND created_at >= ?2 AND created_at < ?3
             ORDER BY created_at, id"
        );
        let entries: Vec<LedgerEntry> = sqlx::query_as(&sql)
            .bind(dealer_id)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await?;

        debug!(dealer_id, year, month, entries = entries.len(), "Monthly rollup");

        Ok(MonthlyRollup::fold(
            dealer_id,
            period,
            opening.unwrap_or_default(),
            &entries,
        ))
    }

    /// Highest balances among active dealers.
    pub async fn top_balances(&self, limit: u32) -> DbResult<Vec<BalanceAccount>> {
        BalanceStore::new(self.pool.clone()).top_balances(limit).await
    }

    /// Current balance of one dealer.
    pub async fn balance(&self, dealer_id: &str) -> DbResult<Money> {
        BalanceStore::new(self.pool.clone()).get_balance(dealer_id).await
    }

    /// The entry of `kind` carrying `reference`, e.g. the credit written for
    /// an invoice id.
    pub async fn entry_for_reference(&self, kind: LedgerKind, reference: &str) -> DbResult<Option<LedgerEntry>> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM ledger_entries
             WHERE kind = ?1 AND external_reference = ?2
             ORDER BY id
             LIMIT 1"
        );
        let entry = sqlx::query_as::<_, LedgerEntry>(&sql)
            .bind(kind)
            .bind(reference)
            .fetch_optional(&self.pool)
            .await?;
        Ok(entry)
    }
}

fn push_filters(query: &mut QueryBuilder<'_, Sqlite>, filter: &HistoryFilter) {
    let mut first = true;
    let mut clause = |query: &mut QueryBuilder<'_, Sqlite>| {
        query.push(if first { " WHERE " } else { " AND " });
        first = false;
    };

    if let Some(dealer_id) = &filter.dealer_id {
        clause(query);
        query.push("dealer_id = ").push_bind(dealer_id.clone());
    }
    if let Some(company_id) = &filter.company_id {
        clause(query);
        query
            .push("dealer_id IN (SELECT dealer_id FROM balance_accounts WHERE company_id = ")
            .push_bind(company_id.clone())
            .push(")");
    }
    if let Some(kind) = filter.kind {
        clause(query);
        query.push("kind = ").push_bind(kind);
    }
    if let Some(from) = filter.from {
        clause(query);
        query.push("created_at >= ").push_bind(from);
    }
    if let Some(to) = filter.to {
        clause(query);
        query.push("created_at < ").push_bind(to);
    }
    if let Some(min) = filter.min_amount {
        clause(query);
        query.push("amount >= ").push_bind(min);
    }
    if let Some(max) = filter.max_amount {
        clause(query);
        query.push("amount <= ").push_bind(max);
    }
}

fn order_clause(sort: HistorySort) -> &'static str {
    match sort {
        HistorySort::DateAsc => " ORDER BY created_at ASC, id ASC",
        HistorySort::DateDesc => " ORDER BY created_at DESC, id DESC",
        HistorySort::AmountAsc => " ORDER BY amount ASC, id ASC",
        HistorySort::AmountDesc => " ORDER BY amount DESC, id DESC",
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
