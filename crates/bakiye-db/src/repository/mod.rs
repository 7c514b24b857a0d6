//! # Repository Module
//!
//! Database access for the balance ledger, one repository per concern.
//!
//! ## Write Paths
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  LedgerWriter ──────────────► ledger_entries (INSERT only)              │
//! │       │                                                                 │
//! │       └── compare_and_swap ─► balance_accounts.current_balance          │
//! │                                                                         │
//! │  BalanceStore ──────────────► balance_accounts (create, is_active)      │
//! │  IntentRepository ──────────► payment_intents (pending → terminal CAS)  │
//! │  CommissionRepository ──────► commission_rates, commission_records      │
//! │                               (debits go through LedgerWriter)          │
//! │                                                                         │
//! │  BalanceQueryService, ConsistencyAudit: read only                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`BalanceStore`](balance::BalanceStore) - Accounts and balance reads
//! - [`LedgerWriter`](ledger::LedgerWriter) - The only balance writer
//! - [`IntentRepository`](intent::IntentRepository) - Payment intents
//! - [`CommissionRepository`](commission::CommissionRepository) - Rates and billing
//! - [`BalanceQueryService`](history::BalanceQueryService) - History, rollups
//! - [`ConsistencyAudit`](audit::ConsistencyAudit) - Invariant checks

pub mod audit;
pub mod balance;
pub mod commission;
pub mod history;
pub mod intent;
pub mod ledger;
