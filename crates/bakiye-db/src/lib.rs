//! # bakiye-db: Ledger & Storage Layer
//!
//! SQLite storage for dealer balances, the append-only ledger, payment
//! intents and commissions, through sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Bakiye Data Flow                                 │
//! │                                                                         │
//! │  bakiye-api service (reconcile, top-up, commission, reports)           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     bakiye-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories  │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │                │    │  (embedded)  │  │   │
//! │  │   │               │    │ LedgerWriter   │    │ 001 ledger   │  │   │
//! │  │   │ SqlitePool    │◄───│ BalanceStore   │    │ 002 intents  │  │   │
//! │  │   │ WAL, busy     │    │ Intents, Audit │    │ 003 commiss. │  │   │
//! │  │   └───────────────┘    └────────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database file (bakiye.db)                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`retry`] - Backoff around lost compare-and-swap and busy errors
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bakiye_db::{Database, DbConfig, Mutation};
//! use bakiye_core::Money;
//!
//! let db = Database::new(DbConfig::new("bakiye.db")).await?;
//! db.accounts().create_account("BAYI-1", "FIRMA-1", "Bayi Bir").await?;
//! let entry = db.ledger()
//!     .apply_mutation(&Mutation::manual_topup("BAYI-1", Money::from_major(500)))
//!     .await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod retry;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use retry::{retry_on_conflict, RetryPolicy};

// Repository re-exports for convenience
pub use repository::audit::{AuditFinding, AuditReport, ConsistencyAudit};
pub use repository::balance::BalanceStore;
pub use repository::commission::{BillingOutcome, CommissionRepository, RateScope};
pub use repository::history::BalanceQueryService;
pub use repository::intent::IntentRepository;
pub use repository::ledger::{LedgerConfig, LedgerWriter, Mutation};
