//! # bakiye-core: Pure Business Logic for Dealer Balances
//!
//! Money, ledger rules, commission math and report folding for the dealer
//! balance subsystem. Zero I/O: storage and gateway traffic live in the
//! crates above this one.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Bakiye Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    bakiye-api (axum)                            │   │
//! │  │   top-ups ─► gateway ─► callbacks ─► reconcile ─► reports      │   │
//! │  └──────────────┬──────────────────────────────┬───────────────────┘   │
//! │                 │                              │                        │
//! │  ┌──────────────▼───────────┐   ┌──────────────▼───────────────────┐   │
//! │  │  bakiye-db (SQLite)      │   │  bakiye-gateway (reqwest, HMAC)  │   │
//! │  │  LedgerWriter, queries   │   │  provider A, provider B          │   │
//! │  └──────────────┬───────────┘   └──────────────┬───────────────────┘   │
//! │                 │                              │                        │
//! │  ┌──────────────▼──────────────────────────────▼───────────────────┐   │
//! │  │               ★ bakiye-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌────────────┐ ┌────────┐ ┌────────┐ │   │
//! │  │   │  money  │ │  types  │ │ commission │ │ ledger │ │ report │ │   │
//! │  │   └─────────┘ └─────────┘ └────────────┘ └────────┘ └────────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Accounts, ledger entries, intents, commission records
//! - [`money`] - Money in minor units (no floating point)
//! - [`ledger`] - Overdraft policy and chain verification
//! - [`commission`] - Rate resolution and commission math
//! - [`report`] - History filters, pages, monthly rollups
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Example Usage
//!
//! ```rust
//! use bakiye_core::ledger::{next_balance, OverdraftPolicy};
//! use bakiye_core::money::Money;
//!
//! let before = Money::parse_decimal("500.00").unwrap();
//! let after = next_balance("BAYI-1", before, Money::from_major(250), OverdraftPolicy::Reject).unwrap();
//! assert_eq!(after.to_string(), "750.00");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod commission;
pub mod error;
pub mod ledger;
pub mod money;
pub mod report;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use ledger::OverdraftPolicy;
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// ISO 4217 code of every balance in the system.
pub const DEFAULT_CURRENCY: &str = "TRY";

/// Largest single top-up accepted (1,000,000.00).
pub const MAX_TOPUP_AMOUNT: Money = Money::from_major(1_000_000);

/// Largest history page a caller may request.
pub const MAX_PAGE_SIZE: u32 = 200;
