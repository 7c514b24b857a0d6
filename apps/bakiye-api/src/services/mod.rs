//! Application services between the HTTP routes and the repositories.

pub mod commission;
pub mod reconciliation;
pub mod topup;

pub use commission::CommissionService;
pub use reconciliation::{ReconciliationEngine, SweepReport};
pub use topup::{TopupMethod, TopupRequest, TopupResponse, TopupService};
