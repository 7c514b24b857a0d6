//! # Domain Types
//!
//! Core domain types of the balance subsystem.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │ BalanceAccount  │   │   LedgerEntry   │   │  PaymentIntent  │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  dealer_id      │◄──│  dealer_id      │   │  invoice_id     │       │
//! │  │  company_id     │   │  amount         │   │  dealer_id      │       │
//! │  │  current_balance│   │  balance_before │   │  provider       │       │
//! │  │  is_active      │   │  balance_after  │   │  status         │       │
//! │  └─────────────────┘   │  kind           │   └────────┬────────┘       │
//! │                        │  external_ref ◄─┼────────────┘ (on success)   │
//! │                        └─────────────────┘                              │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │ CommissionRate  │   │   LedgerKind    │   │  IntentStatus   │       │
//! │  │  bps (u32)      │   │  ManualTopup    │   │  Pending        │       │
//! │  │  1000 = 10%     │   │  GatewayTopupA  │   │  Success        │       │
//! │  └─────────────────┘   │  GatewayTopupB  │   │  Failed         │       │
//! │                        │  CommissionDebit│   └─────────────────┘       │
//! │                        └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;

// =============================================================================
// Commission Rate
// =============================================================================

/// Upper bound of a commission rate: 100% in basis points.
pub const MAX_RATE_BPS: u32 = 10_000;

/// Commission rate in basis points (1 bps = 0.01%).
///
/// `1000` is 10%, `250` is 2.5%. Values are always within `[0, 10000]`;
/// out-of-range inputs are clamped by [`CommissionRate::clamped`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CommissionRate(u32);

impl CommissionRate {
    /// Creates a rate from basis points, clamping to 100%.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        if bps > MAX_RATE_BPS {
            CommissionRate(MAX_RATE_BPS)
        } else {
            CommissionRate(bps)
        }
    }

    /// Creates a rate from a percentage, clamping to `[0, 100]`.
    pub fn from_percentage(pct: f64) -> Self {
        Self::clamped((pct * 100.0).round() as i64).0
    }

    /// Clamps a raw basis-point value (possibly negative or above 100%).
    ///
    /// Returns the rate and whether clamping happened.
    pub fn clamped(raw_bps: i64) -> (Self, bool) {
        if raw_bps < 0 {
            (CommissionRate(0), true)
        } else if raw_bps > MAX_RATE_BPS as i64 {
            (CommissionRate(MAX_RATE_BPS), true)
        } else {
            (CommissionRate(raw_bps as u32), false)
        }
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    #[inline]
    pub const fn zero() -> Self {
        CommissionRate(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for CommissionRate {
    fn default() -> Self {
        CommissionRate::zero()
    }
}

// =============================================================================
// Ledger Kind
// =============================================================================

/// Why a ledger entry exists.
///
/// Always set at write time; there is no "unknown" kind and no backfill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum LedgerKind {
    /// Operator-entered top-up.
    ManualTopup,
    /// Card top-up confirmed by provider A.
    GatewayTopupProviderA,
    /// Card top-up confirmed by provider B.
    GatewayTopupProviderB,
    /// Commission charged for a billable test event.
    CommissionDebit,
}

impl LedgerKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            LedgerKind::ManualTopup => "manual_topup",
            LedgerKind::GatewayTopupProviderA => "gateway_topup_provider_a",
            LedgerKind::GatewayTopupProviderB => "gateway_topup_provider_b",
            LedgerKind::CommissionDebit => "commission_debit",
        }
    }

    /// Gateway kinds carry the intent's invoice id as external reference.
    pub const fn is_gateway(&self) -> bool {
        matches!(
            self,
            LedgerKind::GatewayTopupProviderA | LedgerKind::GatewayTopupProviderB
        )
    }

    /// Whether entries of this kind move money into the account.
    pub const fn is_credit(&self) -> bool {
        !matches!(self, LedgerKind::CommissionDebit)
    }
}

impl fmt::Display for LedgerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LedgerKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual_topup" => Ok(LedgerKind::ManualTopup),
            "gateway_topup_provider_a" => Ok(LedgerKind::GatewayTopupProviderA),
            "gateway_topup_provider_b" => Ok(LedgerKind::GatewayTopupProviderB),
            "commission_debit" => Ok(LedgerKind::CommissionDebit),
            _ => Err(ValidationError::NotAllowed {
                field: "kind".to_string(),
                allowed: vec![
                    "manual_topup".to_string(),
                    "gateway_topup_provider_a".to_string(),
                    "gateway_topup_provider_b".to_string(),
                    "commission_debit".to_string(),
                ],
            }),
        }
    }
}

// =============================================================================
// Gateway Provider
// =============================================================================

/// External card-payment provider that funded a top-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum GatewayProvider {
    ProviderA,
    ProviderB,
}

impl GatewayProvider {
    pub const fn as_str(&self) -> &'static str {
        match self {
            GatewayProvider::ProviderA => "provider_a",
            GatewayProvider::ProviderB => "provider_b",
        }
    }

    /// Ledger kind written when this provider confirms a payment.
    pub const fn topup_kind(&self) -> LedgerKind {
        match self {
            GatewayProvider::ProviderA => LedgerKind::GatewayTopupProviderA,
            GatewayProvider::ProviderB => LedgerKind::GatewayTopupProviderB,
        }
    }
}

impl fmt::Display for GatewayProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GatewayProvider {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "provider_a" => Ok(GatewayProvider::ProviderA),
            "provider_b" => Ok(GatewayProvider::ProviderB),
            _ => Err(ValidationError::NotAllowed {
                field: "provider".to_string(),
                allowed: vec!["provider_a".to_string(), "provider_b".to_string()],
            }),
        }
    }
}

// =============================================================================
// Intent Status
// =============================================================================

/// Lifecycle of a payment intent.
///
/// ```text
///            ┌──────────► Success (terminal)
///  Pending ──┤
///            └──────────► Failed  (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum IntentStatus {
    Pending,
    Success,
    Failed,
}

impl IntentStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            IntentStatus::Pending => "pending",
            IntentStatus::Success => "success",
            IntentStatus::Failed => "failed",
        }
    }

    #[inline]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, IntentStatus::Pending)
    }

    /// Only `Pending -> Success` and `Pending -> Failed` are legal.
    pub const fn can_transition_to(&self, next: IntentStatus) -> bool {
        matches!(
            (self, next),
            (IntentStatus::Pending, IntentStatus::Success)
                | (IntentStatus::Pending, IntentStatus::Failed)
        )
    }
}

impl Default for IntentStatus {
    fn default() -> Self {
        IntentStatus::Pending
    }
}

impl fmt::Display for IntentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Gateway Outcome
// =============================================================================

/// What a provider said about a payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GatewayOutcome {
    Success,
    Failed { reason: Option<String> },
}

impl GatewayOutcome {
    pub fn failed(reason: impl Into<String>) -> Self {
        GatewayOutcome::Failed {
            reason: Some(reason.into()),
        }
    }

    /// Terminal intent status this outcome drives to.
    pub const fn target_status(&self) -> IntentStatus {
        match self {
            GatewayOutcome::Success => IntentStatus::Success,
            GatewayOutcome::Failed { .. } => IntentStatus::Failed,
        }
    }
}

// =============================================================================
// Balance Account
// =============================================================================

/// One prepaid balance per dealer.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct BalanceAccount {
    pub dealer_id: String,
    pub company_id: String,
    pub display_name: String,
    pub current_balance: Money,
    /// Deactivated dealers keep their history.
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Ledger Entry
// =============================================================================

/// An immutable record of one balance mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct LedgerEntry {
    /// Monotonic id; also the chain order within a dealer.
    pub id: i64,
    pub dealer_id: String,
    /// Signed: negative for debits.
    pub amount: Money,
    pub balance_before: Money,
    pub balance_after: Money,
    pub kind: LedgerKind,
    /// Invoice id for gateway top-ups, test id for commissions.
    pub external_reference: Option<String>,
    pub description: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// `balance_after == balance_before + amount`
    pub fn is_balanced(&self) -> bool {
        self.balance_before.checked_add(self.amount) == Some(self.balance_after)
    }
}

// =============================================================================
// Payment Intent
// =============================================================================

/// One outbound payment attempt to a gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PaymentIntent {
    /// Idempotency key; unique across all providers.
    pub invoice_id: String,
    pub dealer_id: String,
    pub requested_amount: Money,
    pub provider: GatewayProvider,
    pub status: IntentStatus,
    /// Opaque provider-issued token.
    pub gateway_token: Option<String>,
    pub failure_reason: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub resolved_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Commission Record
// =============================================================================

/// Commission computed for one billable test event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CommissionRecord {
    pub test_id: String,
    pub dealer_id: String,
    pub company_id: String,
    /// Applied rate in basis points.
    pub rate_bps: i64,
    pub gross_amount: Money,
    pub commission_amount: Money,
    /// `None` when the commission was zero and no entry was written.
    pub ledger_entry_id: Option<i64>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl CommissionRecord {
    pub fn rate(&self) -> CommissionRate {
        CommissionRate::clamped(self.rate_bps).0
    }
}

// =============================================================================
// Reconciliation Result
// =============================================================================

/// Outcome of reconciling one gateway notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationResult {
    pub invoice_id: String,
    pub status: IntentStatus,
    /// `false` for duplicate notifications on an already terminal intent.
    pub applied: bool,
    pub ledger_entry_id: Option<i64>,
    /// Balance after the top-up (success only).
    pub new_balance: Option<Money>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commission_rate_clamping() {
        assert_eq!(CommissionRate::from_bps(12_000).bps(), MAX_RATE_BPS);
        assert_eq!(CommissionRate::clamped(-5), (CommissionRate::zero(), true));
        assert_eq!(CommissionRate::clamped(250), (CommissionRate::from_bps(250), false));
        assert_eq!(CommissionRate::from_percentage(150.0).bps(), MAX_RATE_BPS);
        assert_eq!(CommissionRate::from_percentage(2.5).bps(), 250);
    }

    #[test]
    fn test_intent_transitions() {
        assert!(IntentStatus::Pending.can_transition_to(IntentStatus::Success));
        assert!(IntentStatus::Pending.can_transition_to(IntentStatus::Failed));
        assert!(!IntentStatus::Success.can_transition_to(IntentStatus::Failed));
        assert!(!IntentStatus::Failed.can_transition_to(IntentStatus::Success));
        assert!(!IntentStatus::Pending.can_transition_to(IntentStatus::Pending));
        assert!(IntentStatus::Success.is_terminal());
        assert!(!IntentStatus::default().is_terminal());
    }

    #[test]
    fn test_provider_kind_mapping() {
        assert_eq!(
            GatewayProvider::ProviderA.topup_kind(),
            LedgerKind::GatewayTopupProviderA
        );
        assert!(GatewayProvider::ProviderB.topup_kind().is_gateway());
        assert!(!LedgerKind::CommissionDebit.is_credit());
        assert!(!LedgerKind::ManualTopup.is_gateway());
    }

    #[test]
    fn test_kind_string_forms_agree_with_serde() {
        for kind in [
            LedgerKind::ManualTopup,
            LedgerKind::GatewayTopupProviderA,
            LedgerKind::GatewayTopupProviderB,
            LedgerKind::CommissionDebit,
        ] {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
            assert_eq!(kind.as_str().parse::<LedgerKind>().unwrap(), kind);
        }
        assert!("refund".parse::<LedgerKind>().is_err());
        assert_eq!("provider_b".parse::<GatewayProvider>().unwrap(), GatewayProvider::ProviderB);
    }

    #[test]
    fn test_outcome_targets() {
        assert_eq!(GatewayOutcome::Success.target_status(), IntentStatus::Success);
        assert_eq!(
            GatewayOutcome::failed("card declined").target_status(),
            IntentStatus::Failed
        );
    }

    #[test]
    fn test_ledger_entry_balanced() {
        let entry = LedgerEntry {
            id: 1,
            dealer_id: "D1".to_string(),
            amount: Money::from_major(250),
            balance_before: Money::from_major(500),
            balance_after: Money::from_major(750),
            kind: LedgerKind::ManualTopup,
            external_reference: None,
            description: None,
            created_at: Utc::now(),
        };
        assert!(entry.is_balanced());

        let broken = LedgerEntry {
            balance_after: Money::from_major(700),
            ..entry
        };
        assert!(!broken.is_balanced());
    }
}
