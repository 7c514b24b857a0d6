//! # Reconciliation Engine
//!
//! Turns provider outcomes into exactly one ledger credit per successful
//! invoice, however many times and in whatever order they arrive.
//!
//! ## Reconcile Unit
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN                                                                  │
//! │    UPDATE payment_intents SET status = <target>                         │
//! │      WHERE invoice_id = ? AND status = 'pending'                        │
//! │        │                                                                │
//! │        ├── 1 row ── success? ── LedgerWriter.apply_in(credit) ── COMMIT │
//! │        │             failed? ─────────────────────────────────── COMMIT │
//! │        │                                                                │
//! │        └── 0 rows ── ROLLBACK ── re-read intent                         │
//! │                        ├── absent   → UnknownIntent                     │
//! │                        └── terminal → duplicate, existing result        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The status flip and the credit share one transaction, so no error path
//! leaves a `success` intent without its entry. Lost compare-and-swap and
//! busy conditions retry the whole unit.

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::ReconcileError;
use bakiye_core::{GatewayOutcome, GatewayProvider, IntentStatus, PaymentIntent, ReconciliationResult};
use bakiye_db::repository::intent::{get_in, transition_in};
use bakiye_db::{retry_on_conflict, Database, DbResult, Mutation};
use bakiye_gateway::{GatewayRegistry, NotificationFields};

/// What one attempt of the reconcile unit observed.
enum Step {
    Applied(ReconciliationResult),
    Duplicate(PaymentIntent),
    Unknown,
}

/// Summary of one operator sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub checked: u32,
    pub resolved: Vec<ReconciliationResult>,
    pub still_pending: u32,
    pub errors: u32,
}

#[derive(Debug, Clone)]
pub struct ReconciliationEngine {
    db: Database,
    gateways: GatewayRegistry,
}

impl ReconciliationEngine {
    pub fn new(db: Database, gateways: GatewayRegistry) -> Self {
        ReconciliationEngine { db, gateways }
    }

    /// Drives the intent to the outcome's terminal state.
    ///
    /// ## Rules
    /// - Unknown invoice: `UnknownIntent`, nothing written
    /// - Already terminal: existing result with `applied = false`
    /// - Success: intent flip plus credit of the requested amount
    /// - Failure: intent flip only
    pub async fn reconcile(
        &self,
        invoice_id: &str,
        outcome: &GatewayOutcome,
    ) -> Result<ReconciliationResult, ReconcileError> {
        let retry = self.db.ledger_config().retry;
        let step = retry_on_conflict(&retry, "reconcile", move || self.reconcile_once(invoice_id, outcome)).await?;

        match step {
            Step::Applied(result) => Ok(result),
            Step::Duplicate(intent) => {
                info!(
                    invoice_id,
                    status = %intent.status,
                    "Duplicate notification for resolved intent, nothing applied"
                );
                Ok(self.existing_result(&intent).await?)
            }
            Step::Unknown => {
                warn!(invoice_id, "Notification for unknown intent dropped");
                Err(ReconcileError::UnknownIntent(invoice_id.to_string()))
            }
        }
    }

    async fn reconcile_once(&self, invoice_id: &str, outcome: &GatewayOutcome) -> DbResult<Step> {
        let mut tx = self.db.begin().await?;

        let reason = match outcome {
            GatewayOutcome::Success => None,
            GatewayOutcome::Failed { reason } => reason.as_deref(),
        };

        if !transition_in(&mut *tx, invoice_id, outcome.target_status(), reason).await? {
            tx.rollback().await?;
            let mut conn = self.db.pool().acquire().await?;
            return Ok(match get_in(&mut *conn, invoice_id).await? {
                Some(intent) => Step::Duplicate(intent),
                None => Step::Unknown,
            });
        }

        let intent = get_in(&mut *tx, invoice_id)
            .await?
            .ok_or_else(|| bakiye_db::DbError::not_found("PaymentIntent", invoice_id))?;

        let result = match outcome {
            GatewayOutcome::Success => {
                let credit = Mutation::new(&intent.dealer_id, intent.requested_amount, intent.provider.topup_kind())
                    .reference(invoice_id)
                    .description(format!("Card top-up via {}", intent.provider));
                let entry = self.db.ledger().apply_in(&mut *tx, &credit).await?;
                tx.commit().await?;

                info!(
                    invoice_id,
                    dealer_id = %intent.dealer_id,
                    amount = %intent.requested_amount,
                    new_balance = %entry.balance_after,
                    entry_id = entry.id,
                    "Payment reconciled, balance credited"
                );

                ReconciliationResult {
                    invoice_id: invoice_id.to_string(),
                    status: IntentStatus::Success,
                    applied: true,
                    ledger_entry_id: Some(entry.id),
                    new_balance: Some(entry.balance_after),
                }
            }
            GatewayOutcome::Failed { reason } => {
                tx.commit().await?;
                info!(invoice_id, dealer_id = %intent.dealer_id, ?reason, "Payment failed, intent closed");

                ReconciliationResult {
                    invoice_id: invoice_id.to_string(),
                    status: IntentStatus::Failed,
                    applied: true,
                    ledger_entry_id: None,
                    new_balance: None,
                }
            }
        };

        Ok(Step::Applied(result))
    }

    /// Result of an intent that was resolved earlier.
    async fn existing_result(&self, intent: &PaymentIntent) -> DbResult<ReconciliationResult> {
        let entry = match intent.status {
            IntentStatus::Success => {
                self.db
                    .queries()
                    .entry_for_reference(intent.provider.topup_kind(), &intent.invoice_id)
                    .await?
            }
            _ => None,
        };

        Ok(ReconciliationResult {
            invoice_id: intent.invoice_id.clone(),
            status: intent.status,
            applied: false,
            ledger_entry_id: entry.as_ref().map(|e| e.id),
            new_balance: entry.map(|e| e.balance_after),
        })
    }

    /// Verifies a provider notification and reconciles it.
    ///
    /// ## Errors
    /// - `Gateway(InvalidSignature | MalformedNotification)`: nothing applied
    /// - `ProviderMismatch`: the invoice was issued through another provider
    /// - `UnknownIntent`
    pub async fn handle_notification(
        &self,
        provider: GatewayProvider,
        fields: &NotificationFields,
    ) -> Result<ReconciliationResult, ReconcileError> {
        let adapter = self.gateways.get(provider)?;
        let notification = adapter.verify_notification(fields)?;
        let invoice_id = notification.invoice_id.as_str();

        let intent = self
            .db
            .intents()
            .get(invoice_id)
            .await?
            .ok_or_else(|| ReconcileError::UnknownIntent(invoice_id.to_string()))?;

        if intent.provider != provider {
            warn!(invoice_id, expected = %intent.provider, actual = %provider, "Notification from wrong provider");
            return Err(ReconcileError::ProviderMismatch {
                invoice_id: invoice_id.to_string(),
                expected: intent.provider,
                actual: provider,
            });
        }

        if let Some(reported) = notification.reported_amount {
            if reported != intent.requested_amount {
                warn!(
                    invoice_id,
                    requested = %intent.requested_amount,
                    reported = %reported,
                    "Provider reported a different amount, crediting the requested amount"
                );
            }
        }

        debug!(invoice_id, %provider, outcome = ?notification.outcome, "Notification verified");
        self.reconcile(invoice_id, &notification.outcome).await
    }

    /// Asks providers about pending intents older than `older_than` and
    /// reconciles every final answer. Unknown outcomes stay pending.
    pub async fn sweep_stale(&self, older_than: chrono::Duration, limit: u32) -> Result<SweepReport, ReconcileError> {
        let cutoff = Utc::now() - older_than;
        let stale = self.db.intents().list_stale(cutoff, limit).await?;
        let mut report = SweepReport::default();

        for intent in stale {
            report.checked += 1;

            let adapter = match self.gateways.get(intent.provider) {
                Ok(adapter) => adapter,
                Err(e) => {
                    warn!(invoice_id = %intent.invoice_id, error = %e, "No adapter for stale intent");
                    report.still_pending += 1;
                    continue;
                }
            };

            match adapter.fetch_status(&intent.invoice_id).await {
                Ok(Some(outcome)) => match self.reconcile(&intent.invoice_id, &outcome).await {
                    Ok(result) => report.resolved.push(result),
                    Err(e) => {
                        warn!(invoice_id = %intent.invoice_id, error = %e, "Sweep reconcile failed");
                        report.errors += 1;
                    }
                },
                Ok(None) => report.still_pending += 1,
                Err(e) => {
                    warn!(invoice_id = %intent.invoice_id, error = %e, "Status query failed, intent left pending");
                    report.errors += 1;
                }
            }
        }

        info!(
            checked = report.checked,
            resolved = report.resolved.len(),
            still_pending = report.still_pending,
            errors = report.errors,
            "Stale intent sweep finished"
        );

        Ok(report)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
