//! Transaction applier: executes an allocation plan against the ledger store
//!
//! Each step locks one batch, checks the resulting quantity and writes the
//! batch together with its ledger row. In per-step mode a failure after the
//! first committed step is reported as [`AppError::PartialConsumption`];
//! in atomic mode the whole plan commits or nothing does.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use shared::allocation::Plan;
use shared::LedgerEntry;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::store::LedgerStore;

/// A plan step that reached the ledger
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommittedStep {
    pub batch_id: Uuid,
    pub qty_change: Decimal,
    pub txn_id: Uuid,
}

impl From<&LedgerEntry> for CommittedStep {
    fn from(entry: &LedgerEntry) -> Self {
        Self {
            batch_id: entry.batch_id,
            qty_change: entry.qty_change,
            txn_id: entry.id,
        }
    }
}

#[derive(Clone)]
pub struct TransactionApplier {
    store: Arc<dyn LedgerStore>,
    atomic: bool,
}

impl TransactionApplier {
    pub fn new(store: Arc<dyn LedgerStore>, atomic: bool) -> Self {
        Self { store, atomic }
    }

    /// Apply every step of `plan` for `item_id`, returning the ledger rows
    pub async fn execute(
        &self,
        item_id: Uuid,
        plan: &Plan,
        actor_user_id: Uuid,
        reason: Option<String>,
    ) -> AppResult<Vec<LedgerEntry>> {
        let now = Utc::now();
        let entries: Vec<LedgerEntry> = plan
            .steps
            .iter()
            .map(|step| LedgerEntry {
                id: Uuid::new_v4(),
                item_id,
                batch_id: step.batch_id,
                actor_user_id,
                movement_type: plan.movement_type,
                qty_change: step.delta,
                reason: reason.clone(),
                created_at: now,
            })
            .collect();

        if self.atomic && entries.len() > 1 {
            return self.execute_atomic(item_id, &entries).await;
        }

        let mut written: Vec<LedgerEntry> = Vec::with_capacity(entries.len());
        for entry in &entries {
            match self.store.apply_entry(entry).await {
                Ok(done) => {
                    tracing::info!(
                        item_id = %item_id,
                        batch_id = %done.batch_id,
                        delta = %done.qty_change,
                        txn_type = done.movement_type.as_str(),
                        "Stock movement recorded"
                    );
                    written.push(done);
                }
                Err(err) if written.is_empty() => {
                    tracing::warn!(
                        item_id = %item_id,
                        batch_id = %entry.batch_id,
                        delta = %entry.qty_change,
                        "Stock movement rejected: {}",
                        err
                    );
                    return Err(err);
                }
                Err(err) => {
                    let outstanding = entries[written.len()..]
                        .iter()
                        .fold(Decimal::ZERO, |acc, e| acc.saturating_add(e.qty_change))
                        .abs();
                    let committed: Vec<CommittedStep> =
                        written.iter().map(CommittedStep::from).collect();

                    tracing::error!(
                        item_id = %item_id,
                        committed = committed.len(),
                        outstanding = %outstanding,
                        "Consumption partially applied: {}",
                        err
                    );

                    return Err(AppError::PartialConsumption {
                        committed,
                        outstanding,
                        cause: Box::new(err),
                    });
                }
            }
        }

        Ok(written)
    }

    async fn execute_atomic(
        &self,
        item_id: Uuid,
        entries: &[LedgerEntry],
    ) -> AppResult<Vec<LedgerEntry>> {
        match self.store.apply_entries(entries).await {
            Ok(written) => {
                for done in &written {
                    tracing::info!(
                        item_id = %item_id,
                        batch_id = %done.batch_id,
                        delta = %done.qty_change,
                        txn_type = done.movement_type.as_str(),
                        "Stock movement recorded"
                    );
                }
                Ok(written)
            }
            Err(err) => {
                tracing::warn!(
                    item_id = %item_id,
                    steps = entries.len(),
                    "Stock movement rejected: {}",
                    err
                );
                Err(err)
            }
        }
    }
}
