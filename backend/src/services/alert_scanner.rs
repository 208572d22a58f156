//! Alert scanner: re-derives low-stock / expiring flags and notifies
//!
//! Reads only; a scan never writes to the ledger, so running it twice
//! without stock changes in between flags the same items.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use shared::alerts::{expiring_message, low_stock_message};
use shared::ListItemFilter;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::inventory::InventoryService;
use super::notifier::Notifier;
use crate::error::AppResult;
use crate::store::LedgerStore;

/// Outcome of scanning one household
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    pub household_id: Uuid,
    /// Low-stock notifications dispatched
    pub low_stock: usize,
    /// Expiring notifications dispatched
    pub expiring: usize,
    /// Notifications the notifier failed to deliver
    pub failed: usize,
    /// Items carrying at least one flag, in list order
    pub flagged_items: Vec<Uuid>,
}

#[derive(Clone)]
pub struct AlertScanner {
    inventory: InventoryService,
    store: Arc<dyn LedgerStore>,
    notifier: Arc<dyn Notifier>,
}

impl AlertScanner {
    pub fn new(
        inventory: InventoryService,
        store: Arc<dyn LedgerStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            inventory,
            store,
            notifier,
        }
    }

    /// Scan one household and notify each flagged item
    pub async fn run_once(&self, household_id: Uuid) -> AppResult<ScanReport> {
        let summaries = self
            .inventory
            .list_items(household_id, &ListItemFilter::default())
            .await?;
        let today = self.inventory.today();

        let mut report = ScanReport {
            household_id,
            ..Default::default()
        };

        for summary in &summaries {
            let item = &summary.item;
            if summary.low_stock || summary.expiring {
                report.flagged_items.push(item.id);
            }

            if summary.low_stock {
                let message = low_stock_message(&item.name, summary.total_qty, &item.unit);
                match self
                    .notifier
                    .notify_low_stock(household_id, item.id, &message)
                    .await
                {
                    Ok(()) => report.low_stock += 1,
                    Err(e) => {
                        tracing::warn!(item_id = %item.id, "Low-stock notification failed: {}", e);
                        report.failed += 1;
                    }
                }
            }

            if let (true, Some(expiry)) = (summary.expiring, summary.next_expiry) {
                let message = expiring_message(&item.name, expiry, today);
                match self
                    .notifier
                    .notify_expiring(household_id, item.id, &message)
                    .await
                {
                    Ok(()) => report.expiring += 1,
                    Err(e) => {
                        tracing::warn!(item_id = %item.id, "Expiry notification failed: {}", e);
                        report.failed += 1;
                    }
                }
            }
        }

        tracing::debug!(
            household_id = %household_id,
            low_stock = report.low_stock,
            expiring = report.expiring,
            failed = report.failed,
            "Alert scan finished"
        );
        Ok(report)
    }

    /// Scan every household that owns items. A failing household is
    /// logged and skipped.
    pub async fn run_all(&self) -> AppResult<Vec<ScanReport>> {
        let households = self.store.list_household_ids().await?;
        let mut reports = Vec::with_capacity(households.len());

        for household_id in households {
            match self.run_once(household_id).await {
                Ok(report) => reports.push(report),
                Err(e) => {
                    tracing::error!(household_id = %household_id, error = %e, "Alert scan failed");
                }
            }
        }
        Ok(reports)
    }

    /// Spawn a background task that scans every `period`
    pub fn spawn_periodic(self, period: Duration) -> JoinHandle<()> {
        tracing::info!(period_secs = period.as_secs(), "Spawning alert scanner task");
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                match self.run_all().await {
                    Ok(reports) => {
                        let notified: usize = reports.iter().map(|r| r.low_stock + r.expiring).sum();
                        tracing::info!(households = reports.len(), notified, "Alert scan completed");
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Alert scan could not list households");
                    }
                }
            }
        })
    }
}
