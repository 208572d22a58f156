//! In-memory ledger store
//!
//! Holds all tables behind one async mutex, so every trait call is a
//! single atomic unit. Used for local runs without PostgreSQL and by the
//! service tests.

use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal::Decimal;
use shared::allocation::{fefo_cmp, next_quantity};
use shared::{AlertConfig, Batch, Item, LedgerEntry, Location};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::LedgerStore;
use crate::error::{AppError, AppResult};

#[derive(Default)]
struct Tables {
    items: HashMap<Uuid, Item>,
    batches: HashMap<Uuid, Batch>,
    entries: Vec<LedgerEntry>,
    locations: HashMap<Uuid, Location>,
    alerts: HashMap<Uuid, AlertConfig>,
}

impl Tables {
    fn live_item_ids(&self, household_id: Uuid) -> Vec<Uuid> {
        self.items
            .values()
            .filter(|i| i.household_id == household_id && !i.is_archived)
            .map(|i| i.id)
            .collect()
    }

    fn batch_of_item(&self, batch_id: Uuid, item_id: Uuid) -> AppResult<&Batch> {
        self.batches
            .get(&batch_id)
            .filter(|b| b.item_id == item_id)
            .ok_or_else(|| AppError::NotFound("Batch".to_string()))
    }
}

/// Ledger store kept in process memory
#[derive(Default)]
pub struct MemoryLedgerStore {
    tables: Mutex<Tables>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }

    async fn insert_item(&self, item: &Item) -> AppResult<()> {
        let mut t = self.tables.lock().await;
        t.items.insert(item.id, item.clone());
        Ok(())
    }

    async fn get_item(&self, household_id: Uuid, item_id: Uuid) -> AppResult<Option<Item>> {
        let t = self.tables.lock().await;
        Ok(t.items
            .get(&item_id)
            .filter(|i| i.household_id == household_id && !i.is_archived)
            .cloned())
    }

    async fn list_items(&self, household_id: Uuid) -> AppResult<Vec<Item>> {
        let t = self.tables.lock().await;
        let mut items: Vec<Item> = t
            .items
            .values()
            .filter(|i| i.household_id == household_id && !i.is_archived)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(items)
    }

    async fn update_item(&self, item: &Item) -> AppResult<bool> {
        let mut t = self.tables.lock().await;
        match t.items.get_mut(&item.id) {
            Some(existing) if existing.household_id == item.household_id && !existing.is_archived => {
                let created_at = existing.created_at;
                *existing = Item {
                    created_at,
                    is_archived: false,
                    unit: existing.unit.clone(),
                    ..item.clone()
                };
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn archive_item(&self, household_id: Uuid, item_id: Uuid) -> AppResult<bool> {
        let mut t = self.tables.lock().await;
        match t.items.get_mut(&item_id) {
            Some(item) if item.household_id == household_id && !item.is_archived => {
                item.is_archived = true;
                item.updated_at = chrono::Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn insert_batch(&self, batch: &Batch, opening: Option<&LedgerEntry>) -> AppResult<()> {
        let mut t = self.tables.lock().await;
        t.batches.insert(batch.id, batch.clone());
        if let Some(entry) = opening {
            t.entries.push(entry.clone());
        }
        Ok(())
    }

    async fn list_batches(&self, item_id: Uuid) -> AppResult<Vec<Batch>> {
        let t = self.tables.lock().await;
        let mut batches: Vec<Batch> = t
            .batches
            .values()
            .filter(|b| b.item_id == item_id)
            .cloned()
            .collect();
        batches.sort_by(fefo_cmp);
        Ok(batches)
    }

    async fn list_household_batches(&self, household_id: Uuid) -> AppResult<Vec<Batch>> {
        let t = self.tables.lock().await;
        let items = t.live_item_ids(household_id);
        let mut batches: Vec<Batch> = t
            .batches
            .values()
            .filter(|b| items.contains(&b.item_id))
            .cloned()
            .collect();
        batches.sort_by(fefo_cmp);
        Ok(batches)
    }

    async fn apply_entry(&self, entry: &LedgerEntry) -> AppResult<LedgerEntry> {
        let mut t = self.tables.lock().await;
        let current = t.batch_of_item(entry.batch_id, entry.item_id)?.qty;
        let next = next_quantity(current, entry.qty_change)?;

        if let Some(batch) = t.batches.get_mut(&entry.batch_id) {
            batch.qty = next;
            batch.updated_at = entry.created_at;
        }
        t.entries.push(entry.clone());
        Ok(entry.clone())
    }

    async fn apply_entries(&self, entries: &[LedgerEntry]) -> AppResult<Vec<LedgerEntry>> {
        let mut t = self.tables.lock().await;

        let mut ordered: Vec<&LedgerEntry> = entries.iter().collect();
        ordered.sort_by_key(|e| e.batch_id);

        // Project every batch first so a failure leaves nothing written
        let mut projected: HashMap<Uuid, Decimal> = HashMap::new();
        for entry in &ordered {
            let current = match projected.get(&entry.batch_id) {
                Some(qty) => *qty,
                None => t.batch_of_item(entry.batch_id, entry.item_id)?.qty,
            };
            projected.insert(entry.batch_id, next_quantity(current, entry.qty_change)?);
        }

        for (batch_id, qty) in projected {
            if let Some(batch) = t.batches.get_mut(&batch_id) {
                batch.qty = qty;
                batch.updated_at = chrono::Utc::now();
            }
        }
        t.entries.extend(entries.iter().cloned());
        Ok(entries.to_vec())
    }

    async fn list_entries(&self, item_id: Uuid) -> AppResult<Vec<LedgerEntry>> {
        let t = self.tables.lock().await;
        let mut entries: Vec<LedgerEntry> = t
            .entries
            .iter()
            .rev()
            .filter(|e| e.item_id == item_id)
            .cloned()
            .collect();
        // Stable sort: equal timestamps stay newest write first
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(entries)
    }

    async fn insert_location(&self, location: &Location) -> AppResult<()> {
        let mut t = self.tables.lock().await;
        t.locations.insert(location.id, location.clone());
        Ok(())
    }

    async fn list_locations(&self, household_id: Uuid) -> AppResult<Vec<Location>> {
        let t = self.tables.lock().await;
        let mut locations: Vec<Location> = t
            .locations
            .values()
            .filter(|l| l.household_id == household_id && l.is_active)
            .cloned()
            .collect();
        locations.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(locations)
    }

    async fn get_location(
        &self,
        household_id: Uuid,
        location_id: Uuid,
    ) -> AppResult<Option<Location>> {
        let t = self.tables.lock().await;
        Ok(t.locations
            .get(&location_id)
            .filter(|l| l.household_id == household_id)
            .cloned())
    }

    async fn upsert_alert(&self, alert: &AlertConfig) -> AppResult<AlertConfig> {
        let mut t = self.tables.lock().await;
        t.alerts.insert(alert.item_id, alert.clone());
        Ok(alert.clone())
    }

    async fn get_alert(&self, item_id: Uuid) -> AppResult<Option<AlertConfig>> {
        let t = self.tables.lock().await;
        Ok(t.alerts.get(&item_id).cloned())
    }

    async fn list_household_alerts(&self, household_id: Uuid) -> AppResult<Vec<AlertConfig>> {
        let t = self.tables.lock().await;
        let items = t.live_item_ids(household_id);
        Ok(t.alerts
            .values()
            .filter(|a| items.contains(&a.item_id))
            .cloned()
            .collect())
    }

    async fn list_household_ids(&self) -> AppResult<Vec<Uuid>> {
        let t = self.tables.lock().await;
        let mut ids: Vec<Uuid> = t
            .items
            .values()
            .filter(|i| !i.is_archived)
            .map(|i| i.household_id)
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }
}
