//! Ledger store: durable tables for items, batches, ledger entries,
//! locations and alerts
//!
//! Every batch quantity change goes through [`LedgerStore::apply_entry`] or
//! [`LedgerStore::apply_entries`], which lock the batch row, reject a
//! negative result, and write the new quantity together with the ledger
//! row. Nothing else writes `qty`.

use std::sync::Arc;

use async_trait::async_trait;
use shared::{AlertConfig, Batch, Item, LedgerEntry, Location};
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::error::AppResult;

pub mod memory;
pub mod postgres;

pub use memory::MemoryLedgerStore;
pub use postgres::PgLedgerStore;

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Check the store is reachable
    async fn ping(&self) -> AppResult<()>;

    // ------------------------------------------------------------------
    // Items
    // ------------------------------------------------------------------

    async fn insert_item(&self, item: &Item) -> AppResult<()>;

    /// Non-archived item owned by the household
    async fn get_item(&self, household_id: Uuid, item_id: Uuid) -> AppResult<Option<Item>>;

    /// Non-archived items of the household
    async fn list_items(&self, household_id: Uuid) -> AppResult<Vec<Item>>;

    /// Overwrite the mutable fields of a non-archived item; false if missing
    async fn update_item(&self, item: &Item) -> AppResult<bool>;

    /// Set the archived flag; false if missing or already archived
    async fn archive_item(&self, household_id: Uuid, item_id: Uuid) -> AppResult<bool>;

    // ------------------------------------------------------------------
    // Batches and ledger
    // ------------------------------------------------------------------

    /// Insert a batch, plus its opening ledger entry in the same unit
    async fn insert_batch(&self, batch: &Batch, opening: Option<&LedgerEntry>) -> AppResult<()>;

    /// Batches of one item in FEFO order
    async fn list_batches(&self, item_id: Uuid) -> AppResult<Vec<Batch>>;

    /// Batches of every non-archived item of the household
    async fn list_household_batches(&self, household_id: Uuid) -> AppResult<Vec<Batch>>;

    /// Atomically apply one entry to its batch
    ///
    /// Fails with `NotFound` if the batch does not belong to `entry.item_id`
    /// and with `InsufficientStock` if the batch would go negative; in both
    /// cases nothing is written.
    async fn apply_entry(&self, entry: &LedgerEntry) -> AppResult<LedgerEntry>;

    /// Atomically apply several entries; all or none are committed.
    /// Batch locks are taken in ascending batch id order; ledger rows are
    /// written in the given order.
    async fn apply_entries(&self, entries: &[LedgerEntry]) -> AppResult<Vec<LedgerEntry>>;

    /// Ledger entries of one item, newest first
    async fn list_entries(&self, item_id: Uuid) -> AppResult<Vec<LedgerEntry>>;

    // ------------------------------------------------------------------
    // Locations
    // ------------------------------------------------------------------

    async fn insert_location(&self, location: &Location) -> AppResult<()>;

    /// Active locations ordered by name
    async fn list_locations(&self, household_id: Uuid) -> AppResult<Vec<Location>>;

    async fn get_location(&self, household_id: Uuid, location_id: Uuid)
        -> AppResult<Option<Location>>;

    // ------------------------------------------------------------------
    // Alerts
    // ------------------------------------------------------------------

    /// Insert or replace the single alert row of an item
    async fn upsert_alert(&self, alert: &AlertConfig) -> AppResult<AlertConfig>;

    async fn get_alert(&self, item_id: Uuid) -> AppResult<Option<AlertConfig>>;

    /// Alerts of every non-archived item of the household
    async fn list_household_alerts(&self, household_id: Uuid) -> AppResult<Vec<AlertConfig>>;

    /// Households owning at least one non-archived item
    async fn list_household_ids(&self) -> AppResult<Vec<Uuid>>;
}

/// Open the store selected by `database.url`
pub async fn connect(
    config: &DatabaseConfig,
    run_migrations: bool,
) -> anyhow::Result<Arc<dyn LedgerStore>> {
    if config.is_memory() {
        tracing::warn!("Using in-memory ledger store; data is lost on restart");
        return Ok(Arc::new(MemoryLedgerStore::new()));
    }

    let store = PgLedgerStore::connect(config).await?;
    if run_migrations {
        store.migrate().await?;
    }
    Ok(Arc::new(store))
}
