//! PostgreSQL ledger store

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use shared::allocation::next_quantity;
use shared::{AlertConfig, Batch, Item, LedgerEntry, Location, MedicineForm, MovementType};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::LedgerStore;
use crate::config::DatabaseConfig;
use crate::error::{AppError, AppResult};

const ITEM_COLUMNS: &str = "id, household_id, name, generic_name, form, strength, category, \
     unit, location_id, gtin, photo_file_id, notes, is_archived, created_at, updated_at";

const BATCH_COLUMNS: &str = "id, item_id, lot_no, expiry_date, qty, unit, created_at, updated_at";

const TXN_COLUMNS: &str = "id, item_id, batch_id, actor_user_id, txn_type, qty_change, reason, created_at";

/// Row for item queries
#[derive(Debug, FromRow)]
struct ItemRow {
    id: Uuid,
    household_id: Uuid,
    name: String,
    generic_name: Option<String>,
    form: String,
    strength: Option<String>,
    category: Option<String>,
    unit: String,
    location_id: Option<Uuid>,
    gtin: Option<String>,
    photo_file_id: Option<String>,
    notes: Option<String>,
    is_archived: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ItemRow> for Item {
    fn from(row: ItemRow) -> Self {
        Item {
            id: row.id,
            household_id: row.household_id,
            name: row.name,
            generic_name: row.generic_name,
            form: MedicineForm::from_str(&row.form).unwrap_or_default(),
            strength: row.strength,
            category: row.category,
            unit: row.unit,
            location_id: row.location_id,
            gtin: row.gtin,
            photo_file_id: row.photo_file_id,
            notes: row.notes,
            is_archived: row.is_archived,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Row for batch queries
#[derive(Debug, FromRow)]
struct BatchRow {
    id: Uuid,
    item_id: Uuid,
    lot_no: Option<String>,
    expiry_date: Option<NaiveDate>,
    qty: Decimal,
    unit: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<BatchRow> for Batch {
    fn from(row: BatchRow) -> Self {
        Batch {
            id: row.id,
            item_id: row.item_id,
            lot_no: row.lot_no,
            expiry_date: row.expiry_date,
            qty: row.qty,
            unit: row.unit,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Row for ledger queries
#[derive(Debug, FromRow)]
struct TxnRow {
    id: Uuid,
    item_id: Uuid,
    batch_id: Uuid,
    actor_user_id: Uuid,
    txn_type: String,
    qty_change: Decimal,
    reason: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<TxnRow> for LedgerEntry {
    type Error = AppError;

    fn try_from(row: TxnRow) -> Result<Self, Self::Error> {
        let movement_type = MovementType::from_str(&row.txn_type).ok_or_else(|| {
            AppError::Internal(format!("unknown ledger type '{}' on {}", row.txn_type, row.id))
        })?;
        Ok(LedgerEntry {
            id: row.id,
            item_id: row.item_id,
            batch_id: row.batch_id,
            actor_user_id: row.actor_user_id,
            movement_type,
            qty_change: row.qty_change,
            reason: row.reason,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct LocationRow {
    id: Uuid,
    household_id: Uuid,
    name: String,
    notes: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<LocationRow> for Location {
    fn from(row: LocationRow) -> Self {
        Location {
            id: row.id,
            household_id: row.household_id,
            name: row.name,
            notes: row.notes,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct AlertRow {
    item_id: Uuid,
    min_qty: Option<Decimal>,
    expiry_window_days: Option<i32>,
    is_enabled: bool,
    updated_at: DateTime<Utc>,
}

impl From<AlertRow> for AlertConfig {
    fn from(row: AlertRow) -> Self {
        AlertConfig {
            item_id: row.item_id,
            min_qty: row.min_qty,
            expiry_window_days: row.expiry_window_days,
            is_enabled: row.is_enabled,
            updated_at: row.updated_at,
        }
    }
}

/// Ledger store backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the connection pool
    pub async fn connect(config: &DatabaseConfig) -> anyhow::Result<Self> {
        tracing::info!("Connecting to database...");
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&config.url)
            .await?;
        tracing::info!("Database connection established");
        Ok(Self::new(pool))
    }

    /// Run embedded migrations
    pub async fn migrate(&self) -> anyhow::Result<()> {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::info!("Migrations completed");
        Ok(())
    }

    /// Lock one batch row, apply the change and append the ledger row
    async fn apply_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        entry: &LedgerEntry,
    ) -> AppResult<LedgerEntry> {
        let current = sqlx::query_scalar::<_, Decimal>(
            "SELECT qty FROM medicine_batches WHERE id = $1 AND item_id = $2 FOR UPDATE",
        )
        .bind(entry.batch_id)
        .bind(entry.item_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Batch".to_string()))?;

        let next = next_quantity(current, entry.qty_change)?;

        sqlx::query("UPDATE medicine_batches SET qty = $2, updated_at = NOW() WHERE id = $1")
            .bind(entry.batch_id)
            .bind(next)
            .execute(&mut **tx)
            .await?;

        Self::insert_txn(tx, entry).await
    }

    async fn insert_txn(
        tx: &mut Transaction<'_, Postgres>,
        entry: &LedgerEntry,
    ) -> AppResult<LedgerEntry> {
        let row = sqlx::query_as::<_, TxnRow>(&format!(
            r#"
            INSERT INTO medicine_txns (id, item_id, batch_id, actor_user_id, txn_type, qty_change, reason, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {TXN_COLUMNS}
            "#
        ))
        .bind(entry.id)
        .bind(entry.item_id)
        .bind(entry.batch_id)
        .bind(entry.actor_user_id)
        .bind(entry.movement_type.as_str())
        .bind(entry.qty_change)
        .bind(&entry.reason)
        .bind(entry.created_at)
        .fetch_one(&mut **tx)
        .await?;

        row.try_into()
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn insert_item(&self, item: &Item) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO medicine_items (
                id, household_id, name, generic_name, form, strength, category, unit,
                location_id, gtin, photo_file_id, notes, is_archived, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(item.id)
        .bind(item.household_id)
        .bind(&item.name)
        .bind(&item.generic_name)
        .bind(item.form.as_str())
        .bind(&item.strength)
        .bind(&item.category)
        .bind(&item.unit)
        .bind(item.location_id)
        .bind(&item.gtin)
        .bind(&item.photo_file_id)
        .bind(&item.notes)
        .bind(item.is_archived)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_item(&self, household_id: Uuid, item_id: Uuid) -> AppResult<Option<Item>> {
        let row = sqlx::query_as::<_, ItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM medicine_items \
             WHERE id = $1 AND household_id = $2 AND is_archived = FALSE"
        ))
        .bind(item_id)
        .bind(household_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Item::from))
    }

    async fn list_items(&self, household_id: Uuid) -> AppResult<Vec<Item>> {
        let rows = sqlx::query_as::<_, ItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM medicine_items \
             WHERE household_id = $1 AND is_archived = FALSE ORDER BY name"
        ))
        .bind(household_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Item::from).collect())
    }

    async fn update_item(&self, item: &Item) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE medicine_items
            SET name = $3, generic_name = $4, form = $5, strength = $6, category = $7,
                location_id = $8, gtin = $9, photo_file_id = $10, notes = $11, updated_at = $12
            WHERE id = $1 AND household_id = $2 AND is_archived = FALSE
            "#,
        )
        .bind(item.id)
        .bind(item.household_id)
        .bind(&item.name)
        .bind(&item.generic_name)
        .bind(item.form.as_str())
        .bind(&item.strength)
        .bind(&item.category)
        .bind(item.location_id)
        .bind(&item.gtin)
        .bind(&item.photo_file_id)
        .bind(&item.notes)
        .bind(item.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn archive_item(&self, household_id: Uuid, item_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE medicine_items SET is_archived = TRUE, updated_at = NOW() \
             WHERE id = $1 AND household_id = $2 AND is_archived = FALSE",
        )
        .bind(item_id)
        .bind(household_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_batch(&self, batch: &Batch, opening: Option<&LedgerEntry>) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO medicine_batches (id, item_id, lot_no, expiry_date, qty, unit, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(batch.id)
        .bind(batch.item_id)
        .bind(&batch.lot_no)
        .bind(batch.expiry_date)
        .bind(batch.qty)
        .bind(&batch.unit)
        .bind(batch.created_at)
        .bind(batch.updated_at)
        .execute(&mut *tx)
        .await?;

        if let Some(entry) = opening {
            Self::insert_txn(&mut tx, entry).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn list_batches(&self, item_id: Uuid) -> AppResult<Vec<Batch>> {
        let rows = sqlx::query_as::<_, BatchRow>(&format!(
            "SELECT {BATCH_COLUMNS} FROM medicine_batches WHERE item_id = $1 \
             ORDER BY expiry_date ASC NULLS LAST, created_at ASC, id ASC"
        ))
        .bind(item_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Batch::from).collect())
    }

    async fn list_household_batches(&self, household_id: Uuid) -> AppResult<Vec<Batch>> {
        let rows = sqlx::query_as::<_, BatchRow>(
            r#"
            SELECT b.id, b.item_id, b.lot_no, b.expiry_date, b.qty, b.unit, b.created_at, b.updated_at
            FROM medicine_batches b
            JOIN medicine_items i ON i.id = b.item_id
            WHERE i.household_id = $1 AND i.is_archived = FALSE
            ORDER BY b.expiry_date ASC NULLS LAST, b.created_at ASC, b.id ASC
            "#,
        )
        .bind(household_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Batch::from).collect())
    }

    async fn apply_entry(&self, entry: &LedgerEntry) -> AppResult<LedgerEntry> {
        let mut tx = self.pool.begin().await?;
        let written = Self::apply_in_tx(&mut tx, entry).await?;
        tx.commit().await?;
        Ok(written)
    }

    async fn apply_entries(&self, entries: &[LedgerEntry]) -> AppResult<Vec<LedgerEntry>> {
        let mut batch_ids: Vec<Uuid> = entries.iter().map(|e| e.batch_id).collect();
        batch_ids.sort();
        batch_ids.dedup();

        let mut tx = self.pool.begin().await?;

        // Lock in batch id order, then write in plan order
        for batch_id in &batch_ids {
            sqlx::query("SELECT id FROM medicine_batches WHERE id = $1 FOR UPDATE")
                .bind(batch_id)
                .execute(&mut *tx)
                .await?;
        }

        let mut written = Vec::with_capacity(entries.len());
        for entry in entries {
            written.push(Self::apply_in_tx(&mut tx, entry).await?);
        }
        tx.commit().await?;

        Ok(written)
    }

    async fn list_entries(&self, item_id: Uuid) -> AppResult<Vec<LedgerEntry>> {
        let rows = sqlx::query_as::<_, TxnRow>(&format!(
            "SELECT {TXN_COLUMNS} FROM medicine_txns WHERE item_id = $1 ORDER BY created_at DESC, seq DESC"
        ))
        .bind(item_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(LedgerEntry::try_from).collect()
    }

    async fn insert_location(&self, location: &Location) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO medicine_locations (id, household_id, name, notes, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(location.id)
        .bind(location.household_id)
        .bind(&location.name)
        .bind(&location.notes)
        .bind(location.is_active)
        .bind(location.created_at)
        .bind(location.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_locations(&self, household_id: Uuid) -> AppResult<Vec<Location>> {
        let rows = sqlx::query_as::<_, LocationRow>(
            r#"
            SELECT id, household_id, name, notes, is_active, created_at, updated_at
            FROM medicine_locations
            WHERE household_id = $1 AND is_active = TRUE
            ORDER BY name
            "#,
        )
        .bind(household_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Location::from).collect())
    }

    async fn get_location(
        &self,
        household_id: Uuid,
        location_id: Uuid,
    ) -> AppResult<Option<Location>> {
        let row = sqlx::query_as::<_, LocationRow>(
            r#"
            SELECT id, household_id, name, notes, is_active, created_at, updated_at
            FROM medicine_locations
            WHERE id = $1 AND household_id = $2
            "#,
        )
        .bind(location_id)
        .bind(household_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Location::from))
    }

    async fn upsert_alert(&self, alert: &AlertConfig) -> AppResult<AlertConfig> {
        let row = sqlx::query_as::<_, AlertRow>(
            r#"
            INSERT INTO medicine_alerts (item_id, min_qty, expiry_window_days, is_enabled, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (item_id) DO UPDATE
            SET min_qty = EXCLUDED.min_qty,
                expiry_window_days = EXCLUDED.expiry_window_days,
                is_enabled = EXCLUDED.is_enabled,
                updated_at = EXCLUDED.updated_at
            RETURNING item_id, min_qty, expiry_window_days, is_enabled, updated_at
            "#,
        )
        .bind(alert.item_id)
        .bind(alert.min_qty)
        .bind(alert.expiry_window_days)
        .bind(alert.is_enabled)
        .bind(alert.updated_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn get_alert(&self, item_id: Uuid) -> AppResult<Option<AlertConfig>> {
        let row = sqlx::query_as::<_, AlertRow>(
            "SELECT item_id, min_qty, expiry_window_days, is_enabled, updated_at \
             FROM medicine_alerts WHERE item_id = $1",
        )
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(AlertConfig::from))
    }

    async fn list_household_alerts(&self, household_id: Uuid) -> AppResult<Vec<AlertConfig>> {
        let rows = sqlx::query_as::<_, AlertRow>(
            r#"
            SELECT a.item_id, a.min_qty, a.expiry_window_days, a.is_enabled, a.updated_at
            FROM medicine_alerts a
            JOIN medicine_items i ON i.id = a.item_id
            WHERE i.household_id = $1 AND i.is_archived = FALSE
            "#,
        )
        .bind(household_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(AlertConfig::from).collect())
    }

    async fn list_household_ids(&self) -> AppResult<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT DISTINCT household_id FROM medicine_items WHERE is_archived = FALSE ORDER BY household_id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }
}
