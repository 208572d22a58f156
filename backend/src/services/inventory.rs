//! Inventory service for medicine items, batches and stock movements
//!
//! Every call takes the household (and, for movements, the acting user)
//! explicitly; items outside the household or archived are `NotFound`.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use shared::allocation::{plan_adjust, plan_consume, plan_receive, Plan};
use shared::stock::{derive_flags, matches_filter, retain_flagged, sort_summaries, stock_level};
use shared::validation::{
    normalize_optional, validate_expiry_window_days, validate_non_negative_quantity,
    validate_quantity_range, validate_required,
};
use shared::{
    AlertConfig, Batch, CreateBatchInput, CreateItemInput, CreateLocationInput, Item, ItemDetail,
    ItemPatch, ItemSummary, LedgerEntry, ListItemFilter, Location, MovementType, SetAlertInput,
};
use uuid::Uuid;
use validator::Validate;

use super::applier::TransactionApplier;
use crate::error::{AppError, AppResult};
use crate::store::LedgerStore;

/// Reason recorded on the ledger row written with a new batch
pub const OPENING_BALANCE_REASON: &str = "opening balance";

/// Source of the current time
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Result of one stock movement
#[derive(Debug, Clone, Serialize)]
pub struct MovementOutcome {
    pub transactions: Vec<LedgerEntry>,
    pub total_change: Decimal,
}

impl From<Vec<LedgerEntry>> for MovementOutcome {
    fn from(transactions: Vec<LedgerEntry>) -> Self {
        let total_change = transactions
            .iter()
            .fold(Decimal::ZERO, |acc, t| acc.saturating_add(t.qty_change));
        Self {
            transactions,
            total_change,
        }
    }
}

/// Inventory service for managing medicine stock
#[derive(Clone)]
pub struct InventoryService {
    store: Arc<dyn LedgerStore>,
    applier: TransactionApplier,
    clock: Clock,
}

impl InventoryService {
    /// Create a new InventoryService instance
    pub fn new(store: Arc<dyn LedgerStore>, atomic_consumption: bool) -> Self {
        Self {
            applier: TransactionApplier::new(store.clone(), atomic_consumption),
            store,
            clock: Arc::new(Utc::now),
        }
    }

    /// Replace the clock used for timestamps and expiry checks
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// Current UTC calendar date
    pub fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    // ========================================================================
    // Items
    // ========================================================================

    /// Create an item
    pub async fn create_item(&self, household_id: Uuid, input: CreateItemInput) -> AppResult<Item> {
        input.validate()?;
        validate_required(&input.name)
            .map_err(|msg| AppError::validation("name", msg, "ต้องระบุชื่อยา"))?;
        validate_required(&input.unit)
            .map_err(|msg| AppError::validation("unit", msg, "ต้องระบุหน่วย"))?;
        self.require_location(household_id, input.location_id).await?;

        let now = self.now();
        let item = Item {
            id: Uuid::new_v4(),
            household_id,
            name: input.name.trim().to_string(),
            generic_name: normalize_optional(input.generic_name),
            form: input.form,
            strength: normalize_optional(input.strength),
            category: normalize_optional(input.category),
            unit: input.unit.trim().to_string(),
            location_id: input.location_id,
            gtin: normalize_optional(input.gtin),
            photo_file_id: normalize_optional(input.photo_file_id),
            notes: normalize_optional(input.notes),
            is_archived: false,
            created_at: now,
            updated_at: now,
        };

        self.store.insert_item(&item).await?;
        tracing::info!(item_id = %item.id, household_id = %household_id, "Item created");
        Ok(item)
    }

    /// List items with totals and derived flags
    pub async fn list_items(
        &self,
        household_id: Uuid,
        filter: &ListItemFilter,
    ) -> AppResult<Vec<ItemSummary>> {
        let items = self.store.list_items(household_id).await?;
        let batches = self.store.list_household_batches(household_id).await?;
        let alerts = self.store.list_household_alerts(household_id).await?;

        let mut batches_by_item: HashMap<Uuid, Vec<Batch>> = HashMap::new();
        for batch in batches {
            batches_by_item.entry(batch.item_id).or_default().push(batch);
        }
        let alerts_by_item: HashMap<Uuid, AlertConfig> =
            alerts.into_iter().map(|a| (a.item_id, a)).collect();

        let today = self.today();
        let mut summaries: Vec<ItemSummary> = items
            .into_iter()
            .filter(|item| matches_filter(item, filter))
            .map(|item| {
                let level = stock_level(batches_by_item.get(&item.id).into_iter().flatten());
                let flags = derive_flags(alerts_by_item.get(&item.id), &level, today);
                ItemSummary {
                    item,
                    total_qty: level.total_qty,
                    next_expiry: level.next_expiry,
                    low_stock: flags.low_stock,
                    expiring: flags.expiring,
                }
            })
            .collect();

        retain_flagged(&mut summaries, filter);
        sort_summaries(&mut summaries, filter.sort);
        Ok(summaries)
    }

    /// Item with its batches, totals and alert
    pub async fn get_item_detail(&self, household_id: Uuid, item_id: Uuid) -> AppResult<ItemDetail> {
        let item = self.require_item(household_id, item_id).await?;
        let batches = self.store.list_batches(item_id).await?;
        let alert = self.store.get_alert(item_id).await?;
        let level = stock_level(&batches);

        Ok(ItemDetail {
            item,
            batches,
            total_qty: level.total_qty,
            next_expiry: level.next_expiry,
            alert,
        })
    }

    /// Apply a partial update
    pub async fn update_item(
        &self,
        household_id: Uuid,
        item_id: Uuid,
        patch: ItemPatch,
    ) -> AppResult<Item> {
        let mut item = self.require_item(household_id, item_id).await?;
        self.require_location(household_id, patch.location_id).await?;

        patch.apply(&mut item);
        item.updated_at = self.now();

        if !self.store.update_item(&item).await? {
            return Err(AppError::NotFound("Item".to_string()));
        }
        Ok(item)
    }

    /// Archive an item; its batches and ledger stay in place
    pub async fn archive_item(&self, household_id: Uuid, item_id: Uuid) -> AppResult<()> {
        if !self.store.archive_item(household_id, item_id).await? {
            return Err(AppError::NotFound("Item".to_string()));
        }
        tracing::info!(item_id = %item_id, "Item archived");
        Ok(())
    }

    // ========================================================================
    // Batches
    // ========================================================================

    /// Add a batch; a positive opening quantity is recorded as an `in` entry
    pub async fn add_batch(
        &self,
        household_id: Uuid,
        item_id: Uuid,
        input: CreateBatchInput,
        actor_user_id: Uuid,
    ) -> AppResult<Batch> {
        let item = self.require_item(household_id, item_id).await?;

        let unit = match normalize_optional(input.unit) {
            Some(unit) if unit != item.unit => {
                return Err(AppError::Conflict {
                    resource: "unit".to_string(),
                    message: format!("Batch unit '{}' does not match item unit '{}'", unit, item.unit),
                    message_th: format!("หน่วยของล็อต '{}' ไม่ตรงกับหน่วยของยา '{}'", unit, item.unit),
                });
            }
            _ => item.unit.clone(),
        };

        let qty = input.qty.unwrap_or(Decimal::ZERO);
        validate_non_negative_quantity(qty)
            .map_err(|msg| AppError::validation("qty", msg, "จำนวนต้องไม่ติดลบ"))?;
        check_quantity("qty", qty)?;

        let now = self.now();
        let batch = Batch {
            id: Uuid::new_v4(),
            item_id,
            lot_no: normalize_optional(input.lot_no),
            expiry_date: input.expiry_date,
            qty,
            unit,
            created_at: now,
            updated_at: now,
        };

        let opening = (qty > Decimal::ZERO).then(|| LedgerEntry {
            id: Uuid::new_v4(),
            item_id,
            batch_id: batch.id,
            actor_user_id,
            movement_type: MovementType::In,
            qty_change: qty,
            reason: Some(OPENING_BALANCE_REASON.to_string()),
            created_at: now,
        });

        self.store.insert_batch(&batch, opening.as_ref()).await?;
        tracing::info!(item_id = %item_id, batch_id = %batch.id, qty = %qty, "Batch added");
        Ok(batch)
    }

    /// Batches of an item in FEFO order
    pub async fn list_batches(&self, household_id: Uuid, item_id: Uuid) -> AppResult<Vec<Batch>> {
        self.require_item(household_id, item_id).await?;
        self.store.list_batches(item_id).await
    }

    // ========================================================================
    // Movements
    // ========================================================================

    /// Receive stock into one batch
    pub async fn receive_in(
        &self,
        household_id: Uuid,
        item_id: Uuid,
        batch_id: Uuid,
        qty: Decimal,
        reason: Option<String>,
        actor_user_id: Uuid,
    ) -> AppResult<MovementOutcome> {
        check_quantity("qty", qty)?;
        self.require_item(household_id, item_id).await?;
        let plan = plan_receive(batch_id, qty)?;
        self.apply(item_id, &plan, actor_user_id, reason).await
    }

    /// Consume stock across batches, first-expire-first-out
    pub async fn use_out(
        &self,
        household_id: Uuid,
        item_id: Uuid,
        qty: Decimal,
        reason: Option<String>,
        actor_user_id: Uuid,
    ) -> AppResult<MovementOutcome> {
        check_quantity("qty", qty)?;
        self.require_item(household_id, item_id).await?;
        let batches = self.store.list_batches(item_id).await?;

        let plan = plan_consume(&batches, qty).map_err(|err| {
            tracing::warn!(item_id = %item_id, qty = %qty, "Consumption rejected: {}", err);
            AppError::from(err)
        })?;

        self.apply(item_id, &plan, actor_user_id, reason).await
    }

    /// Signed stocktake correction on one batch
    pub async fn adjust(
        &self,
        household_id: Uuid,
        item_id: Uuid,
        batch_id: Uuid,
        delta: Decimal,
        reason: Option<String>,
        actor_user_id: Uuid,
    ) -> AppResult<MovementOutcome> {
        check_quantity("delta", delta)?;
        self.require_item(household_id, item_id).await?;
        let plan = plan_adjust(batch_id, delta)?;
        self.apply(item_id, &plan, actor_user_id, reason).await
    }

    /// Ledger rows of an item, newest first
    pub async fn list_transactions(
        &self,
        household_id: Uuid,
        item_id: Uuid,
    ) -> AppResult<Vec<LedgerEntry>> {
        self.require_item(household_id, item_id).await?;
        self.store.list_entries(item_id).await
    }

    async fn apply(
        &self,
        item_id: Uuid,
        plan: &Plan,
        actor_user_id: Uuid,
        reason: Option<String>,
    ) -> AppResult<MovementOutcome> {
        let written = self
            .applier
            .execute(item_id, plan, actor_user_id, normalize_optional(reason))
            .await?;
        Ok(written.into())
    }

    // ========================================================================
    // Alerts
    // ========================================================================

    /// Create or replace the alert of an item
    pub async fn set_alert(
        &self,
        household_id: Uuid,
        item_id: Uuid,
        input: SetAlertInput,
    ) -> AppResult<AlertConfig> {
        self.require_item(household_id, item_id).await?;

        if let Some(min_qty) = input.min_qty {
            validate_non_negative_quantity(min_qty)
                .map_err(|msg| AppError::validation("min_qty", msg, "จำนวนขั้นต่ำต้องไม่ติดลบ"))?;
            check_quantity("min_qty", min_qty)?;
        }
        if let Some(days) = input.expiry_window_days {
            validate_expiry_window_days(days).map_err(|msg| {
                AppError::validation("expiry_window_days", msg, "จำนวนวันต้องไม่ติดลบ")
            })?;
        }

        let alert = AlertConfig {
            item_id,
            min_qty: input.min_qty,
            expiry_window_days: input.expiry_window_days,
            is_enabled: input.is_enabled.unwrap_or(true),
            updated_at: self.now(),
        };
        self.store.upsert_alert(&alert).await
    }

    pub async fn get_alert(&self, household_id: Uuid, item_id: Uuid) -> AppResult<Option<AlertConfig>> {
        self.require_item(household_id, item_id).await?;
        self.store.get_alert(item_id).await
    }

    // ========================================================================
    // Locations
    // ========================================================================

    pub async fn create_location(
        &self,
        household_id: Uuid,
        input: CreateLocationInput,
    ) -> AppResult<Location> {
        input.validate()?;
        validate_required(&input.name)
            .map_err(|msg| AppError::validation("name", msg, "ต้องระบุชื่อที่เก็บ"))?;

        let now = self.now();
        let location = Location {
            id: Uuid::new_v4(),
            household_id,
            name: input.name.trim().to_string(),
            notes: normalize_optional(input.notes),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_location(&location).await?;
        Ok(location)
    }

    pub async fn list_locations(&self, household_id: Uuid) -> AppResult<Vec<Location>> {
        self.store.list_locations(household_id).await
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn require_item(&self, household_id: Uuid, item_id: Uuid) -> AppResult<Item> {
        self.store
            .get_item(household_id, item_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Item".to_string()))
    }

    async fn require_location(&self, household_id: Uuid, location_id: Option<Uuid>) -> AppResult<()> {
        let Some(location_id) = location_id else {
            return Ok(());
        };
        match self.store.get_location(household_id, location_id).await? {
            Some(location) if location.is_active => Ok(()),
            _ => Err(AppError::validation(
                "location_id",
                "Location does not exist",
                "ไม่พบที่เก็บยา",
            )),
        }
    }
}

/// Reject quantities the ledger columns cannot hold exactly
fn check_quantity(field: &str, qty: Decimal) -> AppResult<()> {
    validate_quantity_range(qty)
        .map_err(|msg| AppError::validation(field, msg, "จำนวนเกินขอบเขตที่บันทึกได้"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryLedgerStore;
    use chrono::{Days, TimeZone};
    use shared::validation::MAX_QUANTITY;
    use shared::{ItemSort, MedicineForm};

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
    }

    fn service_with(atomic: bool) -> (InventoryService, Arc<MemoryLedgerStore>) {
        let store = Arc::new(MemoryLedgerStore::new());
        let service = InventoryService::new(store.clone(), atomic).with_clock(Arc::new(fixed_now));
        (service, store)
    }

    fn service() -> InventoryService {
        service_with(false).0
    }

    fn item_input(name: &str) -> CreateItemInput {
        CreateItemInput {
            name: name.to_string(),
            generic_name: None,
            form: MedicineForm::Tablet,
            strength: Some("500 mg".to_string()),
            category: Some("painkiller".to_string()),
            unit: "tablet".to_string(),
            location_id: None,
            gtin: None,
            photo_file_id: None,
            notes: None,
        }
    }

    fn batch_input(qty: i64, expires_in_days: Option<u64>) -> CreateBatchInput {
        CreateBatchInput {
            lot_no: None,
            expiry_date: expires_in_days.map(|d| fixed_now().date_naive() + Days::new(d)),
            qty: Some(Decimal::from(qty)),
            unit: None,
        }
    }

    fn d(v: i64) -> Decimal {
        Decimal::from(v)
    }

    async fn assert_ledger_matches_batches(svc: &InventoryService, hh: Uuid, item_id: Uuid) {
        let batches = svc.list_batches(hh, item_id).await.unwrap();
        let entries = svc.list_transactions(hh, item_id).await.unwrap();
        for batch in batches {
            let sum: Decimal = entries
                .iter()
                .filter(|e| e.batch_id == batch.id)
                .map(|e| e.qty_change)
                .sum();
            assert_eq!(sum, batch.qty, "ledger drifted for batch {}", batch.id);
            assert!(batch.qty >= Decimal::ZERO);
        }
    }

    #[tokio::test]
    async fn test_create_item_requires_name_and_unit() {
        let svc = service();
        let hh = Uuid::new_v4();

        let err = svc.create_item(hh, item_input("")).await.unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");

        let mut input = item_input("Paracetamol");
        input.unit = "   ".to_string();
        let err = svc.create_item(hh, input).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "unit"));

        let item = svc.create_item(hh, item_input("  Paracetamol ")).await.unwrap();
        assert_eq!(item.name, "Paracetamol");
        assert!(!item.is_archived);
    }

    #[tokio::test]
    async fn test_fefo_use_out_spans_batches() {
        let svc = service();
        let hh = Uuid::new_v4();
        let actor = Uuid::new_v4();
        let item = svc.create_item(hh, item_input("Paracetamol")).await.unwrap();
        let a = svc.add_batch(hh, item.id, batch_input(10, Some(5)), actor).await.unwrap();
        let b = svc.add_batch(hh, item.id, batch_input(20, None), actor).await.unwrap();

        let outcome = svc.use_out(hh, item.id, d(15), None, actor).await.unwrap();

        let deltas: Vec<(Uuid, Decimal)> = outcome
            .transactions
            .iter()
            .map(|t| (t.batch_id, t.qty_change))
            .collect();
        assert_eq!(deltas, vec![(a.id, d(-10)), (b.id, d(-5))]);
        assert_eq!(outcome.total_change, d(-15));

        let detail = svc.get_item_detail(hh, item.id).await.unwrap();
        assert_eq!(detail.total_qty, d(15));
        let qtys: Vec<Decimal> = detail.batches.iter().map(|b| b.qty).collect();
        assert_eq!(qtys, vec![d(0), d(15)]);
        assert_ledger_matches_batches(&svc, hh, item.id).await;
    }

    #[tokio::test]
    async fn test_insufficient_use_out_writes_nothing() {
        let svc = service();
        let hh = Uuid::new_v4();
        let actor = Uuid::new_v4();
        let item = svc.create_item(hh, item_input("Paracetamol")).await.unwrap();
        svc.add_batch(hh, item.id, batch_input(5, None), actor).await.unwrap();
        let before = svc.list_transactions(hh, item.id).await.unwrap().len();

        let err = svc.use_out(hh, item.id, d(10), None, actor).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::InsufficientStock { requested, available } if requested == d(10) && available == d(5)
        ));

        assert_eq!(svc.list_transactions(hh, item.id).await.unwrap().len(), before);
        assert_eq!(svc.get_item_detail(hh, item.id).await.unwrap().total_qty, d(5));
    }

    #[tokio::test]
    async fn test_receive_in_appends_one_entry() {
        let svc = service();
        let hh = Uuid::new_v4();
        let actor = Uuid::new_v4();
        let item = svc.create_item(hh, item_input("Paracetamol")).await.unwrap();
        let b = svc.add_batch(hh, item.id, batch_input(20, None), actor).await.unwrap();

        let outcome = svc
            .receive_in(hh, item.id, b.id, d(5), Some("restock".into()), actor)
            .await
            .unwrap();
        assert_eq!(outcome.transactions.len(), 1);
        assert_eq!(outcome.transactions[0].movement_type, MovementType::In);
        assert_eq!(outcome.transactions[0].qty_change, d(5));
        assert_eq!(outcome.transactions[0].actor_user_id, actor);

        let batches = svc.list_batches(hh, item.id).await.unwrap();
        assert_eq!(batches[0].qty, d(25));
        assert_ledger_matches_batches(&svc, hh, item.id).await;
    }

    #[tokio::test]
    async fn test_adjust_below_zero_is_rejected() {
        let svc = service();
        let hh = Uuid::new_v4();
        let actor = Uuid::new_v4();
        let item = svc.create_item(hh, item_input("Paracetamol")).await.unwrap();
        let a = svc.add_batch(hh, item.id, batch_input(2, Some(30)), actor).await.unwrap();

        let err = svc.adjust(hh, item.id, a.id, d(-3), None, actor).await.unwrap_err();
        assert_eq!(err.code(), "INSUFFICIENT_STOCK");
        assert_eq!(svc.list_batches(hh, item.id).await.unwrap()[0].qty, d(2));

        let err = svc.adjust(hh, item.id, a.id, Decimal::ZERO, None, actor).await.unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");

        svc.adjust(hh, item.id, a.id, d(-2), Some("stocktake".into()), actor).await.unwrap();
        assert_eq!(svc.list_batches(hh, item.id).await.unwrap()[0].qty, d(0));
    }

    #[tokio::test]
    async fn test_low_stock_flag_follows_total() {
        let svc = service();
        let hh = Uuid::new_v4();
        let actor = Uuid::new_v4();
        let item = svc.create_item(hh, item_input("Paracetamol")).await.unwrap();
        let b = svc.add_batch(hh, item.id, batch_input(15, None), actor).await.unwrap();
        svc.set_alert(
            hh,
            item.id,
            SetAlertInput {
                min_qty: Some(d(20)),
                expiry_window_days: None,
                is_enabled: None,
            },
        )
        .await
        .unwrap();

        let list = svc.list_items(hh, &ListItemFilter::default()).await.unwrap();
        assert!(list[0].low_stock);

        svc.receive_in(hh, item.id, b.id, d(10), None, actor).await.unwrap();
        let list = svc.list_items(hh, &ListItemFilter::default()).await.unwrap();
        assert_eq!(list[0].total_qty, d(25));
        assert!(!list[0].low_stock);
    }

    #[tokio::test]
    async fn test_expiring_flag_and_filters() {
        let svc = service();
        let hh = Uuid::new_v4();
        let actor = Uuid::new_v4();
        let soon = svc.create_item(hh, item_input("Amoxicillin")).await.unwrap();
        let later = svc.create_item(hh, item_input("Cetirizine")).await.unwrap();
        svc.add_batch(hh, soon.id, batch_input(4, Some(3)), actor).await.unwrap();
        svc.add_batch(hh, later.id, batch_input(30, Some(90)), actor).await.unwrap();
        for id in [soon.id, later.id] {
            svc.set_alert(
                hh,
                id,
                SetAlertInput {
                    min_qty: Some(d(10)),
                    expiry_window_days: Some(7),
                    is_enabled: Some(true),
                },
            )
            .await
            .unwrap();
        }

        let filter = ListItemFilter {
            only_expiring: true,
            ..Default::default()
        };
        let list = svc.list_items(hh, &filter).await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].item.id, soon.id);
        assert!(list[0].low_stock);

        let filter = ListItemFilter {
            sort: ItemSort::StockDesc,
            ..Default::default()
        };
        let names: Vec<String> = svc
            .list_items(hh, &filter)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.item.name)
            .collect();
        assert_eq!(names, vec!["Cetirizine", "Amoxicillin"]);

        let filter = ListItemFilter {
            query: Some("amox".into()),
            ..Default::default()
        };
        assert_eq!(svc.list_items(hh, &filter).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_disabled_alert_flags_nothing() {
        let svc = service();
        let hh = Uuid::new_v4();
        let item = svc.create_item(hh, item_input("Paracetamol")).await.unwrap();
        svc.set_alert(
            hh,
            item.id,
            SetAlertInput {
                min_qty: Some(d(10)),
                expiry_window_days: Some(30),
                is_enabled: Some(false),
            },
        )
        .await
        .unwrap();

        let list = svc.list_items(hh, &ListItemFilter::default()).await.unwrap();
        assert!(!list[0].low_stock);
        assert!(!list[0].expiring);
    }

    #[tokio::test]
    async fn test_add_batch_unit_mismatch_and_defaults() {
        let svc = service();
        let hh = Uuid::new_v4();
        let actor = Uuid::new_v4();
        let item = svc.create_item(hh, item_input("Paracetamol")).await.unwrap();

        let mut input = batch_input(5, None);
        input.unit = Some("ml".to_string());
        let err = svc.add_batch(hh, item.id, input, actor).await.unwrap_err();
        assert_eq!(err.code(), "CONFLICT");

        let err = svc.add_batch(hh, item.id, batch_input(-1, None), actor).await.unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");

        let empty = CreateBatchInput::default();
        let batch = svc.add_batch(hh, item.id, empty, actor).await.unwrap();
        assert_eq!(batch.unit, "tablet");
        assert_eq!(batch.qty, Decimal::ZERO);
        assert!(svc.list_transactions(hh, item.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_batch_then_detail_reflects_quantity() {
        let svc = service();
        let hh = Uuid::new_v4();
        let actor = Uuid::new_v4();
        let item = svc.create_item(hh, item_input("Paracetamol")).await.unwrap();
        svc.add_batch(hh, item.id, batch_input(12, Some(100)), actor).await.unwrap();

        let detail = svc.get_item_detail(hh, item.id).await.unwrap();
        assert_eq!(detail.total_qty, d(12));
        assert_eq!(detail.batches.len(), 1);

        let entries = svc.list_transactions(hh, item.id).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].reason.as_deref(), Some(OPENING_BALANCE_REASON));
    }

    #[tokio::test]
    async fn test_household_scoping_and_archive() {
        let svc = service();
        let hh = Uuid::new_v4();
        let actor = Uuid::new_v4();
        let item = svc.create_item(hh, item_input("Paracetamol")).await.unwrap();
        let b = svc.add_batch(hh, item.id, batch_input(5, None), actor).await.unwrap();

        let other = Uuid::new_v4();
        let err = svc.get_item_detail(other, item.id).await.unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");

        svc.archive_item(hh, item.id).await.unwrap();
        let err = svc.use_out(hh, item.id, d(1), None, actor).await.unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
        let err = svc.receive_in(hh, item.id, b.id, d(1), None, actor).await.unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
        assert!(svc.list_items(hh, &ListItemFilter::default()).await.unwrap().is_empty());
        assert_eq!(svc.archive_item(hh, item.id).await.unwrap_err().code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_update_item_patch_and_location_rules() {
        let svc = service();
        let hh = Uuid::new_v4();
        let item = svc.create_item(hh, item_input("Paracetamol")).await.unwrap();
        let cabinet = svc
            .create_location(
                hh,
                CreateLocationInput {
                    name: "Medicine cabinet".into(),
                    notes: None,
                },
            )
            .await
            .unwrap();

        let patch = ItemPatch {
            name: Some("".into()),
            notes: Some("after meals".into()),
            location_id: Some(cabinet.id),
            ..Default::default()
        };
        let updated = svc.update_item(hh, item.id, patch).await.unwrap();
        assert_eq!(updated.name, "Paracetamol");
        assert_eq!(updated.notes.as_deref(), Some("after meals"));
        assert_eq!(updated.location_id, Some(cabinet.id));

        let foreign = svc
            .create_location(
                Uuid::new_v4(),
                CreateLocationInput {
                    name: "Elsewhere".into(),
                    notes: None,
                },
            )
            .await
            .unwrap();
        let patch = ItemPatch {
            location_id: Some(foreign.id),
            ..Default::default()
        };
        let err = svc.update_item(hh, item.id, patch).await.unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");

        let err = svc
            .update_item(hh, Uuid::new_v4(), ItemPatch::default())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_set_alert_validates_and_upserts() {
        let svc = service();
        let hh = Uuid::new_v4();
        let item = svc.create_item(hh, item_input("Paracetamol")).await.unwrap();

        let err = svc
            .set_alert(
                hh,
                item.id,
                SetAlertInput {
                    min_qty: Some(d(-1)),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");

        svc.set_alert(
            hh,
            item.id,
            SetAlertInput {
                min_qty: Some(d(5)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        let alert = svc
            .set_alert(
                hh,
                item.id,
                SetAlertInput {
                    min_qty: Some(d(8)),
                    expiry_window_days: Some(14),
                    is_enabled: Some(false),
                },
            )
            .await
            .unwrap();
        assert!(!alert.is_enabled);

        let stored = svc.get_alert(hh, item.id).await.unwrap().unwrap();
        assert_eq!(stored.min_qty, Some(d(8)));
        assert_eq!(stored.expiry_window_days, Some(14));
    }

    #[tokio::test]
    async fn test_list_locations_active_by_name() {
        let svc = service();
        let hh = Uuid::new_v4();
        for name in ["Fridge", "Bathroom cabinet"] {
            svc.create_location(
                hh,
                CreateLocationInput {
                    name: name.into(),
                    notes: None,
                },
            )
            .await
            .unwrap();
        }
        let err = svc
            .create_location(
                hh,
                CreateLocationInput {
                    name: "".into(),
                    notes: None,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");

        let names: Vec<String> = svc
            .list_locations(hh)
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.name)
            .collect();
        assert_eq!(names, vec!["Bathroom cabinet", "Fridge"]);
    }

    #[tokio::test]
    async fn test_quantities_outside_storage_range_are_rejected() {
        let svc = service();
        let hh = Uuid::new_v4();
        let actor = Uuid::new_v4();
        let item = svc.create_item(hh, item_input("Paracetamol")).await.unwrap();

        let mut huge = batch_input(0, None);
        huge.qty = Some(Decimal::MAX);
        let err = svc.add_batch(hh, item.id, huge, actor).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "qty"));

        let batch = svc.add_batch(hh, item.id, batch_input(5, None), actor).await.unwrap();
        let tiny = Decimal::new(4, 4);
        for err in [
            svc.receive_in(hh, item.id, batch.id, tiny, None, actor).await.unwrap_err(),
            svc.use_out(hh, item.id, tiny, None, actor).await.unwrap_err(),
            svc.adjust(hh, item.id, batch.id, -tiny, None, actor).await.unwrap_err(),
            svc.receive_in(hh, item.id, batch.id, Decimal::MAX, None, actor).await.unwrap_err(),
        ] {
            assert_eq!(err.code(), "VALIDATION_ERROR");
        }

        let alert = SetAlertInput {
            min_qty: Some(Decimal::new(1, 5)),
            expiry_window_days: None,
            is_enabled: None,
        };
        let err = svc.set_alert(hh, item.id, alert).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "min_qty"));

        // Three decimal places are kept
        let outcome = svc
            .receive_in(hh, item.id, batch.id, Decimal::new(1_250, 3), None, actor)
            .await
            .unwrap();
        assert_eq!(outcome.total_change, Decimal::new(1_250, 3));
        assert_ledger_matches_batches(&svc, hh, item.id).await;
    }

    #[tokio::test]
    async fn test_receive_past_maximum_is_rejected_without_panicking() {
        let svc = service();
        let hh = Uuid::new_v4();
        let actor = Uuid::new_v4();
        let item = svc.create_item(hh, item_input("Saline")).await.unwrap();

        let mut full = batch_input(0, None);
        full.qty = Some(MAX_QUANTITY);
        let a = svc.add_batch(hh, item.id, full.clone(), actor).await.unwrap();
        svc.add_batch(hh, item.id, full, actor).await.unwrap();

        let err = svc.receive_in(hh, item.id, a.id, Decimal::ONE, None, actor).await.unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        let batches = svc.list_batches(hh, item.id).await.unwrap();
        assert!(batches.iter().all(|b| b.qty == MAX_QUANTITY));

        // Totals over two full batches still list and consume
        let items = svc.list_items(hh, &ListItemFilter::default()).await.unwrap();
        assert_eq!(items[0].total_qty, MAX_QUANTITY + MAX_QUANTITY);
        svc.use_out(hh, item.id, d(3), None, actor).await.unwrap();
    }

    #[tokio::test]
    async fn test_ledger_readback_orders_steps_of_one_movement() {
        let svc = service();
        let hh = Uuid::new_v4();
        let actor = Uuid::new_v4();
        let item = svc.create_item(hh, item_input("Ibuprofen")).await.unwrap();
        let first = svc.add_batch(hh, item.id, batch_input(0, Some(5)), actor).await.unwrap();
        let second = svc.add_batch(hh, item.id, batch_input(0, Some(9)), actor).await.unwrap();
        svc.receive_in(hh, item.id, first.id, d(2), None, actor).await.unwrap();
        svc.receive_in(hh, item.id, second.id, d(4), None, actor).await.unwrap();

        svc.use_out(hh, item.id, d(5), None, actor).await.unwrap();

        // Steps of one movement share a timestamp; newest first keeps write order reversed
        let entries = svc.list_transactions(hh, item.id).await.unwrap();
        let seen: Vec<(Uuid, Decimal)> = entries.iter().map(|e| (e.batch_id, e.qty_change)).collect();
        assert_eq!(
            seen,
            vec![
                (second.id, d(-3)),
                (first.id, d(-2)),
                (second.id, d(4)),
                (first.id, d(2)),
            ]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_movements_keep_invariants() {
        for atomic in [false, true] {
            let (svc, _store) = service_with(atomic);
            let hh = Uuid::new_v4();
            let actor = Uuid::new_v4();
            let item = svc.create_item(hh, item_input("Paracetamol")).await.unwrap();
            let a = svc.add_batch(hh, item.id, batch_input(10, Some(10)), actor).await.unwrap();
            svc.add_batch(hh, item.id, batch_input(15, None), actor).await.unwrap();

            let mut handles = Vec::new();
            for i in 0..24 {
                let svc = svc.clone();
                let item_id = item.id;
                let batch_id = a.id;
                handles.push(tokio::spawn(async move {
                    if i % 3 == 0 {
                        svc.adjust(hh, item_id, batch_id, Decimal::from(-2), None, actor).await
                    } else {
                        svc.use_out(hh, item_id, Decimal::from(3), None, actor).await
                    }
                }));
            }
            for handle in handles {
                // Rejections are expected once stock runs out
                let _ = handle.await.unwrap();
            }

            assert_ledger_matches_batches(&svc, hh, item.id).await;
        }
    }
}
