//! HTTP handlers for medicine items, batches, movements and alerts

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{
    AlertConfig, Batch, CreateBatchInput, CreateItemInput, Item, ItemDetail, ItemPatch, ItemSort,
    ItemSummary, LedgerEntry, ListItemFilter, MedicineForm, SetAlertInput,
};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::{CurrentUser, HouseholdContext};
use crate::services::MovementOutcome;
use crate::AppState;

/// Query string of `GET /items`
#[derive(Debug, Default, Deserialize)]
pub struct ListItemsQuery {
    pub q: Option<String>,
    pub category: Option<String>,
    pub form: Option<String>,
    pub location_id: Option<Uuid>,
    pub only_low: Option<String>,
    pub only_expiring: Option<String>,
    pub sort: Option<String>,
}

impl ListItemsQuery {
    /// Convert into a service filter. An unknown sort key falls back to name.
    pub fn into_filter(self) -> AppResult<ListItemFilter> {
        let form = match self.form.as_deref().filter(|f| !f.is_empty()) {
            Some(raw) => Some(MedicineForm::from_str(raw).ok_or_else(|| {
                AppError::validation("form", "Unknown medicine form", "ไม่รู้จักรูปแบบยานี้")
            })?),
            None => None,
        };

        Ok(ListItemFilter {
            query: self.q,
            category: self.category,
            form,
            location_id: self.location_id,
            only_low: is_truthy(self.only_low.as_deref()),
            only_expiring: is_truthy(self.only_expiring.as_deref()),
            sort: self
                .sort
                .as_deref()
                .and_then(ItemSort::from_str)
                .unwrap_or_default(),
        })
    }
}

fn is_truthy(value: Option<&str>) -> bool {
    matches!(value, Some("1") | Some("true"))
}

/// Body of `POST /items/{id}/txns/in`
#[derive(Debug, Deserialize)]
pub struct ReceiveInRequest {
    pub batch_id: Uuid,
    pub qty: Decimal,
    pub reason: Option<String>,
    pub actor_user_id: Option<Uuid>,
}

/// Body of `POST /items/{id}/txns/out`
#[derive(Debug, Deserialize)]
pub struct UseOutRequest {
    pub qty: Decimal,
    pub reason: Option<String>,
    pub actor_user_id: Option<Uuid>,
}

/// Body of `POST /items/{id}/txns/adjust`
#[derive(Debug, Deserialize)]
pub struct AdjustRequest {
    pub batch_id: Uuid,
    pub delta: Decimal,
    pub reason: Option<String>,
    pub actor_user_id: Option<Uuid>,
}

/// The acting user is the authenticated one; a body value must agree
fn resolve_actor(ctx: &HouseholdContext, claimed: Option<Uuid>) -> AppResult<Uuid> {
    match claimed {
        Some(actor) if actor != ctx.user_id => Err(AppError::validation(
            "actor_user_id",
            "actor_user_id does not match the authenticated user",
            "ผู้ทำรายการไม่ตรงกับผู้ใช้ที่เข้าสู่ระบบ",
        )),
        _ => Ok(ctx.user_id),
    }
}

// ============================================================================
// Items
// ============================================================================

/// List items with stock totals and flags
pub async fn list_items(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ListItemsQuery>,
) -> AppResult<Json<Vec<ItemSummary>>> {
    let filter = query.into_filter()?;
    let items = state
        .inventory
        .list_items(current_user.0.household_id, &filter)
        .await?;
    Ok(Json(items))
}

/// Create an item
pub async fn create_item(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateItemInput>,
) -> AppResult<(StatusCode, Json<Item>)> {
    let item = state
        .inventory
        .create_item(current_user.0.household_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// Get an item with its batches and alert
pub async fn get_item(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(item_id): Path<Uuid>,
) -> AppResult<Json<ItemDetail>> {
    let detail = state
        .inventory
        .get_item_detail(current_user.0.household_id, item_id)
        .await?;
    Ok(Json(detail))
}

/// Partially update an item
pub async fn update_item(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(item_id): Path<Uuid>,
    Json(patch): Json<ItemPatch>,
) -> AppResult<Json<Item>> {
    let item = state
        .inventory
        .update_item(current_user.0.household_id, item_id, patch)
        .await?;
    Ok(Json(item))
}

/// Archive an item
pub async fn archive_item(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(item_id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    state
        .inventory
        .archive_item(current_user.0.household_id, item_id)
        .await?;
    Ok(Json(serde_json::json!({ "archived": true })))
}

// ============================================================================
// Batches
// ============================================================================

/// Add a batch to an item
pub async fn add_batch(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(item_id): Path<Uuid>,
    Json(input): Json<CreateBatchInput>,
) -> AppResult<(StatusCode, Json<Batch>)> {
    let ctx = current_user.0;
    let batch = state
        .inventory
        .add_batch(ctx.household_id, item_id, input, ctx.user_id)
        .await?;
    Ok((StatusCode::CREATED, Json(batch)))
}

/// List batches of an item, first-expiring first
pub async fn list_batches(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(item_id): Path<Uuid>,
) -> AppResult<Json<Vec<Batch>>> {
    let batches = state
        .inventory
        .list_batches(current_user.0.household_id, item_id)
        .await?;
    Ok(Json(batches))
}

// ============================================================================
// Movements
// ============================================================================

/// Receive stock into a batch
pub async fn receive_in(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(item_id): Path<Uuid>,
    Json(body): Json<ReceiveInRequest>,
) -> AppResult<Json<MovementOutcome>> {
    let ctx = current_user.0;
    let actor = resolve_actor(&ctx, body.actor_user_id)?;
    let outcome = state
        .inventory
        .receive_in(ctx.household_id, item_id, body.batch_id, body.qty, body.reason, actor)
        .await?;
    Ok(Json(outcome))
}

/// Consume stock, first-expire-first-out
pub async fn use_out(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(item_id): Path<Uuid>,
    Json(body): Json<UseOutRequest>,
) -> AppResult<Json<MovementOutcome>> {
    let ctx = current_user.0;
    let actor = resolve_actor(&ctx, body.actor_user_id)?;
    let outcome = state
        .inventory
        .use_out(ctx.household_id, item_id, body.qty, body.reason, actor)
        .await?;
    Ok(Json(outcome))
}

/// Stocktake correction on a batch
pub async fn adjust(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(item_id): Path<Uuid>,
    Json(body): Json<AdjustRequest>,
) -> AppResult<Json<MovementOutcome>> {
    let ctx = current_user.0;
    let actor = resolve_actor(&ctx, body.actor_user_id)?;
    let outcome = state
        .inventory
        .adjust(ctx.household_id, item_id, body.batch_id, body.delta, body.reason, actor)
        .await?;
    Ok(Json(outcome))
}

/// Ledger of an item, newest first
pub async fn list_transactions(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(item_id): Path<Uuid>,
) -> AppResult<Json<Vec<LedgerEntry>>> {
    let entries = state
        .inventory
        .list_transactions(current_user.0.household_id, item_id)
        .await?;
    Ok(Json(entries))
}

// ============================================================================
// Alert configuration
// ============================================================================

/// Create or replace the alert of an item
pub async fn set_alert(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(item_id): Path<Uuid>,
    Json(input): Json<SetAlertInput>,
) -> AppResult<Json<AlertConfig>> {
    let alert = state
        .inventory
        .set_alert(current_user.0.household_id, item_id, input)
        .await?;
    Ok(Json(alert))
}

/// Alert of an item, or null
pub async fn get_alert(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(item_id): Path<Uuid>,
) -> AppResult<Json<Option<AlertConfig>>> {
    let alert = state
        .inventory
        .get_alert(current_user.0.household_id, item_id)
        .await?;
    Ok(Json(alert))
}
