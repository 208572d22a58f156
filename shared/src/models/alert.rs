//! Per-item alert configuration

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Low-stock / expiring thresholds for one item (at most one per item)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertConfig {
    pub item_id: Uuid,
    /// Flag the item when its total stock drops below this
    pub min_qty: Option<Decimal>,
    /// Flag the item this many days before its nearest expiry
    pub expiry_window_days: Option<i32>,
    pub is_enabled: bool,
    pub updated_at: DateTime<Utc>,
}

/// Input for setting an item's alert
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SetAlertInput {
    pub min_qty: Option<Decimal>,
    pub expiry_window_days: Option<i32>,
    /// Defaults to enabled
    pub is_enabled: Option<bool>,
}
