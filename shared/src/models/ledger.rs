//! Stock ledger models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of stock movement
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MovementType {
    /// Stock received into a batch
    In,
    /// Stock used from the cabinet
    Out,
    /// Stocktake correction, either sign
    Adjust,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::In => "in",
            MovementType::Out => "out",
            MovementType::Adjust => "adjust",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "in" => Some(MovementType::In),
            "out" => Some(MovementType::Out),
            "adjust" => Some(MovementType::Adjust),
            _ => None,
        }
    }
}

/// Immutable record of one stock movement against one batch
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub item_id: Uuid,
    pub batch_id: Uuid,
    pub actor_user_id: Uuid,
    #[serde(rename = "type")]
    pub movement_type: MovementType,
    /// Signed: positive for `in`, negative for `out`, either for `adjust`
    pub qty_change: Decimal,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}
