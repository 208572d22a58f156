//! Batch (lot) models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One expiry-dated lot of an item
///
/// `qty` is a projection of the ledger: it always equals the sum of the
/// `qty_change` of every ledger entry recorded against this batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Batch {
    pub id: Uuid,
    pub item_id: Uuid,
    pub lot_no: Option<String>,
    /// `None` means the batch never expires
    pub expiry_date: Option<NaiveDate>,
    pub qty: Decimal,
    pub unit: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for adding a batch to an item
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateBatchInput {
    pub lot_no: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    /// Opening quantity, defaults to zero
    pub qty: Option<Decimal>,
    /// Defaults to the item's unit
    pub unit: Option<String>,
}
