//! Medicine item models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{AlertConfig, Batch};

/// A medicine type kept by a household
///
/// The unit is fixed at the item level and every batch of the item
/// must carry the same unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Item {
    pub id: Uuid,
    pub household_id: Uuid,
    pub name: String,
    pub generic_name: Option<String>,
    pub form: MedicineForm,
    /// e.g. "500 mg", "5 mg/5 mL"
    pub strength: Option<String>,
    /// e.g. "painkiller", "antihistamine"
    pub category: Option<String>,
    /// e.g. "tablet", "ml", "g", "piece"
    pub unit: String,
    pub location_id: Option<Uuid>,
    /// Barcode / product code
    pub gtin: Option<String>,
    /// Reference into the file store, if a photo was uploaded
    pub photo_file_id: Option<String>,
    pub notes: Option<String>,
    pub is_archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Dosage form of a medicine
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MedicineForm {
    Tablet,
    Capsule,
    Syrup,
    Ointment,
    Spray,
    Drop,
    #[default]
    Other,
}

impl MedicineForm {
    pub fn as_str(&self) -> &'static str {
        match self {
            MedicineForm::Tablet => "tablet",
            MedicineForm::Capsule => "capsule",
            MedicineForm::Syrup => "syrup",
            MedicineForm::Ointment => "ointment",
            MedicineForm::Spray => "spray",
            MedicineForm::Drop => "drop",
            MedicineForm::Other => "other",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "tablet" => Some(MedicineForm::Tablet),
            "capsule" => Some(MedicineForm::Capsule),
            "syrup" => Some(MedicineForm::Syrup),
            "ointment" => Some(MedicineForm::Ointment),
            "spray" => Some(MedicineForm::Spray),
            "drop" => Some(MedicineForm::Drop),
            "other" => Some(MedicineForm::Other),
            _ => None,
        }
    }
}

/// Input for creating an item
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateItemInput {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    pub generic_name: Option<String>,
    #[serde(default)]
    pub form: MedicineForm,
    pub strength: Option<String>,
    pub category: Option<String>,
    #[validate(length(min = 1, message = "Unit is required"))]
    pub unit: String,
    pub location_id: Option<Uuid>,
    pub gtin: Option<String>,
    pub photo_file_id: Option<String>,
    pub notes: Option<String>,
}

/// Partial update for an item. Only supplied fields are applied.
///
/// The unit is not patchable once batches are recorded in it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemPatch {
    pub name: Option<String>,
    pub generic_name: Option<String>,
    pub form: Option<MedicineForm>,
    pub strength: Option<String>,
    pub category: Option<String>,
    pub location_id: Option<Uuid>,
    pub gtin: Option<String>,
    pub photo_file_id: Option<String>,
    pub notes: Option<String>,
}

impl ItemPatch {
    /// Apply the supplied fields onto `item`. A blank name is ignored.
    pub fn apply(self, item: &mut Item) {
        if let Some(name) = self.name {
            let name = name.trim();
            if !name.is_empty() {
                item.name = name.to_string();
            }
        }
        if let Some(v) = self.generic_name {
            item.generic_name = Some(v);
        }
        if let Some(v) = self.form {
            item.form = v;
        }
        if let Some(v) = self.strength {
            item.strength = Some(v);
        }
        if let Some(v) = self.category {
            item.category = Some(v);
        }
        if let Some(v) = self.location_id {
            item.location_id = Some(v);
        }
        if let Some(v) = self.gtin {
            item.gtin = Some(v);
        }
        if let Some(v) = self.photo_file_id {
            item.photo_file_id = Some(v);
        }
        if let Some(v) = self.notes {
            item.notes = Some(v);
        }
    }
}

/// List filter for items
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListItemFilter {
    /// Free text matched against name and generic name
    pub query: Option<String>,
    pub category: Option<String>,
    pub form: Option<MedicineForm>,
    pub location_id: Option<Uuid>,
    pub only_low: bool,
    pub only_expiring: bool,
    pub sort: ItemSort,
}

/// Sort key for item lists
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ItemSort {
    #[default]
    Name,
    StockAsc,
    StockDesc,
    ExpiryAsc,
    ExpiryDesc,
}

impl ItemSort {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "name" => Some(ItemSort::Name),
            "stock_asc" => Some(ItemSort::StockAsc),
            "stock_desc" => Some(ItemSort::StockDesc),
            "expiry_asc" => Some(ItemSort::ExpiryAsc),
            "expiry_desc" => Some(ItemSort::ExpiryDesc),
            _ => None,
        }
    }
}

/// Item with its total stock, nearest expiry and derived flags
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemSummary {
    pub item: Item,
    pub total_qty: Decimal,
    pub next_expiry: Option<NaiveDate>,
    /// Total is below the alert's minimum quantity
    pub low_stock: bool,
    /// Nearest expiry falls inside the alert's window
    pub expiring: bool,
}

/// Item with all batches and its alert configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemDetail {
    pub item: Item,
    pub batches: Vec<Batch>,
    pub total_qty: Decimal,
    pub next_expiry: Option<NaiveDate>,
    pub alert: Option<AlertConfig>,
}
