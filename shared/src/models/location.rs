//! Storage location models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Named storage place within a household, e.g. "medicine cabinet"
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Location {
    pub id: Uuid,
    pub household_id: Uuid,
    pub name: String,
    pub notes: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a location
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateLocationInput {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    pub notes: Option<String>,
}
