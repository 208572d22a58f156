//! HTTP handlers for storage locations

use axum::{extract::State, http::StatusCode, Json};
use shared::{CreateLocationInput, Location};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::AppState;

/// List active locations of the household
pub async fn list_locations(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<Location>>> {
    let locations = state
        .inventory
        .list_locations(current_user.0.household_id)
        .await?;
    Ok(Json(locations))
}

/// Create a location
pub async fn create_location(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateLocationInput>,
) -> AppResult<(StatusCode, Json<Location>)> {
    let location = state
        .inventory
        .create_location(current_user.0.household_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(location)))
}
