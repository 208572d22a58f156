//! Manual alert scan trigger

use axum::{extract::State, Json};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::ScanReport;
use crate::AppState;

/// Run the alert scanner for the caller's household
pub async fn scan_alerts(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<ScanReport>> {
    let report = state.scanner.run_once(current_user.0.household_id).await?;
    Ok(Json(report))
}
