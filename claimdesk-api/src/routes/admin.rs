/// Operational endpoints
///
/// # Endpoints
///
/// - `POST /admin/trigger-reminders` - Run the manager reminder job now

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use claimdesk_shared::{
    auth::{authorization::require_admin, middleware::AuthContext},
    reminders::{run_reminders, ReminderRun, ReminderSummary},
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct TriggerRemindersResponse {
    pub success: bool,
    pub message: String,
    pub summary: ReminderSummary,
    pub timestamp: DateTime<Utc>,
}

/// Runs the reminder job immediately
///
/// A manual run ignores the daily watermark, so every manager with pending
/// claims is reminded again. It does not suppress the next scheduled run.
///
/// # Errors
///
/// - `403 Forbidden`: Caller is not an admin
/// - `500 Internal Server Error`: The pending claims could not be loaded
pub async fn trigger_reminders(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Json<TriggerRemindersResponse>> {
    require_admin(&auth)?;

    let now = Utc::now();
    tracing::info!(triggered_by = %auth.user_id, "Manual reminder run requested");

    let summary = run_reminders(&state.db, state.notifier.as_ref(), now, ReminderRun::Manual).await?;

    Ok(Json(TriggerRemindersResponse {
        success: true,
        message: "Manager reminders triggered successfully".to_string(),
        summary,
        timestamp: now,
    }))
}
