/// Reviewer dashboard
///
/// # Endpoint
///
/// ```text
/// GET /dashboard
/// ```
///
/// Returns the claim status distribution, monthly totals for the current
/// year, per-category totals and the oldest claims waiting for review.

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, Json};
use chrono::Utc;
use claimdesk_shared::{
    auth::{authorization::require_reviewer, middleware::AuthContext},
    models::dashboard::DashboardSummary,
};

pub async fn get_dashboard(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Json<DashboardSummary>> {
    require_reviewer(&auth)?;

    let summary = DashboardSummary::load(&state.db, Utc::now()).await?;
    Ok(Json(summary))
}
