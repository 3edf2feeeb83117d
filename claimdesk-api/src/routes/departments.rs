/// Department listing
///
/// # Endpoint
///
/// ```text
/// GET /departments
/// ```

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, Json};
use claimdesk_shared::{auth::middleware::AuthContext, models::department::Department};

/// All departments ordered by name
pub async fn list_departments(
    State(state): State<AppState>,
    _auth: AuthContext,
) -> ApiResult<Json<Vec<Department>>> {
    let departments = Department::list(&state.db).await?;
    Ok(Json(departments))
}
