/// Notification inbox endpoints
///
/// Every handler is scoped to the authenticated user; a notification owned
/// by someone else behaves as if it did not exist.
///
/// # Endpoints
///
/// - `GET /notifications` - Latest notifications and the unread count
/// - `PUT /notifications/:id/read` - Mark one read
/// - `PUT /notifications/mark-all-read` - Mark all read

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, State},
    Json,
};
use axum_extra::extract::WithRejection;
use claimdesk_shared::{
    auth::middleware::AuthContext,
    models::notification::{Notification, INBOX_LIMIT},
};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct NotificationListResponse {
    pub data: Vec<Notification>,
    pub unread_count: i64,
}

#[derive(Debug, Serialize)]
pub struct MarkAllReadResponse {
    pub updated: u64,
}

/// Latest notifications, newest first
pub async fn list_notifications(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Json<NotificationListResponse>> {
    let data = Notification::list_for_user(&state.db, auth.user_id, INBOX_LIMIT).await?;
    let unread_count = Notification::unread_count(&state.db, auth.user_id).await?;

    Ok(Json(NotificationListResponse { data, unread_count }))
}

pub async fn mark_read(
    State(state): State<AppState>,
    auth: AuthContext,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
) -> ApiResult<Json<Notification>> {
    Notification::mark_read(&state.db, id, auth.user_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Notification not found".to_string()))
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Json<MarkAllReadResponse>> {
    let updated = Notification::mark_all_read(&state.db, auth.user_id).await?;

    tracing::debug!(user_id = %auth.user_id, updated, "Notifications marked read");

    Ok(Json(MarkAllReadResponse { updated }))
}
