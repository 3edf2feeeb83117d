/// Notification model and database operations
///
/// Notifications are addressed to one user and may reference the claim they
/// are about and the user whose action produced them.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE notifications (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     claim_id UUID REFERENCES expense_claims(id) ON DELETE SET NULL,
///     sender_id UUID REFERENCES users(id) ON DELETE SET NULL,
///     title VARCHAR(255) NOT NULL,
///     message TEXT NOT NULL,
///     type notification_type NOT NULL DEFAULT 'INFO',
///     is_read BOOLEAN NOT NULL DEFAULT FALSE,
///     data JSONB,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use uuid::Uuid;

/// Number of notifications returned by the inbox listing
pub const INBOX_LIMIT: i64 = 50;

/// Value of `data.reminder_type` on daily review reminders
pub const DAILY_REVIEW_REMINDER: &str = "DAILY_CLAIM_REVIEW";

/// Values of `data.trigger` on daily review reminders
pub const SCHEDULED_TRIGGER: &str = "scheduled";
pub const MANUAL_TRIGGER: &str = "manual";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "notification_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    Info,
    Success,
    Warning,
    Error,
    ClaimApproved,
    ClaimRejected,
    ClaimSubmitted,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Notification {
    pub id: Uuid,

    /// Recipient
    pub user_id: Uuid,

    pub claim_id: Option<Uuid>,

    pub sender_id: Option<Uuid>,

    pub title: String,

    pub message: String,

    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: NotificationType,

    pub is_read: bool,

    pub data: Option<JsonValue>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Input for creating a notification
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub claim_id: Option<Uuid>,
    pub sender_id: Option<Uuid>,
    pub title: String,
    pub message: String,
    pub kind: NotificationType,
    pub data: Option<JsonValue>,
}

const NOTIFICATION_COLUMNS: &str =
    "id, user_id, claim_id, sender_id, title, message, type, is_read, data, created_at, updated_at";

impl Notification {
    pub async fn create(pool: &PgPool, data: NewNotification) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO notifications (user_id, claim_id, sender_id, title, message, type, data)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            NOTIFICATION_COLUMNS
        );

        sqlx::query_as::<_, Notification>(&query)
            .bind(data.user_id)
            .bind(data.claim_id)
            .bind(data.sender_id)
            .bind(data.title)
            .bind(data.message)
            .bind(data.kind)
            .bind(data.data)
            .fetch_one(pool)
            .await
    }

    /// Latest notifications of a user, newest first
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            r#"
            SELECT {}
            FROM notifications
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
            NOTIFICATION_COLUMNS
        );

        sqlx::query_as::<_, Notification>(&query)
            .bind(user_id)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    pub async fn unread_count(pool: &PgPool, user_id: Uuid) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND is_read = FALSE",
        )
        .bind(user_id)
        .fetch_one(pool)
        .await?;

        Ok(count)
    }

    /// Marks one notification read if it belongs to `user_id`
    ///
    /// Returns `None` when no such notification exists for that user.
    pub async fn mark_read(
        pool: &PgPool,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE notifications
            SET is_read = TRUE, updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING {}
            "#,
            NOTIFICATION_COLUMNS
        );

        sqlx::query_as::<_, Notification>(&query)
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Marks every unread notification of a user read, returning how many changed
    pub async fn mark_all_read(pool: &PgPool, user_id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET is_read = TRUE, updated_at = NOW()
            WHERE user_id = $1 AND is_read = FALSE
            "#,
        )
        .bind(user_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Managers that received a scheduled daily review reminder at or after `since`
    ///
    /// Manually triggered reminders do not count.
    pub async fn reminded_since(
        pool: &PgPool,
        since: DateTime<Utc>,
    ) -> Result<Vec<Uuid>, sqlx::Error> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT DISTINCT user_id
            FROM notifications
            WHERE data->>'reminder_type' = $1
              AND data->>'trigger' = $2
              AND created_at >= $3
            "#,
        )
        .bind(DAILY_REVIEW_REMINDER)
        .bind(SCHEDULED_TRIGGER)
        .bind(since)
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}
