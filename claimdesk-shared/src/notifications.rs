/// Notification sink and message builders
///
/// The lifecycle and the reminder job describe notifications as
/// [`NewNotification`] values and hand them to a [`NotificationSink`]. The
/// PostgreSQL sink writes them to the `notifications` table; the in-memory
/// sink records them for tests.
///
/// Delivery is best effort: callers log a failed send and carry on.

use async_trait::async_trait;
use serde_json::json;
use sqlx::PgPool;
use std::sync::Mutex;
use thiserror::Error;
use uuid::Uuid;

use crate::models::approval::ApprovalStatus;
use crate::models::claim::ExpenseClaim;
use crate::models::notification::{NewNotification, Notification, NotificationType};
use crate::money::format_usd;

/// Notification delivery error
#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("notification sink unavailable: {0}")]
    Unavailable(String),
}

/// Destination for notifications produced by claim transitions and reminders
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Records one notification, returning its ID
    async fn send(&self, notification: NewNotification) -> Result<Uuid, NotificationError>;
}

/// Sink writing rows to the `notifications` table
#[derive(Debug, Clone)]
pub struct PgNotificationSink {
    pool: PgPool,
}

impl PgNotificationSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationSink for PgNotificationSink {
    async fn send(&self, notification: NewNotification) -> Result<Uuid, NotificationError> {
        let user_id = notification.user_id;
        let created = Notification::create(&self.pool, notification).await?;

        tracing::debug!(
            notification_id = %created.id,
            user_id = %user_id,
            kind = ?created.kind,
            "Notification recorded"
        );

        Ok(created.id)
    }
}

/// Sink keeping notifications in memory
///
/// Optionally fails every send, to exercise the best-effort paths.
#[derive(Debug, Default)]
pub struct MemoryNotificationSink {
    sent: Mutex<Vec<NewNotification>>,
    fail: bool,
}

impl MemoryNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose every send fails
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// Notifications recorded so far
    pub fn sent(&self) -> Vec<NewNotification> {
        match self.sent.lock() {
            Ok(sent) => sent.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl NotificationSink for MemoryNotificationSink {
    async fn send(&self, notification: NewNotification) -> Result<Uuid, NotificationError> {
        if self.fail {
            return Err(NotificationError::Unavailable(
                "memory sink configured to fail".to_string(),
            ));
        }

        let mut sent = match self.sent.lock() {
            Ok(sent) => sent,
            Err(poisoned) => poisoned.into_inner(),
        };
        sent.push(notification);

        Ok(Uuid::new_v4())
    }
}

/// Notification telling a manager a claim was submitted for review
pub fn claim_submitted(claim: &ExpenseClaim, submitter_name: &str, manager_id: Uuid) -> NewNotification {
    NewNotification {
        user_id: manager_id,
        claim_id: Some(claim.id),
        sender_id: Some(claim.user_id),
        title: "New Claim Submitted".to_string(),
        message: format!(
            "{} submitted expense claim \"{}\" for {} and it is waiting for your review.",
            submitter_name,
            claim.title,
            format_usd(claim.total_amount)
        ),
        kind: NotificationType::ClaimSubmitted,
        data: Some(json!({
            "claim_title": claim.title,
            "submitter_name": submitter_name,
            "total_amount": claim.total_amount,
        })),
    }
}

/// Notification telling the owner about an approve/reject decision
///
/// The rejection message carries the reason when one was given.
pub fn claim_decided(
    claim: &ExpenseClaim,
    approver_id: Uuid,
    approver_name: &str,
    decision: ApprovalStatus,
    comments: Option<&str>,
) -> NewNotification {
    let (title, kind, verb, status) = match decision {
        ApprovalStatus::Rejected => (
            "Claim Rejected",
            NotificationType::ClaimRejected,
            "rejected",
            "REJECTED",
        ),
        _ => (
            "Claim Approved",
            NotificationType::ClaimApproved,
            "approved",
            "APPROVED",
        ),
    };

    let mut message = format!(
        "Your expense claim \"{}\" has been {} by {}.",
        claim.title, verb, approver_name
    );
    if decision == ApprovalStatus::Rejected {
        if let Some(reason) = comments.filter(|c| !c.trim().is_empty()) {
            message.push_str(&format!(" Reason: {}", reason));
        }
    }

    NewNotification {
        user_id: claim.user_id,
        claim_id: Some(claim.id),
        sender_id: Some(approver_id),
        title: title.to_string(),
        message,
        kind,
        data: Some(json!({
            "claim_title": claim.title,
            "approver_name": approver_name,
            "comments": comments,
            "status": status,
        })),
    }
}
