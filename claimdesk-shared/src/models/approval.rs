/// Approval audit records
///
/// One row per approve/reject decision. Rows are never updated; the
/// approver reference is `ON DELETE RESTRICT` so history survives.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

/// Decision recorded by an approval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "approval_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Approval {
    pub id: Uuid,
    pub claim_id: Uuid,
    pub approver_id: Uuid,
    pub status: ApprovalStatus,
    pub comments: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Approval joined with the approver's name, for claim detail and reports
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ApprovalWithApprover {
    pub id: Uuid,
    pub claim_id: Uuid,
    pub approver_id: Uuid,
    pub approver_name: String,
    pub approver_email: String,
    pub status: ApprovalStatus,
    pub comments: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Approval {
    /// Records a decision, stamped with the current time
    pub async fn create(
        conn: &mut PgConnection,
        claim_id: Uuid,
        approver_id: Uuid,
        status: ApprovalStatus,
        comments: Option<&str>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Approval>(
            r#"
            INSERT INTO approvals (claim_id, approver_id, status, comments, approved_at)
            VALUES ($1, $2, $3, $4, NOW())
            RETURNING id, claim_id, approver_id, status, comments, approved_at, created_at
            "#,
        )
        .bind(claim_id)
        .bind(approver_id)
        .bind(status)
        .bind(comments)
        .fetch_one(conn)
        .await
    }

    /// Approval history of a claim, oldest first
    pub async fn list_for_claim(
        pool: &PgPool,
        claim_id: Uuid,
    ) -> Result<Vec<ApprovalWithApprover>, sqlx::Error> {
        sqlx::query_as::<_, ApprovalWithApprover>(
            r#"
            SELECT a.id, a.claim_id, a.approver_id,
                   u.name AS approver_name, u.email AS approver_email,
                   a.status, a.comments, a.approved_at, a.created_at
            FROM approvals a
            JOIN users u ON u.id = a.approver_id
            WHERE a.claim_id = $1
            ORDER BY a.created_at ASC
            "#,
        )
        .bind(claim_id)
        .fetch_all(pool)
        .await
    }
}
