/// Aggregation queries for the manager dashboard
///
/// Read-only. Every query runs against the whole claim table; the dashboard
/// is restricted to MANAGER and ADMIN at the HTTP layer.

use chrono::{DateTime, Datelike, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use super::claim::{ClaimStatus, ExpenseCategory};

/// Size of the approval queue shown on the dashboard
pub const APPROVAL_QUEUE_LIMIT: i64 = 10;

#[derive(Debug, Clone, Serialize)]
pub struct StatusShare {
    pub status: ClaimStatus,
    pub count: i64,
    /// Share of all claims, 0..=100
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct MonthlyTotal {
    /// Abbreviated month name, e.g. `Mar`
    pub month: String,
    pub amount: Decimal,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CategoryTotal {
    pub category: ExpenseCategory,
    pub count: i64,
    pub total_amount: Decimal,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct QueuedClaim {
    pub id: Uuid,
    pub title: String,
    pub total_amount: Decimal,
    pub submitted_at: Option<DateTime<Utc>>,
    pub status: ClaimStatus,
    pub user_id: Uuid,
    pub user_name: String,
    pub user_email: String,
    pub department_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummary {
    pub status_data: Vec<StatusShare>,
    pub monthly_data: Vec<MonthlyTotal>,
    pub category_data: Vec<CategoryTotal>,
    pub approval_queue: Vec<QueuedClaim>,
}

/// Converts raw per-status counts into shares of the total
pub fn status_shares(counts: Vec<(ClaimStatus, i64)>) -> Vec<StatusShare> {
    let total: i64 = counts.iter().map(|(_, count)| count).sum();

    counts
        .into_iter()
        .map(|(status, count)| StatusShare {
            status,
            count,
            percentage: if total > 0 {
                count as f64 / total as f64 * 100.0
            } else {
                0.0
            },
        })
        .collect()
}

impl DashboardSummary {
    /// Runs all dashboard aggregations, bucketing submissions of the year of `now`
    pub async fn load(pool: &PgPool, now: DateTime<Utc>) -> Result<Self, sqlx::Error> {
        let counts: Vec<(ClaimStatus, i64)> = sqlx::query_as(
            r#"
            SELECT status, COUNT(*)
            FROM expense_claims
            GROUP BY status
            ORDER BY status
            "#,
        )
        .fetch_all(pool)
        .await?;

        let year_start = Utc
            .with_ymd_and_hms(now.year(), 1, 1, 0, 0, 0)
            .single()
            .unwrap_or(now);

        let monthly_data = sqlx::query_as::<_, MonthlyTotal>(
            r#"
            SELECT TO_CHAR(DATE_TRUNC('month', submitted_at), 'Mon') AS month,
                   SUM(total_amount) AS amount,
                   COUNT(*) AS count
            FROM expense_claims
            WHERE submitted_at >= $1 AND submitted_at < $1 + INTERVAL '1 year'
            GROUP BY DATE_TRUNC('month', submitted_at)
            ORDER BY DATE_TRUNC('month', submitted_at)
            "#,
        )
        .bind(year_start)
        .fetch_all(pool)
        .await?;

        let category_data = sqlx::query_as::<_, CategoryTotal>(
            r#"
            SELECT category,
                   COUNT(DISTINCT claim_id) AS count,
                   SUM(amount) AS total_amount
            FROM expense_items
            GROUP BY category
            ORDER BY category
            "#,
        )
        .fetch_all(pool)
        .await?;

        let approval_queue = sqlx::query_as::<_, QueuedClaim>(
            r#"
            SELECT c.id, c.title, c.total_amount, c.submitted_at, c.status,
                   u.id AS user_id, u.name AS user_name, u.email AS user_email,
                   d.name AS department_name
            FROM expense_claims c
            JOIN users u ON u.id = c.user_id
            LEFT JOIN departments d ON d.id = u.department_id
            WHERE c.status = 'IN_REVIEW'
            ORDER BY c.submitted_at ASC NULLS LAST
            LIMIT $1
            "#,
        )
        .bind(APPROVAL_QUEUE_LIMIT)
        .fetch_all(pool)
        .await?;

        Ok(DashboardSummary {
            status_data: status_shares(counts),
            monthly_data,
            category_data,
            approval_queue,
        })
    }
}
