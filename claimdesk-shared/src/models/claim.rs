/// Expense claim and line item models
///
/// A claim owns its items; `total_amount` is derived from them and written
/// in the same transaction as the items themselves.
///
/// # State Machine
///
/// ```text
/// DRAFT → IN_REVIEW → APPROVED
///                   → REJECTED
/// ```
///
/// Transition rules live in [`crate::lifecycle`]. The write helpers here are
/// conditional on the expected prior status and return `None` when the row
/// was not in that status.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE expense_claims (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     title VARCHAR(100) NOT NULL,
///     description TEXT,
///     total_amount NUMERIC(12, 2) NOT NULL DEFAULT 0,
///     currency VARCHAR(3) NOT NULL DEFAULT 'USD',
///     status claim_status NOT NULL DEFAULT 'DRAFT',
///     expense_date DATE NOT NULL,
///     submitted_at TIMESTAMPTZ,
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
///
/// CREATE TABLE expense_items (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     claim_id UUID NOT NULL REFERENCES expense_claims(id) ON DELETE CASCADE,
///     description VARCHAR(255) NOT NULL,
///     amount NUMERIC(12, 2) NOT NULL CHECK (amount > 0),
///     category expense_category NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::approval::ApprovalWithApprover;
use super::receipt::Receipt;

/// Claim status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "claim_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClaimStatus {
    /// Being prepared by the owner; the only mutable status
    Draft,

    /// Submitted, waiting for a manager decision
    InReview,

    Approved,

    Rejected,
}

impl ClaimStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimStatus::Draft => "DRAFT",
            ClaimStatus::InReview => "IN_REVIEW",
            ClaimStatus::Approved => "APPROVED",
            ClaimStatus::Rejected => "REJECTED",
        }
    }

    pub const ALL: [ClaimStatus; 4] = [
        ClaimStatus::Draft,
        ClaimStatus::InReview,
        ClaimStatus::Approved,
        ClaimStatus::Rejected,
    ];
}

impl std::fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Expense category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "expense_category", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExpenseCategory {
    Travel,
    Meals,
    Accommodation,
    Transport,
    OfficeSupplies,
    Training,
    Marketing,
    Other,
}

impl ExpenseCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpenseCategory::Travel => "TRAVEL",
            ExpenseCategory::Meals => "MEALS",
            ExpenseCategory::Accommodation => "ACCOMMODATION",
            ExpenseCategory::Transport => "TRANSPORT",
            ExpenseCategory::OfficeSupplies => "OFFICE_SUPPLIES",
            ExpenseCategory::Training => "TRAINING",
            ExpenseCategory::Marketing => "MARKETING",
            ExpenseCategory::Other => "OTHER",
        }
    }

    /// Human-readable label, used in reports
    pub fn label(&self) -> &'static str {
        match self {
            ExpenseCategory::Travel => "Travel",
            ExpenseCategory::Meals => "Meals",
            ExpenseCategory::Accommodation => "Accommodation",
            ExpenseCategory::Transport => "Transport",
            ExpenseCategory::OfficeSupplies => "Office Supplies",
            ExpenseCategory::Training => "Training",
            ExpenseCategory::Marketing => "Marketing",
            ExpenseCategory::Other => "Other",
        }
    }
}

/// Expense claim row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ExpenseClaim {
    pub id: Uuid,

    pub title: String,

    pub description: Option<String>,

    /// Sum of item amounts at last write
    pub total_amount: Decimal,

    pub currency: String,

    pub status: ClaimStatus,

    pub expense_date: NaiveDate,

    /// Set when the claim enters IN_REVIEW
    pub submitted_at: Option<DateTime<Utc>>,

    /// Owner
    pub user_id: Uuid,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Expense line item row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ExpenseItem {
    pub id: Uuid,
    pub claim_id: Uuid,
    pub description: String,
    pub amount: Decimal,
    pub category: ExpenseCategory,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Line item as supplied by the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewExpenseItem {
    pub description: String,
    pub amount: Decimal,
    pub category: ExpenseCategory,
}

/// Claim contents for create and replace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimDraft {
    pub title: String,
    pub description: Option<String>,
    pub currency: String,
    pub expense_date: NaiveDate,
    pub items: Vec<NewExpenseItem>,
}

impl ClaimDraft {
    /// Sum of the item amounts
    pub fn total(&self) -> Decimal {
        self.items.iter().map(|item| item.amount).sum()
    }
}

/// Row shape for claim listings
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ClaimListItem {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub total_amount: Decimal,
    pub currency: String,
    pub status: ClaimStatus,
    pub expense_date: NaiveDate,
    pub submitted_at: Option<DateTime<Utc>>,
    pub user_id: Uuid,
    pub user_name: String,
    pub user_email: String,
    pub item_count: i64,
    pub receipt_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Listing filter
#[derive(Debug, Clone, Copy, Default)]
pub struct ClaimFilter {
    /// Restrict to claims owned by this user
    pub owner_id: Option<Uuid>,

    pub status: Option<ClaimStatus>,
}

/// IN_REVIEW claim joined with its owner's manager, input to the reminder job
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct PendingClaim {
    pub id: Uuid,
    pub title: String,
    pub total_amount: Decimal,
    pub submitted_at: Option<DateTime<Utc>>,
    pub owner_id: Uuid,
    pub owner_name: String,
    pub manager_id: Option<Uuid>,
}

/// Owner summary embedded in claim detail
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ClaimOwner {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub department_name: Option<String>,
    pub manager_id: Option<Uuid>,
}

/// Claim with owner, items, receipts and approval history
#[derive(Debug, Clone, Serialize)]
pub struct ClaimDetail {
    #[serde(flatten)]
    pub claim: ExpenseClaim,
    pub user: ClaimOwner,
    pub items: Vec<ExpenseItem>,
    pub receipts: Vec<Receipt>,
    pub approvals: Vec<ApprovalWithApprover>,
}

const CLAIM_COLUMNS: &str = "id, title, description, total_amount, currency, status, \
     expense_date, submitted_at, user_id, created_at, updated_at";

impl ExpenseClaim {
    /// Inserts a DRAFT claim with a precomputed total
    ///
    /// Items are inserted separately with [`ExpenseItem::insert_many`] on the
    /// same connection.
    pub async fn insert(
        conn: &mut PgConnection,
        user_id: Uuid,
        draft: &ClaimDraft,
    ) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO expense_claims (title, description, total_amount, currency, expense_date, user_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            CLAIM_COLUMNS
        );

        sqlx::query_as::<_, ExpenseClaim>(&query)
            .bind(&draft.title)
            .bind(&draft.description)
            .bind(draft.total())
            .bind(&draft.currency)
            .bind(draft.expense_date)
            .bind(user_id)
            .fetch_one(conn)
            .await
    }

    /// Finds a claim by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {} FROM expense_claims WHERE id = $1", CLAIM_COLUMNS);

        sqlx::query_as::<_, ExpenseClaim>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Loads a claim and locks its row until the transaction ends
    pub async fn find_for_update(
        conn: &mut PgConnection,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM expense_claims WHERE id = $1 FOR UPDATE",
            CLAIM_COLUMNS
        );

        sqlx::query_as::<_, ExpenseClaim>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    /// Replaces the header fields and total of a DRAFT claim
    ///
    /// Returns `None` if the claim is no longer a draft.
    pub async fn update_contents(
        conn: &mut PgConnection,
        id: Uuid,
        draft: &ClaimDraft,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE expense_claims
            SET title = $2,
                description = $3,
                total_amount = $4,
                currency = $5,
                expense_date = $6,
                updated_at = NOW()
            WHERE id = $1 AND status = 'DRAFT'
            RETURNING {}
            "#,
            CLAIM_COLUMNS
        );

        sqlx::query_as::<_, ExpenseClaim>(&query)
            .bind(id)
            .bind(&draft.title)
            .bind(&draft.description)
            .bind(draft.total())
            .bind(&draft.currency)
            .bind(draft.expense_date)
            .fetch_optional(conn)
            .await
    }

    /// Moves a claim from `from` to `to`
    ///
    /// The update only applies while the row is still in `from`, so two
    /// concurrent transitions cannot both succeed. Entering IN_REVIEW stamps
    /// `submitted_at`.
    pub async fn transition(
        conn: &mut PgConnection,
        id: Uuid,
        from: ClaimStatus,
        to: ClaimStatus,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE expense_claims
            SET status = $3,
                submitted_at = CASE WHEN $3 = 'IN_REVIEW'::claim_status THEN NOW() ELSE submitted_at END,
                updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING {}
            "#,
            CLAIM_COLUMNS
        );

        sqlx::query_as::<_, ExpenseClaim>(&query)
            .bind(id)
            .bind(from)
            .bind(to)
            .fetch_optional(conn)
            .await
    }

    /// Deletes a DRAFT claim; items and receipts cascade
    pub async fn delete_draft(conn: &mut PgConnection, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM expense_claims WHERE id = $1 AND status = 'DRAFT'")
            .bind(id)
            .execute(conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Lists claims with owner and counts, newest first
    pub async fn list(pool: &PgPool, filter: ClaimFilter) -> Result<Vec<ClaimListItem>, sqlx::Error> {
        let mut query = String::from(
            r#"
            SELECT c.id, c.title, c.description, c.total_amount, c.currency, c.status,
                   c.expense_date, c.submitted_at, c.user_id,
                   u.name AS user_name, u.email AS user_email,
                   (SELECT COUNT(*) FROM expense_items i WHERE i.claim_id = c.id) AS item_count,
                   (SELECT COUNT(*) FROM receipts r WHERE r.claim_id = c.id) AS receipt_count,
                   c.created_at, c.updated_at
            FROM expense_claims c
            JOIN users u ON u.id = c.user_id
            WHERE TRUE
            "#,
        );
        let mut bind_count = 0;

        if filter.owner_id.is_some() {
            bind_count += 1;
            query.push_str(&format!(" AND c.user_id = ${}", bind_count));
        }
        if filter.status.is_some() {
            bind_count += 1;
            query.push_str(&format!(" AND c.status = ${}", bind_count));
        }
        query.push_str(" ORDER BY c.created_at DESC");

        let mut q = sqlx::query_as::<_, ClaimListItem>(&query);
        if let Some(owner_id) = filter.owner_id {
            q = q.bind(owner_id);
        }
        if let Some(status) = filter.status {
            q = q.bind(status);
        }

        q.fetch_all(pool).await
    }

    /// All IN_REVIEW claims with the owner's manager, oldest submission first
    pub async fn list_pending_review(pool: &PgPool) -> Result<Vec<PendingClaim>, sqlx::Error> {
        sqlx::query_as::<_, PendingClaim>(
            r#"
            SELECT c.id, c.title, c.total_amount, c.submitted_at,
                   u.id AS owner_id, u.name AS owner_name, u.manager_id
            FROM expense_claims c
            JOIN users u ON u.id = c.user_id
            WHERE c.status = 'IN_REVIEW'
            ORDER BY c.submitted_at ASC NULLS LAST, c.created_at ASC
            "#,
        )
        .fetch_all(pool)
        .await
    }
}

impl ExpenseItem {
    /// Inserts line items for a claim, preserving input order
    pub async fn insert_many(
        conn: &mut PgConnection,
        claim_id: Uuid,
        items: &[NewExpenseItem],
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut inserted = Vec::with_capacity(items.len());

        for item in items {
            let row = sqlx::query_as::<_, ExpenseItem>(
                r#"
                INSERT INTO expense_items (claim_id, description, amount, category)
                VALUES ($1, $2, $3, $4)
                RETURNING id, claim_id, description, amount, category, created_at, updated_at
                "#,
            )
            .bind(claim_id)
            .bind(&item.description)
            .bind(item.amount)
            .bind(item.category)
            .fetch_one(&mut *conn)
            .await?;

            inserted.push(row);
        }

        Ok(inserted)
    }

    /// Removes every item of a claim
    pub async fn delete_for_claim(conn: &mut PgConnection, claim_id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM expense_items WHERE claim_id = $1")
            .bind(claim_id)
            .execute(conn)
            .await?;

        Ok(result.rows_affected())
    }

    pub async fn count_for_claim(conn: &mut PgConnection, claim_id: Uuid) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM expense_items WHERE claim_id = $1")
                .bind(claim_id)
                .fetch_one(conn)
                .await?;

        Ok(count)
    }

    /// Items of a claim in insertion order
    pub async fn list_for_claim(pool: &PgPool, claim_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, ExpenseItem>(
            r#"
            SELECT id, claim_id, description, amount, category, created_at, updated_at
            FROM expense_items
            WHERE claim_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(claim_id)
        .fetch_all(pool)
        .await
    }
}

impl ClaimDetail {
    /// Loads a claim with everything the detail view and PDF report need
    pub async fn load(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let Some(claim) = ExpenseClaim::find_by_id(pool, id).await? else {
            return Ok(None);
        };

        let user = sqlx::query_as::<_, ClaimOwner>(
            r#"
            SELECT u.id, u.name, u.email, d.name AS department_name, u.manager_id
            FROM users u
            LEFT JOIN departments d ON d.id = u.department_id
            WHERE u.id = $1
            "#,
        )
        .bind(claim.user_id)
        .fetch_one(pool)
        .await?;

        let items = ExpenseItem::list_for_claim(pool, id).await?;
        let receipts = Receipt::list_for_claim(pool, id).await?;
        let approvals = super::approval::Approval::list_for_claim(pool, id).await?;

        Ok(Some(ClaimDetail {
            claim,
            user,
            items,
            receipts,
            approvals,
        }))
    }
}
