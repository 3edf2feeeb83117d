/// Claim lifecycle
///
/// Enforces the claim state machine and performs each transition as a single
/// database transaction:
///
/// | From      | Action  | To        | Side effects                                   |
/// |-----------|---------|-----------|------------------------------------------------|
/// | (none)    | create  | DRAFT     | total computed from items                      |
/// | DRAFT     | edit    | DRAFT     | items replaced, total recomputed               |
/// | DRAFT     | receipt | DRAFT     | receipt attached, previous one replaced        |
/// | DRAFT     | delete  | (removed) | items and receipts removed                     |
/// | DRAFT     | submit  | IN_REVIEW | `submitted_at` set, manager notified           |
/// | IN_REVIEW | approve | APPROVED  | approval record, owner notified                |
/// | IN_REVIEW | reject  | REJECTED  | approval record with reason, owner notified    |
///
/// Status writes are conditional on the expected prior status, so of two
/// concurrent decisions on the same claim exactly one commits. Notifications
/// are sent after commit; a failed send is logged and the transition stands.
///
/// # Example
///
/// ```no_run
/// use claimdesk_shared::lifecycle::{approve_claim, Actor};
/// use claimdesk_shared::models::user::UserRole;
/// use claimdesk_shared::notifications::PgNotificationSink;
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, claim_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let sink = PgNotificationSink::new(pool.clone());
/// let manager = Actor { id: Uuid::new_v4(), role: UserRole::Manager, name: "Sari".into() };
///
/// let claim = approve_claim(&pool, &sink, &manager, claim_id, Some("Looks good")).await?;
/// println!("claim {} is now {}", claim.id, claim.status);
/// # Ok(())
/// # }
/// ```

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::approval::{Approval, ApprovalStatus};
use crate::models::claim::{ClaimDraft, ClaimStatus, ExpenseClaim, ExpenseItem};
use crate::models::notification::NewNotification;
use crate::models::receipt::{NewReceipt, Receipt};
use crate::models::user::{User, UserRole};
use crate::notifications::{self, NotificationSink};

/// Maximum number of line items on a claim
pub const MAX_ITEMS: usize = 20;

/// Largest amount accepted for a single line item
pub const MAX_ITEM_AMOUNT: Decimal = Decimal::from_parts(9_999_999, 0, 0, false, 2);

pub const MAX_TITLE_LEN: usize = 100;
pub const MAX_DESCRIPTION_LEN: usize = 500;
pub const MAX_ITEM_DESCRIPTION_LEN: usize = 255;

/// Operation requested on an existing claim
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimAction {
    Edit,
    Delete,
    Submit,
    Approve,
    Reject,
}

impl ClaimAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimAction::Edit => "edit",
            ClaimAction::Delete => "delete",
            ClaimAction::Submit => "submit",
            ClaimAction::Approve => "approve",
            ClaimAction::Reject => "reject",
        }
    }
}

impl std::fmt::Display for ClaimAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("claim not found")]
    NotFound,

    #[error("cannot {action} a claim in {status} status")]
    InvalidState {
        status: ClaimStatus,
        action: ClaimAction,
    },

    #[error("cannot submit a claim without expense items")]
    NoItems,

    #[error("rejection reason is required")]
    MissingComment,

    #[error("{0}")]
    Forbidden(String),

    #[error("invalid claim: {0}")]
    Invalid(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ClaimStatus {
    /// Status a claim ends in after `action`
    ///
    /// Delete is allowed from DRAFT only and yields DRAFT, the status the row
    /// had when it was removed.
    pub fn apply(self, action: ClaimAction) -> Result<ClaimStatus, LifecycleError> {
        match (self, action) {
            (ClaimStatus::Draft, ClaimAction::Edit) => Ok(ClaimStatus::Draft),
            (ClaimStatus::Draft, ClaimAction::Delete) => Ok(ClaimStatus::Draft),
            (ClaimStatus::Draft, ClaimAction::Submit) => Ok(ClaimStatus::InReview),
            (ClaimStatus::InReview, ClaimAction::Approve) => Ok(ClaimStatus::Approved),
            (ClaimStatus::InReview, ClaimAction::Reject) => Ok(ClaimStatus::Rejected),
            (status, action) => Err(LifecycleError::InvalidState { status, action }),
        }
    }
}

/// The user performing a lifecycle operation
#[derive(Debug, Clone)]
pub struct Actor {
    pub id: Uuid,
    pub role: UserRole,
    pub name: String,
}

impl Actor {
    /// Owners act on their own claims; admins act on any claim
    pub fn can_manage(&self, claim: &ExpenseClaim) -> bool {
        self.id == claim.user_id || self.role == UserRole::Admin
    }

    /// Owners, managers and admins may view a claim
    pub fn can_view(&self, claim: &ExpenseClaim) -> bool {
        self.id == claim.user_id || self.role.can_review()
    }
}

impl From<&User> for Actor {
    fn from(user: &User) -> Self {
        Actor {
            id: user.id,
            role: user.role,
            name: user.name.clone(),
        }
    }
}

/// Claim together with its current items
#[derive(Debug, Clone, Serialize)]
pub struct ClaimWithItems {
    #[serde(flatten)]
    pub claim: ExpenseClaim,
    pub items: Vec<ExpenseItem>,
}

/// Checks the invariants every stored draft must satisfy
pub fn validate_draft(draft: &ClaimDraft) -> Result<(), LifecycleError> {
    let title = draft.title.trim();
    if title.is_empty() || title.chars().count() > MAX_TITLE_LEN {
        return Err(LifecycleError::Invalid(format!(
            "title must be 1 to {} characters",
            MAX_TITLE_LEN
        )));
    }

    if let Some(description) = &draft.description {
        if description.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(LifecycleError::Invalid(format!(
                "description must be at most {} characters",
                MAX_DESCRIPTION_LEN
            )));
        }
    }

    if draft.currency.len() != 3 || !draft.currency.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(LifecycleError::Invalid(
            "currency must be a three-letter ISO code".to_string(),
        ));
    }

    if draft.items.is_empty() || draft.items.len() > MAX_ITEMS {
        return Err(LifecycleError::Invalid(format!(
            "a claim needs 1 to {} expense items",
            MAX_ITEMS
        )));
    }

    for (index, item) in draft.items.iter().enumerate() {
        let description = item.description.trim();
        if description.is_empty() || description.chars().count() > MAX_ITEM_DESCRIPTION_LEN {
            return Err(LifecycleError::Invalid(format!(
                "item {}: description must be 1 to {} characters",
                index + 1,
                MAX_ITEM_DESCRIPTION_LEN
            )));
        }
        if item.amount <= Decimal::ZERO || item.amount > MAX_ITEM_AMOUNT {
            return Err(LifecycleError::Invalid(format!(
                "item {}: amount must be greater than 0 and at most {}",
                index + 1,
                MAX_ITEM_AMOUNT
            )));
        }
        if item.amount.normalize().scale() > 2 {
            return Err(LifecycleError::Invalid(format!(
                "item {}: amount cannot have more than two decimal places",
                index + 1
            )));
        }
    }

    Ok(())
}

/// Trims a reviewer comment, mapping blank input to `None`
pub fn normalize_comment(comment: Option<&str>) -> Option<String> {
    comment
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
}

fn ensure_manages(actor: &Actor, claim: &ExpenseClaim, action: ClaimAction) -> Result<(), LifecycleError> {
    if actor.can_manage(claim) {
        Ok(())
    } else {
        Err(LifecycleError::Forbidden(format!(
            "only the claim owner can {} this claim",
            action
        )))
    }
}

fn ensure_reviewer(actor: &Actor) -> Result<(), LifecycleError> {
    if actor.role.can_review() {
        Ok(())
    } else {
        Err(LifecycleError::Forbidden("manager role required".to_string()))
    }
}

async fn dispatch(sink: &dyn NotificationSink, notification: NewNotification) {
    let user_id = notification.user_id;
    let claim_id = notification.claim_id;

    if let Err(e) = sink.send(notification).await {
        warn!(
            user_id = %user_id,
            claim_id = ?claim_id,
            error = %e,
            "Failed to send claim notification"
        );
    }
}

/// Creates a DRAFT claim owned by `actor` with the given items
pub async fn create_claim(
    pool: &PgPool,
    actor: &Actor,
    draft: ClaimDraft,
) -> Result<ClaimWithItems, LifecycleError> {
    validate_draft(&draft)?;

    let mut tx = pool.begin().await?;
    let claim = ExpenseClaim::insert(&mut *tx, actor.id, &draft).await?;
    let items = ExpenseItem::insert_many(&mut *tx, claim.id, &draft.items).await?;
    tx.commit().await?;

    info!(
        claim_id = %claim.id,
        user_id = %actor.id,
        item_count = items.len(),
        total_amount = %claim.total_amount,
        "Expense claim created"
    );

    Ok(ClaimWithItems { claim, items })
}

/// Replaces the contents and items of a DRAFT claim
pub async fn update_draft(
    pool: &PgPool,
    actor: &Actor,
    claim_id: Uuid,
    draft: ClaimDraft,
) -> Result<ClaimWithItems, LifecycleError> {
    validate_draft(&draft)?;

    let mut tx = pool.begin().await?;

    let current = ExpenseClaim::find_for_update(&mut *tx, claim_id)
        .await?
        .ok_or(LifecycleError::NotFound)?;
    ensure_manages(actor, &current, ClaimAction::Edit)?;
    current.status.apply(ClaimAction::Edit)?;

    ExpenseItem::delete_for_claim(&mut *tx, claim_id).await?;
    let claim = ExpenseClaim::update_contents(&mut *tx, claim_id, &draft)
        .await?
        .ok_or(LifecycleError::InvalidState {
            status: current.status,
            action: ClaimAction::Edit,
        })?;
    let items = ExpenseItem::insert_many(&mut *tx, claim_id, &draft.items).await?;

    tx.commit().await?;

    info!(
        claim_id = %claim_id,
        item_count = items.len(),
        total_amount = %claim.total_amount,
        "Draft claim updated"
    );

    Ok(ClaimWithItems { claim, items })
}

/// Attaches a receipt to a DRAFT claim, replacing any previous one
///
/// The claim row stays locked until commit, so a concurrent submit either
/// waits for the receipt or makes this call fail with an invalid-state error.
/// Returns the new row and the file URLs of the receipts it replaced.
pub async fn attach_receipt(
    pool: &PgPool,
    actor: &Actor,
    claim_id: Uuid,
    receipt: NewReceipt,
) -> Result<(Receipt, Vec<String>), LifecycleError> {
    let mut tx = pool.begin().await?;

    let current = ExpenseClaim::find_for_update(&mut *tx, claim_id)
        .await?
        .ok_or(LifecycleError::NotFound)?;
    ensure_manages(actor, &current, ClaimAction::Edit)?;
    current.status.apply(ClaimAction::Edit)?;

    let (receipt, replaced) = Receipt::replace_for_claim(&mut *tx, claim_id, receipt).await?;

    tx.commit().await?;

    info!(
        claim_id = %claim_id,
        file_url = %receipt.file_url,
        file_size = receipt.file_size,
        replaced = replaced.len(),
        "Receipt attached"
    );

    Ok((receipt, replaced))
}

/// Deletes a DRAFT claim
///
/// Returns the file URLs of the receipts removed with it.
pub async fn delete_draft(
    pool: &PgPool,
    actor: &Actor,
    claim_id: Uuid,
) -> Result<Vec<String>, LifecycleError> {
    let mut tx = pool.begin().await?;

    let current = ExpenseClaim::find_for_update(&mut *tx, claim_id)
        .await?
        .ok_or(LifecycleError::NotFound)?;
    ensure_manages(actor, &current, ClaimAction::Delete)?;
    current.status.apply(ClaimAction::Delete)?;

    let receipt_urls = Receipt::delete_for_claim(&mut *tx, claim_id).await?;

    if !ExpenseClaim::delete_draft(&mut *tx, claim_id).await? {
        return Err(LifecycleError::InvalidState {
            status: current.status,
            action: ClaimAction::Delete,
        });
    }

    tx.commit().await?;

    info!(claim_id = %claim_id, user_id = %actor.id, "Draft claim deleted");
    Ok(receipt_urls)
}

/// Moves a DRAFT claim with at least one item to IN_REVIEW
///
/// The owner's manager, if any, is notified after commit.
pub async fn submit_claim(
    pool: &PgPool,
    sink: &dyn NotificationSink,
    actor: &Actor,
    claim_id: Uuid,
) -> Result<ExpenseClaim, LifecycleError> {
    let mut tx = pool.begin().await?;

    let current = ExpenseClaim::find_for_update(&mut *tx, claim_id)
        .await?
        .ok_or(LifecycleError::NotFound)?;
    ensure_manages(actor, &current, ClaimAction::Submit)?;
    let next = current.status.apply(ClaimAction::Submit)?;

    if ExpenseItem::count_for_claim(&mut *tx, claim_id).await? == 0 {
        return Err(LifecycleError::NoItems);
    }

    let claim = ExpenseClaim::transition(&mut *tx, claim_id, current.status, next)
        .await?
        .ok_or(LifecycleError::InvalidState {
            status: current.status,
            action: ClaimAction::Submit,
        })?;

    tx.commit().await?;

    info!(
        claim_id = %claim_id,
        user_id = %claim.user_id,
        total_amount = %claim.total_amount,
        "Expense claim submitted for review"
    );

    match User::find_by_id(pool, claim.user_id).await {
        Ok(Some(owner)) => match owner.manager_id {
            Some(manager_id) => {
                dispatch(sink, notifications::claim_submitted(&claim, &owner.name, manager_id)).await
            }
            None => warn!(
                claim_id = %claim_id,
                user_id = %owner.id,
                "Submitted claim owner has no manager, nobody notified"
            ),
        },
        Ok(None) => {}
        Err(e) => warn!(claim_id = %claim_id, error = %e, "Failed to load claim owner for notification"),
    }

    Ok(claim)
}

/// Approves an IN_REVIEW claim
pub async fn approve_claim(
    pool: &PgPool,
    sink: &dyn NotificationSink,
    actor: &Actor,
    claim_id: Uuid,
    comments: Option<&str>,
) -> Result<ExpenseClaim, LifecycleError> {
    ensure_reviewer(actor)?;
    let comments = normalize_comment(comments);

    decide(pool, sink, actor, claim_id, ClaimAction::Approve, comments).await
}

/// Rejects an IN_REVIEW claim; a non-blank reason is required
pub async fn reject_claim(
    pool: &PgPool,
    sink: &dyn NotificationSink,
    actor: &Actor,
    claim_id: Uuid,
    comments: Option<&str>,
) -> Result<ExpenseClaim, LifecycleError> {
    let comments = normalize_comment(comments).ok_or(LifecycleError::MissingComment)?;
    ensure_reviewer(actor)?;

    decide(pool, sink, actor, claim_id, ClaimAction::Reject, Some(comments)).await
}

async fn decide(
    pool: &PgPool,
    sink: &dyn NotificationSink,
    actor: &Actor,
    claim_id: Uuid,
    action: ClaimAction,
    comments: Option<String>,
) -> Result<ExpenseClaim, LifecycleError> {
    let mut tx = pool.begin().await?;

    let current = ExpenseClaim::find_for_update(&mut *tx, claim_id)
        .await?
        .ok_or(LifecycleError::NotFound)?;
    let next = current.status.apply(action)?;

    let claim = ExpenseClaim::transition(&mut *tx, claim_id, current.status, next)
        .await?
        .ok_or(LifecycleError::InvalidState {
            status: current.status,
            action,
        })?;

    let decision = if next == ClaimStatus::Approved {
        ApprovalStatus::Approved
    } else {
        ApprovalStatus::Rejected
    };
    let approval = Approval::create(&mut *tx, claim_id, actor.id, decision, comments.as_deref()).await?;

    tx.commit().await?;

    info!(
        claim_id = %claim_id,
        approval_id = %approval.id,
        approver_id = %actor.id,
        status = %claim.status,
        "Claim decision recorded"
    );

    dispatch(
        sink,
        notifications::claim_decided(&claim, actor.id, &actor.name, decision, comments.as_deref()),
    )
    .await;

    Ok(claim)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::claim::{ExpenseCategory, NewExpenseItem};
    use chrono::{NaiveDate, Utc};

    fn draft(amounts: &[&str]) -> ClaimDraft {
        ClaimDraft {
            title: "Client visit".to_string(),
            description: Some("Bandung".to_string()),
            currency: "USD".to_string(),
            expense_date: NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
            items: amounts
                .iter()
                .map(|a| NewExpenseItem {
                    description: "Train".to_string(),
                    amount: a.parse().unwrap(),
                    category: ExpenseCategory::Transport,
                })
                .collect(),
        }
    }

    fn claim_owned_by(user_id: Uuid) -> ExpenseClaim {
        ExpenseClaim {
            id: Uuid::new_v4(),
            title: "Claim".to_string(),
            description: None,
            total_amount: Decimal::ONE,
            currency: "USD".to_string(),
            status: ClaimStatus::Draft,
            expense_date: NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
            submitted_at: None,
            user_id,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn actor(role: UserRole) -> Actor {
        Actor {
            id: Uuid::new_v4(),
            role,
            name: "Actor".to_string(),
        }
    }

    #[test]
    fn test_valid_transitions() {
        assert_eq!(ClaimStatus::Draft.apply(ClaimAction::Submit).unwrap(), ClaimStatus::InReview);
        assert_eq!(ClaimStatus::Draft.apply(ClaimAction::Edit).unwrap(), ClaimStatus::Draft);
        assert_eq!(ClaimStatus::Draft.apply(ClaimAction::Delete).unwrap(), ClaimStatus::Draft);
        assert_eq!(
            ClaimStatus::InReview.apply(ClaimAction::Approve).unwrap(),
            ClaimStatus::Approved
        );
        assert_eq!(
            ClaimStatus::InReview.apply(ClaimAction::Reject).unwrap(),
            ClaimStatus::Rejected
        );
    }

    #[test]
    fn test_only_in_review_can_be_decided() {
        for status in [ClaimStatus::Draft, ClaimStatus::Approved, ClaimStatus::Rejected] {
            for action in [ClaimAction::Approve, ClaimAction::Reject] {
                match status.apply(action) {
                    Err(LifecycleError::InvalidState { status: s, action: a }) => {
                        assert_eq!(s, status);
                        assert_eq!(a, action);
                    }
                    other => panic!("expected invalid state for {status} {action}, got {other:?}"),
                }
            }
        }
    }

    #[test]
    fn test_only_draft_is_mutable() {
        for status in [ClaimStatus::InReview, ClaimStatus::Approved, ClaimStatus::Rejected] {
            for action in [ClaimAction::Edit, ClaimAction::Delete, ClaimAction::Submit] {
                assert!(status.apply(action).is_err(), "{status} allowed {action}");
            }
        }
    }

    #[test]
    fn test_invalid_state_message() {
        let err = ClaimStatus::Approved.apply(ClaimAction::Edit).unwrap_err();
        assert_eq!(err.to_string(), "cannot edit a claim in APPROVED status");
    }

    #[test]
    fn test_validate_draft_accepts_typical_claim() {
        assert!(validate_draft(&draft(&["12.50", "99999.99"])).is_ok());
    }

    #[test]
    fn test_validate_draft_rejects_bad_items() {
        assert!(validate_draft(&draft(&[])).is_err());
        assert!(validate_draft(&draft(&["0"])).is_err());
        assert!(validate_draft(&draft(&["-5"])).is_err());
        assert!(validate_draft(&draft(&["100000.00"])).is_err());
        assert!(validate_draft(&draft(&["1.005"])).is_err());

        let too_many: Vec<&str> = vec!["1.00"; MAX_ITEMS + 1];
        assert!(validate_draft(&draft(&too_many)).is_err());
    }

    #[test]
    fn test_validate_draft_rejects_bad_header() {
        let mut d = draft(&["1.00"]);
        d.title = "   ".to_string();
        assert!(validate_draft(&d).is_err());

        let mut d = draft(&["1.00"]);
        d.title = "x".repeat(MAX_TITLE_LEN + 1);
        assert!(validate_draft(&d).is_err());

        let mut d = draft(&["1.00"]);
        d.currency = "usd".to_string();
        assert!(validate_draft(&d).is_err());
    }

    #[test]
    fn test_normalize_comment() {
        assert_eq!(normalize_comment(None), None);
        assert_eq!(normalize_comment(Some("")), None);
        assert_eq!(normalize_comment(Some("   \n\t")), None);
        assert_eq!(normalize_comment(Some("  too high ")), Some("too high".to_string()));
    }

    #[test]
    fn test_actor_permissions() {
        let employee = actor(UserRole::Employee);
        let own = claim_owned_by(employee.id);
        let other = claim_owned_by(Uuid::new_v4());

        assert!(employee.can_manage(&own));
        assert!(!employee.can_manage(&other));
        assert!(employee.can_view(&own));
        assert!(!employee.can_view(&other));

        let manager = actor(UserRole::Manager);
        assert!(!manager.can_manage(&other));
        assert!(manager.can_view(&other));

        let admin = actor(UserRole::Admin);
        assert!(admin.can_manage(&other));
        assert!(admin.can_view(&other));
    }

    #[test]
    fn test_employee_cannot_review() {
        assert!(matches!(
            ensure_reviewer(&actor(UserRole::Employee)),
            Err(LifecycleError::Forbidden(_))
        ));
        assert!(ensure_reviewer(&actor(UserRole::Manager)).is_ok());
    }

    #[test]
    fn test_max_item_amount() {
        assert_eq!(MAX_ITEM_AMOUNT.to_string(), "99999.99");
    }
}
