/// Expense claim endpoints
///
/// Thin handlers over [`claimdesk_shared::lifecycle`]: they parse and
/// validate the request, build an [`Actor`] from the session and delegate.
/// Status rules, ownership checks and notifications live in the lifecycle
/// module so the HTTP layer cannot bypass them.
///
/// # Endpoints
///
/// - `GET /claims` - List claims (employees see their own)
/// - `POST /claims` - Create a DRAFT
/// - `GET /claims/:id` - Claim detail
/// - `PUT /claims/:id` - Replace DRAFT contents
/// - `DELETE /claims/:id` - Delete a DRAFT
/// - `PUT /claims/:id/submit` - Submit for review
/// - `PUT /claims/:id/approve` - Approve
/// - `PUT /claims/:id/reject` - Reject with a reason
/// - `POST /claims/:id/upload-receipt` - Attach a receipt file
/// - `GET /claims/:id/download-pdf` - PDF report of an approved claim

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    pdf,
    storage::ReceiptUpload,
};
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::{Multipart, WithRejection};
use chrono::{NaiveDate, Utc};
use claimdesk_shared::{
    auth::middleware::AuthContext,
    lifecycle::{self, Actor, ClaimAction, ClaimWithItems},
    models::{
        claim::{
            ClaimDetail, ClaimDraft, ClaimFilter, ClaimListItem, ClaimStatus, ExpenseCategory,
            ExpenseClaim, NewExpenseItem,
        },
        receipt::{NewReceipt, Receipt},
        user::UserRole,
    },
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Multipart field carrying the receipt file
const RECEIPT_FIELD: &str = "receipt";

fn default_currency() -> String {
    "USD".to_string()
}

/// Line item in a create or update request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemRequest {
    pub description: String,
    pub amount: Decimal,
    pub category: ExpenseCategory,
}

/// Create or replace request
///
/// Item-level rules (description length, amount range and precision) are
/// enforced by [`lifecycle::validate_draft`].
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ClaimRequest {
    #[validate(length(min = 1, max = 100, message = "Title must be 1 to 100 characters"))]
    pub title: String,

    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: Option<String>,

    #[serde(default = "default_currency")]
    #[validate(length(equal = 3, message = "Currency must be a three-letter code"))]
    pub currency: String,

    pub expense_date: NaiveDate,

    #[validate(length(min = 1, max = 20, message = "A claim needs 1 to 20 expense items"))]
    pub items: Vec<ItemRequest>,
}

impl ClaimRequest {
    pub fn into_draft(self) -> ClaimDraft {
        ClaimDraft {
            title: self.title.trim().to_string(),
            description: self
                .description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            currency: self.currency.trim().to_ascii_uppercase(),
            expense_date: self.expense_date,
            items: self
                .items
                .into_iter()
                .map(|item| NewExpenseItem {
                    description: item.description.trim().to_string(),
                    amount: item.amount,
                    category: item.category,
                })
                .collect(),
        }
    }
}

/// Listing query
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub status: Option<ClaimStatus>,
}

/// Listing response
#[derive(Debug, Serialize)]
pub struct ClaimListResponse {
    pub data: Vec<ClaimListItem>,
    pub count: usize,
}

/// Approve or reject body
#[derive(Debug, Default, Deserialize)]
pub struct DecisionRequest {
    pub comments: Option<String>,
}

/// Loads a claim the caller may view
async fn viewable_claim(state: &AppState, actor: &Actor, claim_id: Uuid) -> ApiResult<ExpenseClaim> {
    let claim = ExpenseClaim::find_by_id(&state.db, claim_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Claim not found".to_string()))?;

    if !actor.can_view(&claim) {
        return Err(ApiError::Forbidden(
            "You do not have access to this claim".to_string(),
        ));
    }

    Ok(claim)
}

/// Deletes receipt files whose rows are gone
async fn remove_files(state: &AppState, urls: Vec<String>) {
    for url in urls {
        if let Err(e) = state.receipts.remove(&url).await {
            tracing::warn!(file_url = %url, error = %e, "Failed to remove receipt file");
        }
    }
}

/// List claims
///
/// Employees only see their own claims; managers and admins see all.
///
/// # Endpoint
///
/// ```text
/// GET /claims?status=IN_REVIEW
/// ```
pub async fn list_claims(
    State(state): State<AppState>,
    auth: AuthContext,
    WithRejection(Query(query), _): WithRejection<Query<ListQuery>, ApiError>,
) -> ApiResult<Json<ClaimListResponse>> {
    let owner_id = match auth.role {
        UserRole::Employee => Some(auth.user_id),
        UserRole::Manager | UserRole::Admin => None,
    };

    let data = ExpenseClaim::list(
        &state.db,
        ClaimFilter {
            owner_id,
            status: query.status,
        },
    )
    .await?;

    let count = data.len();
    Ok(Json(ClaimListResponse { data, count }))
}

/// Create a DRAFT claim
///
/// # Endpoint
///
/// ```text
/// POST /claims
/// Content-Type: application/json
///
/// {
///   "title": "Client visit Surabaya",
///   "currency": "USD",
///   "expense_date": "2025-03-10",
///   "items": [
///     { "description": "Flight", "amount": "120.00", "category": "TRAVEL" }
///   ]
/// }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: Validation failed
pub async fn create_claim(
    State(state): State<AppState>,
    auth: AuthContext,
    WithRejection(Json(req), _): WithRejection<Json<ClaimRequest>, ApiError>,
) -> ApiResult<(StatusCode, Json<ClaimWithItems>)> {
    req.validate()?;

    let created = lifecycle::create_claim(&state.db, &auth.actor(), req.into_draft()).await?;

    Ok((StatusCode::CREATED, Json(created)))
}

/// Claim detail with owner, items, receipts and approval history
pub async fn get_claim(
    State(state): State<AppState>,
    auth: AuthContext,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
) -> ApiResult<Json<ClaimDetail>> {
    viewable_claim(&state, &auth.actor(), id).await?;

    let detail = ClaimDetail::load(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Claim not found".to_string()))?;

    Ok(Json(detail))
}

/// Replace the contents of a DRAFT claim
///
/// # Errors
///
/// - `400 Bad Request`: Validation failed or the claim is not a DRAFT
/// - `403 Forbidden`: Not the owner or an admin
/// - `404 Not Found`: Unknown claim
pub async fn update_claim(
    State(state): State<AppState>,
    auth: AuthContext,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
    WithRejection(Json(req), _): WithRejection<Json<ClaimRequest>, ApiError>,
) -> ApiResult<Json<ClaimWithItems>> {
    req.validate()?;

    let updated = lifecycle::update_draft(&state.db, &auth.actor(), id, req.into_draft()).await?;

    Ok(Json(updated))
}

/// Delete a DRAFT claim and its receipt files
pub async fn delete_claim(
    State(state): State<AppState>,
    auth: AuthContext,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
) -> ApiResult<Json<serde_json::Value>> {
    let receipt_urls = lifecycle::delete_draft(&state.db, &auth.actor(), id).await?;

    remove_files(&state, receipt_urls).await;

    Ok(Json(serde_json::json!({ "success": true })))
}

/// Submit a DRAFT for review
///
/// The owner's manager is notified once the status change is committed.
pub async fn submit_claim(
    State(state): State<AppState>,
    auth: AuthContext,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
) -> ApiResult<Json<ExpenseClaim>> {
    let claim =
        lifecycle::submit_claim(&state.db, state.notifier.as_ref(), &auth.actor(), id).await?;

    Ok(Json(claim))
}

/// Approve an IN_REVIEW claim
///
/// # Errors
///
/// - `400 Bad Request`: The claim is not IN_REVIEW
/// - `403 Forbidden`: Caller is not a manager or admin
pub async fn approve_claim(
    State(state): State<AppState>,
    auth: AuthContext,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
    body: Option<Json<DecisionRequest>>,
) -> ApiResult<Json<ExpenseClaim>> {
    let Json(req) = body.unwrap_or_default();

    let claim = lifecycle::approve_claim(
        &state.db,
        state.notifier.as_ref(),
        &auth.actor(),
        id,
        req.comments.as_deref(),
    )
    .await?;

    Ok(Json(claim))
}

/// Reject an IN_REVIEW claim
///
/// A non-blank `comments` value is required.
pub async fn reject_claim(
    State(state): State<AppState>,
    auth: AuthContext,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
    body: Option<Json<DecisionRequest>>,
) -> ApiResult<Json<ExpenseClaim>> {
    let Json(req) = body.unwrap_or_default();

    let claim = lifecycle::reject_claim(
        &state.db,
        state.notifier.as_ref(),
        &auth.actor(),
        id,
        req.comments.as_deref(),
    )
    .await?;

    Ok(Json(claim))
}

/// Upload a receipt
///
/// Expects a multipart body with a `receipt` file field. A claim keeps a
/// single receipt; uploading again replaces the previous one. The DRAFT check
/// is repeated on the locked claim when the receipt is recorded, and the
/// stored file is discarded if that check fails.
///
/// # Endpoint
///
/// ```text
/// POST /claims/:id/upload-receipt
/// Content-Type: multipart/form-data; boundary=...
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: Missing file, unsupported type, too large, or the
///   claim is no longer a DRAFT
/// - `403 Forbidden`: Not the owner or an admin
/// - `404 Not Found`: Unknown claim
pub async fn upload_receipt(
    State(state): State<AppState>,
    auth: AuthContext,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
    mut multipart: Multipart,
) -> ApiResult<Json<Receipt>> {
    let actor = auth.actor();
    let claim = ExpenseClaim::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Claim not found".to_string()))?;

    if !actor.can_manage(&claim) {
        return Err(ApiError::Forbidden(
            "Only the claim owner can attach receipts".to_string(),
        ));
    }
    claim.status.apply(ClaimAction::Edit)?;

    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(RECEIPT_FIELD) {
            continue;
        }

        let filename = field.file_name().unwrap_or("receipt").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let data = field.bytes().await?;

        upload = Some(ReceiptUpload {
            filename,
            content_type,
            data,
        });
        break;
    }

    let upload =
        upload.ok_or_else(|| ApiError::invalid_field(RECEIPT_FIELD, "No receipt file provided"))?;

    crate::storage::validate_receipt(&upload, state.config.uploads.max_bytes)?;
    let stored = state.receipts.save(&upload).await?;

    let attached = lifecycle::attach_receipt(
        &state.db,
        &actor,
        id,
        NewReceipt {
            filename: upload.filename,
            file_url: stored.file_url.clone(),
            file_size: stored.size as i64,
            mime_type: upload.content_type,
        },
    )
    .await;

    let (receipt, replaced) = match attached {
        Ok(attached) => attached,
        Err(e) => {
            remove_files(&state, vec![stored.file_url]).await;
            return Err(e.into());
        }
    };

    remove_files(&state, replaced).await;

    Ok(Json(receipt))
}

/// PDF report of an approved claim
///
/// # Errors
///
/// - `403 Forbidden`: No access, or the claim is not APPROVED
/// - `404 Not Found`: Unknown claim
pub async fn download_pdf(
    State(state): State<AppState>,
    auth: AuthContext,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
) -> ApiResult<Response> {
    let claim = viewable_claim(&state, &auth.actor(), id).await?;

    if claim.status != ClaimStatus::Approved {
        return Err(ApiError::Forbidden(
            "PDF download is only available for approved claims".to_string(),
        ));
    }

    let detail = ClaimDetail::load(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Claim not found".to_string()))?;

    let bytes = pdf::render_claim_report(&detail, Utc::now());
    let disposition = format!("attachment; filename=\"{}\"", pdf::report_filename(id));

    tracing::debug!(claim_id = %id, size = bytes.len(), "Rendered claim report");

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(json: serde_json::Value) -> ClaimRequest {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_currency_defaults_to_usd() {
        let req = request(serde_json::json!({
            "title": "Taxi",
            "expense_date": "2025-03-10",
            "items": [{ "description": "Airport", "amount": "25.00", "category": "TRANSPORT" }]
        }));

        assert_eq!(req.currency, "USD");
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_into_draft_trims_and_normalizes() {
        let req = request(serde_json::json!({
            "title": "  Team lunch ",
            "description": "   ",
            "currency": "idr",
            "expense_date": "2025-03-10",
            "items": [{ "description": " Lunch ", "amount": "42.50", "category": "MEALS" }]
        }));

        let draft = req.into_draft();
        assert_eq!(draft.title, "Team lunch");
        assert_eq!(draft.description, None);
        assert_eq!(draft.currency, "IDR");
        assert_eq!(draft.items[0].description, "Lunch");
        assert_eq!(draft.total(), Decimal::new(4250, 2));
    }

    #[test]
    fn test_request_requires_items() {
        let req = request(serde_json::json!({
            "title": "Empty",
            "expense_date": "2025-03-10",
            "items": []
        }));

        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("items"));
    }

    #[test]
    fn test_status_query_parses_wire_names() {
        let query: ListQuery = serde_json::from_value(serde_json::json!({ "status": "IN_REVIEW" })).unwrap();
        assert_eq!(query.status, Some(ClaimStatus::InReview));
    }
}
