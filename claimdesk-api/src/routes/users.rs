/// User management endpoints
///
/// # Endpoints
///
/// - `GET /users` - List users with department, manager and counts (reviewers)
/// - `POST /users` - Create a user (admin)
/// - `PUT /users/:id` - Partial update (admin)
/// - `DELETE /users/:id` - Delete a user (admin)

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::WithRejection;
use claimdesk_shared::{
    auth::{
        authorization::{require_admin, require_reviewer},
        middleware::AuthContext,
        password,
    },
    models::{
        department::Department,
        user::{CreateUser, UpdateUser, User, UserProfile, UserRole},
    },
};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

/// Distinguishes an absent field from an explicit `null`
///
/// Absent stays `None` through `#[serde(default)]`; present values, `null`
/// included, become `Some`.
fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

fn default_role() -> UserRole {
    UserRole::Employee
}

/// Create user request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be 1 to 255 characters"))]
    pub name: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    pub password: String,

    #[serde(default = "default_role")]
    pub role: UserRole,

    pub department_id: Option<Uuid>,

    pub manager_id: Option<Uuid>,
}

/// Update user request
///
/// `department_id` and `manager_id` accept `null` to clear the reference.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be 1 to 255 characters"))]
    pub name: Option<String>,

    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    pub password: Option<String>,

    pub role: Option<UserRole>,

    #[serde(default, deserialize_with = "deserialize_some")]
    pub department_id: Option<Option<Uuid>>,

    #[serde(default, deserialize_with = "deserialize_some")]
    pub manager_id: Option<Option<Uuid>>,
}

/// User listing response
#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub data: Vec<UserProfile>,
    pub count: usize,
}

fn check_password(password: &str) -> ApiResult<()> {
    password::validate_password_policy(password)
        .map_err(|message| ApiError::invalid_field("password", message))
}

/// Verifies that referenced department and manager rows exist
async fn check_references(
    pool: &PgPool,
    department_id: Option<Uuid>,
    manager_id: Option<Uuid>,
) -> ApiResult<()> {
    if let Some(department_id) = department_id {
        if Department::find_by_id(pool, department_id).await?.is_none() {
            return Err(ApiError::invalid_field("department_id", "Department not found"));
        }
    }

    if let Some(manager_id) = manager_id {
        if User::find_by_id(pool, manager_id).await?.is_none() {
            return Err(ApiError::invalid_field("manager_id", "Manager not found"));
        }
    }

    Ok(())
}

async fn profile_or_not_found(pool: &PgPool, id: Uuid) -> ApiResult<UserProfile> {
    User::find_profile(pool, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
}

/// List users
pub async fn list_users(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Json<UserListResponse>> {
    require_reviewer(&auth)?;

    let data = User::list_profiles(&state.db).await?;
    let count = data.len();

    Ok(Json(UserListResponse { data, count }))
}

/// Create a user
///
/// # Endpoint
///
/// ```text
/// POST /users
/// Content-Type: application/json
///
/// {
///   "name": "Dewi Lestari",
///   "email": "dewi@example.com",
///   "password": "SecureP@ss123",
///   "role": "EMPLOYEE",
///   "manager_id": "uuid"
/// }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: Validation failed or unknown department/manager
/// - `403 Forbidden`: Caller is not an admin
/// - `409 Conflict`: Email already in use
pub async fn create_user(
    State(state): State<AppState>,
    auth: AuthContext,
    WithRejection(Json(req), _): WithRejection<Json<CreateUserRequest>, ApiError>,
) -> ApiResult<(StatusCode, Json<UserProfile>)> {
    require_admin(&auth)?;
    req.validate()?;
    check_password(&req.password)?;

    let email = req.email.trim().to_string();
    if User::find_by_email(&state.db, &email).await?.is_some() {
        return Err(ApiError::Conflict(
            "User with this email already exists".to_string(),
        ));
    }

    check_references(&state.db, req.department_id, req.manager_id).await?;

    let password_hash = password::hash_password(&req.password)?;

    let user = User::create(
        &state.db,
        CreateUser {
            name: req.name.trim().to_string(),
            email,
            password_hash,
            role: req.role,
            department_id: req.department_id,
            manager_id: req.manager_id,
        },
    )
    .await?;

    tracing::info!(user_id = %user.id, role = %user.role, created_by = %auth.user_id, "User created");

    let profile = profile_or_not_found(&state.db, user.id).await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

/// Partially update a user
///
/// # Errors
///
/// - `400 Bad Request`: Validation failed, unknown references, or a user
///   set as their own manager
/// - `403 Forbidden`: Caller is not an admin
/// - `404 Not Found`: Unknown user
/// - `409 Conflict`: Email already in use by another user
pub async fn update_user(
    State(state): State<AppState>,
    auth: AuthContext,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
    WithRejection(Json(req), _): WithRejection<Json<UpdateUserRequest>, ApiError>,
) -> ApiResult<Json<UserProfile>> {
    require_admin(&auth)?;
    req.validate()?;

    if let Some(password) = &req.password {
        check_password(password)?;
    }

    if req.manager_id == Some(Some(id)) {
        return Err(ApiError::invalid_field(
            "manager_id",
            "A user cannot be their own manager",
        ));
    }

    let email = req.email.as_deref().map(|e| e.trim().to_string());
    if let Some(email) = &email {
        if let Some(existing) = User::find_by_email(&state.db, email).await? {
            if existing.id != id {
                return Err(ApiError::Conflict(
                    "User with this email already exists".to_string(),
                ));
            }
        }
    }

    check_references(
        &state.db,
        req.department_id.flatten(),
        req.manager_id.flatten(),
    )
    .await?;

    let password_hash = match &req.password {
        Some(password) => Some(password::hash_password(password)?),
        None => None,
    };

    let changes = UpdateUser {
        name: req.name.map(|n| n.trim().to_string()),
        email,
        password_hash,
        role: req.role,
        department_id: req.department_id,
        manager_id: req.manager_id,
    };

    if changes.is_empty() {
        return profile_or_not_found(&state.db, id).await.map(Json);
    }

    User::update(&state.db, id, changes)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    tracing::info!(user_id = %id, updated_by = %auth.user_id, "User updated");

    profile_or_not_found(&state.db, id).await.map(Json)
}

/// Delete a user
///
/// Claims owned by the user are removed with it; reports pointing at the
/// user as manager lose their manager. Users who have recorded approvals
/// cannot be deleted (409).
pub async fn delete_user(
    State(state): State<AppState>,
    auth: AuthContext,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
) -> ApiResult<Json<serde_json::Value>> {
    require_admin(&auth)?;

    if id == auth.user_id {
        return Err(ApiError::BadRequest(
            "You cannot delete your own account".to_string(),
        ));
    }

    if !User::delete(&state.db, id).await? {
        return Err(ApiError::NotFound("User not found".to_string()));
    }

    tracing::info!(user_id = %id, deleted_by = %auth.user_id, "User deleted");

    Ok(Json(serde_json::json!({ "success": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_request_distinguishes_null_from_absent() {
        let absent: UpdateUserRequest = serde_json::from_str(r#"{"name":"Sari"}"#).unwrap();
        assert_eq!(absent.manager_id, None);
        assert_eq!(absent.department_id, None);

        let cleared: UpdateUserRequest = serde_json::from_str(r#"{"manager_id":null}"#).unwrap();
        assert_eq!(cleared.manager_id, Some(None));

        let id = Uuid::new_v4();
        let set: UpdateUserRequest =
            serde_json::from_str(&format!(r#"{{"department_id":"{}"}}"#, id)).unwrap();
        assert_eq!(set.department_id, Some(Some(id)));
    }

    #[test]
    fn test_create_request_defaults_to_employee() {
        let req: CreateUserRequest = serde_json::from_str(
            r#"{"name":"Budi","email":"budi@example.com","password":"SecureP@ss123"}"#,
        )
        .unwrap();

        assert_eq!(req.role, UserRole::Employee);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_create_request_rejects_bad_email() {
        let req: CreateUserRequest = serde_json::from_str(
            r#"{"name":"Budi","email":"nope","password":"SecureP@ss123"}"#,
        )
        .unwrap();

        assert!(req.validate().unwrap_err().field_errors().contains_key("email"));
    }
}
