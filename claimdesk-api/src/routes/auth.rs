/// Authentication endpoints
///
/// Session handling for the web client. A successful login returns the
/// token in the body and also sets it as an HTTP-only cookie, so both
/// browser and API clients are served.
///
/// # Endpoints
///
/// - `POST /auth/login` - Exchange email and password for a session token
/// - `POST /auth/logout` - Clear the session cookie
/// - `GET /auth/me` - The current user

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{extract::State, Json};
use axum_extra::extract::{
    cookie::{Cookie, CookieJar, SameSite},
    WithRejection,
};
use claimdesk_shared::{
    auth::{
        jwt,
        middleware::{AuthContext, AUTH_COOKIE},
        password,
    },
    models::user::{User, UserProfile},
};
use serde::{Deserialize, Serialize};
use validator::Validate;

const INVALID_CREDENTIALS: &str = "Invalid credentials";

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Login response
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: User,

    /// Session token, also set as the `auth-token` cookie
    pub token: String,

    /// Token lifetime in seconds
    pub expires_in: i64,
}

/// Builds the session cookie
pub fn session_cookie(token: String, ttl_hours: i64, secure: bool) -> Cookie<'static> {
    Cookie::build((AUTH_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::hours(ttl_hours))
        .build()
}

/// Login endpoint
///
/// # Endpoint
///
/// ```text
/// POST /auth/login
/// Content-Type: application/json
///
/// {
///   "email": "manager@example.com",
///   "password": "SecureP@ss123"
/// }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: Validation failed
/// - `401 Unauthorized`: Unknown email or wrong password
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    WithRejection(Json(req), _): WithRejection<Json<LoginRequest>, ApiError>,
) -> ApiResult<(CookieJar, Json<LoginResponse>)> {
    req.validate()?;

    let user = User::find_by_email(&state.db, &req.email)
        .await?
        .ok_or_else(|| ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()))?;

    let valid = match password::verify_password(&req.password, &user.password_hash) {
        Ok(valid) => valid,
        Err(e) => {
            tracing::warn!(user_id = %user.id, error = %e, "Stored password hash could not be verified");
            false
        }
    };

    if !valid {
        tracing::info!(user_id = %user.id, "Login rejected");
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    }

    let ttl_hours = state.config.jwt.ttl_hours;
    let claims = jwt::Claims::new(user.id, user.role, chrono::Duration::hours(ttl_hours));
    let token = jwt::create_token(&claims, state.jwt_secret())?;

    tracing::info!(user_id = %user.id, role = %user.role, "User logged in");

    let cookie = session_cookie(token.clone(), ttl_hours, state.config.api.production);

    Ok((
        jar.add(cookie),
        Json(LoginResponse {
            user,
            token,
            expires_in: ttl_hours * 3600,
        }),
    ))
}

/// Logout endpoint
///
/// Tokens are stateless; logging out only removes the cookie.
pub async fn logout(jar: CookieJar) -> (CookieJar, Json<serde_json::Value>) {
    let jar = jar.remove(Cookie::build(AUTH_COOKIE).path("/"));
    (jar, Json(serde_json::json!({ "success": true })))
}

/// Current user with department and manager
pub async fn me(State(state): State<AppState>, auth: AuthContext) -> ApiResult<Json<UserProfile>> {
    let profile = User::find_profile(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(profile))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = session_cookie("token-value".to_string(), 168, true);

        assert_eq!(cookie.name(), AUTH_COOKIE);
        assert_eq!(cookie.value(), "token-value");
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.max_age(), Some(time::Duration::hours(168)));
    }

    #[test]
    fn test_session_cookie_not_secure_in_development() {
        let cookie = session_cookie("t".to_string(), 1, false);
        assert_eq!(cookie.secure(), Some(false));
    }

    #[test]
    fn test_login_request_validation() {
        let ok = LoginRequest {
            email: "a@example.com".to_string(),
            password: "x".to_string(),
        };
        assert!(ok.validate().is_ok());

        let missing = LoginRequest {
            email: "not-an-email".to_string(),
            password: String::new(),
        };
        let errors = missing.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("email"));
        assert!(errors.field_errors().contains_key("password"));
    }
}
