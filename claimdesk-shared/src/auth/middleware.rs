/// Request authentication for Axum
///
/// Reads the session token from the `Authorization: Bearer` header or the
/// `auth-token` cookie, validates it and re-reads the user row, so role
/// changes apply on the next request. The API's auth layer stores the
/// resulting [`AuthContext`] in the request extensions; handlers take it as
/// an extractor.
///
/// # Example
///
/// ```no_run
/// use axum::http::HeaderMap;
/// use claimdesk_shared::auth::middleware::{authenticate, AuthContext};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool, headers: HeaderMap) -> Result<(), Box<dyn std::error::Error>> {
/// let auth: AuthContext = authenticate(&pool, "a-secret-of-at-least-thirty-two-bytes", &headers).await?;
/// println!("Hello, {}!", auth.name);
/// # Ok(())
/// # }
/// ```

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::CookieJar;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use super::jwt::{validate_token, JwtError};
use crate::lifecycle::Actor;
use crate::models::user::{User, UserRole};

/// Name of the session cookie
pub const AUTH_COOKIE: &str = "auth-token";

/// Authenticated user, inserted into request extensions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthContext {
    pub user_id: Uuid,

    /// Role as currently stored, not as recorded in the token
    pub role: UserRole,

    pub email: String,

    pub name: String,
}

impl AuthContext {
    pub fn from_user(user: &User) -> Self {
        Self {
            user_id: user.id,
            role: user.role,
            email: user.email.clone(),
            name: user.name.clone(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// The lifecycle view of this user
    pub fn actor(&self) -> Actor {
        Actor {
            id: self.user_id,
            role: self.role,
            name: self.name.clone(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Authentication required")]
    MissingCredentials,

    #[error("{0}")]
    InvalidFormat(String),

    #[error("{0}")]
    InvalidToken(String),

    /// Token is valid but the user no longer exists
    #[error("User no longer exists")]
    UnknownUser,

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error) = match &self {
            AuthError::InvalidFormat(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AuthError::DatabaseError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
            _ => (StatusCode::UNAUTHORIZED, "unauthorized"),
        };

        let message = match &self {
            AuthError::DatabaseError(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };

        (status, Json(json!({ "error": error, "message": message }))).into_response()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or(AuthError::MissingCredentials)
    }
}

/// Finds the session token in the request headers
///
/// A Bearer header wins over the cookie. A malformed `Authorization` header
/// is an error rather than a fall back to the cookie.
pub fn extract_token(headers: &HeaderMap) -> Result<Option<String>, AuthError> {
    if let Some(value) = headers.get(header::AUTHORIZATION) {
        let value = value
            .to_str()
            .map_err(|_| AuthError::InvalidFormat("Invalid authorization header".to_string()))?;
        let token = value
            .strip_prefix("Bearer ")
            .ok_or_else(|| AuthError::InvalidFormat("Expected Bearer token".to_string()))?;
        return Ok(Some(token.trim().to_string()));
    }

    let jar = CookieJar::from_headers(headers);
    Ok(jar
        .get(AUTH_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty()))
}

/// Validates the request's session and loads the current user
pub async fn authenticate(
    pool: &PgPool,
    secret: &str,
    headers: &HeaderMap,
) -> Result<AuthContext, AuthError> {
    let token = extract_token(headers)?.ok_or(AuthError::MissingCredentials)?;

    let claims = validate_token(&token, secret).map_err(|e| match e {
        JwtError::Expired => AuthError::InvalidToken("Token expired".to_string()),
        JwtError::InvalidIssuer { .. } => AuthError::InvalidToken("Invalid issuer".to_string()),
        _ => AuthError::InvalidToken("Invalid token".to_string()),
    })?;

    let user = User::find_by_id(pool, claims.sub)
        .await
        .map_err(|e| AuthError::DatabaseError(e.to_string()))?
        .ok_or(AuthError::UnknownUser)?;

    Ok(AuthContext::from_user(&user))
}
