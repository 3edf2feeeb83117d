/// Authentication and authorization
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing
/// - [`jwt`]: Session token creation and validation
/// - [`middleware`]: Request authentication and the `AuthContext` extractor
/// - [`authorization`]: Role checks
///
/// # Example
///
/// ```no_run
/// use claimdesk_shared::auth::jwt::{create_token, Claims};
/// use claimdesk_shared::auth::password::{hash_password, verify_password};
/// use claimdesk_shared::models::user::UserRole;
/// use chrono::Duration;
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("user_password")?;
/// assert!(verify_password("user_password", &hash)?);
///
/// let claims = Claims::new(Uuid::new_v4(), UserRole::Employee, Duration::days(7));
/// let token = create_token(&claims, "a-secret-of-at-least-thirty-two-bytes")?;
/// # Ok(())
/// # }
/// ```

pub mod authorization;
pub mod jwt;
pub mod middleware;
pub mod password;
