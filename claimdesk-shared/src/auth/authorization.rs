/// Role checks
///
/// Three roles, no hierarchy beyond what each endpoint lists:
///
/// | Role     | Adds                                                  |
/// |----------|-------------------------------------------------------|
/// | EMPLOYEE | own claims only                                       |
/// | MANAGER  | view all claims, approve/reject, dashboard, user list |
/// | ADMIN    | everything, including user management and reminders  |

use super::middleware::AuthContext;
use crate::models::user::UserRole;

#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    #[error("Insufficient permissions: requires one of {required}")]
    InsufficientRole { required: String },

    #[error("Not authorized to access this resource")]
    NotAuthorized,
}

/// Roles allowed to review claims and view other users' data
pub const REVIEWER_ROLES: &[UserRole] = &[UserRole::Manager, UserRole::Admin];

/// Fails unless the user has one of `allowed`
pub fn require_role(auth: &AuthContext, allowed: &[UserRole]) -> Result<(), AuthzError> {
    if allowed.contains(&auth.role) {
        return Ok(());
    }

    Err(AuthzError::InsufficientRole {
        required: allowed
            .iter()
            .map(UserRole::as_str)
            .collect::<Vec<_>>()
            .join(", "),
    })
}

pub fn require_admin(auth: &AuthContext) -> Result<(), AuthzError> {
    require_role(auth, &[UserRole::Admin])
}

pub fn require_reviewer(auth: &AuthContext) -> Result<(), AuthzError> {
    require_role(auth, REVIEWER_ROLES)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn auth(role: UserRole) -> AuthContext {
        AuthContext {
            user_id: Uuid::new_v4(),
            role,
            email: "user@example.com".to_string(),
            name: "User".to_string(),
        }
    }

    #[test]
    fn test_require_admin() {
        assert!(require_admin(&auth(UserRole::Admin)).is_ok());
        assert!(require_admin(&auth(UserRole::Manager)).is_err());
        assert!(require_admin(&auth(UserRole::Employee)).is_err());
    }

    #[test]
    fn test_require_reviewer() {
        assert!(require_reviewer(&auth(UserRole::Admin)).is_ok());
        assert!(require_reviewer(&auth(UserRole::Manager)).is_ok());
        assert!(require_reviewer(&auth(UserRole::Employee)).is_err());
    }

    #[test]
    fn test_insufficient_role_message() {
        let err = require_reviewer(&auth(UserRole::Employee)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Insufficient permissions: requires one of MANAGER, ADMIN"
        );
    }
}
