/// User model and database operations
///
/// Users carry a role and optionally point at a manager (another user, one
/// level deep). The manager relation is what the reminder job groups by.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name VARCHAR(255) NOT NULL,
///     email VARCHAR(255) NOT NULL,          -- unique on LOWER(email)
///     password_hash VARCHAR(255) NOT NULL,
///     avatar_url VARCHAR(512),
///     role user_role NOT NULL DEFAULT 'EMPLOYEE',
///     department_id UUID REFERENCES departments(id) ON DELETE SET NULL,
///     manager_id UUID REFERENCES users(id) ON DELETE SET NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use claimdesk_shared::models::user::{CreateUser, User, UserRole};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
/// let user = User::create(&pool, CreateUser {
///     name: "Dewi Lestari".to_string(),
///     email: "dewi@example.com".to_string(),
///     password_hash: "$argon2id$...".to_string(),
///     role: UserRole::Employee,
///     department_id: None,
///     manager_id: None,
/// })
/// .await?;
///
/// let found = User::find_by_email(&pool, "DEWI@example.com").await?;
/// assert_eq!(found.map(|u| u.id), Some(user.id));
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// User role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    Employee,
    Manager,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Employee => "EMPLOYEE",
            UserRole::Manager => "MANAGER",
            UserRole::Admin => "ADMIN",
        }
    }

    /// Whether this role may approve or reject claims
    pub fn can_review(&self) -> bool {
        matches!(self, UserRole::Manager | UserRole::Admin)
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User account row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,

    pub name: String,

    pub email: String,

    /// Argon2id hash, never serialized
    #[serde(skip_serializing, default)]
    pub password_hash: String,

    pub avatar_url: Option<String>,

    pub role: UserRole,

    pub department_id: Option<Uuid>,

    /// Reviewer for this user's claims
    pub manager_id: Option<Uuid>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// User with department, manager and relation counts, as returned by the
/// user management endpoints
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub avatar_url: Option<String>,
    pub role: UserRole,
    pub department_id: Option<Uuid>,
    pub department_name: Option<String>,
    pub manager_id: Option<Uuid>,
    pub manager_name: Option<String>,
    pub manager_email: Option<String>,
    pub employee_count: i64,
    pub claim_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a new user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    pub name: String,

    pub email: String,

    /// Argon2id password hash (NOT plaintext password!)
    pub password_hash: String,

    pub role: UserRole,

    pub department_id: Option<Uuid>,

    pub manager_id: Option<Uuid>,
}

/// Input for updating an existing user
///
/// Only `Some` fields are written. The nested options clear the reference
/// with `Some(None)`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateUser {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub role: Option<UserRole>,
    pub department_id: Option<Option<Uuid>>,
    pub manager_id: Option<Option<Uuid>>,
}

impl UpdateUser {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.email.is_none()
            && self.password_hash.is_none()
            && self.role.is_none()
            && self.department_id.is_none()
            && self.manager_id.is_none()
    }
}

const PROFILE_SELECT: &str = r#"
    SELECT u.id, u.name, u.email, u.avatar_url, u.role,
           u.department_id, d.name AS department_name,
           u.manager_id, m.name AS manager_name, m.email AS manager_email,
           (SELECT COUNT(*) FROM users e WHERE e.manager_id = u.id) AS employee_count,
           (SELECT COUNT(*) FROM expense_claims c WHERE c.user_id = u.id) AS claim_count,
           u.created_at, u.updated_at
    FROM users u
    LEFT JOIN departments d ON d.id = u.department_id
    LEFT JOIN users m ON m.id = u.manager_id
"#;

impl User {
    /// Creates a new user
    ///
    /// # Errors
    ///
    /// Fails with a unique violation on `users_email_key` when the email is
    /// already registered (case-insensitive).
    pub async fn create(pool: &PgPool, data: CreateUser) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, password_hash, role, department_id, manager_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, name, email, password_hash, avatar_url, role,
                      department_id, manager_id, created_at, updated_at
            "#,
        )
        .bind(data.name)
        .bind(data.email)
        .bind(data.password_hash)
        .bind(data.role)
        .bind(data.department_id)
        .bind(data.manager_id)
        .fetch_one(pool)
        .await
    }

    /// Finds a user by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, avatar_url, role,
                   department_id, manager_id, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Finds a user by email, case-insensitively
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, avatar_url, role,
                   department_id, manager_id, created_at, updated_at
            FROM users
            WHERE LOWER(email) = LOWER($1)
            "#,
        )
        .bind(email)
        .fetch_optional(pool)
        .await
    }

    /// Updates the fields set in `data`
    ///
    /// Returns `None` when no user has the given ID.
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateUser,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut query = String::from("UPDATE users SET updated_at = NOW()");
        let mut bind_count = 1;

        if data.name.is_some() {
            bind_count += 1;
            query.push_str(&format!(", name = ${}", bind_count));
        }
        if data.email.is_some() {
            bind_count += 1;
            query.push_str(&format!(", email = ${}", bind_count));
        }
        if data.password_hash.is_some() {
            bind_count += 1;
            query.push_str(&format!(", password_hash = ${}", bind_count));
        }
        if data.role.is_some() {
            bind_count += 1;
            query.push_str(&format!(", role = ${}", bind_count));
        }
        if data.department_id.is_some() {
            bind_count += 1;
            query.push_str(&format!(", department_id = ${}", bind_count));
        }
        if data.manager_id.is_some() {
            bind_count += 1;
            query.push_str(&format!(", manager_id = ${}", bind_count));
        }

        query.push_str(
            " WHERE id = $1 RETURNING id, name, email, password_hash, avatar_url, role, \
             department_id, manager_id, created_at, updated_at",
        );

        let mut q = sqlx::query_as::<_, User>(&query).bind(id);

        if let Some(name) = data.name {
            q = q.bind(name);
        }
        if let Some(email) = data.email {
            q = q.bind(email);
        }
        if let Some(password_hash) = data.password_hash {
            q = q.bind(password_hash);
        }
        if let Some(role) = data.role {
            q = q.bind(role);
        }
        if let Some(department_id) = data.department_id {
            q = q.bind(department_id);
        }
        if let Some(manager_id) = data.manager_id {
            q = q.bind(manager_id);
        }

        q.fetch_optional(pool).await
    }

    /// Deletes a user by ID
    ///
    /// Owned claims and notifications cascade. Fails with a foreign key
    /// violation if the user has recorded approvals, which are audit rows.
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Counts all users
    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(pool)
            .await?;

        Ok(count)
    }

    /// Lists all users with department, manager and counts, newest first
    pub async fn list_profiles(pool: &PgPool) -> Result<Vec<UserProfile>, sqlx::Error> {
        let query = format!("{} ORDER BY u.created_at DESC", PROFILE_SELECT);
        sqlx::query_as::<_, UserProfile>(&query)
            .fetch_all(pool)
            .await
    }

    /// Loads the profile view of one user
    pub async fn find_profile(pool: &PgPool, id: Uuid) -> Result<Option<UserProfile>, sqlx::Error> {
        let query = format!("{} WHERE u.id = $1", PROFILE_SELECT);
        sqlx::query_as::<_, UserProfile>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_can_review() {
        assert!(!UserRole::Employee.can_review());
        assert!(UserRole::Manager.can_review());
        assert!(UserRole::Admin.can_review());
    }

    #[test]
    fn test_role_serde_uses_screaming_case() {
        assert_eq!(serde_json::to_string(&UserRole::Manager).unwrap(), "\"MANAGER\"");
        let role: UserRole = serde_json::from_str("\"ADMIN\"").unwrap();
        assert_eq!(role, UserRole::Admin);
    }

    #[test]
    fn test_update_user_default_is_empty() {
        assert!(UpdateUser::default().is_empty());

        let update = UpdateUser {
            manager_id: Some(None),
            ..Default::default()
        };
        assert!(!update.is_empty());
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let user = User {
            id: Uuid::new_v4(),
            name: "Test".to_string(),
            email: "test@example.com".to_string(),
            password_hash: "secret-hash".to_string(),
            avatar_url: None,
            role: UserRole::Employee,
            department_id: None,
            manager_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "EMPLOYEE");
    }
}
