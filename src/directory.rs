//! User directory with append-only role history
//!
//! A user's current role is the latest entry of their role history. Role
//! changes append a new entry and never overwrite older ones.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{Role, RoleChange, User};
use crate::store::{parse_opt_uuid, parse_uuid};

#[derive(Clone)]
pub struct Directory {
    pool: SqlitePool,
}

impl Directory {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn register(&self, name: &str, role: Role) -> Result<User> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("User name is required".to_string()));
        }

        let id = Uuid::new_v4();
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO users (id, name, created_at) VALUES (?, ?, ?)")
            .bind(id.to_string())
            .bind(name)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO role_history (user_id, role, changed_by, created_at) VALUES (?, ?, NULL, ?)",
        )
        .bind(id.to_string())
        .bind(role.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(user_id = %id, role = %role, "Registered user");

        Ok(User {
            id,
            name: name.to_string(),
            role,
            created_at: now,
        })
    }

    pub async fn get(&self, id: Uuid) -> Result<User> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT u.id, u.name, u.created_at,
                   (SELECT role FROM role_history r WHERE r.user_id = u.id ORDER BY r.seq DESC LIMIT 1) AS role
            FROM users u
            WHERE u.id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))?;

        row.try_into()
    }

    /// Append a role change for `user_id`
    pub async fn change_role(&self, user_id: Uuid, role: Role, changed_by: Uuid) -> Result<User> {
        let user = self.get(user_id).await?;
        if user.role == role {
            return Ok(user);
        }

        sqlx::query(
            "INSERT INTO role_history (user_id, role, changed_by, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(user_id.to_string())
        .bind(role.as_str())
        .bind(changed_by.to_string())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        tracing::info!(user_id = %user_id, from = %user.role, to = %role, "Changed user role");
        Ok(User { role, ..user })
    }

    /// Full role history, oldest first
    pub async fn role_history(&self, user_id: Uuid) -> Result<Vec<RoleChange>> {
        // Surface NotFound for unknown users rather than an empty history
        self.get(user_id).await?;

        let rows = sqlx::query_as::<_, RoleChangeRow>(
            r#"
            SELECT role, changed_by, created_at
            FROM role_history
            WHERE user_id = ?
            ORDER BY seq ASC
            "#,
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    /// Ids of every user whose current role is one of `roles`
    pub async fn ids_with_roles(&self, roles: &[Role]) -> Result<Vec<Uuid>> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT u.id,
                   (SELECT role FROM role_history r WHERE r.user_id = u.id ORDER BY r.seq DESC LIMIT 1) AS role
            FROM users u
            ORDER BY u.created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut ids = Vec::new();
        for (id, role) in rows {
            let role: Role = role
                .parse()
                .map_err(|e| AppError::Internal(format!("Invalid role: {}", e)))?;
            if roles.contains(&role) {
                ids.push(parse_uuid(&id, "user id")?);
            }
        }
        Ok(ids)
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    name: String,
    role: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = AppError;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(User {
            id: parse_uuid(&row.id, "user id")?,
            name: row.name,
            role: row
                .role
                .parse()
                .map_err(|e| AppError::Internal(format!("Invalid role: {}", e)))?,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct RoleChangeRow {
    role: String,
    changed_by: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<RoleChangeRow> for RoleChange {
    type Error = AppError;

    fn try_from(row: RoleChangeRow) -> Result<Self> {
        Ok(RoleChange {
            role: row
                .role
                .parse()
                .map_err(|e| AppError::Internal(format!("Invalid role: {}", e)))?,
            changed_by: parse_opt_uuid(row.changed_by, "changed_by")?,
            created_at: row.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store;

    async fn setup() -> Directory {
        let pool = store::open("sqlite::memory:", 1)
            .await
            .expect("Failed to create in-memory database");
        Directory::new(pool)
    }

    #[tokio::test]
    async fn test_register_and_get() {
        let directory = setup().await;
        let user = directory.register("Lena", Role::Legal).await.unwrap();
        let fetched = directory.get(user.id).await.unwrap();
        assert_eq!(fetched.name, "Lena");
        assert_eq!(fetched.role, Role::Legal);
    }

    #[tokio::test]
    async fn test_register_requires_name() {
        let directory = setup().await;
        let err = directory.register("  ", Role::Legal).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_get_unknown_user() {
        let directory = setup().await;
        let err = directory.get(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_change_role_appends_history() {
        let directory = setup().await;
        let admin = directory.register("Root", Role::Admin).await.unwrap();
        let user = directory.register("Sam", Role::Legal).await.unwrap();

        let moved = directory
            .change_role(user.id, Role::Finance, admin.id)
            .await
            .unwrap();
        assert_eq!(moved.role, Role::Finance);
        assert_eq!(directory.get(user.id).await.unwrap().role, Role::Finance);

        let history = directory.role_history(user.id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, Role::Legal);
        assert!(history[0].changed_by.is_none());
        assert_eq!(history[1].role, Role::Finance);
        assert_eq!(history[1].changed_by, Some(admin.id));
    }

    #[tokio::test]
    async fn test_change_to_same_role_is_noop() {
        let directory = setup().await;
        let admin = directory.register("Root", Role::Admin).await.unwrap();
        let user = directory.register("Sam", Role::Legal).await.unwrap();
        directory
            .change_role(user.id, Role::Legal, admin.id)
            .await
            .unwrap();
        assert_eq!(directory.role_history(user.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_role_history_is_append_only() {
        let directory = setup().await;
        let user = directory.register("Sam", Role::Legal).await.unwrap();

        let err: AppError = sqlx::query("UPDATE role_history SET role = 'admin' WHERE user_id = ?")
            .bind(user.id.to_string())
            .execute(&directory.pool)
            .await
            .unwrap_err()
            .into();
        assert!(matches!(err, AppError::ImmutableResource(_)));
    }

    #[tokio::test]
    async fn test_ids_with_roles_uses_current_role() {
        let directory = setup().await;
        let admin = directory.register("Root", Role::Admin).await.unwrap();
        let fin = directory.register("Fay", Role::Finance).await.unwrap();
        let senior = directory.register("Sid", Role::SeniorFinance).await.unwrap();
        let moved = directory.register("Sam", Role::Finance).await.unwrap();
        directory
            .change_role(moved.id, Role::Legal, admin.id)
            .await
            .unwrap();

        let ids = directory
            .ids_with_roles(&[Role::Finance, Role::SeniorFinance])
            .await
            .unwrap();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&fin.id));
        assert!(ids.contains(&senior.id));
    }
}
