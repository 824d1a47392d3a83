//! Repository for `users` and their roles.

use clausewatch_core::types::DbId;
use sqlx::PgPool;

use crate::models::user::{CreateUser, Recipient, User};

/// Column list for `users` joined to `roles` as `r`.
const COLUMNS: &str = "\
    u.id, u.email, u.display_name, r.name AS role, u.is_active, \
    u.created_at, u.updated_at";

pub struct UserRepo;

impl UserRepo {
    /// Insert a user with the named role. Fails with `RowNotFound` if the
    /// role does not exist.
    pub async fn create(pool: &PgPool, input: &CreateUser) -> Result<User, sqlx::Error> {
        let id: DbId = sqlx::query_scalar(
            "INSERT INTO users (email, display_name, role_id) \
             SELECT $1, $2, id FROM roles WHERE name = $3 \
             RETURNING id",
        )
        .bind(&input.email)
        .bind(&input.display_name)
        .bind(&input.role)
        .fetch_one(pool)
        .await?;

        Self::find_by_id(pool, id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<User>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM users u JOIN roles r ON r.id = u.role_id WHERE u.id = $1"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn set_active(pool: &PgPool, id: DbId, is_active: bool) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET is_active = $2 WHERE id = $1")
            .bind(id)
            .bind(is_active)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Active users, optionally restricted to one role, ordered by id.
    pub async fn list_recipients(
        pool: &PgPool,
        role: Option<&str>,
    ) -> Result<Vec<Recipient>, sqlx::Error> {
        sqlx::query_as::<_, Recipient>(
            "SELECT u.id AS user_id, u.email, u.display_name \
             FROM users u JOIN roles r ON r.id = u.role_id \
             WHERE u.is_active AND ($1::TEXT IS NULL OR r.name = $1) \
             ORDER BY u.id",
        )
        .bind(role)
        .fetch_all(pool)
        .await
    }
}
