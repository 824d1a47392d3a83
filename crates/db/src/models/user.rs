use clausewatch_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from `users` joined with its role name.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: DbId,
    pub email: String,
    pub display_name: String,
    pub role: String,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone)]
pub struct CreateUser {
    pub email: String,
    pub display_name: String,
    /// Role name; must exist in `roles`.
    pub role: String,
}

/// Addressing details of a notification recipient.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Recipient {
    pub user_id: DbId,
    pub email: String,
    pub display_name: String,
}
