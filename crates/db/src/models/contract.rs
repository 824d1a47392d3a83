//! Contract records created by the submission endpoint.

use clausewatch_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `contracts` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Contract {
    pub id: DbId,
    pub owner_user_id: DbId,
    pub file_name: String,
    pub file_size: i64,
    pub content_type: Option<String>,
    pub content_sha256: String,
    /// Path of the stored bytes, relative to the API's storage root.
    #[serde(skip_serializing)]
    pub storage_path: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Insert DTO for a new contract.
#[derive(Debug, Clone)]
pub struct CreateContract {
    pub owner_user_id: DbId,
    pub file_name: String,
    pub file_size: i64,
    pub content_type: Option<String>,
    pub content_sha256: String,
    pub storage_path: String,
}
