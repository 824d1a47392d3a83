//! Queue job rows.

use clausewatch_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

use super::status::StatusId;

/// A row from the `jobs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Job {
    pub id: DbId,
    pub job_type: String,
    pub status_id: StatusId,
    pub submitted_by: Option<DbId>,
    pub parameters: serde_json::Value,
    pub error_message: Option<String>,
    pub submitted_at: Timestamp,
    pub claimed_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Insert DTO for a new pending job.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub job_type: String,
    pub submitted_by: Option<DbId>,
    pub parameters: serde_json::Value,
}
