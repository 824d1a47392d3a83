//! Repository for the `jobs` table.
//!
//! Uses `JobStatus` from `models::status` for every status transition.

use clausewatch_core::types::DbId;
use sqlx::PgPool;

use crate::models::job::{Job, NewJob};
use crate::models::status::JobStatus;

/// Column list for `jobs` queries.
const COLUMNS: &str = "\
    id, job_type, status_id, submitted_by, parameters, error_message, \
    submitted_at, claimed_at, completed_at, created_at, updated_at";

/// Queue operations over `jobs`.
pub struct JobRepo;

impl JobRepo {
    /// Insert a new pending job.
    pub async fn enqueue(pool: &PgPool, input: &NewJob) -> Result<Job, sqlx::Error> {
        let query = format!(
            "INSERT INTO jobs (job_type, status_id, submitted_by, parameters) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(&input.job_type)
            .bind(JobStatus::Pending.id())
            .bind(input.submitted_by)
            .bind(&input.parameters)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Job>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = $1");
        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Atomically claim the oldest pending job of `job_type`.
    ///
    /// Uses `SELECT FOR UPDATE SKIP LOCKED` so concurrent workers never
    /// claim the same row.
    pub async fn claim_next(pool: &PgPool, job_type: &str) -> Result<Option<Job>, sqlx::Error> {
        let query = format!(
            "UPDATE jobs \
             SET claimed_at = NOW(), status_id = $1 \
             WHERE id = ( \
                 SELECT id FROM jobs \
                 WHERE job_type = $2 AND status_id = $3 \
                 ORDER BY id ASC \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(JobStatus::Running.id())
            .bind(job_type)
            .bind(JobStatus::Pending.id())
            .fetch_optional(pool)
            .await
    }

    pub async fn complete(pool: &PgPool, job_id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE jobs SET status_id = $2, completed_at = NOW() WHERE id = $1")
            .bind(job_id)
            .bind(JobStatus::Completed.id())
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Mark a job failed. No automatic retry is performed.
    pub async fn fail(pool: &PgPool, job_id: DbId, error: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE jobs SET status_id = $2, error_message = $3, completed_at = NOW() WHERE id = $1",
        )
        .bind(job_id)
        .bind(JobStatus::Failed.id())
        .bind(error)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Jobs of one type whose parameters contain `filter` (JSONB `@>`),
    /// oldest first.
    pub async fn list_matching(
        pool: &PgPool,
        job_type: &str,
        filter: &serde_json::Value,
    ) -> Result<Vec<Job>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM jobs \
             WHERE job_type = $1 AND parameters @> $2 \
             ORDER BY id ASC"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(job_type)
            .bind(filter)
            .fetch_all(pool)
            .await
    }
}
