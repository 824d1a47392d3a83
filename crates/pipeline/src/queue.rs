//! Job queue seam and its two backends.

use async_trait::async_trait;
use clausewatch_core::job_types::JOB_TYPE_PIPELINE_STAGE;
use clausewatch_core::pipeline::StageDispatchRequest;
use clausewatch_core::types::DbId;
use clausewatch_db::models::job::NewJob;
use clausewatch_db::repositories::JobRepo;
use clausewatch_db::DbPool;
use serde::Serialize;
use tokio::sync::Mutex;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A unit of work to place on the queue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobRequest {
    pub job_type: String,
    pub submitted_by: Option<DbId>,
    pub parameters: serde_json::Value,
}

impl JobRequest {
    pub fn new(job_type: impl Into<String>, parameters: serde_json::Value) -> Self {
        Self {
            job_type: job_type.into(),
            submitted_by: None,
            parameters,
        }
    }

    pub fn submitted_by(mut self, user_id: Option<DbId>) -> Self {
        self.submitted_by = user_id;
        self
    }

    /// Wrap one resolved pipeline stage as a `pipeline.stage` job.
    pub fn stage(request: &StageDispatchRequest) -> Result<Self, QueueError> {
        let parameters = serde_json::to_value(request)
            .map_err(|e| QueueError::Rejected(format!("Unencodable stage request: {e}")))?;
        Ok(Self::new(JOB_TYPE_PIPELINE_STAGE, parameters))
    }
}

/// Receipt for an accepted job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JobTicket {
    pub job_id: DbId,
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Queue database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Job rejected: {0}")]
    Rejected(String),
}

/// Somewhere jobs can be enqueued.
///
/// `enqueue` returning `Ok` means the job is durably accepted; callers that
/// need ordering wait for it before enqueueing the next job.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, request: JobRequest) -> Result<JobTicket, QueueError>;
}

// ---------------------------------------------------------------------------
// Postgres
// ---------------------------------------------------------------------------

/// Queue backed by the `jobs` table; jobs start `pending`.
#[derive(Clone)]
pub struct PgJobQueue {
    pool: DbPool,
}

impl PgJobQueue {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobQueue for PgJobQueue {
    async fn enqueue(&self, request: JobRequest) -> Result<JobTicket, QueueError> {
        let job = JobRepo::enqueue(
            &self.pool,
            &NewJob {
                job_type: request.job_type,
                submitted_by: request.submitted_by,
                parameters: request.parameters,
            },
        )
        .await?;
        tracing::debug!(job_id = job.id, job_type = %job.job_type, "Job enqueued");
        Ok(JobTicket { job_id: job.id })
    }
}

// ---------------------------------------------------------------------------
// Memory
// ---------------------------------------------------------------------------

/// In-process queue that records jobs in arrival order.
#[derive(Default)]
pub struct MemoryJobQueue {
    jobs: Mutex<Vec<(JobTicket, JobRequest)>>,
}

impl MemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every accepted job, oldest first.
    pub async fn jobs(&self) -> Vec<(JobTicket, JobRequest)> {
        self.jobs.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.jobs.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.lock().await.is_empty()
    }
}

#[async_trait]
impl JobQueue for MemoryJobQueue {
    async fn enqueue(&self, request: JobRequest) -> Result<JobTicket, QueueError> {
        let mut jobs = self.jobs.lock().await;
        let ticket = JobTicket {
            job_id: jobs.len() as DbId + 1,
        };
        jobs.push((ticket, request));
        Ok(ticket)
    }
}
