//! `email.send` job consumer.
//!
//! Polls every `poll_interval` and drains pending `email.send` jobs one at a
//! time. Claiming goes through [`JobRepo::claim_next`] (`FOR UPDATE SKIP
//! LOCKED`) so several workers can share the queue.

use std::sync::Arc;
use std::time::Duration;

use clausewatch_core::job_types::JOB_TYPE_EMAIL_SEND;
use clausewatch_core::types::DbId;
use clausewatch_db::repositories::JobRepo;
use clausewatch_db::DbPool;
use clausewatch_events::{EmailSender, OutboundEmail};
use tokio_util::sync::CancellationToken;

/// Default polling interval for the worker loop.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// What happened to one claimed job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessedJob {
    Sent { job_id: DbId },
    Failed { job_id: DbId, error: String },
}

pub struct EmailWorker {
    pool: DbPool,
    sender: Arc<dyn EmailSender>,
    poll_interval: Duration,
}

impl EmailWorker {
    pub fn new(pool: DbPool, sender: Arc<dyn EmailSender>) -> Self {
        Self {
            pool,
            sender,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Run the worker loop until the cancellation token is triggered.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        tracing::info!(
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "Email worker started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Email worker shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.drain(&cancel).await {
                        tracing::error!(error = %e, "Email poll cycle failed");
                    }
                }
            }
        }
    }

    /// Process jobs until the queue is empty or shutdown is requested.
    async fn drain(&self, cancel: &CancellationToken) -> Result<usize, sqlx::Error> {
        let mut processed = 0;
        while !cancel.is_cancelled() {
            match self.process_next().await? {
                Some(_) => processed += 1,
                None => break,
            }
        }
        if processed > 0 {
            tracing::debug!(processed, "Email queue drained");
        }
        Ok(processed)
    }

    /// Claim and deliver the oldest pending `email.send` job.
    ///
    /// Returns `Ok(None)` when no job is pending. A delivery failure marks
    /// the job `failed` and is reported as [`ProcessedJob::Failed`]; only
    /// database errors are returned as `Err`.
    pub async fn process_next(&self) -> Result<Option<ProcessedJob>, sqlx::Error> {
        let Some(job) = JobRepo::claim_next(&self.pool, JOB_TYPE_EMAIL_SEND).await? else {
            return Ok(None);
        };

        let delivered = match serde_json::from_value::<OutboundEmail>(job.parameters) {
            Ok(email) => self.sender.send(&email).await.map_err(|e| e.to_string()),
            Err(e) => Err(format!("Malformed email job parameters: {e}")),
        };

        let outcome = match delivered {
            Ok(()) => {
                JobRepo::complete(&self.pool, job.id).await?;
                tracing::info!(job_id = job.id, "Email job completed");
                ProcessedJob::Sent { job_id: job.id }
            }
            Err(error) => {
                JobRepo::fail(&self.pool, job.id, &error).await?;
                tracing::warn!(job_id = job.id, error = %error, "Email job failed");
                ProcessedJob::Failed {
                    job_id: job.id,
                    error,
                }
            }
        };
        Ok(Some(outcome))
    }
}
