//! Notification broadcast.
//!
//! A broadcast resolves its recipients once, then enqueues one `email.send`
//! job per recipient through the batch aggregator. A recipient whose job
//! cannot be enqueued is recorded as failed; the rest still get theirs.

use std::sync::Arc;

use clausewatch_core::batch::{dispatch_concurrent, dispatch_sequential, BatchDispatchResult};
use clausewatch_core::error::CoreError;
use clausewatch_core::job_types::JOB_TYPE_EMAIL_SEND;
use clausewatch_core::roles::RecipientFilter;
use clausewatch_core::types::DbId;
use clausewatch_db::models::user::Recipient;
use clausewatch_pipeline::{JobQueue, JobRequest, QueueError};
use serde::Deserialize;

use crate::delivery::email::OutboundEmail;
use crate::directory::{DirectoryError, RecipientDirectory};

/// Maximum subject length accepted for a broadcast.
const MAX_SUBJECT_LEN: usize = 200;

#[derive(Debug, thiserror::Error)]
pub enum BroadcastError {
    #[error(transparent)]
    Invalid(#[from] CoreError),

    /// Recipients could not be resolved; nothing was attempted.
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

/// Subject and plain-text body of a broadcast.
#[derive(Debug, Clone, Deserialize)]
pub struct BroadcastMessage {
    pub subject: String,
    pub body: String,
}

impl BroadcastMessage {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.subject.trim().is_empty() {
            return Err(CoreError::Validation("Subject must not be empty".into()));
        }
        if self.subject.chars().count() > MAX_SUBJECT_LEN {
            return Err(CoreError::Validation(format!(
                "Subject exceeds {MAX_SUBJECT_LEN} characters"
            )));
        }
        if self.body.trim().is_empty() {
            return Err(CoreError::Validation("Body must not be empty".into()));
        }
        Ok(())
    }

    fn addressed_to(&self, recipient: &Recipient) -> OutboundEmail {
        OutboundEmail {
            to: recipient.email.clone(),
            recipient_user_id: Some(recipient.user_id),
            subject: self.subject.clone(),
            body: self.body.clone(),
        }
    }
}

/// Fans a message out to every matching recipient.
pub struct Broadcaster {
    directory: Arc<dyn RecipientDirectory>,
    queue: Arc<dyn JobQueue>,
    concurrency: usize,
}

impl Broadcaster {
    pub fn new(directory: Arc<dyn RecipientDirectory>, queue: Arc<dyn JobQueue>) -> Self {
        Self {
            directory,
            queue,
            concurrency: 1,
        }
    }

    /// Enqueue up to `limit` recipients' jobs at once. Outcomes keep
    /// recipient order either way.
    pub fn with_concurrency(mut self, limit: usize) -> Self {
        self.concurrency = limit.max(1);
        self
    }

    pub async fn broadcast(
        &self,
        filter: &RecipientFilter,
        message: &BroadcastMessage,
        submitted_by: Option<DbId>,
    ) -> Result<BatchDispatchResult, BroadcastError> {
        message.validate()?;
        let recipients = self.directory.recipients(filter).await?;
        tracing::info!(
            %filter,
            recipients = recipients.len(),
            subject = %message.subject,
            "Broadcasting notification",
        );

        let queue = &self.queue;
        let enqueue = move |recipient: Recipient| {
            let email = message.addressed_to(&recipient);
            async move {
                let parameters = serde_json::to_value(&email)
                    .map_err(|e| QueueError::Rejected(format!("Unencodable email: {e}")))?;
                let request =
                    JobRequest::new(JOB_TYPE_EMAIL_SEND, parameters).submitted_by(submitted_by);
                queue.enqueue(request).await.map(|_| ())
            }
        };

        let result = if self.concurrency > 1 {
            dispatch_concurrent(recipients, self.concurrency, enqueue).await
        } else {
            dispatch_sequential(recipients, enqueue).await
        };
        Ok(result)
    }
}
