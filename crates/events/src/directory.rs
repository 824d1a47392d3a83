//! Recipient lookup for notification broadcasts.

use async_trait::async_trait;
use clausewatch_core::roles::RecipientFilter;
use clausewatch_db::models::user::Recipient;
use clausewatch_db::repositories::UserRepo;
use clausewatch_db::DbPool;

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("Recipient lookup failed: {0}")]
    Database(#[from] sqlx::Error),
}

/// Resolves a [`RecipientFilter`] to concrete recipients.
#[async_trait]
pub trait RecipientDirectory: Send + Sync {
    async fn recipients(&self, filter: &RecipientFilter) -> Result<Vec<Recipient>, DirectoryError>;
}

/// Directory over the `users` table. Only active users are returned.
#[derive(Clone)]
pub struct PgRecipientDirectory {
    pool: DbPool,
}

impl PgRecipientDirectory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecipientDirectory for PgRecipientDirectory {
    async fn recipients(&self, filter: &RecipientFilter) -> Result<Vec<Recipient>, DirectoryError> {
        let recipients = UserRepo::list_recipients(&self.pool, filter.role()).await?;
        tracing::debug!(%filter, count = recipients.len(), "Recipients resolved");
        Ok(recipients)
    }
}
