//! Drives an onboarding session from upload to a linked contract record.
//!
//! The coordinator reacts to authentication; it never performs it. Once the
//! visitor holds an [`Identity`], [`HandoffCoordinator::resume`] submits the
//! artifact through an [`ArtifactSubmitter`] and records the resulting
//! record id. A session that is already `complete` is never submitted again.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use clausewatch_core::onboarding::{Artifact, SessionPatch, SessionStatus};
use clausewatch_core::types::DbId;
use tokio::sync::Mutex;

use crate::error::SessionError;
use crate::manager::SessionManager;

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// Bearer credential issued by the authentication provider.
#[derive(Clone, PartialEq, Eq)]
pub struct Identity(String);

impl Identity {
    pub fn bearer(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn token(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Identity(***)")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    /// The credential was rejected.
    #[error("Not authenticated: {0}")]
    Unauthorized(String),

    /// The endpoint refused the artifact.
    #[error("Submission rejected: {0}")]
    Rejected(String),

    /// The endpoint could not be reached.
    #[error("Transport error: {0}")]
    Transport(String),
}

/// The artifact submission endpoint.
#[async_trait]
pub trait ArtifactSubmitter: Send + Sync {
    /// Submit an artifact on behalf of `identity`, returning the id of the
    /// record the server created.
    async fn submit(&self, artifact: &Artifact, identity: &Identity) -> Result<DbId, SubmitError>;
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandoffOutcome {
    /// The artifact was submitted by this call.
    Submitted { record_id: DbId },
    /// An earlier call already completed the session; nothing was submitted.
    AlreadyComplete { record_id: DbId },
}

impl HandoffOutcome {
    pub fn record_id(&self) -> DbId {
        match self {
            Self::Submitted { record_id } | Self::AlreadyComplete { record_id } => *record_id,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HandoffError {
    /// No readable session under this id. Route the visitor back to upload.
    #[error("Onboarding session '{0}' not found")]
    SessionNotFound(String),

    /// The session exists but its artifact is in no tier.
    #[error("Artifact for onboarding session '{0}' is no longer available")]
    ArtifactMissing(String),

    /// The endpoint refused or failed; the session is back to
    /// `awaiting-authentication` with the reason recorded.
    #[error("Submission for onboarding session '{session_id}' failed: {source}")]
    SubmissionFailed {
        session_id: String,
        #[source]
        source: SubmitError,
    },

    #[error(transparent)]
    Session(#[from] SessionError),
}

// ---------------------------------------------------------------------------
// HandoffCoordinator
// ---------------------------------------------------------------------------

pub struct HandoffCoordinator {
    sessions: Arc<SessionManager>,
    submitter: Arc<dyn ArtifactSubmitter>,
    /// Serialises `resume` so two calls in one process cannot both submit.
    resume_lock: Mutex<()>,
}

impl HandoffCoordinator {
    pub fn new(sessions: Arc<SessionManager>, submitter: Arc<dyn ArtifactSubmitter>) -> Self {
        Self {
            sessions,
            submitter,
            resume_lock: Mutex::new(()),
        }
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Record that the visitor must sign in before the session can proceed.
    ///
    /// With an identity the session is left as is; the caller resumes it.
    pub async fn prepare(
        &self,
        session_id: &str,
        identity: Option<&Identity>,
    ) -> Result<SessionStatus, HandoffError> {
        let session = self
            .sessions
            .get_metadata(session_id)
            .await
            .ok_or_else(|| HandoffError::SessionNotFound(session_id.to_string()))?;

        if identity.is_some() || session.status != SessionStatus::Processing {
            return Ok(session.status);
        }

        let updated = self
            .sessions
            .update(
                session_id,
                SessionPatch::status(SessionStatus::AwaitingAuthentication),
            )
            .await?
            .ok_or_else(|| HandoffError::SessionNotFound(session_id.to_string()))?;
        Ok(updated.status)
    }

    /// Submit the session's artifact on behalf of `identity`.
    pub async fn resume(
        &self,
        session_id: &str,
        identity: &Identity,
    ) -> Result<HandoffOutcome, HandoffError> {
        let _guard = self.resume_lock.lock().await;

        let session = self
            .sessions
            .get_metadata(session_id)
            .await
            .ok_or_else(|| HandoffError::SessionNotFound(session_id.to_string()))?;

        if session.status == SessionStatus::Complete {
            if let Some(record_id) = session.linked_record_id {
                tracing::info!(session_id, record_id, "Onboarding session already complete");
                self.sessions.release_artifact(session_id).await;
                return Ok(HandoffOutcome::AlreadyComplete { record_id });
            }
        }

        let artifact = self
            .sessions
            .resolve_artifact(session_id)
            .await
            .ok_or_else(|| HandoffError::ArtifactMissing(session_id.to_string()))?;

        self.sessions
            .update(session_id, SessionPatch::status(SessionStatus::Uploading))
            .await?;

        match self.submitter.submit(&artifact, identity).await {
            Ok(record_id) => {
                self.sessions
                    .update(session_id, SessionPatch::complete(record_id))
                    .await?;
                self.sessions.release_artifact(session_id).await;
                tracing::info!(session_id, record_id, "Onboarding artifact submitted");
                Ok(HandoffOutcome::Submitted { record_id })
            }
            Err(e) => {
                tracing::warn!(session_id, error = %e, "Onboarding artifact submission failed");
                self.sessions
                    .update(
                        session_id,
                        SessionPatch::status(SessionStatus::AwaitingAuthentication)
                            .with_error(e.to_string()),
                    )
                    .await?;
                Err(HandoffError::SubmissionFailed {
                    session_id: session_id.to_string(),
                    source: e,
                })
            }
        }
    }
}
