//! Uploader operations over a persistent onboarding session store.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clausewatch_core::onboarding::{Artifact, OnboardingSession, SessionStatus};
use clausewatch_onboarding::{
    ArtifactCache, ArtifactSubmitter, DurableArtifactStore, FileMetadataStore, HandoffCoordinator,
    HandoffError, HandoffOutcome, Identity, SessionError, SessionManager, StoreError,
};

use crate::config::UploaderConfig;

/// Session records, relative to the state directory.
const METADATA_FILE: &str = "sessions.json";

/// Parked artifact bytes, relative to the state directory.
const ARTIFACT_DIR: &str = "artifacts";

#[derive(Debug, thiserror::Error)]
pub enum UploaderError {
    #[error("Failed to read {}: {source}", path.display())]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to open session store: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Handoff(#[from] HandoffError),

    #[error("No session '{0}' on this machine; start again with `upload <file>`")]
    UnknownSession(String),

    #[error("No upload is waiting to be resumed; start with `upload <file>`")]
    NoActiveSession,
}

/// Result of `upload`.
#[derive(Debug)]
pub enum UploadReport {
    /// The session is parked until the user signs in.
    AwaitingSignIn {
        session_id: String,
        sign_in_link: String,
    },
    /// A token was supplied and the contract was submitted straight away.
    Submitted {
        session_id: String,
        outcome: HandoffOutcome,
    },
}

/// Result of `resume`.
#[derive(Debug)]
pub struct ResumeReport {
    pub session_id: String,
    pub outcome: HandoffOutcome,
}

/// Uploader backed by the state directory.
pub struct Uploader {
    config: UploaderConfig,
    coordinator: HandoffCoordinator,
}

impl Uploader {
    /// Open (or create) the session store under `config.state_dir`.
    pub async fn open(
        config: UploaderConfig,
        submitter: Arc<dyn ArtifactSubmitter>,
    ) -> Result<Self, UploaderError> {
        let metadata = FileMetadataStore::open(config.state_dir.join(METADATA_FILE)).await?;
        let durable = DurableArtifactStore::open(config.state_dir.join(ARTIFACT_DIR)).await?;
        let sessions = SessionManager::new(
            Arc::new(metadata),
            Arc::new(ArtifactCache::new()),
            Arc::new(durable),
        );
        tracing::debug!(state_dir = %config.state_dir.display(), "Session store opened");

        Ok(Self {
            config,
            coordinator: HandoffCoordinator::new(Arc::new(sessions), submitter),
        })
    }

    fn sessions(&self) -> &SessionManager {
        self.coordinator.sessions()
    }

    /// Park `path` in a new session; submit it immediately if a token is
    /// given.
    pub async fn upload(
        &self,
        path: &Path,
        identity: Option<&Identity>,
    ) -> Result<UploadReport, UploaderError> {
        let artifact = read_artifact(path).await?;
        let (session_id, durable) = self.sessions().create(artifact).await?;

        // The process may exit right after this call; the parked copy must
        // be on disk before then.
        if !durable.finished().await {
            tracing::warn!(%session_id, "Artifact is only held in memory for this run");
        }

        self.coordinator.prepare(&session_id, identity).await?;
        match identity {
            Some(identity) => {
                let outcome = self.coordinator.resume(&session_id, identity).await?;
                Ok(UploadReport::Submitted {
                    session_id,
                    outcome,
                })
            }
            None => Ok(UploadReport::AwaitingSignIn {
                sign_in_link: self.config.sign_in_link(&session_id),
                session_id,
            }),
        }
    }

    /// Submit `session_id`, or the most recent active session.
    pub async fn resume(
        &self,
        session_id: Option<&str>,
        identity: &Identity,
    ) -> Result<ResumeReport, UploaderError> {
        let session_id = match session_id {
            Some(id) => id.to_string(),
            None => self
                .sessions()
                .find_most_recent_active()
                .await
                .ok_or(UploaderError::NoActiveSession)?,
        };

        match self.coordinator.resume(&session_id, identity).await {
            Ok(outcome) => Ok(ResumeReport {
                session_id,
                outcome,
            }),
            Err(HandoffError::SessionNotFound(id)) => Err(UploaderError::UnknownSession(id)),
            Err(e) => Err(e.into()),
        }
    }

    /// One session, or all of them when `session_id` is `None`.
    pub async fn status(
        &self,
        session_id: Option<&str>,
    ) -> Result<Vec<OnboardingSession>, UploaderError> {
        match session_id {
            Some(id) => {
                let session = self
                    .sessions()
                    .get_metadata(id)
                    .await
                    .ok_or_else(|| UploaderError::UnknownSession(id.to_string()))?;
                Ok(vec![session])
            }
            None => Ok(self.sessions().list().await),
        }
    }

    pub async fn discard(&self, session_id: &str) -> Result<(), UploaderError> {
        self.sessions().discard(session_id).await?;
        Ok(())
    }

    /// Remove every session except `keep`. Returns the number removed.
    pub async fn gc(&self, keep: Option<&str>) -> Result<usize, UploaderError> {
        Ok(self.sessions().garbage_collect_all_except(keep).await?)
    }
}

/// Whether a listed session still needs the user.
pub fn needs_sign_in(session: &OnboardingSession) -> bool {
    matches!(
        session.status,
        SessionStatus::Processing | SessionStatus::AwaitingAuthentication
    )
}

async fn read_artifact(path: &Path) -> Result<Artifact, UploaderError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| UploaderError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut artifact = Artifact::new(file_name, bytes);
    if let Some(content_type) = guess_content_type(path) {
        artifact = artifact.with_content_type(content_type);
    }
    Ok(artifact)
}

fn guess_content_type(path: &Path) -> Option<&'static str> {
    mime_guess::from_path(path).first_raw()
}
