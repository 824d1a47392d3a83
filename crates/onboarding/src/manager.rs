//! Onboarding session manager.
//!
//! Owns the three storage tiers and exposes the session operations. The
//! metadata record decides whether a session exists; artifact tiers are
//! consulted only for bytes.

use std::sync::Arc;

use clausewatch_core::error::CoreError;
use clausewatch_core::onboarding::{
    most_recent_active, new_session_id, validate_file_name, validate_session_id, Artifact,
    OnboardingSession, SessionPatch,
};
use tokio::task::JoinHandle;

use crate::cache::ArtifactCache;
use crate::error::SessionError;
use crate::metadata::MetadataStore;
use crate::tiered::{ArtifactTier, TieredArtifactStore};

// ---------------------------------------------------------------------------
// DurableWrite
// ---------------------------------------------------------------------------

/// Handle to the background durable write started by
/// [`SessionManager::create`].
///
/// Dropping the handle leaves the write running. Awaiting
/// [`DurableWrite::finished`] reports whether the artifact reached the
/// durable tier and was kept there.
#[derive(Debug)]
pub struct DurableWrite {
    handle: JoinHandle<bool>,
}

impl DurableWrite {
    pub async fn finished(self) -> bool {
        self.handle.await.unwrap_or(false)
    }
}

// ---------------------------------------------------------------------------
// SessionManager
// ---------------------------------------------------------------------------

pub struct SessionManager {
    metadata: Arc<dyn MetadataStore>,
    cache: Arc<ArtifactCache>,
    durable: Arc<dyn ArtifactTier>,
    artifacts: TieredArtifactStore,
}

impl SessionManager {
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        cache: Arc<ArtifactCache>,
        durable: Arc<dyn ArtifactTier>,
    ) -> Self {
        let artifacts = TieredArtifactStore::new(vec![
            cache.clone() as Arc<dyn ArtifactTier>,
            durable.clone(),
        ]);
        Self {
            metadata,
            cache,
            durable,
            artifacts,
        }
    }

    /// Start a session for a freshly uploaded artifact.
    ///
    /// The metadata record and the in-memory copy exist when this returns.
    /// The durable copy is written by a spawned task; its failure is logged
    /// and never fails creation. If the session is discarded or completed
    /// while the write is in flight, the task removes its own copy.
    pub async fn create(&self, artifact: Artifact) -> Result<(String, DurableWrite), SessionError> {
        validate_file_name(&artifact.file_name)?;

        let id = new_session_id();
        let created_at = chrono::Utc::now().timestamp_millis();
        let session = OnboardingSession::new(id.clone(), &artifact, created_at);
        self.write_record(&session).await?;
        self.cache.insert(id.clone(), artifact.clone()).await;

        let durable = Arc::clone(&self.durable);
        let metadata = Arc::clone(&self.metadata);
        let durable_id = id.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = durable.put(&durable_id, &artifact).await {
                tracing::warn!(session_id = %durable_id, error = %e, "Durable artifact write failed");
                return false;
            }

            let still_wanted = metadata
                .get(&durable_id)
                .await
                .and_then(|raw| parse_record(&durable_id, &raw))
                .is_some_and(|session| !session.status.is_terminal());
            if still_wanted {
                return true;
            }

            if let Err(e) = durable.remove(&durable_id).await {
                tracing::warn!(session_id = %durable_id, error = %e, "Stale durable artifact removal failed");
            }
            tracing::debug!(session_id = %durable_id, "Durable write outlived its session; copy removed");
            false
        });

        tracing::info!(
            session_id = %id,
            file_name = %session.file_name,
            file_size = session.file_size,
            "Onboarding session created",
        );
        Ok((id, DurableWrite { handle }))
    }

    /// Read a session record. Unknown ids, invalid ids and malformed records
    /// all read as `None`.
    pub async fn get_metadata(&self, session_id: &str) -> Option<OnboardingSession> {
        if validate_session_id(session_id).is_err() {
            return None;
        }
        let raw = self.metadata.get(session_id).await?;
        parse_record(session_id, &raw)
    }

    /// Merge `patch` into an existing session.
    ///
    /// Returns `Ok(None)` without writing when the session does not exist.
    pub async fn update(
        &self,
        session_id: &str,
        patch: SessionPatch,
    ) -> Result<Option<OnboardingSession>, SessionError> {
        let Some(current) = self.get_metadata(session_id).await else {
            tracing::debug!(session_id, "Update skipped for unknown session");
            return Ok(None);
        };

        let next = current.apply(&patch)?;
        self.write_record(&next).await?;
        if next.status != current.status {
            tracing::info!(
                session_id,
                from = %current.status,
                to = %next.status,
                "Onboarding session status changed",
            );
        }
        Ok(Some(next))
    }

    /// Find the artifact bytes, memory first, then the durable tier. A
    /// durable hit is copied back into memory.
    ///
    /// Only sessions with a readable metadata record resolve; stray tier
    /// entries are ignored.
    pub async fn resolve_artifact(&self, session_id: &str) -> Option<Artifact> {
        self.get_metadata(session_id).await?;
        self.artifacts.resolve(session_id).await
    }

    /// Id of the session a resuming client should continue.
    pub async fn find_most_recent_active(&self) -> Option<String> {
        let sessions = self.list().await;
        most_recent_active(&sessions).map(|s| s.id.clone())
    }

    /// Every well-formed session, in insertion order.
    pub async fn list(&self) -> Vec<OnboardingSession> {
        self.metadata
            .entries()
            .await
            .into_iter()
            .filter_map(|(id, raw)| parse_record(&id, &raw))
            .collect()
    }

    /// Remove a session from every tier. Missing sessions are a no-op.
    pub async fn discard(&self, session_id: &str) -> Result<(), SessionError> {
        let existed = self.metadata.remove(session_id).await?;
        // Artifact tiers key files by id; never touch them with an unsafe one.
        if validate_session_id(session_id).is_ok() {
            self.artifacts.remove_all(session_id).await;
        }
        if existed {
            tracing::info!(session_id, "Onboarding session discarded");
        }
        Ok(())
    }

    /// Drop the local artifact copies of a session, keeping its record.
    pub async fn release_artifact(&self, session_id: &str) {
        if validate_session_id(session_id).is_err() {
            return;
        }
        self.artifacts.remove_all(session_id).await;
        tracing::debug!(session_id, "Local artifact copies released");
    }

    /// Discard every session except `keep`.
    ///
    /// Malformed records are removed even when their key equals `keep`.
    /// Artifact entries with no metadata record are swept as well. Returns
    /// the number of metadata records removed.
    pub async fn garbage_collect_all_except(
        &self,
        keep: Option<&str>,
    ) -> Result<usize, SessionError> {
        let mut removed = 0;
        for (id, raw) in self.metadata.entries().await {
            let malformed = parse_record(&id, &raw).is_none();
            if !malformed && keep == Some(id.as_str()) {
                continue;
            }
            self.discard(&id).await?;
            removed += 1;
        }

        let mut orphans = 0;
        for id in self.artifacts.ids().await {
            if keep == Some(id.as_str()) || self.metadata.get(&id).await.is_some() {
                continue;
            }
            self.artifacts.remove_all(&id).await;
            orphans += 1;
        }

        tracing::info!(removed, orphans, keep = ?keep, "Onboarding sessions garbage collected");
        Ok(removed)
    }

    async fn write_record(&self, session: &OnboardingSession) -> Result<(), SessionError> {
        let raw = serde_json::to_string(session)
            .map_err(|e| CoreError::Internal(format!("Failed to encode session: {e}")))?;
        self.metadata.set(&session.id, raw).await?;
        Ok(())
    }
}

/// Decode a stored record. A record that does not parse, or whose id does not
/// match its key, is malformed.
fn parse_record(key: &str, raw: &str) -> Option<OnboardingSession> {
    match serde_json::from_str::<OnboardingSession>(raw) {
        Ok(session) if session.id == key => Some(session),
        Ok(_) => {
            tracing::debug!(session_id = key, "Session record id does not match its key");
            None
        }
        Err(e) => {
            tracing::debug!(session_id = key, error = %e, "Malformed session record");
            None
        }
    }
}
