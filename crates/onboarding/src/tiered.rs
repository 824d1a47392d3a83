//! Priority list of artifact tiers.
//!
//! Tiers are ordered fastest first. A lookup walks the list and stops at the
//! first hit; the artifact is then copied into every faster tier so the next
//! lookup is served from the front.

use std::sync::Arc;

use async_trait::async_trait;
use clausewatch_core::onboarding::Artifact;
use indexmap::IndexSet;

use crate::error::StoreError;

/// One place an artifact can live.
#[async_trait]
pub trait ArtifactTier: Send + Sync {
    /// Short name used in log events.
    fn name(&self) -> &'static str;

    async fn get(&self, session_id: &str) -> Result<Option<Artifact>, StoreError>;

    async fn put(&self, session_id: &str, artifact: &Artifact) -> Result<(), StoreError>;

    /// Remove an entry. Removing a missing entry succeeds.
    async fn remove(&self, session_id: &str) -> Result<(), StoreError>;

    /// Ids of every stored entry.
    async fn ids(&self) -> Result<Vec<String>, StoreError>;
}

/// Ordered set of tiers with read-through promotion.
///
/// Tier errors are logged and treated as a miss; they never reach the
/// caller.
pub struct TieredArtifactStore {
    tiers: Vec<Arc<dyn ArtifactTier>>,
}

impl TieredArtifactStore {
    pub fn new(tiers: Vec<Arc<dyn ArtifactTier>>) -> Self {
        Self { tiers }
    }

    /// Find an artifact, promoting a hit into every faster tier.
    pub async fn resolve(&self, session_id: &str) -> Option<Artifact> {
        for (index, tier) in self.tiers.iter().enumerate() {
            let artifact = match tier.get(session_id).await {
                Ok(Some(artifact)) => artifact,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(
                        session_id,
                        tier = tier.name(),
                        error = %e,
                        "Artifact tier read failed",
                    );
                    continue;
                }
            };

            for faster in &self.tiers[..index] {
                if let Err(e) = faster.put(session_id, &artifact).await {
                    tracing::warn!(
                        session_id,
                        tier = faster.name(),
                        error = %e,
                        "Artifact promotion failed",
                    );
                }
            }
            if index > 0 {
                tracing::debug!(session_id, from = tier.name(), "Artifact promoted");
            }
            return Some(artifact);
        }
        None
    }

    /// Remove an entry from every tier.
    pub async fn remove_all(&self, session_id: &str) {
        for tier in &self.tiers {
            if let Err(e) = tier.remove(session_id).await {
                tracing::warn!(
                    session_id,
                    tier = tier.name(),
                    error = %e,
                    "Artifact removal failed",
                );
            }
        }
    }

    /// Union of entry ids across all tiers, first-seen order.
    pub async fn ids(&self) -> Vec<String> {
        let mut seen = IndexSet::new();
        for tier in &self.tiers {
            match tier.ids().await {
                Ok(ids) => seen.extend(ids),
                Err(e) => {
                    tracing::warn!(tier = tier.name(), error = %e, "Artifact tier listing failed");
                }
            }
        }
        seen.into_iter().collect()
    }
}
