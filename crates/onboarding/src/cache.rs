use std::collections::HashMap;

use async_trait::async_trait;
use clausewatch_core::onboarding::Artifact;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::tiered::ArtifactTier;

/// In-process artifact cache keyed by session id.
///
/// Contents are lost when the process exits. The cache is an accelerator
/// only; a hit here never proves a session exists.
#[derive(Default)]
pub struct ArtifactCache {
    entries: RwLock<HashMap<String, Artifact>>,
}

impl ArtifactCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, session_id: impl Into<String>, artifact: Artifact) {
        self.entries.write().await.insert(session_id.into(), artifact);
    }

    pub async fn get(&self, session_id: &str) -> Option<Artifact> {
        self.entries.read().await.get(session_id).cloned()
    }

    pub async fn remove(&self, session_id: &str) -> Option<Artifact> {
        self.entries.write().await.remove(session_id)
    }

    pub async fn contains(&self, session_id: &str) -> bool {
        self.entries.read().await.contains_key(session_id)
    }
}

#[async_trait]
impl ArtifactTier for ArtifactCache {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, session_id: &str) -> Result<Option<Artifact>, StoreError> {
        Ok(ArtifactCache::get(self, session_id).await)
    }

    async fn put(&self, session_id: &str, artifact: &Artifact) -> Result<(), StoreError> {
        self.insert(session_id, artifact.clone()).await;
        Ok(())
    }

    async fn remove(&self, session_id: &str) -> Result<(), StoreError> {
        ArtifactCache::remove(self, session_id).await;
        Ok(())
    }

    async fn ids(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.entries.read().await.keys().cloned().collect())
    }
}
