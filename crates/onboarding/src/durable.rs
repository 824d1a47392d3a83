//! Artifact storage that survives process restarts.
//!
//! Each session gets two files under the root directory:
//!
//! - `<id>.bin`: the artifact bytes.
//! - `<id>.json`: file name and content type.
//!
//! The payload is written first and the descriptor last, each through a
//! temporary file and a rename, so a descriptor only exists for a complete
//! payload. An entry missing either file reads as absent.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use clausewatch_core::onboarding::Artifact;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::tiered::ArtifactTier;

const PAYLOAD_EXT: &str = "bin";
const DESCRIPTOR_EXT: &str = "json";

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Descriptor {
    file_name: String,
    #[serde(default)]
    content_type: Option<String>,
}

/// Filesystem-backed artifact store rooted at one directory.
#[derive(Debug, Clone)]
pub struct DurableArtifactStore {
    root: PathBuf,
}

impl DurableArtifactStore {
    /// Open (and create if needed) the store directory.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    fn path(&self, session_id: &str, ext: &str) -> PathBuf {
        self.root.join(format!("{session_id}.{ext}"))
    }

    async fn write_atomic(&self, path: &Path, contents: &[u8]) -> Result<(), StoreError> {
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, contents).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}

async fn remove_if_present(path: &Path) -> Result<(), StoreError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

async fn read_if_present(path: &Path) -> Result<Option<Vec<u8>>, StoreError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl ArtifactTier for DurableArtifactStore {
    fn name(&self) -> &'static str {
        "durable"
    }

    async fn get(&self, session_id: &str) -> Result<Option<Artifact>, StoreError> {
        let Some(raw) = read_if_present(&self.path(session_id, DESCRIPTOR_EXT)).await? else {
            return Ok(None);
        };
        let descriptor: Descriptor = serde_json::from_slice(&raw)?;
        let Some(bytes) = read_if_present(&self.path(session_id, PAYLOAD_EXT)).await? else {
            return Ok(None);
        };

        Ok(Some(Artifact {
            file_name: descriptor.file_name,
            content_type: descriptor.content_type,
            bytes: bytes.into(),
        }))
    }

    async fn put(&self, session_id: &str, artifact: &Artifact) -> Result<(), StoreError> {
        let descriptor = serde_json::to_vec(&Descriptor {
            file_name: artifact.file_name.clone(),
            content_type: artifact.content_type.clone(),
        })?;
        self.write_atomic(&self.path(session_id, PAYLOAD_EXT), &artifact.bytes)
            .await?;
        self.write_atomic(&self.path(session_id, DESCRIPTOR_EXT), &descriptor)
            .await?;
        tracing::debug!(session_id, size = artifact.size(), "Artifact stored durably");
        Ok(())
    }

    async fn remove(&self, session_id: &str) -> Result<(), StoreError> {
        remove_if_present(&self.path(session_id, DESCRIPTOR_EXT)).await?;
        remove_if_present(&self.path(session_id, PAYLOAD_EXT)).await?;
        Ok(())
    }

    /// Ids with at least one file on disk, including half-written entries.
    async fn ids(&self) -> Result<Vec<String>, StoreError> {
        let mut ids = IndexSet::new();
        let mut dir = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            let is_entry_file = matches!(
                path.extension().and_then(|e| e.to_str()),
                Some(PAYLOAD_EXT) | Some(DESCRIPTOR_EXT)
            );
            if !is_entry_file {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.insert(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids.into_iter().collect())
    }
}
