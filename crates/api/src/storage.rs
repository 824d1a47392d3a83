//! Content-addressed contract storage on the local filesystem.
//!
//! Bytes live at `<root>/<owner_id>/<sha256>.bin`. Identical uploads from
//! one owner land on the same path, so rewriting is harmless.

use std::path::PathBuf;

use clausewatch_core::types::DbId;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Hex SHA-256 of `bytes`.
pub fn content_sha256(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Clone)]
pub struct ContractStorage {
    root: PathBuf,
}

impl ContractStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Write `bytes` and return the path relative to the storage root.
    pub async fn store(
        &self,
        owner_user_id: DbId,
        sha256: &str,
        bytes: &[u8],
    ) -> std::io::Result<String> {
        let relative = format!("{owner_user_id}/{sha256}.bin");
        let target = self.root.join(&relative);
        if let Some(dir) = target.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }

        // Concurrent uploads of the same content each get their own temp file.
        let tmp = target.with_extension(format!("{}.tmp", Uuid::new_v4().simple()));
        tokio::fs::write(&tmp, bytes).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &target).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e);
        }

        tracing::debug!(path = %target.display(), size = bytes.len(), "Contract bytes stored");
        Ok(relative)
    }
}
