//! Session metadata records.
//!
//! Records are stored as raw JSON strings keyed by session id, in insertion
//! order. Keeping them raw means a corrupted record stays visible: the
//! manager reads it as absent and garbage collection removes it.

use std::path::PathBuf;

use async_trait::async_trait;
use indexmap::IndexMap;
use tokio::sync::RwLock;

use crate::error::StoreError;

/// Key/value store for session metadata.
///
/// Reads are served from memory and cannot fail; writes may.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn get(&self, session_id: &str) -> Option<String>;

    /// Insert or overwrite a record. Overwriting keeps the original position.
    async fn set(&self, session_id: &str, raw: String) -> Result<(), StoreError>;

    /// Remove a record, returning whether it existed.
    async fn remove(&self, session_id: &str) -> Result<bool, StoreError>;

    /// Every record as `(session_id, raw)`, in insertion order.
    async fn entries(&self) -> Vec<(String, String)>;
}

// ---------------------------------------------------------------------------
// Memory
// ---------------------------------------------------------------------------

/// Metadata held only in process memory.
#[derive(Default)]
pub struct MemoryMetadataStore {
    records: RwLock<IndexMap<String, String>>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn get(&self, session_id: &str) -> Option<String> {
        self.records.read().await.get(session_id).cloned()
    }

    async fn set(&self, session_id: &str, raw: String) -> Result<(), StoreError> {
        self.records.write().await.insert(session_id.to_string(), raw);
        Ok(())
    }

    async fn remove(&self, session_id: &str) -> Result<bool, StoreError> {
        Ok(self.records.write().await.shift_remove(session_id).is_some())
    }

    async fn entries(&self) -> Vec<(String, String)> {
        self.records
            .read()
            .await
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// File
// ---------------------------------------------------------------------------

/// Metadata persisted as one JSON object in a file.
///
/// The whole map is loaded on open and rewritten (temp file + rename) after
/// every change. An unreadable file is logged and replaced by an empty map.
pub struct FileMetadataStore {
    path: PathBuf,
    records: RwLock<IndexMap<String, String>>,
}

impl FileMetadataStore {
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let records = match tokio::fs::read(&path).await {
            Ok(raw) => serde_json::from_slice(&raw).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "Discarding unreadable session metadata file");
                IndexMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => IndexMap::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            records: RwLock::new(records),
        })
    }

    /// Write `next` to disk, then make it the in-memory map. A failed write
    /// leaves both untouched.
    async fn commit(
        &self,
        records: &mut IndexMap<String, String>,
        next: IndexMap<String, String>,
    ) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(&next)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, json).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        *records = next;
        Ok(())
    }
}

#[async_trait]
impl MetadataStore for FileMetadataStore {
    async fn get(&self, session_id: &str) -> Option<String> {
        self.records.read().await.get(session_id).cloned()
    }

    async fn set(&self, session_id: &str, raw: String) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        let mut next = records.clone();
        next.insert(session_id.to_string(), raw);
        self.commit(&mut records, next).await
    }

    async fn remove(&self, session_id: &str) -> Result<bool, StoreError> {
        let mut records = self.records.write().await;
        if !records.contains_key(session_id) {
            return Ok(false);
        }
        let mut next = records.clone();
        next.shift_remove(session_id);
        self.commit(&mut records, next).await?;
        Ok(true)
    }

    async fn entries(&self) -> Vec<(String, String)> {
        self.records
            .read()
            .await
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}
