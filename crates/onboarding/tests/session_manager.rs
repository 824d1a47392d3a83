use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use clausewatch_core::error::CoreError;
use clausewatch_core::onboarding::{Artifact, OnboardingSession, SessionPatch, SessionStatus};
use clausewatch_onboarding::{
    ArtifactCache, ArtifactTier, DurableArtifactStore, FileMetadataStore, MemoryMetadataStore,
    MetadataStore, SessionError, SessionManager, StoreError,
};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Harness {
    _dir: TempDir,
    metadata: Arc<MemoryMetadataStore>,
    durable: Arc<DurableArtifactStore>,
    cache: Arc<ArtifactCache>,
    manager: SessionManager,
}

impl Harness {
    async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let metadata = Arc::new(MemoryMetadataStore::new());
        let durable = Arc::new(
            DurableArtifactStore::open(dir.path().join("artifacts"))
                .await
                .unwrap(),
        );
        let cache = Arc::new(ArtifactCache::new());
        let manager = SessionManager::new(metadata.clone(), cache.clone(), durable.clone());
        Self {
            _dir: dir,
            metadata,
            durable,
            cache,
            manager,
        }
    }

    /// Same metadata and durable tiers, empty memory: a process restart.
    fn restarted(&self) -> (Arc<ArtifactCache>, SessionManager) {
        let cache = Arc::new(ArtifactCache::new());
        let manager =
            SessionManager::new(self.metadata.clone(), cache.clone(), self.durable.clone());
        (cache, manager)
    }

    async fn create(&self, name: &str) -> String {
        let (id, durable) = self
            .manager
            .create(Artifact::new(name, format!("contents of {name}").into_bytes()))
            .await
            .unwrap();
        assert!(durable.finished().await);
        id
    }
}

async fn put_record(store: &MemoryMetadataStore, id: &str, status: SessionStatus, created_at: i64) {
    let session = OnboardingSession {
        id: id.to_string(),
        file_name: format!("{id}.pdf"),
        file_size: 10,
        linked_record_id: (status == SessionStatus::Complete).then_some(1),
        status,
        created_at,
        last_error: None,
    };
    store
        .set(id, serde_json::to_string(&session).unwrap())
        .await
        .unwrap();
}

/// A manager over file-backed metadata and durable tiers with an empty cache.
async fn open_file_backed(root: &Path) -> SessionManager {
    let metadata = Arc::new(
        FileMetadataStore::open(root.join("sessions.json"))
            .await
            .unwrap(),
    );
    let durable = Arc::new(DurableArtifactStore::open(root.join("artifacts")).await.unwrap());
    SessionManager::new(metadata, Arc::new(ArtifactCache::new()), durable)
}

/// A durable tier that is always unavailable.
struct UnavailableTier;

#[async_trait]
impl ArtifactTier for UnavailableTier {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    async fn get(&self, _: &str) -> Result<Option<Artifact>, StoreError> {
        Err(std::io::Error::other("quota exceeded").into())
    }

    async fn put(&self, _: &str, _: &Artifact) -> Result<(), StoreError> {
        Err(std::io::Error::other("quota exceeded").into())
    }

    async fn remove(&self, _: &str) -> Result<(), StoreError> {
        Err(std::io::Error::other("quota exceeded").into())
    }

    async fn ids(&self) -> Result<Vec<String>, StoreError> {
        Err(std::io::Error::other("quota exceeded").into())
    }
}

/// A durable tier whose writes land only after a delay.
struct SlowTier {
    inner: Arc<DurableArtifactStore>,
    delay: Duration,
}

#[async_trait]
impl ArtifactTier for SlowTier {
    fn name(&self) -> &'static str {
        "slow"
    }

    async fn get(&self, session_id: &str) -> Result<Option<Artifact>, StoreError> {
        self.inner.get(session_id).await
    }

    async fn put(&self, session_id: &str, artifact: &Artifact) -> Result<(), StoreError> {
        tokio::time::sleep(self.delay).await;
        self.inner.put(session_id, artifact).await
    }

    async fn remove(&self, session_id: &str) -> Result<(), StoreError> {
        self.inner.remove(session_id).await
    }

    async fn ids(&self) -> Result<Vec<String>, StoreError> {
        self.inner.ids().await
    }
}

// ---------------------------------------------------------------------------
// Create / resolve
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_writes_metadata_and_memory_copy() {
    let h = Harness::new().await;
    let artifact = Artifact::new("lease.pdf", b"%PDF".to_vec());
    let (id, _durable) = h.manager.create(artifact.clone()).await.unwrap();

    let session = h.manager.get_metadata(&id).await.unwrap();
    assert_eq!(session.status, SessionStatus::Processing);
    assert_eq!(session.file_name, "lease.pdf");
    assert_eq!(session.file_size, 4);
    assert_eq!(session.linked_record_id, None);
    assert!(h.cache.contains(&id).await);
    assert_eq!(h.manager.resolve_artifact(&id).await, Some(artifact));
}

#[tokio::test]
async fn create_rejects_blank_file_name() {
    let h = Harness::new().await;
    let result = h.manager.create(Artifact::new("  ", b"x".to_vec())).await;
    assert_matches!(result, Err(SessionError::Core(CoreError::Validation(_))));
    assert!(h.manager.list().await.is_empty());
}

#[tokio::test]
async fn artifact_survives_memory_loss_and_is_promoted() {
    let h = Harness::new().await;
    let id = h.create("lease.pdf").await;

    let (fresh_cache, restarted) = h.restarted();
    assert!(!fresh_cache.contains(&id).await);

    let artifact = restarted.resolve_artifact(&id).await.unwrap();
    assert_eq!(artifact.file_name, "lease.pdf");
    assert_eq!(&artifact.bytes[..], b"contents of lease.pdf");
    assert!(fresh_cache.contains(&id).await);
}

#[tokio::test]
async fn durable_failure_does_not_fail_create() {
    let metadata = Arc::new(MemoryMetadataStore::new());
    let cache = Arc::new(ArtifactCache::new());
    let manager = SessionManager::new(metadata, cache, Arc::new(UnavailableTier));

    let (id, durable) = manager
        .create(Artifact::new("lease.pdf", b"%PDF".to_vec()))
        .await
        .unwrap();
    assert!(!durable.finished().await);
    assert!(manager.resolve_artifact(&id).await.is_some());
}

#[tokio::test]
async fn failed_metadata_write_leaves_no_session() {
    let dir = tempfile::tempdir().unwrap();
    let manager = open_file_backed(dir.path()).await;

    let sessions_file = dir.path().join("sessions.json");
    tokio::fs::create_dir(&sessions_file).await.unwrap();
    tokio::fs::write(sessions_file.join("occupied"), b"x")
        .await
        .unwrap();

    let result = manager
        .create(Artifact::new("lease.pdf", b"%PDF".to_vec()))
        .await;
    assert!(matches!(result, Err(SessionError::Store(_))));
    assert!(manager.list().await.is_empty());
    assert_eq!(manager.find_most_recent_active().await, None);
}

#[tokio::test]
async fn cached_artifact_without_record_does_not_resolve() {
    let h = Harness::new().await;
    h.cache
        .insert("stray", Artifact::new("stray.pdf", b"x".to_vec()))
        .await;
    h.durable
        .put("orphan", &Artifact::new("orphan.pdf", b"y".to_vec()))
        .await
        .unwrap();

    assert_eq!(h.manager.resolve_artifact("stray").await, None);
    assert_eq!(h.manager.resolve_artifact("orphan").await, None);
}

#[tokio::test]
async fn sessions_survive_restart_with_file_metadata() {
    let dir = tempfile::tempdir().unwrap();

    let first = open_file_backed(dir.path()).await;
    let (id, durable) = first
        .create(Artifact::new("lease.pdf", b"%PDF".to_vec()))
        .await
        .unwrap();
    assert!(durable.finished().await);
    drop(first);

    let second = open_file_backed(dir.path()).await;
    assert_eq!(second.find_most_recent_active().await, Some(id.clone()));
    assert!(second.get_metadata(&id).await.is_some());
    assert!(second.resolve_artifact(&id).await.is_some());
}

// ---------------------------------------------------------------------------
// Read / update
// ---------------------------------------------------------------------------

#[tokio::test]
async fn malformed_and_unknown_records_read_as_none() {
    let h = Harness::new().await;
    h.metadata
        .set("broken", "{\"id\": \"broken\"".into())
        .await
        .unwrap();

    assert_eq!(h.manager.get_metadata("broken").await, None);
    assert_eq!(h.manager.get_metadata("missing").await, None);
    assert_eq!(h.manager.get_metadata("../etc/passwd").await, None);
    assert!(h.manager.list().await.is_empty());
}

#[tokio::test]
async fn update_of_unknown_session_is_noop() {
    let h = Harness::new().await;
    let result = h
        .manager
        .update("missing", SessionPatch::status(SessionStatus::Uploading))
        .await
        .unwrap();
    assert_eq!(result, None);
    assert!(h.metadata.entries().await.is_empty());
}

#[tokio::test]
async fn complete_is_terminal() {
    let h = Harness::new().await;
    let id = h.create("lease.pdf").await;

    h.manager
        .update(&id, SessionPatch::status(SessionStatus::Uploading))
        .await
        .unwrap();
    let completed = h
        .manager
        .update(&id, SessionPatch::complete(7))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(completed.linked_record_id, Some(7));

    for status in [
        SessionStatus::Processing,
        SessionStatus::AwaitingAuthentication,
        SessionStatus::Uploading,
    ] {
        let result = h.manager.update(&id, SessionPatch::status(status)).await;
        assert_matches!(result, Err(SessionError::Core(CoreError::Conflict(_))));
    }

    let session = h.manager.get_metadata(&id).await.unwrap();
    assert_eq!(session.status, SessionStatus::Complete);
    assert_eq!(session.linked_record_id, Some(7));
}

// ---------------------------------------------------------------------------
// Recency
// ---------------------------------------------------------------------------

#[tokio::test]
async fn most_recent_active_skips_complete_sessions() {
    let h = Harness::new().await;
    put_record(&h.metadata, "a", SessionStatus::Processing, 100).await;
    put_record(&h.metadata, "b", SessionStatus::Complete, 200).await;

    assert_eq!(h.manager.find_most_recent_active().await.as_deref(), Some("a"));
}

#[tokio::test]
async fn most_recent_active_prefers_later_insert_on_tie() {
    let h = Harness::new().await;
    put_record(&h.metadata, "a", SessionStatus::Processing, 100).await;
    put_record(&h.metadata, "c", SessionStatus::AwaitingAuthentication, 100).await;
    h.metadata.set("z", "garbage".into()).await.unwrap();

    assert_eq!(h.manager.find_most_recent_active().await.as_deref(), Some("c"));
}

#[tokio::test]
async fn most_recent_active_is_none_when_all_complete() {
    let h = Harness::new().await;
    put_record(&h.metadata, "b", SessionStatus::Complete, 200).await;
    assert_eq!(h.manager.find_most_recent_active().await, None);
}

// ---------------------------------------------------------------------------
// Discard / GC
// ---------------------------------------------------------------------------

#[tokio::test]
async fn discard_clears_every_tier_and_is_idempotent() {
    let h = Harness::new().await;
    let id = h.create("lease.pdf").await;

    h.manager.discard(&id).await.unwrap();

    assert_eq!(h.manager.get_metadata(&id).await, None);
    assert!(!h.cache.contains(&id).await);
    assert_eq!(h.durable.get(&id).await.unwrap(), None);
    assert_eq!(h.manager.resolve_artifact(&id).await, None);

    h.manager.discard(&id).await.unwrap();
    h.manager.discard("never-existed").await.unwrap();
}

#[tokio::test]
async fn discard_during_durable_write_leaves_nothing_behind() {
    let dir = tempfile::tempdir().unwrap();
    let metadata = Arc::new(MemoryMetadataStore::new());
    let store = Arc::new(DurableArtifactStore::open(dir.path()).await.unwrap());
    let slow = Arc::new(SlowTier {
        inner: store.clone(),
        delay: Duration::from_millis(50),
    });
    let manager = SessionManager::new(
        metadata.clone(),
        Arc::new(ArtifactCache::new()),
        slow.clone(),
    );

    let (id, durable) = manager
        .create(Artifact::new("a.pdf", b"%PDF".to_vec()))
        .await
        .unwrap();
    manager.discard(&id).await.unwrap();
    assert!(!durable.finished().await);

    assert_eq!(metadata.get(&id).await, None);
    assert!(store.ids().await.unwrap().is_empty());

    let restarted = SessionManager::new(metadata, Arc::new(ArtifactCache::new()), slow);
    assert_eq!(restarted.resolve_artifact(&id).await, None);
}

#[tokio::test]
async fn durable_write_finishing_after_completion_is_dropped() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(DurableArtifactStore::open(dir.path()).await.unwrap());
    let slow = Arc::new(SlowTier {
        inner: store.clone(),
        delay: Duration::from_millis(50),
    });
    let manager = SessionManager::new(
        Arc::new(MemoryMetadataStore::new()),
        Arc::new(ArtifactCache::new()),
        slow,
    );

    let (id, durable) = manager
        .create(Artifact::new("a.pdf", b"%PDF".to_vec()))
        .await
        .unwrap();
    manager
        .update(&id, SessionPatch::status(SessionStatus::Uploading))
        .await
        .unwrap();
    manager.update(&id, SessionPatch::complete(3)).await.unwrap();
    manager.release_artifact(&id).await;

    assert!(!durable.finished().await);
    assert!(store.ids().await.unwrap().is_empty());
    assert_eq!(
        manager.get_metadata(&id).await.unwrap().linked_record_id,
        Some(3)
    );
}

#[tokio::test]
async fn garbage_collection_keeps_only_the_named_session() {
    let h = Harness::new().await;
    let x = h.create("x.pdf").await;
    let y = h.create("y.pdf").await;
    let z = h.create("z.pdf").await;

    let removed = h.manager.garbage_collect_all_except(Some(&x)).await.unwrap();
    assert_eq!(removed, 2);

    assert!(h.manager.get_metadata(&x).await.is_some());
    assert!(h.manager.resolve_artifact(&x).await.is_some());
    for gone in [&y, &z] {
        assert_eq!(h.manager.get_metadata(gone).await, None);
        assert!(!h.cache.contains(gone).await);
        assert_eq!(h.durable.get(gone).await.unwrap(), None);
    }
}

#[tokio::test]
async fn garbage_collection_removes_malformed_records_and_orphans() {
    let h = Harness::new().await;
    let keep = h.create("keep.pdf").await;
    h.metadata.set("broken", "{".into()).await.unwrap();
    h.durable
        .put("orphan", &Artifact::new("o.pdf", b"o".to_vec()))
        .await
        .unwrap();

    let removed = h.manager.garbage_collect_all_except(Some(&keep)).await.unwrap();
    assert_eq!(removed, 1);
    assert!(h.metadata.get("broken").await.is_none());
    assert_eq!(h.durable.get("orphan").await.unwrap(), None);
    assert!(h.manager.get_metadata(&keep).await.is_some());
}

#[tokio::test]
async fn garbage_collection_without_keep_removes_everything() {
    let h = Harness::new().await;
    h.create("a.pdf").await;
    h.create("b.pdf").await;

    assert_eq!(h.manager.garbage_collect_all_except(None).await.unwrap(), 2);
    assert!(h.manager.list().await.is_empty());
    assert!(h.cache.ids().await.unwrap().is_empty());
}
