use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;
use async_trait::async_trait;
use clausewatch_core::onboarding::{Artifact, SessionStatus};
use clausewatch_core::types::DbId;
use clausewatch_onboarding::{ArtifactSubmitter, HandoffError, HandoffOutcome, Identity, SubmitError};
use clausewatch_uploader::client::needs_sign_in;
use clausewatch_uploader::{UploadReport, Uploader, UploaderConfig, UploaderError};
use tempfile::TempDir;

#[derive(Default)]
struct ScriptedSubmitter {
    responses: Mutex<VecDeque<Result<DbId, SubmitError>>>,
    calls: AtomicUsize,
    last_file_name: Mutex<Option<String>>,
}

impl ScriptedSubmitter {
    fn with(responses: Vec<Result<DbId, SubmitError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            ..Default::default()
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArtifactSubmitter for ScriptedSubmitter {
    async fn submit(&self, artifact: &Artifact, _: &Identity) -> Result<DbId, SubmitError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_file_name.lock().unwrap() = Some(artifact.file_name.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(SubmitError::Rejected("no scripted response".into())))
    }
}

struct Fixture {
    dir: TempDir,
    submitter: Arc<ScriptedSubmitter>,
}

impl Fixture {
    fn new(responses: Vec<Result<DbId, SubmitError>>) -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
            submitter: ScriptedSubmitter::with(responses),
        }
    }

    fn config(&self) -> UploaderConfig {
        UploaderConfig::new(
            "http://localhost:3000",
            "https://app.example/sign-in",
            self.dir.path().join("state"),
        )
        .unwrap()
    }

    /// A fresh uploader over the same state directory, as a new process
    /// would open it.
    async fn open(&self) -> Uploader {
        Uploader::open(self.config(), self.submitter.clone())
            .await
            .unwrap()
    }

    fn contract_file(&self, name: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, b"%PDF-1.7 lease").unwrap();
        path
    }
}

fn token() -> Identity {
    Identity::bearer("token")
}

async fn park(uploader: &Uploader, path: &std::path::Path) -> String {
    match uploader.upload(path, None).await.unwrap() {
        UploadReport::AwaitingSignIn { session_id, .. } => session_id,
        other => panic!("expected a parked session, got {other:?}"),
    }
}

#[tokio::test]
async fn upload_without_token_parks_session_with_sign_in_link() {
    let fx = Fixture::new(vec![]);
    let uploader = fx.open().await;

    let report = uploader
        .upload(&fx.contract_file("lease.pdf"), None)
        .await
        .unwrap();

    let (session_id, link) = assert_matches!(
        report,
        UploadReport::AwaitingSignIn { session_id, sign_in_link } => (session_id, sign_in_link)
    );
    assert_eq!(link, format!("https://app.example/sign-in?session={session_id}"));

    let sessions = uploader.status(Some(&session_id)).await.unwrap();
    assert_eq!(sessions[0].status, SessionStatus::AwaitingAuthentication);
    assert_eq!(sessions[0].file_name, "lease.pdf");
    assert!(needs_sign_in(&sessions[0]));
    assert_eq!(fx.submitter.calls(), 0);
}

#[tokio::test]
async fn upload_with_token_submits_immediately() {
    let fx = Fixture::new(vec![Ok(7)]);
    let uploader = fx.open().await;

    let report = uploader
        .upload(&fx.contract_file("lease.pdf"), Some(&token()))
        .await
        .unwrap();

    let (session_id, outcome) = assert_matches!(
        report,
        UploadReport::Submitted { session_id, outcome } => (session_id, outcome)
    );
    assert_eq!(outcome, HandoffOutcome::Submitted { record_id: 7 });

    let session = &uploader.status(Some(&session_id)).await.unwrap()[0];
    assert_eq!(session.status, SessionStatus::Complete);
    assert_eq!(session.linked_record_id, Some(7));
    assert!(!needs_sign_in(session));
}

#[tokio::test]
async fn parked_session_resumes_in_a_new_process() {
    let fx = Fixture::new(vec![Ok(11)]);
    let session_id = {
        let uploader = fx.open().await;
        park(&uploader, &fx.contract_file("lease.pdf")).await
    };

    let uploader = fx.open().await;
    let report = uploader.resume(Some(&session_id), &token()).await.unwrap();

    assert_eq!(report.session_id, session_id);
    assert_eq!(report.outcome, HandoffOutcome::Submitted { record_id: 11 });
    assert_eq!(
        fx.submitter.last_file_name.lock().unwrap().as_deref(),
        Some("lease.pdf")
    );
}

#[tokio::test]
async fn resume_without_id_picks_most_recent_session() {
    let fx = Fixture::new(vec![Ok(3)]);
    let uploader = fx.open().await;
    park(&uploader, &fx.contract_file("first.pdf")).await;
    let latest = park(&uploader, &fx.contract_file("second.pdf")).await;

    let report = uploader.resume(None, &token()).await.unwrap();

    assert_eq!(report.session_id, latest);
    assert_eq!(
        fx.submitter.last_file_name.lock().unwrap().as_deref(),
        Some("second.pdf")
    );
}

#[tokio::test]
async fn resume_twice_submits_once() {
    let fx = Fixture::new(vec![Ok(5), Ok(99)]);
    let uploader = fx.open().await;
    let session_id = park(&uploader, &fx.contract_file("lease.pdf")).await;

    uploader.resume(Some(&session_id), &token()).await.unwrap();
    let again = uploader.resume(Some(&session_id), &token()).await.unwrap();

    assert_eq!(again.outcome, HandoffOutcome::AlreadyComplete { record_id: 5 });
    assert_eq!(fx.submitter.calls(), 1);
}

#[tokio::test]
async fn failed_resume_keeps_session_for_retry() {
    let fx = Fixture::new(vec![Err(SubmitError::Unauthorized("expired".into())), Ok(8)]);
    let uploader = fx.open().await;
    let session_id = park(&uploader, &fx.contract_file("lease.pdf")).await;

    let result = uploader.resume(Some(&session_id), &token()).await;
    assert_matches!(
        result,
        Err(UploaderError::Handoff(HandoffError::SubmissionFailed { .. }))
    );
    let session = &uploader.status(Some(&session_id)).await.unwrap()[0];
    assert_eq!(session.status, SessionStatus::AwaitingAuthentication);
    assert!(session.last_error.as_deref().unwrap().contains("expired"));

    let report = uploader.resume(Some(&session_id), &token()).await.unwrap();
    assert_eq!(report.outcome.record_id(), 8);
}

#[tokio::test]
async fn unknown_session_is_reported() {
    let fx = Fixture::new(vec![]);
    let uploader = fx.open().await;

    let result = uploader.resume(Some("no-such-session"), &token()).await;
    assert_matches!(result, Err(UploaderError::UnknownSession(id)) if id == "no-such-session");

    let result = uploader.status(Some("no-such-session")).await;
    assert_matches!(result, Err(UploaderError::UnknownSession(_)));
}

#[tokio::test]
async fn resume_with_nothing_parked_is_no_active_session() {
    let fx = Fixture::new(vec![]);
    let uploader = fx.open().await;

    let result = uploader.resume(None, &token()).await;
    assert_matches!(result, Err(UploaderError::NoActiveSession));
}

#[tokio::test]
async fn missing_file_is_read_error() {
    let fx = Fixture::new(vec![]);
    let uploader = fx.open().await;

    let result = uploader
        .upload(&fx.dir.path().join("missing.pdf"), None)
        .await;
    assert_matches!(result, Err(UploaderError::ReadFile { .. }));
    assert!(uploader.status(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn discard_forgets_session() {
    let fx = Fixture::new(vec![]);
    let uploader = fx.open().await;
    let session_id = park(&uploader, &fx.contract_file("lease.pdf")).await;

    uploader.discard(&session_id).await.unwrap();

    let result = uploader.resume(Some(&session_id), &token()).await;
    assert_matches!(result, Err(UploaderError::UnknownSession(_)));
    assert_eq!(fx.submitter.calls(), 0);
}

#[tokio::test]
async fn gc_keeps_only_named_session() {
    let fx = Fixture::new(vec![]);
    let uploader = fx.open().await;
    park(&uploader, &fx.contract_file("a.pdf")).await;
    let keep = park(&uploader, &fx.contract_file("b.pdf")).await;
    park(&uploader, &fx.contract_file("c.pdf")).await;

    let removed = uploader.gc(Some(&keep)).await.unwrap();

    assert_eq!(removed, 2);
    let remaining = fx.open().await.status(None).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, keep);
}
