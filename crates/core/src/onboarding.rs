//! Onboarding session model and state machine.
//!
//! An onboarding session links an artifact uploaded before sign-in to the
//! contract record created once the visitor has authenticated. This module
//! owns the pure parts: the status lifecycle, the metadata record, patch
//! application with transition checks, id generation and the recency rule
//! used to pick the session a resuming client should continue.
//!
//! ```text
//! processing ──► awaiting-authentication ──► uploading ──► complete
//!      │                      ▲                  │
//!      └──────────────────────┼──────────────────┤
//!        (already signed in)  └──────────────────┘
//!                              (submission failed)
//! ```

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::DbId;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Maximum length of a session id accepted from a URL path segment.
const MAX_SESSION_ID_LEN: usize = 64;

/// Maximum length of an artifact file name.
const MAX_FILE_NAME_LEN: usize = 255;

// ---------------------------------------------------------------------------
// SessionStatus
// ---------------------------------------------------------------------------

/// Lifecycle status of an onboarding session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionStatus {
    /// Artifact received; nothing has been decided yet.
    Processing,
    /// Waiting for the visitor to sign in.
    AwaitingAuthentication,
    /// Artifact is being submitted to the contract endpoint.
    Uploading,
    /// Submission accepted; `linked_record_id` is set.
    Complete,
}

impl SessionStatus {
    /// Wire name, identical to the serde representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::AwaitingAuthentication => "awaiting-authentication",
            Self::Uploading => "uploading",
            Self::Complete => "complete",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete)
    }

    /// Whether a session may move from `self` to `next`.
    ///
    /// Re-asserting the current status is always allowed. `complete` is
    /// terminal: no other status is reachable from it.
    pub fn can_transition_to(self, next: SessionStatus) -> bool {
        use SessionStatus::*;

        if self == next {
            return true;
        }
        matches!(
            (self, next),
            (Processing, AwaitingAuthentication)
                | (Processing, Uploading)
                | (AwaitingAuthentication, Uploading)
                | (Uploading, Complete)
                | (Uploading, AwaitingAuthentication)
        )
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Artifact
// ---------------------------------------------------------------------------

/// The uploaded document together with its descriptive metadata.
///
/// `bytes` is reference-counted so moving an artifact between storage tiers
/// does not copy the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl Artifact {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: None,
            bytes: bytes.into(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Payload size in bytes.
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

// ---------------------------------------------------------------------------
// OnboardingSession
// ---------------------------------------------------------------------------

/// Metadata record for one onboarding session.
///
/// This record, not the cached artifact, is the source of truth for whether
/// a session exists and what state it is in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingSession {
    pub id: String,
    pub file_name: String,
    pub file_size: u64,
    pub linked_record_id: Option<DbId>,
    pub status: SessionStatus,
    /// Milliseconds since the Unix epoch. Only compared against other
    /// sessions' values.
    pub created_at: i64,
    /// Reason the most recent submission attempt failed, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl OnboardingSession {
    /// Build the initial `processing` record for a freshly uploaded artifact.
    pub fn new(id: impl Into<String>, artifact: &Artifact, created_at: i64) -> Self {
        Self {
            id: id.into(),
            file_name: artifact.file_name.clone(),
            file_size: artifact.size(),
            linked_record_id: None,
            status: SessionStatus::Processing,
            created_at,
            last_error: None,
        }
    }

    /// Return a copy of this record with `patch` merged in.
    ///
    /// Rejects transitions the state machine does not allow, a `complete`
    /// status without a linked record, and a linked record on any other
    /// status. Once linked, the record id cannot change.
    pub fn apply(&self, patch: &SessionPatch) -> Result<OnboardingSession, CoreError> {
        let next_status = patch.status.unwrap_or(self.status);
        if !self.status.can_transition_to(next_status) {
            return Err(CoreError::Conflict(format!(
                "Session '{}' cannot move from {} to {}",
                self.id, self.status, next_status
            )));
        }

        let linked_record_id = match (self.linked_record_id, patch.linked_record_id) {
            (Some(existing), Some(new)) if existing != new => {
                return Err(CoreError::Conflict(format!(
                    "Session '{}' is already linked to record {existing}",
                    self.id
                )));
            }
            (existing, new) => new.or(existing),
        };

        match (next_status, linked_record_id) {
            (SessionStatus::Complete, None) => {
                return Err(CoreError::Validation(format!(
                    "Session '{}' cannot complete without a linked record",
                    self.id
                )));
            }
            (status, Some(_)) if status != SessionStatus::Complete => {
                return Err(CoreError::Validation(format!(
                    "Session '{}' can only be linked when it completes",
                    self.id
                )));
            }
            _ => {}
        }

        let last_error = match &patch.last_error {
            Some(update) => update.clone(),
            None => self.last_error.clone(),
        };

        Ok(OnboardingSession {
            status: next_status,
            linked_record_id,
            last_error,
            ..self.clone()
        })
    }
}

// ---------------------------------------------------------------------------
// SessionPatch
// ---------------------------------------------------------------------------

/// Partial update for an [`OnboardingSession`].
///
/// `file_name`, `file_size`, `id` and `created_at` are immutable and have no
/// field here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionPatch {
    pub status: Option<SessionStatus>,
    pub linked_record_id: Option<DbId>,
    /// `Some(None)` clears the stored error, `None` leaves it unchanged.
    pub last_error: Option<Option<String>>,
}

impl SessionPatch {
    pub fn status(status: SessionStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// The `uploading -> complete` patch: status and record id in one write.
    pub fn complete(record_id: DbId) -> Self {
        Self {
            status: Some(SessionStatus::Complete),
            linked_record_id: Some(record_id),
            last_error: Some(None),
        }
    }

    pub fn with_error(mut self, reason: impl Into<String>) -> Self {
        self.last_error = Some(Some(reason.into()));
        self
    }

    pub fn clearing_error(mut self) -> Self {
        self.last_error = Some(None);
        self
    }
}

// ---------------------------------------------------------------------------
// Ids and validation
// ---------------------------------------------------------------------------

/// Generate a fresh session id (UUID v4, hyphenated).
pub fn new_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Validate that a session id is safe to use as a URL path segment and as a
/// file name in the durable store.
pub fn validate_session_id(id: &str) -> Result<(), CoreError> {
    if id.is_empty() || id.len() > MAX_SESSION_ID_LEN {
        return Err(CoreError::Validation(format!(
            "Session id must be 1-{MAX_SESSION_ID_LEN} characters"
        )));
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(CoreError::Validation(format!(
            "Session id '{id}' contains characters that are not URL-safe"
        )));
    }
    Ok(())
}

/// Validate an artifact file name.
pub fn validate_file_name(name: &str) -> Result<(), CoreError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation(
            "Artifact file name must not be empty".to_string(),
        ));
    }
    if trimmed.chars().count() > MAX_FILE_NAME_LEN {
        return Err(CoreError::Validation(format!(
            "Artifact file name exceeds {MAX_FILE_NAME_LEN} characters"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Recency
// ---------------------------------------------------------------------------

/// Pick the session a resuming client should continue.
///
/// `complete` sessions are skipped. Among the rest the greatest `created_at`
/// wins; when two sessions share a timestamp, the one yielded later by the
/// iterator wins. Callers pass sessions in storage insertion order, so the
/// later-inserted session wins a tie.
pub fn most_recent_active<'a, I>(sessions: I) -> Option<&'a OnboardingSession>
where
    I: IntoIterator<Item = &'a OnboardingSession>,
{
    sessions
        .into_iter()
        .filter(|s| !s.status.is_terminal())
        .fold(None::<&'a OnboardingSession>, |best, candidate| match best {
            Some(current) if candidate.created_at < current.created_at => Some(current),
            _ => Some(candidate),
        })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
