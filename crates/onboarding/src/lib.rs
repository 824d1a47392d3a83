//! Client-side onboarding session handoff.
//!
//! Holds an artifact uploaded before sign-in across process restarts and an
//! external authentication round-trip, then submits it exactly once.
//!
//! Storage is split into three tiers:
//!
//! - [`cache::ArtifactCache`]: process memory, lost on exit.
//! - [`metadata::MetadataStore`]: one small JSON record per session; the
//!   source of truth for whether a session exists.
//! - [`durable::DurableArtifactStore`]: artifact bytes on disk, keyed by
//!   session id.
//!
//! [`manager::SessionManager`] ties the tiers together and
//! [`handoff::HandoffCoordinator`] drives a session to completion.

pub mod cache;
pub mod durable;
pub mod error;
pub mod handoff;
pub mod manager;
pub mod metadata;
pub mod tiered;

pub use cache::ArtifactCache;
pub use durable::DurableArtifactStore;
pub use error::{SessionError, StoreError};
pub use handoff::{ArtifactSubmitter, HandoffCoordinator, HandoffError, HandoffOutcome, Identity, SubmitError};
pub use manager::{DurableWrite, SessionManager};
pub use metadata::{FileMetadataStore, MemoryMetadataStore, MetadataStore};
pub use tiered::{ArtifactTier, TieredArtifactStore};
