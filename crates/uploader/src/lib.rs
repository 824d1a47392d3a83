//! `clausewatch-uploader` -- hands a contract to Clausewatch from a machine
//! that is not signed in yet.
//!
//! The file is parked in a local onboarding session, the user is sent to the
//! sign-in page, and a later `resume` with the issued token submits it.
//! Sessions survive process restarts under the state directory.

pub mod client;
pub mod config;
pub mod submitter;

pub use client::{ResumeReport, UploadReport, Uploader, UploaderError};
pub use config::{ConfigError, UploaderConfig};
pub use submitter::HttpArtifactSubmitter;
