//! Clausewatch domain core.
//!
//! Pure types, constants and validation shared by every other crate. Nothing
//! in here performs I/O; the only async code is the batch aggregator, which
//! drives caller-supplied futures.

pub mod batch;
pub mod error;
pub mod job_types;
pub mod onboarding;
pub mod pipeline;
pub mod roles;
pub mod types;
