//! Queue consumers for Clausewatch.
//!
//! The worker binary claims `email.send` jobs enqueued by notification
//! broadcasts and delivers them over SMTP.

pub mod config;
pub mod email_worker;

pub use config::WorkerConfig;
pub use email_worker::{EmailWorker, ProcessedJob};
