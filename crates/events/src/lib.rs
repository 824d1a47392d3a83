//! Clausewatch notification fan-out.
//!
//! - [`directory`]: who a broadcast is addressed to.
//! - [`broadcast`]: one `email.send` job per recipient, with per-recipient
//!   failure isolation.
//! - [`delivery`]: outbound channels consumed by the worker (SMTP email).

pub mod broadcast;
pub mod delivery;
pub mod directory;

pub use broadcast::{BroadcastError, BroadcastMessage, Broadcaster};
pub use delivery::email::{EmailConfig, EmailDelivery, EmailError, EmailSender, OutboundEmail};
pub use directory::{DirectoryError, PgRecipientDirectory, RecipientDirectory};
