pub mod contracts;
pub mod notifications;
