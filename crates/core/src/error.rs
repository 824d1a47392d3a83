//! Domain error type shared by every crate in the workspace.

use std::fmt::Display;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// `id` is rendered as a string so contract ids (`BIGSERIAL`) and
    /// onboarding session ids (UUID strings) share one variant.
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn not_found(entity: &'static str, id: impl Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}
