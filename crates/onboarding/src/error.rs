use clausewatch_core::error::CoreError;

/// Failure of a storage tier.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Failure of a session manager operation.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Invalid input or a rejected state transition.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The metadata store could not be written.
    #[error(transparent)]
    Store(#[from] StoreError),
}
