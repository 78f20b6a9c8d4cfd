use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("store unavailable: {0}")]
    Store(String),
    #[error("data integrity error: {0}")]
    Integrity(String),
    #[error(transparent)]
    Model(#[from] models::errors::ModelError),
}

impl ServiceError {
    pub fn store(context: &str, err: impl std::fmt::Display) -> Self {
        Self::Store(format!("{context}: {err}"))
    }

    /// Failures that come from the backend rather than from the caller's input.
    pub fn is_store_failure(&self) -> bool {
        matches!(self, Self::Store(_) | Self::Integrity(_))
    }
}
