/// Errors surfaced by the storage port. Transient storage errors and
/// write conflicts are retried with backoff; everything else is
/// fatal to the calling round.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("transient storage error: {0}")]
    Transient(#[source] anyhow::Error),
    #[error("write conflict: {0}")]
    Conflict(String),
    #[error("not found")]
    NotFound,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StorageError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StorageError::Transient(_) | StorageError::Conflict(_))
    }
}
