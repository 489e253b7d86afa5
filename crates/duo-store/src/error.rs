use thiserror::Error;

/// Store failures, split the way callers need to react to them: a bad room
/// code (`NotFound`) sends the user back to the entry screen, a membership
/// rejection (`PermissionDenied`) is surfaced inline, and everything else
/// is a retryable storage-level error.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("room does not exist")]
    NotFound,

    #[error("room already exists")]
    AlreadyExists,

    #[error("not a member of this room")]
    PermissionDenied,

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("document encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("store lock poisoned")]
    Poisoned,
}

pub type StoreResult<T> = Result<T, StoreError>;
