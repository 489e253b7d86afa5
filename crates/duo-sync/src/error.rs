use duo_store::StoreError;
use thiserror::Error;

/// Everything the engine can report. The UI-facing split matters: a bad
/// code sends the user back to the entry screen, a refused join is shown
/// inline without touching the current room selection, and write failures
/// are surfaced in the status line while the optimistic local state stays.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("room code is empty or invalid")]
    InvalidCode,

    #[error("no room with this code")]
    RoomNotFound,

    #[error("this room already has two participants")]
    JoinRefused,

    #[error("no access to this room")]
    RoomInaccessible,

    #[error("could not find a free room code")]
    CodesExhausted,

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type SyncResult<T> = Result<T, SyncError>;
