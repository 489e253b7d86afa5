/// Events published by the room store.

use serde::{Deserialize, Serialize};

use crate::models::RoomDoc;

/// One committed state of a room, as delivered to subscribers. Receivers
/// that lag only see the latest states — intermediate commits may be
/// skipped, never reordered.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub code: String,
    /// Monotonic per-room commit counter.
    pub version: u64,
    /// None when the document was deleted out from under the room.
    pub doc: Option<RoomDoc>,
}

impl RoomSnapshot {
    pub fn exists(&self) -> bool {
        self.doc.is_some()
    }
}

/// Before/after pair for every committed write, for consumers that diff
/// (the playlist notification watcher).
#[derive(Debug, Clone)]
pub struct RoomChange {
    pub code: String,
    pub before: Option<RoomDoc>,
    pub after: Option<RoomDoc>,
}
