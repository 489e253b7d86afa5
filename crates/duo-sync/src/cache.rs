/// Per-client persistent scraps: the participant identity, the currently
/// selected room code, and a backup copy of the last-known room content —
/// the localStorage of the original client. The backup seeds a newly created
/// room so content survives a lost or recreated document.
///
/// The cache is best-effort: a missing or corrupt file loads as empty, and
/// persistence failures are logged, never raised.

use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use duo_types::models::RoomDoc;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct CacheFile {
    participant_id: Option<String>,
    room_code: Option<String>,
    backup: Option<RoomDoc>,
}

pub struct LocalCache {
    path: Option<PathBuf>,
    data: CacheFile,
}

/// Shared between the `Client` façade and the engine's listener task.
pub type CacheHandle = Arc<Mutex<LocalCache>>;

/// The cache is best-effort state; a poisoned lock just means some writer
/// panicked mid-update, and the data is still the best copy we have.
pub(crate) fn lock_cache(handle: &CacheHandle) -> std::sync::MutexGuard<'_, LocalCache> {
    match handle.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl LocalCache {
    pub fn load(path: PathBuf) -> Self {
        let data = fs::read(&path)
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .unwrap_or_default();
        LocalCache { path: Some(path), data }
    }

    /// In-memory cache for tests and throwaway sessions.
    pub fn ephemeral() -> Self {
        LocalCache { path: None, data: CacheFile::default() }
    }

    pub fn into_handle(self) -> CacheHandle {
        Arc::new(Mutex::new(self))
    }

    /// Stable participant identity, minted on first use.
    pub fn participant_id(&mut self) -> String {
        if let Some(id) = &self.data.participant_id {
            return id.clone();
        }
        let id = Uuid::new_v4().to_string();
        self.data.participant_id = Some(id.clone());
        self.persist();
        id
    }

    pub fn room_code(&self) -> Option<String> {
        self.data.room_code.clone()
    }

    pub fn set_room_code(&mut self, code: Option<String>) {
        if self.data.room_code != code {
            self.data.room_code = code;
            self.persist();
        }
    }

    pub fn backup(&self) -> Option<RoomDoc> {
        self.data.backup.clone()
    }

    pub fn set_backup(&mut self, doc: RoomDoc) {
        self.data.backup = Some(doc);
        self.persist();
    }

    fn persist(&self) {
        let Some(path) = &self.path else { return };
        let write = serde_json::to_vec_pretty(&self.data)
            .map_err(std::io::Error::other)
            .and_then(|bytes| {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(path, bytes)
            });
        if let Err(err) = write {
            warn!("could not persist local cache to {}: {err}", path.display());
        }
    }
}
