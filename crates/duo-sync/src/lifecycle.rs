/// Room lifecycle: how a client ends up inside a room.
///
/// - `resume` re-enters the remembered room; with nothing remembered and no
///   backup, it falls back to the hardcoded legacy room — the import path
///   for the original fixed-room deployment.
/// - `create_room` mints fresh codes until one sticks (bounded retries),
///   seeding the new room from the local backup when there is one.
/// - `join_room` self-registers into an existing room, telling a bad code
///   apart from a full room.

use std::sync::Arc;

use chrono::Utc;
use tracing::warn;

use duo_store::{RoomStore, StoreError};
use duo_types::codes;
use duo_types::models::RoomDoc;

use crate::cache::{CacheHandle, LocalCache, lock_cache};
use crate::engine::SyncEngine;
use crate::error::{SyncError, SyncResult};

/// Fresh-code attempts before `create_room` gives up for good.
const CREATE_ATTEMPTS: usize = 5;

pub struct Client {
    store: Arc<RoomStore>,
    cache: CacheHandle,
    me: String,
}

impl Client {
    /// Identity comes from the cache: minted on first run, stable after.
    pub fn new(store: Arc<RoomStore>, cache: LocalCache) -> Client {
        let cache = cache.into_handle();
        let me = lock_cache(&cache).participant_id();
        Client { store, cache, me }
    }

    /// Client with a fixed identity — the legacy room's two participants
    /// are addressed by their literal ids.
    pub fn with_identity(store: Arc<RoomStore>, cache: LocalCache, me: &str) -> Client {
        Client { store, cache: cache.into_handle(), me: me.to_string() }
    }

    pub fn participant_id(&self) -> &str {
        &self.me
    }

    pub async fn enter(&self, code: &str) -> SyncResult<SyncEngine> {
        SyncEngine::enter(self.store.clone(), self.cache.clone(), code, &self.me).await
    }

    /// Re-enter the remembered room, or migrate into the legacy room when
    /// this client has never seen any room at all. Returns `None` when the
    /// entry screen should be shown instead.
    pub async fn resume(&self) -> SyncResult<Option<SyncEngine>> {
        let (code, has_backup) = {
            let cache = lock_cache(&self.cache);
            (cache.room_code(), cache.backup().is_some())
        };
        match code {
            Some(code) => self.enter(&code).await.map(Some),
            None if !has_backup => self.enter(codes::LEGACY_ROOM_CODE).await.map(Some),
            None => Ok(None),
        }
    }

    /// Create a new room under a generated code. Collisions (and rooms we
    /// are not allowed to claim) get a fresh code, up to the attempt cap.
    pub async fn create_room(&self) -> SyncResult<SyncEngine> {
        for _ in 0..CREATE_ATTEMPTS {
            let code = codes::generate();
            let now = Utc::now().timestamp_millis();

            // Best available prior content, with ownership reset to us —
            // the other seat of the old room does not follow along.
            let mut doc = lock_cache(&self.cache)
                .backup()
                .unwrap_or_else(|| RoomDoc::new(now));
            doc.created_at = now;
            doc.updated_at = now;
            doc.members.clear();
            doc.members.insert(self.me.clone(), true);
            doc.owner = Some(self.me.clone());

            match self.store.create(&code, &doc) {
                Ok(()) => return self.enter(&code).await,
                Err(StoreError::AlreadyExists | StoreError::PermissionDenied) => {
                    warn!(code = %code, "room code collision, retrying with a fresh one");
                    continue;
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(SyncError::CodesExhausted)
    }

    /// Join an existing room by code.
    pub async fn join_room(&self, raw_code: &str) -> SyncResult<SyncEngine> {
        let code = codes::normalize(raw_code);
        if code.is_empty() {
            return Err(SyncError::InvalidCode);
        }
        match self.store.join(&code, &self.me, Utc::now().timestamp_millis()) {
            Ok(_) => self.enter(&code).await,
            Err(StoreError::NotFound) => Err(SyncError::RoomNotFound),
            Err(StoreError::PermissionDenied) => Err(SyncError::JoinRefused),
            Err(err) => Err(err.into()),
        }
    }

    /// Drop the remembered selection (back to the entry screen).
    pub fn forget_room(&self) {
        lock_cache(&self.cache).set_room_code(None);
    }
}
