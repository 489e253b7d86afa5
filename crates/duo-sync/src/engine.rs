/// The room sync engine: one instance per client, holding the local copy of
/// the shared document and mirroring it against the store.
///
/// Protocol, in order of life:
/// - entering subscribes to the room, creating the document (seeded from
///   the local backup) when it does not exist yet;
/// - remote snapshots are adopted wholesale and arm the echo-suppression
///   flag, so the next local patch — the one re-rendering the UI from that
///   very snapshot — is not written back to the store;
/// - local patches apply optimistically first (the UI never waits on the
///   network), then write through; a failed write leaves the optimistic
///   state in place and surfaces the error string;
/// - composite fields go through [`SyncEngine::run_transaction`], which
///   applies the same pure mutation both locally and against the freshly
///   read base inside a store transaction.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use duo_store::{RoomStore, StoreError};
use duo_types::codes;
use duo_types::events::RoomSnapshot;
use duo_types::models::{RoomDoc, RoomPatch};
use duo_types::mutations;

use crate::cache::{CacheHandle, lock_cache};
use crate::error::{SyncError, SyncResult};

/// Engine states. `Error` is sticky until the next successful write or
/// received snapshot; feature actions stay available throughout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Disconnected,
    Subscribing,
    Synced,
    Writing,
    Error,
}

struct Inner {
    store: Arc<RoomStore>,
    cache: CacheHandle,
    code: String,
    me: String,
    shared: RoomDoc,
    state: SyncState,
    last_error: Option<String>,
    /// Armed whenever a remote snapshot is adopted; consumed (and the
    /// remote write skipped) by the next patch. Lives here, not in some
    /// side channel, so every reset point is in this file.
    suppress_echo: bool,
}

pub struct SyncEngine {
    inner: Arc<Mutex<Inner>>,
    listener: JoinHandle<()>,
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine").finish_non_exhaustive()
    }
}

impl SyncEngine {
    /// Subscribe to `raw_code` and adopt (or create) the room document.
    /// Needs a tokio runtime: the snapshot listener is a spawned task.
    pub async fn enter(
        store: Arc<RoomStore>,
        cache: CacheHandle,
        raw_code: &str,
        me: &str,
    ) -> SyncResult<SyncEngine> {
        let code = codes::normalize(raw_code);
        if code.is_empty() {
            return Err(SyncError::InvalidCode);
        }

        let (initial, rx) = match store.subscribe(&code, me) {
            Ok(ok) => ok,
            Err(StoreError::PermissionDenied) => {
                // The room exists but is not ours: forget the selection and
                // send the user back to the entry screen.
                lock_cache(&cache).set_room_code(None);
                return Err(SyncError::RoomInaccessible);
            }
            Err(err) => return Err(err.into()),
        };

        let now = Utc::now().timestamp_millis();
        let shared = match initial.doc {
            Some(doc) => doc,
            None => {
                let backup = lock_cache(&cache).backup();
                let mut doc = backup.unwrap_or_else(|| RoomDoc::new(now));
                if doc.created_at == 0 {
                    doc.created_at = now;
                }
                doc.updated_at = now;
                if code != codes::LEGACY_ROOM_CODE {
                    doc = mutations::register_member(doc, me);
                    doc.owner.get_or_insert_with(|| me.to_string());
                }
                match store.create(&code, &doc) {
                    Ok(()) => doc,
                    // Lost the creation race; adopt whatever the other
                    // client just wrote.
                    Err(StoreError::AlreadyExists) => {
                        store.get(&code)?.ok_or(StoreError::NotFound)?
                    }
                    Err(err) => return Err(err.into()),
                }
            }
        };

        {
            let mut cache = lock_cache(&cache);
            cache.set_room_code(Some(code.clone()));
            cache.set_backup(shared.clone());
        }
        debug!(code = %code, "entered room");

        let inner = Arc::new(Mutex::new(Inner {
            store,
            cache,
            code,
            me: me.to_string(),
            shared,
            state: SyncState::Synced,
            last_error: None,
            suppress_echo: true,
        }));
        let listener = tokio::spawn(listen(inner.clone(), rx));
        Ok(SyncEngine { inner, listener })
    }

    /// Scalar last-writer-wins mutation. Applies locally first; errors are
    /// recorded for the status line, never returned — the optimistic state
    /// stays either way.
    pub fn patch(&self, patch: RoomPatch) {
        let mut inner = self.lock();
        let now = Utc::now().timestamp_millis();
        patch.apply(&mut inner.shared, now);

        if inner.suppress_echo {
            inner.suppress_echo = false;
            return;
        }

        inner.state = SyncState::Writing;
        match inner.store.update(&inner.code, &inner.me, &patch, now) {
            Ok(committed) => {
                inner.shared = committed;
                inner.state = SyncState::Synced;
                inner.last_error = None;
            }
            Err(err) => {
                // If the document vanished underneath us, recreate it as
                // defaults + this patch; the error is surfaced regardless.
                if matches!(inner.store.get(&inner.code), Ok(None)) {
                    let mut doc = RoomDoc::new(now);
                    if inner.code != codes::LEGACY_ROOM_CODE {
                        doc = mutations::register_member(doc, &inner.me);
                        doc.owner = Some(inner.me.clone());
                    }
                    patch.apply(&mut doc, now);
                    if let Err(err) = inner.store.set(&inner.code, &inner.me, &doc) {
                        warn!("room recreation failed: {err}");
                    }
                }
                inner.last_error = Some(err.to_string());
                inner.state = SyncState::Error;
            }
        }
    }

    /// Composite mutation: `f` runs once against the local copy (optimistic)
    /// and once against the freshly read base inside a store transaction, so
    /// a concurrent append from the other participant survives.
    pub(crate) fn run_transaction<F>(&self, f: F)
    where
        F: Fn(RoomDoc) -> RoomDoc,
    {
        let mut inner = self.lock();
        let now = Utc::now().timestamp_millis();
        inner.shared = f(inner.shared.clone());
        inner.shared.updated_at = now;

        inner.state = SyncState::Writing;
        match inner.store.transact(&inner.code, &inner.me, now, |base| f(base)) {
            Ok(committed) => {
                inner.shared = committed;
                inner.state = SyncState::Synced;
                inner.last_error = None;
            }
            Err(err) => {
                inner.last_error = Some(err.to_string());
                inner.state = SyncState::Error;
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    // -- Accessors --

    /// Clone of the current local document.
    pub fn shared(&self) -> RoomDoc {
        self.lock().shared.clone()
    }

    pub fn state(&self) -> SyncState {
        self.lock().state
    }

    pub fn last_error(&self) -> Option<String> {
        self.lock().last_error.clone()
    }

    pub fn code(&self) -> String {
        self.lock().code.clone()
    }

    pub fn participant_id(&self) -> String {
        self.lock().me.clone()
    }

    /// The persistent status indicator.
    pub fn status_line(&self) -> String {
        let inner = self.lock();
        match (inner.state, &inner.last_error) {
            (SyncState::Error, Some(err)) => format!("⚠️ {err}"),
            (SyncState::Error, None) => "⚠️ erreur de synchronisation".to_string(),
            (SyncState::Subscribing | SyncState::Writing, _) => "Synchronisation…".to_string(),
            (SyncState::Synced, _) => "✅ Synchronisé".to_string(),
            (SyncState::Disconnected, _) => "Hors ligne".to_string(),
        }
    }

    /// Tear the subscription down and stop mirroring.
    pub fn leave(self) {
        self.listener.abort();
        let mut inner = self.lock();
        inner.state = SyncState::Disconnected;
    }
}

impl Drop for SyncEngine {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

async fn listen(inner: Arc<Mutex<Inner>>, mut rx: broadcast::Receiver<RoomSnapshot>) {
    loop {
        match rx.recv().await {
            Ok(snapshot) => apply_snapshot(&inner, snapshot),
            Err(broadcast::error::RecvError::Lagged(n)) => {
                // Intermediate states were dropped; the latest one is still
                // queued, which is all the contract promises.
                warn!("room subscription lagged by {n} snapshots");
            }
            Err(broadcast::error::RecvError::Closed) => {
                if let Ok(mut inner) = inner.lock() {
                    inner.state = SyncState::Disconnected;
                }
                break;
            }
        }
    }
}

fn apply_snapshot(inner: &Arc<Mutex<Inner>>, snapshot: RoomSnapshot) {
    let mut guard = match inner.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    match snapshot.doc {
        Some(doc) => {
            guard.suppress_echo = true;
            guard.shared = doc.clone();
            guard.state = SyncState::Synced;
            lock_cache(&guard.cache).set_backup(doc);
        }
        None => {
            // Deleted out from under us. Keep the local copy and surface a
            // non-fatal error; the next patch notices the missing document
            // and recreates it.
            warn!(code = %guard.code, "room document disappeared");
            guard.last_error = Some("room document disappeared".to_string());
            guard.state = SyncState::Error;
        }
    }
}
