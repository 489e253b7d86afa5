//! The shared document store: one JSON document per room, addressed by room
//! code, with live subscriptions and transactional read-modify-write for
//! composite fields. This is the single shared mutable resource of the whole
//! system — scalar fields are last-writer-wins, composite fields only change
//! through [`RoomStore::transact`] so two participants appending at the same
//! time never lose each other's entries.

pub mod error;
pub mod migrations;
mod queries;
pub mod rules;
pub mod watch;

pub use error::{StoreError, StoreResult};

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;
use tracing::info;

use crate::watch::WatchHub;

pub struct RoomStore {
    conn: Mutex<Connection>,
    hub: WatchHub,
}

impl RoomStore {
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;

        migrations::run(&conn)?;

        info!("Room store opened at {}", path.display());
        Ok(RoomStore { conn: Mutex::new(conn), hub: WatchHub::new() })
    }

    /// Throwaway store for tests.
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        migrations::run(&conn)?;
        Ok(RoomStore { conn: Mutex::new(conn), hub: WatchHub::new() })
    }

    pub(crate) fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    pub(crate) fn hub(&self) -> &WatchHub {
        &self.hub
    }
}
