/// Subscription fan-out: one broadcast channel per room plus a global
/// change feed. Snapshots are published under the store's writer lock, so
/// subscribers see commits in commit order; a lagging receiver drops the
/// oldest buffered snapshots and catches up on the latest state, which is
/// the delivery contract (latest wins, no replay).

use std::collections::HashMap;
use std::sync::RwLock;

use tokio::sync::broadcast;

use duo_types::events::{RoomChange, RoomSnapshot};

/// Snapshots buffered per subscriber before lag kicks in.
const ROOM_CHANNEL_CAPACITY: usize = 64;
/// The change feed serves the notification watcher, which may fall behind
/// during bursts; give it more headroom.
const CHANGE_FEED_CAPACITY: usize = 256;

pub struct WatchHub {
    rooms: RwLock<HashMap<String, broadcast::Sender<RoomSnapshot>>>,
    changes_tx: broadcast::Sender<RoomChange>,
}

impl WatchHub {
    pub fn new() -> Self {
        let (changes_tx, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        WatchHub { rooms: RwLock::new(HashMap::new()), changes_tx }
    }

    /// Live feed for one room.
    pub fn watch(&self, code: &str) -> broadcast::Receiver<RoomSnapshot> {
        if let Ok(rooms) = self.rooms.read() {
            if let Some(tx) = rooms.get(code) {
                return tx.subscribe();
            }
        }
        let mut rooms = match self.rooms.write() {
            Ok(rooms) => rooms,
            Err(poisoned) => poisoned.into_inner(),
        };
        rooms
            .entry(code.to_string())
            .or_insert_with(|| broadcast::channel(ROOM_CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Global before/after feed across all rooms.
    pub fn changes(&self) -> broadcast::Receiver<RoomChange> {
        self.changes_tx.subscribe()
    }

    pub fn publish(&self, snapshot: RoomSnapshot, change: RoomChange) {
        if let Ok(rooms) = self.rooms.read() {
            if let Some(tx) = rooms.get(&snapshot.code) {
                let _ = tx.send(snapshot);
            }
        }
        let _ = self.changes_tx.send(change);
    }
}

impl Default for WatchHub {
    fn default() -> Self {
        Self::new()
    }
}
