/// Playlist watcher: whenever a room commit adds a playlist entry, notify
/// the room's registered endpoints about the newest one.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::warn;

use duo_store::RoomStore;
use duo_types::content;
use duo_types::models::{PlaylistEntry, RoomDoc};

use crate::messenger::{Messenger, Notification};
use crate::{data_payload, send_to_room};

/// Entries present in `after` but not in `before`, keyed by (day, author).
pub fn added_entries<'a>(before: Option<&RoomDoc>, after: &'a RoomDoc) -> Vec<&'a PlaylistEntry> {
    let seen: HashSet<String> = before
        .map(|doc| doc.playlist.iter().map(PlaylistEntry::slot_key).collect())
        .unwrap_or_default();
    after
        .playlist
        .iter()
        .filter(|entry| !seen.contains(&entry.slot_key()))
        .collect()
}

pub fn playlist_notification(code: &str, entry: &PlaylistEntry) -> Notification {
    let who = content::partner_label(&entry.who);
    let title = if entry.title.is_empty() { "une musique" } else { entry.title.as_str() };
    let artist = if entry.artist.is_empty() {
        String::new()
    } else {
        format!(" — {}", entry.artist)
    };
    Notification {
        title: "Nouvelle musique 🎧".to_string(),
        body: format!("{who} a ajouté \"{title}\"{artist}"),
        data: data_payload(&[("type", "playlist"), ("roomId", code)]),
    }
}

/// Consume the store's change feed until it closes. One notification per
/// commit that added entries, about the newest addition.
pub async fn run_playlist_watcher<M: Messenger>(store: Arc<RoomStore>, messenger: Arc<M>) {
    let mut rx = store.changes();
    loop {
        let change = match rx.recv().await {
            Ok(change) => change,
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!("playlist watcher lagged by {n} commits");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        let Some(after) = &change.after else { continue };
        if after.playlist.is_empty() {
            continue;
        }
        let added = added_entries(change.before.as_ref(), after);
        let Some(latest) = added.first() else { continue };

        let notification = playlist_notification(&change.code, latest);
        if let Err(err) = send_to_room(&store, messenger.as_ref(), &change.code, &notification).await
        {
            warn!(code = %change.code, "playlist notification failed: {err}");
        }
    }
}
