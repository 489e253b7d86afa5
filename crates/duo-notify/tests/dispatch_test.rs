/// Dispatcher integration tests with a recording fake messenger: chunking,
/// invalid-token pruning, sweep idempotency, and the live playlist watcher.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{Days, TimeZone, Utc};

use duo_notify::schedule::{daily_unlock_sweep, j14_sweep};
use duo_notify::{
    MAX_TOKENS_PER_SEND, Messenger, Notification, NotifyResult, SendOutcome, send_to_room,
};
use duo_store::RoomStore;
use duo_types::models::{PlaylistEntry, RoomDoc, RoomPatch};
use duo_types::mutations;

#[derive(Default)]
struct FakeMessenger {
    calls: Mutex<Vec<(Vec<String>, Notification)>>,
    invalid: HashSet<String>,
}

impl FakeMessenger {
    fn with_invalid(tokens: &[&str]) -> Self {
        FakeMessenger {
            calls: Mutex::new(Vec::new()),
            invalid: tokens.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn calls(&self) -> Vec<(Vec<String>, Notification)> {
        self.calls.lock().unwrap().clone()
    }
}

impl Messenger for FakeMessenger {
    async fn send_multicast(
        &self,
        tokens: &[String],
        notification: &Notification,
    ) -> NotifyResult<Vec<SendOutcome>> {
        self.calls.lock().unwrap().push((tokens.to_vec(), notification.clone()));
        Ok(tokens
            .iter()
            .map(|token| {
                if self.invalid.contains(token) {
                    SendOutcome::InvalidToken
                } else {
                    SendOutcome::Delivered
                }
            })
            .collect())
    }
}

fn room_with_member(store: &RoomStore, code: &str, who: &str) -> RoomDoc {
    let doc = mutations::register_member(RoomDoc::new(1_000), who);
    store.create(code, &doc).unwrap();
    doc
}

fn note(title: &str) -> Notification {
    Notification {
        title: title.to_string(),
        body: String::new(),
        data: Default::default(),
    }
}

#[tokio::test]
async fn sends_are_chunked_to_the_provider_maximum() {
    let store = RoomStore::open_in_memory().unwrap();
    room_with_member(&store, "abcd2345", "lea");
    for i in 0..(MAX_TOKENS_PER_SEND + 1) {
        store.register_push_token("abcd2345", &format!("tok-{i:04}"), "").unwrap();
    }

    let messenger = FakeMessenger::default();
    let delivered = send_to_room(&store, &messenger, "abcd2345", &note("hello")).await.unwrap();

    assert_eq!(delivered, MAX_TOKENS_PER_SEND + 1);
    let calls = messenger.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].0.len(), MAX_TOKENS_PER_SEND);
    assert_eq!(calls[1].0.len(), 1);
}

#[tokio::test]
async fn invalid_tokens_are_pruned_after_a_send() {
    let store = RoomStore::open_in_memory().unwrap();
    room_with_member(&store, "abcd2345", "lea");
    store.register_push_token("abcd2345", "tok-live", "").unwrap();
    store.register_push_token("abcd2345", "tok-dead", "").unwrap();

    let messenger = FakeMessenger::with_invalid(&["tok-dead"]);
    let delivered = send_to_room(&store, &messenger, "abcd2345", &note("hello")).await.unwrap();

    assert_eq!(delivered, 1);
    assert_eq!(store.push_tokens("abcd2345").unwrap(), vec!["tok-live".to_string()]);
}

#[tokio::test]
async fn rooms_without_tokens_are_skipped_silently() {
    let store = RoomStore::open_in_memory().unwrap();
    room_with_member(&store, "abcd2345", "lea");

    let messenger = FakeMessenger::default();
    let delivered = send_to_room(&store, &messenger, "abcd2345", &note("hello")).await.unwrap();
    assert_eq!(delivered, 0);
    assert!(messenger.calls().is_empty());
}

#[tokio::test]
async fn daily_unlock_sweep_is_idempotent_per_day() {
    let store = RoomStore::open_in_memory().unwrap();
    room_with_member(&store, "room-one", "lea");
    room_with_member(&store, "room-two", "gauthier");
    store.register_push_token("room-one", "tok-1", "").unwrap();
    store.register_push_token("room-two", "tok-2", "").unwrap();

    let messenger = FakeMessenger::default();
    let notified = daily_unlock_sweep(&store, &messenger, "2026-02-14").await.unwrap();
    assert_eq!(notified, 2);

    // The stamp makes a rerun a no-op; a new day notifies again.
    let notified = daily_unlock_sweep(&store, &messenger, "2026-02-14").await.unwrap();
    assert_eq!(notified, 0);
    let notified = daily_unlock_sweep(&store, &messenger, "2026-02-15").await.unwrap();
    assert_eq!(notified, 2);

    let (_, first) = &messenger.calls()[0];
    assert_eq!(first.title, "Mot + mini défi dispo ✨");
    assert_eq!(first.data.get("type").map(String::as_str), Some("daily-unlock"));
}

#[tokio::test]
async fn j14_sweep_targets_exactly_fourteen_days() {
    let store = RoomStore::open_in_memory().unwrap();
    let now = Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap();

    for (code, days_out) in [("room-j14a", 14), ("room-j20b", 20)] {
        room_with_member(&store, code, "lea");
        store.register_push_token(code, &format!("tok-{code}"), "").unwrap();
        let target = (now + Days::new(days_out)).to_rfc3339();
        let patch = RoomPatch { target_iso: Some(target), ..Default::default() };
        store.update(code, "lea", &patch, 0).unwrap();
    }

    let messenger = FakeMessenger::default();
    let notified = j14_sweep(&store, &messenger, now).await.unwrap();
    assert_eq!(notified, 1);
    let (tokens, notification) = &messenger.calls()[0];
    assert_eq!(tokens, &vec!["tok-room-j14a".to_string()]);
    assert_eq!(notification.title, "J-14 💖");

    // Same target: the stamp suppresses a rerun.
    assert_eq!(j14_sweep(&store, &messenger, now).await.unwrap(), 0);

    // A rescheduled reunion notifies again when it hits J-14.
    let new_target = (now + Days::new(30)).to_rfc3339();
    let patch = RoomPatch { target_iso: Some(new_target), ..Default::default() };
    store.update("room-j14a", "lea", &patch, 0).unwrap();
    let later = now + Days::new(16);
    assert_eq!(j14_sweep(&store, &messenger, later).await.unwrap(), 1);
}

#[tokio::test]
async fn playlist_watcher_notifies_on_new_entries() {
    let store = Arc::new(RoomStore::open_in_memory().unwrap());
    room_with_member(&store, "abcd2345", "lea");
    store.register_push_token("abcd2345", "tok-1", "").unwrap();

    let messenger = Arc::new(FakeMessenger::default());
    let watcher = tokio::spawn(duo_notify::playlist::run_playlist_watcher(
        store.clone(),
        messenger.clone(),
    ));
    // Let the watcher subscribe before committing.
    tokio::time::sleep(Duration::from_millis(50)).await;

    store
        .transact("abcd2345", "lea", 2_000, |doc| {
            mutations::upsert_playlist_entry(
                doc,
                PlaylistEntry {
                    date_key: "2026-02-14".into(),
                    who: "lea".into(),
                    title: "Nikes".into(),
                    artist: "Frank Ocean".into(),
                    ..Default::default()
                },
            )
        })
        .unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    watcher.abort();

    let calls = messenger.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].1.body, "Léa a ajouté \"Nikes\" — Frank Ocean");

    // A non-playlist commit must not notify.
    assert!(
        duo_notify::playlist::added_entries(
            store.get("abcd2345").unwrap().as_ref(),
            &store.get("abcd2345").unwrap().unwrap(),
        )
        .is_empty()
    );
}
