/// Integration tests for the sync engine: two clients against one store,
/// the echo-suppression protocol, the recreate path, lifecycle flows, and
/// the end-to-end countdown scenarios.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, Local, TimeZone};

use duo_store::RoomStore;
use duo_sync::{Client, LocalCache, SyncError, SyncState};
use duo_types::codes::LEGACY_ROOM_CODE;
use duo_types::content;
use duo_types::dates;
use duo_types::models::{MeetInfo, Period, RoomPatch};

fn client(store: &Arc<RoomStore>, me: &str) -> Client {
    Client::with_identity(store.clone(), LocalCache::ephemeral(), me)
}

/// Give the spawned snapshot listeners a beat to drain their channels.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[tokio::test]
async fn entering_a_missing_room_creates_it_with_defaults() {
    let store = Arc::new(RoomStore::open_in_memory().unwrap());
    let engine = client(&store, "lea").enter("fresh234").await.unwrap();

    let doc = store.get("fresh234").unwrap().expect("document should exist after enter");
    assert!(doc.is_member("lea"));
    assert_eq!(doc.owner.as_deref(), Some("lea"));
    assert!(doc.created_at > 0);
    assert_eq!(doc.target_iso, "");
    assert!(!doc.movies.is_empty());
    assert_eq!(engine.state(), SyncState::Synced);
    assert_eq!(engine.status_line(), "✅ Synchronisé");
}

#[tokio::test]
async fn patches_mirror_between_two_clients() {
    let store = Arc::new(RoomStore::open_in_memory().unwrap());
    let lea = client(&store, "lea").enter("abcd2345").await.unwrap();
    let gauthier = client(&store, "gauthier").join_room("abcd2345").await.unwrap();
    settle().await;

    // The join snapshot armed lea's echo flag; burn it with an empty patch
    // so the real write goes through.
    lea.patch(RoomPatch::default());
    lea.set_meet(MeetInfo { city: "Paris".into(), ..Default::default() });
    settle().await;

    assert_eq!(gauthier.shared().meet.city, "Paris");
    // The write-through round-trip did not clobber unrelated fields.
    assert!(gauthier.shared().is_member("lea"));
}

#[tokio::test]
async fn echo_suppression_consumes_exactly_one_patch() {
    let store = Arc::new(RoomStore::open_in_memory().unwrap());
    let lea = client(&store, "lea").enter("abcd2345").await.unwrap();
    // Let the listener process the creation echo; the flag is armed.
    settle().await;

    // The first patch after a received snapshot is local-only: the flag is
    // consumed and nothing is written through.
    lea.patch(RoomPatch {
        target_iso: Some("2026-06-01T10:00:00.000Z".into()),
        ..Default::default()
    });
    assert_eq!(lea.shared().target_iso, "2026-06-01T10:00:00.000Z");
    assert_eq!(store.get("abcd2345").unwrap().unwrap().target_iso, "");

    // The one after writes through again.
    lea.patch(RoomPatch {
        target_iso: Some("2026-07-01T10:00:00.000Z".into()),
        ..Default::default()
    });
    assert_eq!(
        store.get("abcd2345").unwrap().unwrap().target_iso,
        "2026-07-01T10:00:00.000Z"
    );
}

#[tokio::test]
async fn failed_patch_keeps_optimistic_state_and_recreates_missing_doc() {
    let store = Arc::new(RoomStore::open_in_memory().unwrap());
    let lea = client(&store, "lea").enter("abcd2345").await.unwrap();
    settle().await;

    // Burn the armed echo flag so the next patch really writes.
    lea.patch(RoomPatch::default());

    store.delete("abcd2345").unwrap();
    settle().await;
    // The listener surfaced the disappearance but kept local state.
    assert!(lea.status_line().starts_with("⚠️"));

    lea.patch(RoomPatch {
        target_iso: Some("2026-06-01T10:00:00.000Z".into()),
        ..Default::default()
    });

    // Optimistic state survives, the error is surfaced, and the document
    // was recreated with the patch folded in.
    assert_eq!(lea.shared().target_iso, "2026-06-01T10:00:00.000Z");
    assert!(lea.status_line().starts_with("⚠️"));
    let doc = store.get("abcd2345").unwrap().expect("recreated");
    assert_eq!(doc.target_iso, "2026-06-01T10:00:00.000Z");
}

#[tokio::test]
async fn transactional_appends_from_both_sides_survive() {
    let store = Arc::new(RoomStore::open_in_memory().unwrap());
    let lea = client(&store, "lea").enter("abcd2345").await.unwrap();
    let gauthier = client(&store, "gauthier").join_room("abcd2345").await.unwrap();

    lea.add_song("Nikes", "Frank Ocean", "", "pour toi").unwrap();
    gauthier.add_song("Vienna", "Billy Joel", "", "").unwrap();
    settle().await;

    for engine in [&lea, &gauthier] {
        let playlist = engine.shared().playlist;
        assert_eq!(playlist.len(), 2, "both songs must survive");
    }

    // One slot per (day, author): re-adding replaces, not duplicates.
    lea.add_song("Solo", "", "", "").unwrap();
    settle().await;
    let playlist = gauthier.shared().playlist;
    assert_eq!(playlist.len(), 2);
    assert!(playlist.iter().any(|s| s.title == "Solo"));
}

#[tokio::test]
async fn join_errors_are_distinguished() {
    let store = Arc::new(RoomStore::open_in_memory().unwrap());
    let lea = client(&store, "lea");
    let _room = lea.enter("abcd2345").await.unwrap();
    let _partner = client(&store, "gauthier").join_room("abcd2345").await.unwrap();

    let err = client(&store, "third").join_room("abcd2345").await.unwrap_err();
    assert!(matches!(err, SyncError::JoinRefused));

    let err = client(&store, "third").join_room("zzzz9999").await.unwrap_err();
    assert!(matches!(err, SyncError::RoomNotFound));

    let err = client(&store, "third").join_room("   ").await.unwrap_err();
    assert!(matches!(err, SyncError::InvalidCode));
}

#[tokio::test]
async fn create_room_seeds_from_backup_and_resets_membership() {
    let store = Arc::new(RoomStore::open_in_memory().unwrap());
    let dir = tempfile::tempdir().unwrap();
    let cache_path = dir.path().join("cache.json");

    {
        let lea = Client::with_identity(
            store.clone(),
            LocalCache::load(cache_path.clone()),
            "lea",
        );
        let room = lea.enter("abcd2345").await.unwrap();
        settle().await;
        room.patch(RoomPatch::default());
        room.set_meet(MeetInfo { city: "Paris".into(), ..Default::default() });
        let _ = client(&store, "gauthier").join_room("abcd2345").await.unwrap();
        // The write-through echo refreshes the cached backup.
        settle().await;
    }

    // Same cache, new room: content carries over, the second seat does not.
    let lea = Client::with_identity(store.clone(), LocalCache::load(cache_path), "lea");
    let room = lea.create_room().await.unwrap();
    assert_ne!(room.code(), "abcd2345");
    let doc = room.shared();
    assert_eq!(doc.meet.city, "Paris");
    assert!(doc.is_member("lea"));
    assert!(!doc.is_member("gauthier"));
    assert_eq!(doc.owner.as_deref(), Some("lea"));
}

#[tokio::test]
async fn resume_falls_back_to_legacy_room_only_on_first_run() {
    let store = Arc::new(RoomStore::open_in_memory().unwrap());

    // Fresh client, nothing cached: lands in the legacy room.
    let fresh = client(&store, "lea");
    let engine = fresh.resume().await.unwrap().expect("legacy fallback");
    assert_eq!(engine.code(), LEGACY_ROOM_CODE);
    drop(engine);

    // A client that forgot its room but kept a backup stays on the entry
    // screen instead of being teleported into the legacy room.
    let dir = tempfile::tempdir().unwrap();
    let cache_path = dir.path().join("cache.json");
    {
        let returning = Client::with_identity(
            store.clone(),
            LocalCache::load(cache_path.clone()),
            "gauthier",
        );
        let _engine = returning.enter("abcd2345").await.unwrap();
        settle().await;
        returning.forget_room();
    }
    let returning =
        Client::with_identity(store.clone(), LocalCache::load(cache_path), "gauthier");
    assert!(returning.resume().await.unwrap().is_none());
}

#[tokio::test]
async fn legacy_room_accepts_writes_without_membership() {
    let store = Arc::new(RoomStore::open_in_memory().unwrap());
    let engine = client(&store, "anyone").enter(LEGACY_ROOM_CODE).await.unwrap();
    settle().await;

    // Burn the echo flag, then write for real.
    engine.patch(RoomPatch::default());
    engine.set_meet(MeetInfo { city: "Paris".into(), ..Default::default() });
    assert_eq!(engine.state(), SyncState::Synced);
    assert_eq!(store.get(LEGACY_ROOM_CODE).unwrap().unwrap().meet.city, "Paris");
}

#[tokio::test]
async fn daily_unlock_is_deterministic_and_idempotent() {
    let store = Arc::new(RoomStore::open_in_memory().unwrap());
    let lea = client(&store, "lea").enter("abcd2345").await.unwrap();
    let gauthier = client(&store, "gauthier").join_room("abcd2345").await.unwrap();

    let from_lea = lea.unlock_daily();
    let again = lea.unlock_daily();
    assert_eq!(from_lea, again);
    assert!(lea.daily_unlocked());

    // The other client computes the identical record on its own.
    let from_gauthier = gauthier.unlock_daily();
    assert_eq!(from_lea, from_gauthier);
    assert!(content::LOVE_NOTES.contains(&from_lea.love.as_str()));
    assert!(content::CHALLENGES.contains(&from_lea.challenge.as_str()));
}

#[tokio::test]
async fn quiz_stale_record_reads_as_unanswered_and_first_answer_wins() {
    let store = Arc::new(RoomStore::open_in_memory().unwrap());
    let lea = client(&store, "lea").enter("abcd2345").await.unwrap();

    let question = lea.today_question();

    // Plant yesterday's record for the same question id.
    let yesterday = dates::day_key(
        Local::now().date_naive().pred_opt().unwrap(),
    );
    store
        .transact("abcd2345", "lea", 1, |doc| {
            duo_types::mutations::answer_daily_quiz(doc, "lea", &yesterday, question, 0, "t0")
        })
        .unwrap();
    settle().await;

    // Yesterday's answer does not count for today.
    assert!(lea.my_quiz_answer().is_none());

    lea.answer_daily_quiz(question.answer).unwrap();
    let first = lea.my_quiz_answer().expect("answered");
    assert!(first.correct);

    // Second attempt is a no-op.
    lea.answer_daily_quiz((question.answer + 1) % question.choices.len()).unwrap();
    assert_eq!(lea.my_quiz_answer().unwrap().choice, first.choice);

    let err = lea.answer_daily_quiz(99).unwrap_err();
    assert!(matches!(err, SyncError::Validation(_)));
}

#[tokio::test]
async fn couple_quiz_gates_on_date_and_blank_answers() {
    let store = Arc::new(RoomStore::open_in_memory().unwrap());
    let lea = client(&store, "lea").enter("abcd2345").await.unwrap();

    let answers: Vec<String> =
        content::COUPLE_QUIZ_QUESTIONS.iter().map(|_| "une réponse".to_string()).collect();
    let today = dates::today_key();

    if today.ends_with("-02-14") {
        // On the day itself, blank answers are still rejected.
        let mut blank = answers.clone();
        blank[0] = "   ".into();
        assert!(matches!(lea.submit_couple_quiz(blank), Err(SyncError::Validation(_))));
        lea.submit_couple_quiz(answers).unwrap();
        assert!(lea.shared().couple_quiz.unwrap().answers.contains_key("lea"));
    } else {
        assert!(!lea.couple_quiz_open());
        assert!(matches!(lea.submit_couple_quiz(answers), Err(SyncError::Validation(_))));
    }
}

#[tokio::test]
async fn rest_ranges_normalize_through_the_engine() {
    let store = Arc::new(RoomStore::open_in_memory().unwrap());
    let lea = client(&store, "lea").enter("abcd2345").await.unwrap();

    lea.add_rest_range("2026-03-10", "2026-03-05", Period::Am, Period::Pm).unwrap();
    lea.add_rest_range("2026-03-05", "2026-03-10", Period::Pm, Period::Am).unwrap();

    let ranges = lea.shared().rest_ranges;
    assert_eq!(ranges.len(), 1, "swapped duplicate must be deduplicated");
    assert_eq!(ranges[0].start, "2026-03-05");
    assert_eq!(ranges[0].start_period, Period::Pm);

    assert!(lea.add_rest_range("garbage", "2026-03-05", Period::Am, Period::Pm).is_err());
}

#[tokio::test]
async fn countdown_scenarios_end_to_end() {
    let store = Arc::new(RoomStore::open_in_memory().unwrap());
    let lea = client(&store, "lea").enter("abcd2345").await.unwrap();
    settle().await;

    // Pin "now" to 13:00 local today so the day math is exact.
    let now = Local::now();
    let now = Local
        .with_ymd_and_hms(now.year(), now.month(), now.day(), 13, 0, 0)
        .single()
        .unwrap();

    // No target: no timer, no message.
    let view = lea.home_view(now);
    assert!(view.timer.is_none());
    assert_eq!(view.message, "");
    assert_eq!(view.days, None);

    // Target at local noon five days out.
    let target_day = dates::day_key(now.date_naive() + chrono::Days::new(5));
    lea.set_target_date(&target_day).unwrap();

    let view = lea.home_view(now);
    assert_eq!(view.days, Some(5));
    assert_eq!(view.message, "Plus que 5 jours avant de te revoir 💕");
    let timer = view.timer.expect("timer visible");
    assert_eq!(timer.days, 4);
    assert_eq!(timer.hours, 23);
    assert_eq!(view.nights, Some(5));
    assert_eq!(view.milestone, Some((3, "3 jours".to_string())));
    assert_eq!(view.days_to_milestone, Some(2));
    assert_eq!(view.vibe, "Semaine finale. Je tiens plus 😭💋");
}

#[tokio::test]
async fn movie_lists_sync_on_both_paths() {
    let store = Arc::new(RoomStore::open_in_memory().unwrap());
    let lea = client(&store, "lea").enter("abcd2345").await.unwrap();
    let gauthier = client(&store, "gauthier").join_room("abcd2345").await.unwrap();

    settle().await;
    // Curated list: scalar patch path. Burn lea's echo flag first.
    lea.patch(RoomPatch::default());
    lea.set_movie_done("Coco", true);
    settle().await;
    assert!(
        gauthier.shared().movies.iter().find(|m| m.title == "Coco").unwrap().done
    );

    // Custom list: transactional path from both sides.
    lea.add_custom_movie("Portrait de la jeune fille en feu").unwrap();
    gauthier.add_custom_movie("Before Sunrise").unwrap();
    settle().await;
    assert_eq!(lea.shared().custom_movies.len(), 2);
    assert_eq!(gauthier.shared().custom_movies.len(), 2);

    gauthier.set_movie_done("Before Sunrise", true);
    settle().await;
    assert!(
        lea.shared().custom_movies.iter().find(|m| m.title == "Before Sunrise").unwrap().done
    );
}
