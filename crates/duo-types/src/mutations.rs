/// Pure transforms applied to a freshly read room document inside a store
/// transaction. Both the sync engine and the server handlers route composite
/// writes through these, so a concurrent insertion from the other
/// participant is never clobbered by a stale in-memory copy.
///
/// Each function takes the base document by value and returns the new one;
/// `updated_at` is stamped by the caller that commits.

use crate::content::QuizQuestion;
use crate::models::{
    CoupleQuizRecord, CoupleQuizSubmission, DailyQuizRecord, MovieItem, PlaylistEntry, QuizAnswer,
    RestRange, RoomDoc, normalize_rest_ranges,
};

/// Add (or replace) the author's song for the entry's day. Newest first,
/// one slot per (day, author).
pub fn upsert_playlist_entry(mut doc: RoomDoc, entry: PlaylistEntry) -> RoomDoc {
    doc.playlist.retain(|s| s.slot_key() != entry.slot_key());
    doc.playlist.insert(0, entry);
    doc
}

pub fn remove_playlist_entry(mut doc: RoomDoc, date_key: &str, who: &str) -> RoomDoc {
    doc.playlist.retain(|s| !(s.date_key == date_key && s.who == who));
    doc
}

pub fn clear_playlist(mut doc: RoomDoc) -> RoomDoc {
    doc.playlist.clear();
    doc
}

pub fn add_rest_range(mut doc: RoomDoc, range: RestRange) -> RoomDoc {
    doc.rest_ranges.push(range);
    doc.rest_ranges = normalize_rest_ranges(std::mem::take(&mut doc.rest_ranges));
    doc
}

pub fn remove_rest_range(mut doc: RoomDoc, range: &RestRange) -> RoomDoc {
    doc.rest_ranges.retain(|r| r != range);
    doc
}

/// Append to the custom watchlist unless the title is already on either
/// list. Comparison is trimmed but case-sensitive.
pub fn add_custom_movie(mut doc: RoomDoc, title: &str) -> RoomDoc {
    let title = title.trim();
    if title.is_empty() {
        return doc;
    }
    let known = doc
        .movies
        .iter()
        .chain(doc.custom_movies.iter())
        .any(|m| m.title == title);
    if !known {
        doc.custom_movies.push(MovieItem { title: title.to_string(), done: false });
    }
    doc
}

pub fn remove_custom_movie(mut doc: RoomDoc, title: &str) -> RoomDoc {
    doc.custom_movies.retain(|m| m.title != title);
    doc
}

/// Tick a movie on whichever list it lives on.
pub fn set_movie_done(mut doc: RoomDoc, title: &str, done: bool) -> RoomDoc {
    for movie in doc.movies.iter_mut().chain(doc.custom_movies.iter_mut()) {
        if movie.title == title {
            movie.done = done;
        }
    }
    doc
}

pub fn register_member(mut doc: RoomDoc, who: &str) -> RoomDoc {
    doc.members.insert(who.to_string(), true);
    doc
}

/// Record a daily-quiz answer. A stale record (wrong day, or wrong question
/// after a content change) is replaced by a fresh one for today; a second
/// answer from the same participant is a no-op — the first answer is final
/// for the day.
pub fn answer_daily_quiz(
    mut doc: RoomDoc,
    who: &str,
    today_key: &str,
    question: &QuizQuestion,
    choice: usize,
    now_iso: &str,
) -> RoomDoc {
    if doc.daily_quiz_for(today_key, question.id).is_none() {
        doc.daily_quiz = Some(DailyQuizRecord {
            date_key: today_key.to_string(),
            question_id: question.id,
            answers: Default::default(),
        });
    }
    if let Some(record) = doc.daily_quiz.as_mut() {
        record.answers.entry(who.to_string()).or_insert_with(|| QuizAnswer {
            choice,
            correct: choice == question.answer,
            answered_at: now_iso.to_string(),
        });
    }
    doc
}

/// Store (or replace) the participant's couple-quiz submission. Validation
/// — every answer non-empty after trimming — happens in the caller, which
/// can actually report the error.
pub fn submit_couple_quiz(
    mut doc: RoomDoc,
    who: &str,
    answers: Vec<String>,
    now_iso: &str,
) -> RoomDoc {
    let record = doc.couple_quiz.get_or_insert_with(CoupleQuizRecord::default);
    record.answers.insert(
        who.to_string(),
        CoupleQuizSubmission { answers, submitted_at: now_iso.to_string() },
    );
    doc
}
