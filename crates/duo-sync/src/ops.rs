/// Feature operations, one small method per user action. Scalar fields go
/// through the engine's patch path; anything two people can append to at
/// once goes through the transactional path.

use chrono::{DateTime, Local, SecondsFormat, Utc};

use duo_types::content::{self, QuizQuestion};
use duo_types::dates::{self, TimeParts};
use duo_types::models::{
    DailyRecord, MeetInfo, MovieItem, Period, PlaylistEntry, RestRange, RoomPatch, TodoItem,
};
use duo_types::mutations;
use duo_types::pick;

use crate::engine::SyncEngine;
use crate::error::{SyncError, SyncResult};

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl SyncEngine {
    // -- Countdown --

    /// Pin the reunion date to local noon of `day` (`YYYY-MM-DD`).
    pub fn set_target_date(&self, day: &str) -> SyncResult<()> {
        let target_iso = dates::target_iso_for_day(day)
            .ok_or_else(|| SyncError::Validation(format!("not a valid date: {day}")))?;
        self.patch(RoomPatch { target_iso: Some(target_iso), ..Default::default() });
        Ok(())
    }

    pub fn clear_target_date(&self) {
        self.patch(RoomPatch { target_iso: Some(String::new()), ..Default::default() });
    }

    // -- Daily love note + challenge --

    /// Unlock today's note and challenge (idempotent within a day). The
    /// picks are deterministic, so whichever client unlocks first writes
    /// exactly what the other one would have.
    pub fn unlock_daily(&self) -> DailyRecord {
        let today = dates::today_key();
        let shared = self.shared();
        if let Some(daily) = shared.daily {
            if daily.date_key == today {
                return daily;
            }
        }
        let seed = pick::daily_seed(&today, &shared.target_iso, &self.code());
        let record = DailyRecord {
            date_key: today,
            love: pick::pick(content::LOVE_NOTES, &format!("{seed}|LOVE")).to_string(),
            challenge: pick::pick(content::CHALLENGES, &format!("{seed}|CHALLENGE")).to_string(),
        };
        self.patch(RoomPatch { daily: Some(record.clone()), ..Default::default() });
        record
    }

    /// Whether today's note is already unlocked.
    pub fn daily_unlocked(&self) -> bool {
        self.shared()
            .daily
            .is_some_and(|daily| daily.date_key == dates::today_key())
    }

    // -- Meet / itinerary --

    pub fn set_meet(&self, meet: MeetInfo) {
        self.patch(RoomPatch { meet: Some(meet), ..Default::default() });
    }

    // -- Playlist --

    /// Add (or replace) my song of the day.
    pub fn add_song(&self, title: &str, artist: &str, link: &str, note: &str) -> SyncResult<PlaylistEntry> {
        let title = title.trim();
        if title.is_empty() {
            return Err(SyncError::Validation("song title is required".into()));
        }
        let entry = PlaylistEntry {
            date_key: dates::today_key(),
            who: self.participant_id(),
            title: title.to_string(),
            artist: artist.trim().to_string(),
            link: link.trim().to_string(),
            note: note.trim().to_string(),
            added_at: now_iso(),
        };
        let for_store = entry.clone();
        self.run_transaction(move |doc| mutations::upsert_playlist_entry(doc, for_store.clone()));
        Ok(entry)
    }

    pub fn remove_song(&self, date_key: &str, who: &str) {
        let (date_key, who) = (date_key.to_string(), who.to_string());
        self.run_transaction(move |doc| mutations::remove_playlist_entry(doc, &date_key, &who));
    }

    pub fn clear_playlist(&self) {
        self.run_transaction(mutations::clear_playlist);
    }

    /// The playlist as rendered: newest day first, authors in stable order
    /// within a day.
    pub fn playlist_sorted(&self) -> Vec<PlaylistEntry> {
        let mut playlist = self.shared().playlist;
        playlist.sort_by(|a, b| b.date_key.cmp(&a.date_key).then(a.who.cmp(&b.who)));
        playlist
    }

    pub fn song_for(&self, date_key: &str, who: &str) -> Option<PlaylistEntry> {
        self.shared()
            .playlist
            .into_iter()
            .find(|s| s.date_key == date_key && s.who == who)
    }

    // -- To-dos (wholesale scalar field) --

    pub fn add_todo(&self, text: &str) -> SyncResult<()> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SyncError::Validation("todo text is required".into()));
        }
        let mut todos = self.shared().todos;
        todos.push(TodoItem { text: text.to_string(), done: false });
        self.patch(RoomPatch { todos: Some(todos), ..Default::default() });
        Ok(())
    }

    pub fn set_todo_done(&self, index: usize, done: bool) -> SyncResult<()> {
        let mut todos = self.shared().todos;
        let todo = todos
            .get_mut(index)
            .ok_or_else(|| SyncError::Validation(format!("no todo at index {index}")))?;
        todo.done = done;
        self.patch(RoomPatch { todos: Some(todos), ..Default::default() });
        Ok(())
    }

    pub fn remove_todo(&self, index: usize) -> SyncResult<()> {
        let mut todos = self.shared().todos;
        if index >= todos.len() {
            return Err(SyncError::Validation(format!("no todo at index {index}")));
        }
        todos.remove(index);
        self.patch(RoomPatch { todos: Some(todos), ..Default::default() });
        Ok(())
    }

    // -- Movies --

    /// Tick a movie. The curated list is a plain scalar field; the custom
    /// list is shared-appended, so it goes through the transactional path.
    pub fn set_movie_done(&self, title: &str, done: bool) {
        let shared = self.shared();
        if shared.movies.iter().any(|m| m.title == title) {
            let movies: Vec<MovieItem> = shared
                .movies
                .into_iter()
                .map(|mut m| {
                    if m.title == title {
                        m.done = done;
                    }
                    m
                })
                .collect();
            self.patch(RoomPatch { movies: Some(movies), ..Default::default() });
        } else {
            let title = title.to_string();
            self.run_transaction(move |doc| mutations::set_movie_done(doc, &title, done));
        }
    }

    pub fn add_custom_movie(&self, title: &str) -> SyncResult<()> {
        let title = title.trim().to_string();
        if title.is_empty() {
            return Err(SyncError::Validation("movie title is required".into()));
        }
        self.run_transaction(move |doc| mutations::add_custom_movie(doc, &title));
        Ok(())
    }

    pub fn remove_custom_movie(&self, title: &str) {
        let title = title.to_string();
        self.run_transaction(move |doc| mutations::remove_custom_movie(doc, &title));
    }

    // -- Rest schedule --

    pub fn add_rest_range(
        &self,
        start: &str,
        end: &str,
        start_period: Period,
        end_period: Period,
    ) -> SyncResult<()> {
        if dates::parse_day_key(start).is_none() || dates::parse_day_key(end).is_none() {
            return Err(SyncError::Validation(format!("not a valid range: {start}..{end}")));
        }
        let range = RestRange {
            start: start.to_string(),
            end: end.to_string(),
            start_period,
            end_period,
        };
        self.run_transaction(move |doc| mutations::add_rest_range(doc, range.clone()));
        Ok(())
    }

    pub fn remove_rest_range(&self, range: RestRange) {
        self.run_transaction(move |doc| mutations::remove_rest_range(doc, &range));
    }

    // -- Daily quiz --

    /// Today's question, derived from the date alone (plus the room's seed
    /// material) — no server-side state.
    pub fn today_question(&self) -> &'static QuizQuestion {
        let seed = pick::daily_seed(&dates::today_key(), &self.shared().target_iso, &self.code());
        let index = pick::pick_index(content::QUIZ_QUESTIONS.len(), &format!("{seed}|QUIZ"));
        &content::QUIZ_QUESTIONS[index]
    }

    /// My answer for today, if any. A record left over from another day (or
    /// another question) reads as "not yet answered".
    pub fn my_quiz_answer(&self) -> Option<duo_types::models::QuizAnswer> {
        let question = self.today_question();
        let shared = self.shared();
        shared
            .daily_quiz_for(&dates::today_key(), question.id)
            .and_then(|record| record.answers.get(&self.participant_id()).cloned())
    }

    /// Lock in an answer for today. First answer is final; answering again
    /// is a no-op.
    pub fn answer_daily_quiz(&self, choice: usize) -> SyncResult<()> {
        let question = self.today_question();
        if choice >= question.choices.len() {
            return Err(SyncError::Validation(format!("no choice {choice} on this question")));
        }
        let today = dates::today_key();
        let me = self.participant_id();
        let answered_at = now_iso();
        self.run_transaction(move |doc| {
            mutations::answer_daily_quiz(doc, &me, &today, question, choice, &answered_at)
        });
        Ok(())
    }

    // -- Couple quiz (Valentine's day only) --

    pub fn couple_quiz_open(&self) -> bool {
        dates::today_key().ends_with("-02-14")
    }

    pub fn submit_couple_quiz(&self, answers: Vec<String>) -> SyncResult<()> {
        if !self.couple_quiz_open() {
            return Err(SyncError::Validation(
                "the couple quiz only opens on February 14".into(),
            ));
        }
        let answers: Vec<String> = answers.iter().map(|a| a.trim().to_string()).collect();
        if answers.len() != content::COUPLE_QUIZ_QUESTIONS.len()
            || answers.iter().any(String::is_empty)
        {
            return Err(SyncError::Validation("every question needs an answer".into()));
        }
        let me = self.participant_id();
        let submitted_at = now_iso();
        self.run_transaction(move |doc| {
            mutations::submit_couple_quiz(doc, &me, answers.clone(), &submitted_at)
        });
        Ok(())
    }

    // -- Home view --

    /// Everything the home tab shows, computed from the shared state and a
    /// caller-supplied clock (tests pin it; the UI passes `Local::now()`).
    pub fn home_view(&self, now: DateTime<Local>) -> HomeView {
        let shared = self.shared();
        let now_ms = now.timestamp_millis();
        let target_ms = dates::parse_target_iso(&shared.target_iso);

        let days = target_ms.map(|t| dates::days_until(t, now_ms));
        let timer = target_ms.and_then(|t| {
            let remaining = t - now_ms;
            (remaining > 0).then(|| dates::ms_to_parts(remaining))
        });
        let weekends = target_ms.map(|t| {
            let target_day = DateTime::<Utc>::from_timestamp_millis(t)
                .map(|dt| dt.with_timezone(&Local).date_naive())
                .unwrap_or_else(|| now.date_naive());
            dates::weekends_between(now.date_naive(), target_day)
        });
        let milestone = days.and_then(dates::next_milestone);

        HomeView {
            today_key: dates::day_key(now.date_naive()),
            message: content::countdown_message(days),
            days,
            timer,
            nights: days.map(dates::nights_left),
            weekends,
            milestone: milestone.map(|cap| (cap, content::milestone_label(cap))),
            days_to_milestone: milestone
                .and_then(|cap| days.map(|d| (d - cap).max(0))),
            vibe: content::vibe_line(days),
            until_midnight: dates::ms_to_parts(dates::ms_until_midnight(now)),
        }
    }
}

/// Snapshot of the home tab's derived numbers.
#[derive(Debug, Clone, PartialEq)]
pub struct HomeView {
    pub today_key: String,
    pub message: String,
    pub days: Option<i64>,
    pub timer: Option<TimeParts>,
    pub nights: Option<i64>,
    pub weekends: Option<u32>,
    pub milestone: Option<(i64, String)>,
    pub days_to_milestone: Option<i64>,
    pub vibe: &'static str,
    pub until_midnight: TimeParts,
}
