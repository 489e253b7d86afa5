/// The shared room document.
///
/// One document per room holds everything the two clients mirror. Field
/// names are camelCase on the wire — that is the document format of the
/// original deployment, and rooms written by it must keep loading.
///
/// Reads always go through [`RoomDoc::from_value`], which merges the raw
/// document over a fresh default shape (so fields added since the document
/// was written get their defaults) and folds the known legacy field shapes
/// into the canonical ones. Malformed data degrades to defaults; it is
/// never an error.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::content;

/// Opaque participant identity. Freshly enrolled clients use a uuid; the
/// legacy room's two participants are the literal ids `lea` and `gauthier`.
pub type ParticipantId = String;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RoomDoc {
    /// Reunion timestamp (RFC 3339), empty when no date is set.
    #[serde(rename = "targetISO")]
    pub target_iso: String,
    /// The day's unlocked love note + challenge; at most one per day.
    pub daily: Option<DailyRecord>,
    pub meet: MeetInfo,
    pub playlist: Vec<PlaylistEntry>,
    pub todos: Vec<TodoItem>,
    pub movies: Vec<MovieItem>,
    pub custom_movies: Vec<MovieItem>,
    pub rest_ranges: Vec<RestRange>,
    pub daily_quiz: Option<DailyQuizRecord>,
    pub couple_quiz: Option<CoupleQuizRecord>,
    pub members: BTreeMap<ParticipantId, bool>,
    pub owner: Option<ParticipantId>,
    /// Dispatcher idempotency stamps (see duo-notify).
    pub last_daily_notify: Option<String>,
    pub last_j14_notify: Option<String>,
    /// Unix milliseconds.
    pub created_at: i64,
    pub updated_at: i64,
}

impl Default for RoomDoc {
    fn default() -> Self {
        RoomDoc {
            target_iso: String::new(),
            daily: None,
            meet: MeetInfo::default(),
            playlist: Vec::new(),
            todos: Vec::new(),
            movies: content::DEFAULT_MOVIES
                .iter()
                .map(|title| MovieItem { title: (*title).to_string(), done: false })
                .collect(),
            custom_movies: Vec::new(),
            rest_ranges: Vec::new(),
            daily_quiz: None,
            couple_quiz: None,
            members: BTreeMap::new(),
            owner: None,
            last_daily_notify: None,
            last_j14_notify: None,
            created_at: 0,
            updated_at: 0,
        }
    }
}

impl RoomDoc {
    /// Fresh default shape stamped with a creation time. A factory, not a
    /// shared template — callers can never alias live state with defaults.
    pub fn new(now_ms: i64) -> Self {
        RoomDoc { created_at: now_ms, updated_at: now_ms, ..RoomDoc::default() }
    }

    /// Canonicalize a raw stored document: merge over defaults field by
    /// field, fold legacy aliases, normalize rest ranges. Unknown keys and
    /// unparseable values are dropped silently.
    pub fn from_value(raw: &Value) -> Self {
        let Some(obj) = raw.as_object() else {
            return RoomDoc::default();
        };
        let mut doc = RoomDoc::default();

        if let Some(s) = obj.get("targetISO").and_then(Value::as_str) {
            doc.target_iso = s.to_string();
        }
        doc.daily = parse_field(obj.get("daily"));
        if let Some(meet) = obj.get("meet") {
            doc.meet = MeetInfo::from_value(meet);
        }
        doc.playlist = parse_field::<Vec<PlaylistEntry>>(obj.get("playlist")).unwrap_or_default();
        doc.todos = parse_field::<Vec<TodoItem>>(obj.get("todos")).unwrap_or_default();
        if let Some(movies) = parse_field::<Vec<MovieItem>>(obj.get("movies")) {
            doc.movies = movies;
        }
        doc.custom_movies =
            parse_field::<Vec<MovieItem>>(obj.get("customMovies")).unwrap_or_default();
        doc.rest_ranges = RestRange::parse_list(obj.get("restRanges"), obj.get("restDays"));
        doc.daily_quiz = parse_field(obj.get("dailyQuiz"));
        doc.couple_quiz = parse_field(obj.get("coupleQuiz"));
        doc.members = parse_field(obj.get("members")).unwrap_or_default();
        doc.owner = obj.get("owner").and_then(Value::as_str).map(str::to_string);
        doc.last_daily_notify =
            obj.get("lastDailyNotify").and_then(Value::as_str).map(str::to_string);
        doc.last_j14_notify =
            obj.get("lastJ14Notify").and_then(Value::as_str).map(str::to_string);
        doc.created_at = obj.get("createdAt").and_then(Value::as_i64).unwrap_or(0);
        doc.updated_at = obj.get("updatedAt").and_then(Value::as_i64).unwrap_or(0);
        doc
    }

    pub fn is_member(&self, who: &str) -> bool {
        self.members.get(who).copied().unwrap_or(false)
    }

    pub fn member_count(&self) -> usize {
        self.members.values().filter(|&&v| v).count()
    }

    /// The daily quiz record, but only if it is valid for `today_key` and
    /// today's `question_id`; a leftover record from another day (or from a
    /// content update that changed the day's question) counts as absent.
    pub fn daily_quiz_for(&self, today_key: &str, question_id: u32) -> Option<&DailyQuizRecord> {
        self.daily_quiz
            .as_ref()
            .filter(|record| record.date_key == today_key && record.question_id == question_id)
    }
}

fn parse_field<T: serde::de::DeserializeOwned>(value: Option<&Value>) -> Option<T> {
    value.and_then(|v| serde_json::from_value(v.clone()).ok())
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DailyRecord {
    pub date_key: String,
    pub love: String,
    pub challenge: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FlightInfo {
    pub airline: String,
    pub flight_number: String,
    pub departure_airport: String,
    pub departure_time: String,
    pub arrival_airport: String,
    pub arrival_time: String,
    pub booking_ref: String,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MeetInfo {
    pub place_name: String,
    pub city: String,
    pub address: String,
    pub image_url: String,
    pub flight: FlightInfo,
}

impl Default for MeetInfo {
    fn default() -> Self {
        MeetInfo {
            place_name: "Notre lieu de retrouvailles".to_string(),
            city: String::new(),
            address: String::new(),
            image_url: String::new(),
            flight: FlightInfo::default(),
        }
    }
}

impl MeetInfo {
    /// `imageDataUrl` was the field's name before images became links; the
    /// current key wins when both are present.
    pub fn from_value(raw: &Value) -> Self {
        let mut meet: MeetInfo =
            serde_json::from_value(raw.clone()).unwrap_or_default();
        if meet.image_url.is_empty() {
            if let Some(legacy) = raw.get("imageDataUrl").and_then(Value::as_str) {
                meet.image_url = legacy.to_string();
            }
        }
        meet
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlaylistEntry {
    pub date_key: String,
    pub who: ParticipantId,
    pub title: String,
    pub artist: String,
    pub link: String,
    pub note: String,
    pub added_at: String,
}

impl PlaylistEntry {
    /// Uniqueness key: one song per author per day.
    pub fn slot_key(&self) -> String {
        format!("{}|{}", self.date_key, self.who)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TodoItem {
    pub text: String,
    pub done: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MovieItem {
    pub title: String,
    pub done: bool,
}

/// Half-day granularity for the rest schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Am,
    Pm,
}

impl Period {
    pub fn rank(self) -> u8 {
        match self {
            Period::Am => 0,
            Period::Pm => 1,
        }
    }
}

/// An inclusive date range with half-day endpoints. Dates are `YYYY-MM-DD`
/// strings (lexicographic order is chronological order).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestRange {
    pub start: String,
    pub end: String,
    pub start_period: Period,
    pub end_period: Period,
}

impl RestRange {
    pub fn full_day(date: &str) -> Self {
        RestRange {
            start: date.to_string(),
            end: date.to_string(),
            start_period: Period::Am,
            end_period: Period::Pm,
        }
    }

    fn sort_key(&self) -> (String, String, u8, u8) {
        (
            self.start.clone(),
            self.end.clone(),
            self.start_period.rank(),
            self.end_period.rank(),
        )
    }

    /// Swap endpoints (dates and periods together) when out of order.
    fn reordered(mut self) -> Self {
        let start = (self.start.clone(), self.start_period.rank());
        let end = (self.end.clone(), self.end_period.rank());
        if start > end {
            std::mem::swap(&mut self.start, &mut self.end);
            std::mem::swap(&mut self.start_period, &mut self.end_period);
        }
        self
    }

    /// Parse the stored rest schedule, whatever vintage it is:
    /// - current: `restRanges: [{start, end, startPeriod, endPeriod}, ...]`
    /// - older: range objects without periods, or bare `"YYYY-MM-DD"` strings
    /// - legacy: a flat `restDays: ["YYYY-MM-DD", ...]` list (only consulted
    ///   when `restRanges` is absent)
    ///
    /// Entries that don't match any known shape are dropped.
    pub fn parse_list(ranges: Option<&Value>, legacy_days: Option<&Value>) -> Vec<RestRange> {
        let source = match (ranges, legacy_days) {
            (Some(v), _) if v.is_array() => v,
            (_, Some(v)) if v.is_array() => v,
            _ => return Vec::new(),
        };
        let parsed = source
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(RestRange::parse_one)
            .collect();
        normalize_rest_ranges(parsed)
    }

    fn parse_one(raw: &Value) -> Option<RestRange> {
        if let Some(date) = raw.as_str() {
            return valid_date(date).then(|| RestRange::full_day(date));
        }
        let obj = raw.as_object()?;
        let start = obj.get("start").and_then(Value::as_str);
        let end = obj.get("end").and_then(Value::as_str);
        let (start, end) = match (start, end) {
            (Some(s), Some(e)) => (s, e),
            (Some(s), None) => (s, s),
            (None, Some(e)) => (e, e),
            (None, None) => return None,
        };
        if !valid_date(start) || !valid_date(end) {
            return None;
        }
        Some(RestRange {
            start: start.to_string(),
            end: end.to_string(),
            start_period: parse_field::<Period>(obj.get("startPeriod")).unwrap_or(Period::Am),
            end_period: parse_field::<Period>(obj.get("endPeriod")).unwrap_or(Period::Pm),
        })
    }
}

fn valid_date(s: &str) -> bool {
    crate::dates::parse_day_key(s).is_some()
}

/// Canonical form of a rest-range list: endpoints ordered, duplicates (by
/// the full composite key) removed, sorted. Idempotent.
pub fn normalize_rest_ranges(ranges: Vec<RestRange>) -> Vec<RestRange> {
    let mut out: Vec<RestRange> = Vec::with_capacity(ranges.len());
    for range in ranges {
        let range = range.reordered();
        if !out.contains(&range) {
            out.push(range);
        }
    }
    out.sort_by_key(RestRange::sort_key);
    out
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuizAnswer {
    pub choice: usize,
    pub correct: bool,
    pub answered_at: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DailyQuizRecord {
    pub date_key: String,
    pub question_id: u32,
    pub answers: BTreeMap<ParticipantId, QuizAnswer>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CoupleQuizSubmission {
    pub answers: Vec<String>,
    pub submitted_at: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CoupleQuizRecord {
    pub answers: BTreeMap<ParticipantId, CoupleQuizSubmission>,
}

/// Scalar last-writer-wins patch. Composite fields (playlist, rest ranges,
/// custom movies, quiz records) are deliberately absent: naive wholesale
/// replacement of those would drop the other participant's concurrent
/// insertions, so they only change through store transactions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RoomPatch {
    #[serde(rename = "targetISO", skip_serializing_if = "Option::is_none")]
    pub target_iso: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily: Option<DailyRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meet: Option<MeetInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub todos: Option<Vec<TodoItem>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub movies: Option<Vec<MovieItem>>,
}

impl RoomPatch {
    pub fn is_empty(&self) -> bool {
        *self == RoomPatch::default()
    }

    /// Merge the present fields over `doc`, leaving everything else alone.
    pub fn apply(&self, doc: &mut RoomDoc, now_ms: i64) {
        if let Some(target_iso) = &self.target_iso {
            doc.target_iso = target_iso.clone();
        }
        if let Some(daily) = &self.daily {
            doc.daily = Some(daily.clone());
        }
        if let Some(meet) = &self.meet {
            doc.meet = meet.clone();
        }
        if let Some(todos) = &self.todos {
            doc.todos = todos.clone();
        }
        if let Some(movies) = &self.movies {
            doc.movies = movies.clone();
        }
        doc.updated_at = now_ms;
    }
}
