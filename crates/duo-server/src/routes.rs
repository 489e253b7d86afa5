/// REST surface over the room store. Handlers stay thin: parse, run the
/// shared pure mutation inside a store transaction, map errors to status
/// codes. The participant id rides in each request body — membership, not
/// identity, is what the store enforces.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::{SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use duo_store::{RoomStore, StoreError};
use duo_types::models::{PlaylistEntry, RestRange, RoomDoc, RoomPatch};
use duo_types::mutations;
use duo_types::{codes, content, dates, pick};

use crate::ws;

pub type AppState = Arc<RoomStore>;

pub fn router(store: AppState) -> Router {
    Router::new()
        .route("/rooms", post(create_room))
        .route("/rooms/{code}", get(get_room).patch(patch_room))
        .route("/rooms/{code}/join", post(join_room))
        .route("/rooms/{code}/subscribe", get(ws::subscribe))
        .route("/rooms/{code}/playlist", post(add_song).delete(remove_song))
        .route("/rooms/{code}/playlist/clear", post(clear_playlist))
        .route("/rooms/{code}/rest-ranges", post(add_rest_range).delete(remove_rest_range))
        .route("/rooms/{code}/movies/toggle", post(toggle_movie))
        .route("/rooms/{code}/custom-movies", post(add_custom_movie).delete(remove_custom_movie))
        .route("/rooms/{code}/quiz/answer", post(answer_quiz))
        .route("/rooms/{code}/couple-quiz", post(submit_couple_quiz))
        .route("/rooms/{code}/push-tokens", post(register_push_token))
        .with_state(store)
}

fn status_for(err: &StoreError) -> StatusCode {
    match err {
        StoreError::NotFound => StatusCode::NOT_FOUND,
        StoreError::PermissionDenied => StatusCode::FORBIDDEN,
        StoreError::AlreadyExists => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Attempts before room creation gives up on finding a free code.
const CREATE_ATTEMPTS: usize = 5;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhoBody {
    who: String,
}

pub async fn create_room(
    State(store): State<AppState>,
    Json(req): Json<WhoBody>,
) -> Result<impl IntoResponse, StatusCode> {
    for _ in 0..CREATE_ATTEMPTS {
        let code = codes::generate();
        let now = now_ms();
        let mut doc = RoomDoc::new(now);
        doc = mutations::register_member(doc, &req.who);
        doc.owner = Some(req.who.clone());

        match store.create(&code, &doc) {
            Ok(()) => {
                return Ok((StatusCode::CREATED, Json(json!({ "code": code, "doc": doc }))));
            }
            Err(StoreError::AlreadyExists) => {
                warn!(code = %code, "room code collision, retrying");
                continue;
            }
            Err(err) => return Err(status_for(&err)),
        }
    }
    Err(StatusCode::SERVICE_UNAVAILABLE)
}

pub async fn get_room(
    State(store): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<RoomDoc>, StatusCode> {
    let code = codes::normalize(&code);
    match store.get(&code) {
        Ok(Some(doc)) => Ok(Json(doc)),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(err) => Err(status_for(&err)),
    }
}

pub async fn join_room(
    State(store): State<AppState>,
    Path(code): Path<String>,
    Json(req): Json<WhoBody>,
) -> Result<Json<RoomDoc>, StatusCode> {
    let code = codes::normalize(&code);
    store
        .join(&code, &req.who, now_ms())
        .map(Json)
        .map_err(|err| status_for(&err))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchBody {
    who: String,
    patch: RoomPatch,
}

pub async fn patch_room(
    State(store): State<AppState>,
    Path(code): Path<String>,
    Json(req): Json<PatchBody>,
) -> Result<Json<RoomDoc>, StatusCode> {
    let code = codes::normalize(&code);
    store
        .update(&code, &req.who, &req.patch, now_ms())
        .map(Json)
        .map_err(|err| status_for(&err))
}

fn transact<F>(store: &RoomStore, code: &str, who: &str, f: F) -> Result<Json<RoomDoc>, StatusCode>
where
    F: FnOnce(RoomDoc) -> RoomDoc,
{
    store
        .transact(&codes::normalize(code), who, now_ms(), f)
        .map(Json)
        .map_err(|err| status_for(&err))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SongBody {
    who: String,
    title: String,
    #[serde(default)]
    artist: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    note: String,
}

pub async fn add_song(
    State(store): State<AppState>,
    Path(code): Path<String>,
    Json(req): Json<SongBody>,
) -> Result<Json<RoomDoc>, StatusCode> {
    let title = req.title.trim();
    if title.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    let entry = PlaylistEntry {
        date_key: dates::today_key(),
        who: req.who.clone(),
        title: title.to_string(),
        artist: req.artist.trim().to_string(),
        link: req.link.trim().to_string(),
        note: req.note.trim().to_string(),
        added_at: now_iso(),
    };
    transact(&store, &code, &req.who, move |doc| {
        mutations::upsert_playlist_entry(doc, entry)
    })
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveSongBody {
    who: String,
    date_key: String,
    author: String,
}

pub async fn remove_song(
    State(store): State<AppState>,
    Path(code): Path<String>,
    Json(req): Json<RemoveSongBody>,
) -> Result<Json<RoomDoc>, StatusCode> {
    transact(&store, &code, &req.who, |doc| {
        mutations::remove_playlist_entry(doc, &req.date_key, &req.author)
    })
}

pub async fn clear_playlist(
    State(store): State<AppState>,
    Path(code): Path<String>,
    Json(req): Json<WhoBody>,
) -> Result<Json<RoomDoc>, StatusCode> {
    transact(&store, &code, &req.who, mutations::clear_playlist)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestRangeBody {
    who: String,
    range: RestRange,
}

pub async fn add_rest_range(
    State(store): State<AppState>,
    Path(code): Path<String>,
    Json(req): Json<RestRangeBody>,
) -> Result<Json<RoomDoc>, StatusCode> {
    if dates::parse_day_key(&req.range.start).is_none()
        || dates::parse_day_key(&req.range.end).is_none()
    {
        return Err(StatusCode::BAD_REQUEST);
    }
    transact(&store, &code, &req.who, |doc| mutations::add_rest_range(doc, req.range.clone()))
}

pub async fn remove_rest_range(
    State(store): State<AppState>,
    Path(code): Path<String>,
    Json(req): Json<RestRangeBody>,
) -> Result<Json<RoomDoc>, StatusCode> {
    transact(&store, &code, &req.who, |doc| mutations::remove_rest_range(doc, &req.range))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieBody {
    who: String,
    title: String,
    #[serde(default)]
    done: bool,
}

pub async fn toggle_movie(
    State(store): State<AppState>,
    Path(code): Path<String>,
    Json(req): Json<MovieBody>,
) -> Result<Json<RoomDoc>, StatusCode> {
    transact(&store, &code, &req.who, |doc| {
        mutations::set_movie_done(doc, &req.title, req.done)
    })
}

pub async fn add_custom_movie(
    State(store): State<AppState>,
    Path(code): Path<String>,
    Json(req): Json<MovieBody>,
) -> Result<Json<RoomDoc>, StatusCode> {
    if req.title.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    transact(&store, &code, &req.who, |doc| mutations::add_custom_movie(doc, &req.title))
}

pub async fn remove_custom_movie(
    State(store): State<AppState>,
    Path(code): Path<String>,
    Json(req): Json<MovieBody>,
) -> Result<Json<RoomDoc>, StatusCode> {
    transact(&store, &code, &req.who, |doc| mutations::remove_custom_movie(doc, &req.title))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizAnswerBody {
    who: String,
    choice: usize,
}

pub async fn answer_quiz(
    State(store): State<AppState>,
    Path(code): Path<String>,
    Json(req): Json<QuizAnswerBody>,
) -> Result<Json<RoomDoc>, StatusCode> {
    let code = codes::normalize(&code);
    let doc = store
        .get(&code)
        .map_err(|err| status_for(&err))?
        .ok_or(StatusCode::NOT_FOUND)?;

    let today = dates::today_key();
    let seed = pick::daily_seed(&today, &doc.target_iso, &code);
    let question = &content::QUIZ_QUESTIONS
        [pick::pick_index(content::QUIZ_QUESTIONS.len(), &format!("{seed}|QUIZ"))];
    if req.choice >= question.choices.len() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let who = req.who.clone();
    let answered_at = now_iso();
    transact(&store, &code, &who, move |doc| {
        mutations::answer_daily_quiz(doc, &req.who, &today, question, req.choice, &answered_at)
    })
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoupleQuizBody {
    who: String,
    answers: Vec<String>,
}

pub async fn submit_couple_quiz(
    State(store): State<AppState>,
    Path(code): Path<String>,
    Json(req): Json<CoupleQuizBody>,
) -> Result<Json<RoomDoc>, StatusCode> {
    if !dates::today_key().ends_with("-02-14") {
        return Err(StatusCode::BAD_REQUEST);
    }
    let answers: Vec<String> = req.answers.iter().map(|a| a.trim().to_string()).collect();
    if answers.len() != content::COUPLE_QUIZ_QUESTIONS.len()
        || answers.iter().any(String::is_empty)
    {
        return Err(StatusCode::BAD_REQUEST);
    }
    let who = req.who.clone();
    let submitted_at = now_iso();
    transact(&store, &code, &who, move |doc| {
        mutations::submit_couple_quiz(doc, &req.who, answers, &submitted_at)
    })
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushTokenBody {
    token: String,
    #[serde(default)]
    user_agent: String,
}

pub async fn register_push_token(
    State(store): State<AppState>,
    Path(code): Path<String>,
    Json(req): Json<PushTokenBody>,
) -> Result<StatusCode, StatusCode> {
    if req.token.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    store
        .register_push_token(&codes::normalize(&code), &req.token, &req.user_agent)
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(|err| status_for(&err))
}
