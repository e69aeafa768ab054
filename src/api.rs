use std::path::PathBuf;
use std::sync::Arc;

use shuttle_axum::axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::activity::LogLine;
use crate::analyze::BulkState;
use crate::app::Sentinel;
use crate::config::Settings;
use crate::history::{HistoryEntry, DEFAULT_HISTORY_CAP};
use crate::scheduler::trigger_fetch;

type ApiError = (StatusCode, String);

/// Operator UI surface over the shared [`Sentinel`] context.
pub fn router(sentinel: Arc<Sentinel>) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/status", get(status))
        .route("/history", get(history))
        .route("/reply", get(reply))
        .route("/log", get(activity))
        .route("/settings", get(get_settings).put(put_settings))
        .route("/topics", get(get_topics).put(put_topics))
        .route("/sources/load", post(load_sources))
        .route("/prompt/load", post(load_prompt))
        .route("/fetch", post(fetch_now))
        .layer(CorsLayer::very_permissive())
        .with_state(sentinel)
}

#[derive(serde::Serialize)]
struct StatusOut {
    sources: usize,
    topics: usize,
    fetch_in_progress: bool,
    bulk_state: BulkState,
    history_len: usize,
    shutting_down: bool,
}

async fn status(State(s): State<Arc<Sentinel>>) -> Json<StatusOut> {
    Json(StatusOut {
        sources: s.sources().len(),
        topics: s.topics().len(),
        fetch_in_progress: s.fetch_guard.is_busy(),
        bulk_state: s.bulk.state(),
        history_len: s.history.len(),
        shutting_down: s.shutdown.is_set(),
    })
}

async fn history(State(s): State<Arc<Sentinel>>) -> Json<Vec<HistoryEntry>> {
    Json(s.history.snapshot_last_n(DEFAULT_HISTORY_CAP))
}

#[derive(serde::Serialize)]
struct ReplyOut {
    text: Option<String>,
}

async fn reply(State(s): State<Arc<Sentinel>>) -> Json<ReplyOut> {
    Json(ReplyOut { text: s.reply.get() })
}

#[derive(serde::Deserialize)]
struct LogQuery {
    #[serde(default = "default_log_lines")]
    n: usize,
}

fn default_log_lines() -> usize {
    100
}

async fn activity(State(s): State<Arc<Sentinel>>, Query(q): Query<LogQuery>) -> Json<Vec<LogLine>> {
    Json(s.log.snapshot_last_n(q.n))
}

async fn get_settings(State(s): State<Arc<Sentinel>>) -> Json<Settings> {
    Json(s.settings.snapshot())
}

async fn put_settings(
    State(s): State<Arc<Sentinel>>,
    Json(next): Json<Settings>,
) -> Result<Json<Settings>, ApiError> {
    match s.settings.apply(next) {
        Ok(()) => {
            s.log.info("Settings updated.");
            Ok(Json(s.settings.snapshot()))
        }
        Err(e) => {
            s.log.warn(format!("Settings rejected: {e:#}"));
            Err((StatusCode::BAD_REQUEST, format!("{e:#}")))
        }
    }
}

async fn get_topics(State(s): State<Arc<Sentinel>>) -> Json<Vec<String>> {
    Json(s.topics())
}

async fn put_topics(
    State(s): State<Arc<Sentinel>>,
    Json(topics): Json<Vec<String>>,
) -> Json<Vec<String>> {
    s.set_topics(topics);
    Json(s.topics())
}

#[derive(serde::Deserialize)]
struct PathReq {
    path: PathBuf,
}

#[derive(serde::Serialize)]
struct LoadedOut {
    count: usize,
}

async fn load_sources(
    State(s): State<Arc<Sentinel>>,
    Json(req): Json<PathReq>,
) -> Result<Json<LoadedOut>, ApiError> {
    s.load_sources(&req.path)
        .map(|count| Json(LoadedOut { count }))
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("{e:#}")))
}

async fn load_prompt(
    State(s): State<Arc<Sentinel>>,
    Json(req): Json<PathReq>,
) -> Result<StatusCode, ApiError> {
    s.load_prompt(&req.path)
        .map(|()| StatusCode::NO_CONTENT)
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("{e:#}")))
}

#[derive(serde::Serialize)]
struct FetchOut {
    started: bool,
}

/// 202 when a cycle was started, 409 when one is already running or the
/// service is shutting down.
async fn fetch_now(State(s): State<Arc<Sentinel>>) -> (StatusCode, Json<FetchOut>) {
    if trigger_fetch(&s) {
        (StatusCode::ACCEPTED, Json(FetchOut { started: true }))
    } else {
        (StatusCode::CONFLICT, Json(FetchOut { started: false }))
    }
}
