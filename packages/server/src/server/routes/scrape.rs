//! Session lifecycle endpoints.
//!
//! POST   /api/scrape/start
//! POST   /api/scrape/stop/:session_id
//! GET    /api/scrape/status/:session_id
//! DELETE /api/scrape/:session_id
//! GET    /api/history

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use scrape_engine::{ProgressRecord, ScrapeResult, SessionSummary, StartRequest};

use crate::server::app::AppState;
use crate::server::error::{parse_session_id, ApiError};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartResponse {
    pub session_id: Uuid,
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct StopResponse {
    pub status: &'static str,
}

/// Per-site results once the session is terminal, live progress before.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum StatusResponse {
    Finished(Vec<ScrapeResult>),
    Running(Vec<ProgressRecord>),
}

pub async fn start_handler(
    Extension(state): Extension<AppState>,
    Json(request): Json<StartRequest>,
) -> Result<Json<StartResponse>, ApiError> {
    let configs = request.into_site_configs()?;
    let session_id = state.manager.create_and_start(configs)?;

    Ok(Json(StartResponse {
        session_id,
        status: "started",
    }))
}

pub async fn stop_handler(
    Extension(state): Extension<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<StopResponse>, ApiError> {
    let session_id = parse_session_id(&session_id)?;
    state.manager.stop(session_id)?;
    Ok(Json(StopResponse { status: "stopping" }))
}

pub async fn status_handler(
    Extension(state): Extension<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    let session_id = parse_session_id(&session_id)?;
    let snapshot = state.manager.status(session_id)?;

    Ok(Json(match snapshot.result {
        Some(result) => StatusResponse::Finished(result.results.clone()),
        None => StatusResponse::Running(snapshot.progress),
    }))
}

pub async fn remove_handler(
    Extension(state): Extension<AppState>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let session_id = parse_session_id(&session_id)?;
    state.manager.remove(session_id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn history_handler(Extension(state): Extension<AppState>) -> Json<Vec<SessionSummary>> {
    Json(state.manager.sessions())
}
