use axum::{extract::Extension, Json};
use serde::Serialize;

use scrape_engine::SessionStatus;

use crate::server::app::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    status: String,
    sessions: usize,
    running_sessions: usize,
    enabled_sites: usize,
}

/// Health check endpoint
///
/// Always 200 while the process is serving; reports registry size and how
/// many sites have an extractor.
pub async fn health_handler(Extension(state): Extension<AppState>) -> Json<HealthResponse> {
    let sessions = state.manager.sessions();
    let running_sessions = sessions
        .iter()
        .filter(|s| s.status == SessionStatus::Running)
        .count();
    let enabled_sites = state.manager.sites().iter().filter(|s| s.enabled).count();

    Json(HealthResponse {
        status: "healthy".to_string(),
        sessions: sessions.len(),
        running_sessions,
        enabled_sites,
    })
}
