use axum::{extract::Extension, Json};

use scrape_engine::SiteInfo;

use crate::server::app::AppState;

/// Supported sites, flagged by whether an extractor is wired in.
pub async fn sites_handler(Extension(state): Extension<AppState>) -> Json<Vec<SiteInfo>> {
    Json(state.manager.sites())
}
