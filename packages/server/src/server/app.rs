//! Application setup and server configuration.

use axum::{
    extract::Extension,
    http::{header::CONTENT_TYPE, HeaderValue, Method},
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use scrape_engine::{ExportService, ExtractorRegistry, SessionManager};

use crate::config::Config;
use crate::server::routes::{
    export_handler, health_handler, history_handler, remove_handler, sites_handler,
    start_handler, status_handler, stop_handler, stream_handler,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub manager: SessionManager,
    pub exports: ExportService,
}

impl AppState {
    pub fn new(manager: SessionManager) -> Self {
        Self {
            exports: ExportService::new(manager.clone()),
            manager,
        }
    }

    /// Build the session manager the configuration asks for.
    pub fn from_config(config: &Config) -> Self {
        let registry = if config.demo_mode {
            ExtractorRegistry::demo(config.demo_latency)
        } else {
            ExtractorRegistry::new()
        };
        Self::new(SessionManager::with_config(registry, config.engine.clone()))
    }
}

/// Build the Axum application router
pub fn build_app(state: AppState, allowed_origins: &[String]) -> Router {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let cors = if allowed_origins.iter().any(|o| o == "*") {
        CorsLayer::new().allow_origin(Any)
    } else {
        CorsLayer::new().allow_origin(origins)
    }
    .allow_methods([Method::GET, Method::POST, Method::DELETE])
    .allow_headers([CONTENT_TYPE]);

    Router::new()
        .route("/api/sites", get(sites_handler))
        .route("/api/history", get(history_handler))
        .route("/api/scrape/start", post(start_handler))
        .route("/api/scrape/stop/:session_id", post(stop_handler))
        .route("/api/scrape/status/:session_id", get(status_handler))
        .route("/api/scrape/stream/:session_id", get(stream_handler))
        .route("/api/scrape/:session_id", delete(remove_handler))
        .route("/api/export/:session_id/:format", get(export_handler))
        .route("/health", get(health_handler))
        .layer(Extension(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
