//! Maps engine errors onto HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use scrape_engine::{EngineError, ExportError};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("invalid session id: {0}")]
    InvalidSessionId(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidSessionId(_) => StatusCode::BAD_REQUEST,
            ApiError::Engine(EngineError::Config(_)) => StatusCode::BAD_REQUEST,
            ApiError::Engine(EngineError::SessionNotFound { .. }) => StatusCode::NOT_FOUND,
            ApiError::Engine(EngineError::Export(ExportError::SessionNotComplete)) => {
                StatusCode::CONFLICT
            }
            ApiError::Engine(EngineError::Export(ExportError::UnsupportedFormat(_))) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Engine(EngineError::Export(ExportError::Encode(_))) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<scrape_engine::ConfigError> for ApiError {
    fn from(err: scrape_engine::ConfigError) -> Self {
        ApiError::Engine(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "request rejected");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Parse a path segment as a session id.
pub fn parse_session_id(raw: &str) -> Result<uuid::Uuid, ApiError> {
    uuid::Uuid::parse_str(raw).map_err(|_| ApiError::InvalidSessionId(raw.to_string()))
}
