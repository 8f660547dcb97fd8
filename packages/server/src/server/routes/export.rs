//! GET /api/export/:session_id/:format
//!
//! `format` is `structured` (alias `json`) or `tabular` (alias `csv`).

use axum::{
    extract::{Extension, Path},
    http::header,
    response::{IntoResponse, Response},
};

use crate::server::app::AppState;
use crate::server::error::{parse_session_id, ApiError};

pub async fn export_handler(
    Extension(state): Extension<AppState>,
    Path((session_id, format)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let session_id = parse_session_id(&session_id)?;
    let payload = state.exports.export(session_id, &format)?;

    tracing::info!(
        session_id = %session_id,
        format = %format,
        bytes = payload.bytes.len(),
        "session exported"
    );

    let disposition = format!("attachment; filename=\"{}\"", payload.file_name);
    Ok((
        [
            (header::CONTENT_TYPE, payload.content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        payload.bytes,
    )
        .into_response())
}
