//! Messages delivered on a session's progress stream.

use serde::{Deserialize, Serialize};

use crate::types::progress::ProgressRecord;

/// One message on the per-session streaming channel.
///
/// Serialized with a `type` tag:
/// `{"type":"progress","data":[...]}`, `{"type":"complete"}`,
/// `{"type":"error","error":"..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamMessage {
    Progress { data: Vec<ProgressRecord> },
    /// Emitted exactly once, after the session result is computed
    Complete,
    Error { error: String },
}

impl StreamMessage {
    pub fn progress(record: ProgressRecord) -> Self {
        Self::Progress { data: vec![record] }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self::Error {
            error: error.into(),
        }
    }

    /// The wire `type` value.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Progress { .. } => "progress",
            Self::Complete => "complete",
            Self::Error { .. } => "error",
        }
    }
}
