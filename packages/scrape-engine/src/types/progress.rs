//! Per-site progress state.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::site::SiteId;

/// Lifecycle of one site within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    Pending,
    Running,
    Completed,
    Error,
    /// Stopped by a session stop request; collected items are partial
    Cancelled,
}

impl ProgressStatus {
    /// Whether the worker for this site has finished.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error | Self::Cancelled)
    }
}

/// Latest known progress for one site of one session.
///
/// Keyed by `(session_id, site)`. Only that site's worker writes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    pub session_id: Uuid,
    pub site: SiteId,
    pub status: ProgressStatus,
    pub current_page: u32,
    pub total_pages: u32,
    pub items_collected: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProgressRecord {
    /// Initial record for a site that has not started yet.
    pub fn pending(session_id: Uuid, site: SiteId, total_pages: u32) -> Self {
        Self {
            session_id,
            site,
            status: ProgressStatus::Pending,
            current_page: 0,
            total_pages,
            items_collected: 0,
            message: None,
            error: None,
        }
    }

    pub fn key(&self) -> (Uuid, SiteId) {
        (self.session_id, self.site)
    }
}
