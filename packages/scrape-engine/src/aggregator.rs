//! Merges terminal per-site results into one session result.

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::types::result::{ScrapeResult, SessionResult, SessionStatus};

/// Stateless merger of per-site results.
#[derive(Debug, Default, Clone, Copy)]
pub struct ResultAggregator;

impl ResultAggregator {
    pub fn new() -> Self {
        Self
    }

    /// Build the session result.
    ///
    /// `results` must already be in configuration order; they are kept
    /// as-is so every job retains its site. Overall success means at least
    /// one site succeeded, and is always false for a cancelled session.
    pub fn aggregate(
        &self,
        session_id: Uuid,
        results: Vec<ScrapeResult>,
        cancelled: bool,
    ) -> SessionResult {
        let total_items = results.iter().map(|r| r.total_items).sum();
        let any_succeeded = results.iter().any(|r| r.success);
        let status = if cancelled {
            SessionStatus::Cancelled
        } else {
            SessionStatus::Completed
        };

        let result = SessionResult {
            session_id,
            total_items,
            status,
            success: any_succeeded && !cancelled,
            completed_at: Utc::now(),
            results,
        };

        info!(
            session_id = %session_id,
            status = ?result.status,
            sites = result.results.len(),
            succeeded = result.sites_succeeded(),
            failed = result.sites_failed(),
            total_items,
            "session aggregated"
        );

        result
    }
}
