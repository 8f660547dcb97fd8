//! Terminal per-site and per-session results.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::job::JobRecord;
use crate::types::site::SiteId;

/// Session lifecycle.
///
/// Transitions are monotonic: once terminal, the status never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Running,
    Completed,
    Cancelled,
    /// The session could not be created
    Failed,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }

    /// Whether moving from `self` to `next` respects monotonicity.
    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        match self {
            Self::Running => next != Self::Running,
            _ => false,
        }
    }
}

/// Terminal output of one site's worker. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeResult {
    pub site: SiteId,
    pub jobs: Vec<JobRecord>,
    pub total_items: usize,
    /// Wall-clock time spent by the worker, in seconds on the wire
    #[serde(with = "duration_secs")]
    pub duration: Duration,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Total extractor calls, including retries
    pub attempts: u32,
    /// Transient failures that were retried
    pub retries: u32,
}

/// Aggregated output of a finished session. Computed at most once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResult {
    pub session_id: Uuid,
    /// One entry per configured site, in configuration order
    pub results: Vec<ScrapeResult>,
    pub total_items: usize,
    pub status: SessionStatus,
    /// True if at least one site succeeded and the session was not cancelled
    pub success: bool,
    pub completed_at: DateTime<Utc>,
}

impl SessionResult {
    /// All jobs in configuration order, tagged with the site they came from.
    pub fn jobs(&self) -> impl Iterator<Item = (SiteId, &JobRecord)> + '_ {
        self.results
            .iter()
            .flat_map(|r| r.jobs.iter().map(move |job| (r.site, job)))
    }

    pub fn sites_succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn sites_failed(&self) -> usize {
        self.results.len() - self.sites_succeeded()
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
