//! Typed errors for the scrape engine.
//!
//! Uses `thiserror` for library errors (not `anyhow`) so the transport layer
//! can map each failure to its own response.
//!
//! Only request validation, lookup and export failures surface as `Err`
//! values to callers. Per-site extraction failures ([`FetchError`]) are
//! turned into progress and result data by the site worker and never cross
//! into the session manager.

use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use crate::types::site::SiteId;

/// Errors surfaced by the engine's public operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The start request was malformed
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// No session with this id is registered (unknown or evicted)
    #[error("session not found: {id}")]
    SessionNotFound { id: Uuid },

    /// Export could not be produced
    #[error("export error: {0}")]
    Export(#[from] ExportError),
}

/// Start request validation errors. Raised before any worker is spawned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// No site configurations were supplied
    #[error("at least one site configuration is required")]
    EmptyRequest,

    /// Site id is not one of the supported sites
    #[error("unknown site: {0}")]
    UnknownSite(String),

    /// The same site appears more than once in one request
    #[error("site configured more than once: {0}")]
    DuplicateSite(SiteId),

    /// Site is known but no extractor is registered for it
    #[error("no extractor registered for site: {0}")]
    ExtractorMissing(SiteId),

    /// Keyword is empty after trimming
    #[error("keyword must not be empty (site: {site})")]
    EmptyKeyword { site: SiteId },

    /// Page budget outside the allowed range
    #[error("maxPages for {site} must be between {min} and {max}, got {value}")]
    MaxPagesOutOfRange {
        site: SiteId,
        value: u32,
        min: u32,
        max: u32,
    },

    /// The session registry is full and nothing could be evicted
    #[error("too many live sessions (limit {limit})")]
    TooManySessions { limit: usize },

    /// An environment variable could not be parsed
    #[error("invalid value for {key}: {value}")]
    InvalidEnv { key: String, value: String },
}

/// Failure of a single extractor page fetch, classified by the extractor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Temporary condition (network hiccup, 5xx, rate limiting); retried
    #[error("transient fetch failure: {reason}")]
    Transient { reason: String },

    /// The fetch did not finish within the configured timeout; retried
    #[error("fetch timed out after {after:?}")]
    Timeout { after: Duration },

    /// Permanent condition (site layout changed, login wall); not retried
    #[error("fatal site error: {reason}")]
    Fatal { reason: String },
}

impl FetchError {
    /// Build a transient failure.
    pub fn transient(reason: impl Into<String>) -> Self {
        Self::Transient {
            reason: reason.into(),
        }
    }

    /// Build a fatal failure.
    pub fn fatal(reason: impl Into<String>) -> Self {
        Self::Fatal {
            reason: reason.into(),
        }
    }

    /// Whether the worker should retry after this failure.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. } | Self::Timeout { .. })
    }
}

/// Errors from rendering a session's results.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Session has not reached a terminal state yet
    #[error("session is not complete")]
    SessionNotComplete,

    /// Requested format is not one of the supported encodings
    #[error("unsupported export format: {0}")]
    UnsupportedFormat(String),

    /// Encoding the payload failed
    #[error("failed to encode export: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Result type alias for extractor calls.
pub type FetchResult<T> = std::result::Result<T, FetchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(FetchError::transient("reset by peer").is_transient());
        assert!(FetchError::Timeout {
            after: Duration::from_secs(1)
        }
        .is_transient());
        assert!(!FetchError::fatal("login required").is_transient());
    }

    #[test]
    fn test_config_error_converts_into_engine_error() {
        let err: EngineError = ConfigError::EmptyRequest.into();
        assert!(matches!(err, EngineError::Config(ConfigError::EmptyRequest)));
        assert!(err.to_string().contains("at least one site"));
    }
}
