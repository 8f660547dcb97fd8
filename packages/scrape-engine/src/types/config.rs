//! Configuration types for sessions and the engine.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::retry::RetryPolicy;
use crate::types::site::SiteId;

/// Smallest accepted page budget per site.
pub const MIN_PAGES: u32 = 1;

/// Largest accepted page budget per site.
pub const MAX_PAGES: u32 = 50;

/// How long an in-flight page fetch may keep running after a stop request.
pub const DEFAULT_CANCEL_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Per-site search configuration. Supplied at session creation, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteConfig {
    pub site: SiteId,
    pub keyword: String,
    pub location: String,
    pub max_pages: u32,
}

impl SiteConfig {
    pub fn new(
        site: SiteId,
        keyword: impl Into<String>,
        location: impl Into<String>,
        max_pages: u32,
    ) -> Self {
        Self {
            site,
            keyword: keyword.into(),
            location: location.into(),
            max_pages,
        }
    }

    /// Check the keyword and page budget.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.keyword.trim().is_empty() {
            return Err(ConfigError::EmptyKeyword { site: self.site });
        }
        if !(MIN_PAGES..=MAX_PAGES).contains(&self.max_pages) {
            return Err(ConfigError::MaxPagesOutOfRange {
                site: self.site,
                value: self.max_pages,
                min: MIN_PAGES,
                max: MAX_PAGES,
            });
        }
        Ok(())
    }
}

/// Tuning knobs for the session manager and its workers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Backoff policy for transient extractor failures.
    pub retry: RetryPolicy,

    /// Upper bound on a single extractor call. Elapsing counts as transient.
    pub fetch_timeout: Duration,

    /// After a stop request, an in-flight fetch gets this long before the
    /// worker abandons it.
    pub cancel_grace_period: Duration,

    /// Buffered progress messages per session before slow subscribers lag.
    pub bus_capacity: usize,

    /// Terminal sessions older than this are evicted from the registry.
    pub session_ttl: Duration,

    /// Maximum live sessions in the registry. Zero means unlimited.
    pub max_sessions: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            fetch_timeout: Duration::from_secs(30),
            cancel_grace_period: DEFAULT_CANCEL_GRACE_PERIOD,
            bus_capacity: 256,
            session_ttl: Duration::from_secs(60 * 60),
            max_sessions: 0,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load overrides from `SCRAPE_*` environment variables.
    ///
    /// Unset variables keep their defaults; unparsable ones are an error.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let mut retry = defaults.retry.clone();
        retry.max_attempts = env_or("SCRAPE_RETRY_MAX_ATTEMPTS", retry.max_attempts)?;

        Ok(Self {
            retry,
            fetch_timeout: Duration::from_secs(env_or(
                "SCRAPE_FETCH_TIMEOUT_SECS",
                defaults.fetch_timeout.as_secs(),
            )?),
            cancel_grace_period: Duration::from_secs(env_or(
                "SCRAPE_CANCEL_GRACE_SECS",
                defaults.cancel_grace_period.as_secs(),
            )?),
            bus_capacity: env_or("SCRAPE_BUS_CAPACITY", defaults.bus_capacity)?,
            session_ttl: Duration::from_secs(env_or(
                "SCRAPE_SESSION_TTL_SECS",
                defaults.session_ttl.as_secs(),
            )?),
            max_sessions: env_or("SCRAPE_MAX_SESSIONS", defaults.max_sessions)?,
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_cancel_grace_period(mut self, grace: Duration) -> Self {
        self.cancel_grace_period = grace;
        self
    }

    pub fn with_bus_capacity(mut self, capacity: usize) -> Self {
        self.bus_capacity = capacity;
        self
    }

    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    pub fn with_max_sessions(mut self, max: usize) -> Self {
        self.max_sessions = max;
        self
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidEnv {
            key: key.to_string(),
            value: raw,
        }),
        Err(_) => Ok(default),
    }
}
