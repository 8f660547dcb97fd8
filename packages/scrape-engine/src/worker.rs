//! Site worker: drives one site's scrape to completion.
//!
//! A worker walks the site one page at a time, emitting a progress record
//! after every page and exactly one [`ScrapeResult`] at the end. Failures
//! never escape the worker; they become `error`/`cancelled` progress and an
//! unsuccessful result.
//!
//! # Retry and cancellation
//!
//! ```text
//! page n ──► fetch (timeout) ──► Ok ───────────────► progress, page n+1
//!               │
//!               ├─► transient ──► backoff (cancellable) ──► retry
//!               │                  └─ ceiling reached ──► fatal
//!               └─► fatal ─────────────────────────────► error result
//! ```
//!
//! The cancellation token is checked before each page and during backoff.
//! A fetch already in flight when the session is stopped gets
//! `cancel_grace_period` to finish before it is abandoned.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::Stream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::FetchError;
use crate::retry::RetryPolicy;
use crate::traits::extractor::{Extractor, PageOutcome};
use crate::types::{
    config::{EngineConfig, SiteConfig},
    job::JobRecord,
    progress::{ProgressRecord, ProgressStatus},
    result::ScrapeResult,
};

/// Item of a worker's output stream.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    Progress(ProgressRecord),
    /// Always the last item
    Finished(ScrapeResult),
}

/// Outcome of fetching one page, retries included.
enum FetchStep {
    Page(PageOutcome),
    Failed(FetchError),
    Cancelled,
}

/// How the page loop ended.
enum Termination {
    Completed,
    Failed(FetchError),
    Cancelled,
}

#[derive(Debug, Default, Clone, Copy)]
struct AttemptStats {
    attempts: u32,
    retries: u32,
}

/// Drives one [`SiteConfig`] through its extractor.
pub struct SiteWorker {
    session_id: Uuid,
    config: SiteConfig,
    extractor: Arc<dyn Extractor>,
    cancel: CancellationToken,
    retry: RetryPolicy,
    fetch_timeout: Duration,
    grace_period: Duration,
}

impl SiteWorker {
    /// Create a worker with the default engine settings.
    pub fn new(
        session_id: Uuid,
        config: SiteConfig,
        extractor: Arc<dyn Extractor>,
        cancel: CancellationToken,
    ) -> Self {
        let defaults = EngineConfig::default();
        Self {
            session_id,
            config,
            extractor,
            cancel,
            retry: defaults.retry,
            fetch_timeout: defaults.fetch_timeout,
            grace_period: defaults.cancel_grace_period,
        }
    }

    /// Apply retry, timeout and grace settings from `engine`.
    pub fn with_engine_config(mut self, engine: &EngineConfig) -> Self {
        self.retry = engine.retry.clone();
        self.fetch_timeout = engine.fetch_timeout;
        self.grace_period = engine.cancel_grace_period;
        self
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    /// Run the scrape as a lazy stream of progress events.
    ///
    /// Nothing happens until the stream is polled. The stream always ends
    /// with a single [`WorkerEvent::Finished`].
    pub fn run(self) -> impl Stream<Item = WorkerEvent> + Send + 'static {
        async_stream::stream! {
            let started = Instant::now();
            let max_pages = self.config.max_pages;
            let site = self.config.site;
            let mut stats = AttemptStats::default();
            let mut jobs: Vec<JobRecord> = Vec::new();
            let mut page = 0u32;

            info!(
                session_id = %self.session_id,
                site = %site,
                keyword = %self.config.keyword,
                location = %self.config.location,
                max_pages,
                "site worker starting"
            );

            let mut record = ProgressRecord {
                status: ProgressStatus::Running,
                message: Some(format!("{} scrape started", site)),
                ..ProgressRecord::pending(self.session_id, site, max_pages)
            };
            yield WorkerEvent::Progress(record.clone());

            let termination = loop {
                // A budget exhausted before the stop landed still counts as done
                if page >= max_pages {
                    break Termination::Completed;
                }
                if self.cancel.is_cancelled() {
                    break Termination::Cancelled;
                }

                let next = page + 1;
                match self.fetch_with_retry(next, &mut stats).await {
                    FetchStep::Page(outcome) => {
                        page = next;
                        let found = outcome.jobs.len();
                        jobs.extend(outcome.jobs);

                        if let Some(total) = outcome.total_pages {
                            record.total_pages = total.min(max_pages).max(page);
                        }
                        if !outcome.has_next_page {
                            record.total_pages = page;
                        }
                        record.current_page = page;
                        record.items_collected = jobs.len();
                        record.message = Some(format!("page {}: {} items", page, found));

                        debug!(
                            session_id = %self.session_id,
                            site = %site,
                            page,
                            found,
                            collected = jobs.len(),
                            "page fetched"
                        );
                        yield WorkerEvent::Progress(record.clone());

                        if !outcome.has_next_page {
                            break Termination::Completed;
                        }
                    }
                    FetchStep::Failed(err) => break Termination::Failed(err),
                    FetchStep::Cancelled => break Termination::Cancelled,
                }
            };

            let (success, error) = match termination {
                Termination::Completed => {
                    record.status = ProgressStatus::Completed;
                    record.message = Some(format!("{} items collected", jobs.len()));
                    info!(
                        session_id = %self.session_id,
                        site = %site,
                        pages = page,
                        items = jobs.len(),
                        "site worker completed"
                    );
                    (true, None)
                }
                Termination::Failed(err) => {
                    let text = err.to_string();
                    record.status = ProgressStatus::Error;
                    record.message = Some(format!("failed after {} pages", page));
                    record.error = Some(text.clone());
                    warn!(
                        session_id = %self.session_id,
                        site = %site,
                        page = page + 1,
                        error = %err,
                        "site worker failed"
                    );
                    (false, Some(text))
                }
                Termination::Cancelled => {
                    record.status = ProgressStatus::Cancelled;
                    record.message = Some(format!("stopped after {} pages", page));
                    info!(
                        session_id = %self.session_id,
                        site = %site,
                        pages = page,
                        items = jobs.len(),
                        "site worker cancelled"
                    );
                    (false, Some("cancelled".to_string()))
                }
            };
            yield WorkerEvent::Progress(record);

            let total_items = jobs.len();
            yield WorkerEvent::Finished(ScrapeResult {
                site,
                jobs,
                total_items,
                duration: started.elapsed(),
                timestamp: Utc::now(),
                success,
                error,
                attempts: stats.attempts,
                retries: stats.retries,
            });
        }
    }

    async fn fetch_with_retry(&self, page: u32, stats: &mut AttemptStats) -> FetchStep {
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            stats.attempts += 1;

            let call = tokio::time::timeout(
                self.fetch_timeout,
                self.extractor.fetch_page(&self.config, page),
            );
            let result = tokio::select! {
                res = call => res.unwrap_or(Err(FetchError::Timeout { after: self.fetch_timeout })),
                _ = self.grace_expired() => return FetchStep::Cancelled,
            };

            let err = match result {
                Ok(outcome) => return FetchStep::Page(outcome),
                Err(err) => err,
            };

            if !err.is_transient() {
                return FetchStep::Failed(err);
            }
            if self.cancel.is_cancelled() {
                return FetchStep::Cancelled;
            }
            if !self.retry.should_retry(attempt) {
                return FetchStep::Failed(FetchError::fatal(format!(
                    "gave up after {} attempts: {}",
                    attempt, err
                )));
            }

            let delay = self.retry.delay_for(attempt);
            stats.retries += 1;
            warn!(
                session_id = %self.session_id,
                site = %self.config.site,
                page,
                attempt,
                max_attempts = self.retry.max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "transient fetch failure, retrying"
            );

            tokio::select! {
                _ = self.cancel.cancelled() => return FetchStep::Cancelled,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Resolves once the session is stopped and the grace period has passed.
    async fn grace_expired(&self) {
        self.cancel.cancelled().await;
        tokio::time::sleep(self.grace_period).await;
    }
}
