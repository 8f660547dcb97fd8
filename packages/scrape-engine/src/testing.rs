//! Testing utilities including a scriptable mock extractor.
//!
//! Useful for exercising sessions without touching any real site.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::error::{FetchError, FetchResult};
use crate::traits::extractor::{Extractor, PageOutcome};
use crate::types::{config::SiteConfig, job::JobRecord};

/// Build `count` distinguishable job records labelled with `label`.
pub fn mock_jobs(label: &str, count: usize) -> Vec<JobRecord> {
    (1..=count)
        .map(|i| {
            JobRecord::new(
                format!("{} job {}", label, i),
                format!("{} company", label),
                "Tokyo",
                "¥250,000/month",
            )
            .with_url(format!("https://jobs.example.com/{}/{}", label, i))
        })
        .collect()
}

/// Scriptable extractor.
///
/// Responses are queued per page number. Each call pops the front of the
/// page's queue, except that the final queued response is repeated for any
/// further calls. A page with nothing queued fails fatally.
///
/// # Example
///
/// ```rust
/// use scrape_engine::testing::{mock_jobs, MockExtractor};
/// use scrape_engine::{FetchError, PageOutcome};
///
/// let mock = MockExtractor::new()
///     .with_failure(1, FetchError::transient("timeout"))
///     .with_page(1, PageOutcome::last(mock_jobs("a", 3)));
/// ```
#[derive(Default, Clone)]
pub struct MockExtractor {
    /// Queued responses indexed by page
    script: Arc<RwLock<HashMap<u32, VecDeque<FetchResult<PageOutcome>>>>>,
    /// Latency applied to every call
    delay: Duration,
    /// Page numbers requested, in call order
    calls: Arc<RwLock<Vec<u32>>>,
}

impl MockExtractor {
    /// Create a mock with nothing scripted.
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, page: u32, response: FetchResult<PageOutcome>) {
        self.script
            .write()
            .unwrap()
            .entry(page)
            .or_default()
            .push_back(response);
    }

    /// Queue a successful page.
    pub fn with_page(self, page: u32, outcome: PageOutcome) -> Self {
        self.push(page, Ok(outcome));
        self
    }

    /// Queue a failure for a page.
    pub fn with_failure(self, page: u32, error: FetchError) -> Self {
        self.push(page, Err(error));
        self
    }

    /// Script consecutive pages with the given job counts; the last one
    /// reports no next page.
    pub fn with_pages(self, counts: &[usize]) -> Self {
        for (i, count) in counts.iter().enumerate() {
            let page = i as u32 + 1;
            let jobs = mock_jobs(&format!("p{}", page), *count);
            let outcome = if i + 1 == counts.len() {
                PageOutcome::last(jobs)
            } else {
                PageOutcome::more(jobs)
            };
            self.push(page, Ok(outcome));
        }
        self
    }

    /// Add latency to every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Page numbers requested so far.
    pub fn calls(&self) -> Vec<u32> {
        self.calls.read().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.read().unwrap().len()
    }
}

#[async_trait]
impl Extractor for MockExtractor {
    async fn fetch_page(&self, _config: &SiteConfig, page: u32) -> FetchResult<PageOutcome> {
        self.calls.write().unwrap().push(page);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let mut script = self.script.write().unwrap();
        match script.get_mut(&page) {
            Some(queue) if queue.len() > 1 => queue
                .pop_front()
                .unwrap_or_else(|| Err(FetchError::fatal("empty script"))),
            Some(queue) => queue
                .front()
                .cloned()
                .unwrap_or_else(|| Err(FetchError::fatal("empty script"))),
            None => Err(FetchError::fatal(format!(
                "no scripted response for page {}",
                page
            ))),
        }
    }
}
