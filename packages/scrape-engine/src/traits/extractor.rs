//! Extractor trait: the per-site capability that turns a page request into
//! job listings.
//!
//! How a page is fetched and parsed (browser automation, HTTP + selectors,
//! an API) is entirely the extractor's business. The engine only needs the
//! listings, whether another page exists, and a failure classification.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::FetchResult;
use crate::types::{config::SiteConfig, job::JobRecord};

/// One page of results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageOutcome {
    pub jobs: Vec<JobRecord>,
    pub has_next_page: bool,
    /// Total pages, when the site exposes it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_pages: Option<u32>,
}

impl PageOutcome {
    /// A page followed by more pages.
    pub fn more(jobs: Vec<JobRecord>) -> Self {
        Self {
            jobs,
            has_next_page: true,
            total_pages: None,
        }
    }

    /// The final page.
    pub fn last(jobs: Vec<JobRecord>) -> Self {
        Self {
            jobs,
            has_next_page: false,
            total_pages: None,
        }
    }

    pub fn with_total_pages(mut self, total: u32) -> Self {
        self.total_pages = Some(total);
        self
    }
}

/// Per-site extraction capability.
///
/// Implementations classify their failures: [`FetchError::Transient`] is
/// retried by the worker, [`FetchError::Fatal`] ends that site's scrape.
///
/// [`FetchError::Transient`]: crate::error::FetchError::Transient
/// [`FetchError::Fatal`]: crate::error::FetchError::Fatal
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Fetch page `page` (1-based) of the search described by `config`.
    async fn fetch_page(&self, config: &SiteConfig, page: u32) -> FetchResult<PageOutcome>;
}
