//! Multi-Site Job Scrape Engine
//!
//! Runs scrape sessions across several job sites concurrently, streams
//! per-site progress to any number of observers, and merges the per-site
//! results into one exportable session result.
//!
//! # Design Philosophy
//!
//! - One worker per site; a failing site never affects its siblings
//! - Progress has a single writer per site and is published, never polled
//! - Stop is cooperative, bounded by a grace period
//! - Site specifics live behind [`Extractor`]; the engine only sees pages
//!
//! # Usage
//!
//! ```rust,ignore
//! use scrape_engine::{ExportService, ExtractorRegistry, SessionManager, SiteConfig, SiteId};
//! use std::time::Duration;
//!
//! let manager = SessionManager::new(ExtractorRegistry::demo(Duration::ZERO));
//! let id = manager.create_and_start(vec![
//!     SiteConfig::new(SiteId::Indeed, "cook", "Tokyo", 2),
//! ])?;
//!
//! let mut progress = manager.subscribe(id)?;
//! while let Some(message) = progress.recv().await {
//!     println!("{}", message.kind());
//! }
//!
//! let csv = ExportService::new(manager.clone()).export(id, "tabular")?;
//! ```
//!
//! # Modules
//!
//! - [`manager`] - Session registry and lifecycle
//! - [`worker`] - Per-site page loop with retry and cancellation
//! - [`bus`] - Session-keyed progress pub/sub
//! - [`aggregator`] - Merges per-site results
//! - [`export`] - Structured and tabular encodings
//! - [`extractors`] - Extractor registry and the demo extractor
//! - [`testing`] - Mock extractor for tests

pub mod aggregator;
pub mod bus;
pub mod error;
pub mod export;
pub mod extractors;
pub mod manager;
pub mod retry;
pub mod testing;
pub mod traits;
pub mod types;
pub mod worker;

// Re-export core types at crate root
pub use error::{ConfigError, EngineError, ExportError, FetchError, FetchResult, Result};
pub use traits::extractor::{Extractor, PageOutcome};
pub use types::{
    config::{EngineConfig, SiteConfig, MAX_PAGES, MIN_PAGES},
    job::JobRecord,
    message::StreamMessage,
    progress::{ProgressRecord, ProgressStatus},
    request::{SiteConfigRequest, StartRequest},
    result::{ScrapeResult, SessionResult, SessionStatus},
    site::{SiteId, SiteInfo},
};

pub use aggregator::ResultAggregator;
pub use bus::{ProgressBus, ProgressSubscription};
pub use export::{ExportFormat, ExportPayload, ExportService};
pub use extractors::{DemoExtractor, ExtractorRegistry};
pub use manager::{SessionManager, SessionSnapshot, SessionSummary};
pub use retry::RetryPolicy;
pub use worker::{SiteWorker, WorkerEvent};

// Re-export testing utilities
pub use testing::MockExtractor;
