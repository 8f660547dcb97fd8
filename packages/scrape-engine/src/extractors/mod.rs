//! Extractor registry and bundled extractors.
//!
//! Each site is served by its own [`Extractor`] behind a uniform interface.
//! The registry is handed to the session manager once; workers look their
//! extractor up at spawn time.

pub mod demo;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub use demo::DemoExtractor;

use crate::traits::extractor::Extractor;
use crate::types::site::{SiteId, SiteInfo};

/// Maps each site to the extractor that serves it.
#[derive(Clone, Default)]
pub struct ExtractorRegistry {
    extractors: HashMap<SiteId, Arc<dyn Extractor>>,
}

impl ExtractorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with a [`DemoExtractor`] for every supported site.
    pub fn demo(latency: Duration) -> Self {
        SiteId::ALL.into_iter().fold(Self::new(), |registry, site| {
            registry.with_extractor(site, DemoExtractor::new(site).with_latency(latency))
        })
    }

    /// Register an extractor, replacing any previous one for the site.
    pub fn register(&mut self, site: SiteId, extractor: Arc<dyn Extractor>) {
        self.extractors.insert(site, extractor);
    }

    /// Builder-style [`register`](Self::register).
    pub fn with_extractor<E: Extractor + 'static>(mut self, site: SiteId, extractor: E) -> Self {
        self.register(site, Arc::new(extractor));
        self
    }

    pub fn get(&self, site: SiteId) -> Option<Arc<dyn Extractor>> {
        self.extractors.get(&site).cloned()
    }

    pub fn contains(&self, site: SiteId) -> bool {
        self.extractors.contains_key(&site)
    }

    /// Catalogue of all supported sites, flagged by availability.
    pub fn sites(&self) -> Vec<SiteInfo> {
        SiteId::ALL
            .into_iter()
            .map(|site| SiteInfo::new(site, self.contains(site)))
            .collect()
    }
}

impl std::fmt::Debug for ExtractorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut sites: Vec<_> = self.extractors.keys().collect();
        sites.sort();
        f.debug_struct("ExtractorRegistry")
            .field("sites", &sites)
            .finish()
    }
}
