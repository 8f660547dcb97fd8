//! Demo extractor producing deterministic synthetic listings.
//!
//! Used when no real site extractor is wired in, so the full session flow
//! (progress, aggregation, export) can be exercised end to end.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::FetchResult;
use crate::traits::extractor::{Extractor, PageOutcome};
use crate::types::{config::SiteConfig, job::JobRecord, site::SiteId};

const TITLES: [&str; 5] = [
    "{kw}スタッフ",
    "【急募】{kw}（未経験可）",
    "{kw} - 正社員",
    "{kw}リーダー候補",
    "短期{kw}",
];

const COMPANIES: [&str; 5] = [
    "株式会社テックソリューション",
    "株式会社地域IT",
    "株式会社ローカルワークス",
    "株式会社クラウドテック",
    "株式会社データサイエンス",
];

const SALARIES: [&str; 5] = [
    "時給1200円～1500円",
    "月給25万円～",
    "年収450万円～700万円",
    "時給1500円～2000円",
    "日給1万円",
];

/// Synthetic extractor for one site.
#[derive(Debug, Clone)]
pub struct DemoExtractor {
    site: SiteId,
    pages: u32,
    jobs_per_page: usize,
    latency: Duration,
}

impl DemoExtractor {
    /// Three pages of five listings with no artificial latency.
    pub fn new(site: SiteId) -> Self {
        Self {
            site,
            pages: 3,
            jobs_per_page: 5,
            latency: Duration::ZERO,
        }
    }

    pub fn with_pages(mut self, pages: u32) -> Self {
        self.pages = pages;
        self
    }

    pub fn with_jobs_per_page(mut self, jobs: usize) -> Self {
        self.jobs_per_page = jobs;
        self
    }

    /// Simulated fetch time per page.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    fn job(&self, config: &SiteConfig, page: u32, index: usize) -> JobRecord {
        let n = (page as usize - 1) * self.jobs_per_page + index;
        let slot = n % TITLES.len();
        let location = if config.location.is_empty() {
            "勤務地応相談".to_string()
        } else {
            format!("{}エリア", config.location)
        };

        JobRecord::new(
            TITLES[slot].replace("{kw}", &config.keyword),
            COMPANIES[slot],
            location,
            SALARIES[slot],
        )
        .with_url(format!(
            "https://{}.example.jp/jobs/{}-{}",
            self.site.as_str(),
            page,
            index + 1
        ))
        .with_employment_type(if slot % 2 == 0 { "アルバイト" } else { "正社員" })
    }
}

#[async_trait]
impl Extractor for DemoExtractor {
    async fn fetch_page(&self, config: &SiteConfig, page: u32) -> FetchResult<PageOutcome> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if page == 0 || page > self.pages {
            return Ok(PageOutcome::last(vec![]).with_total_pages(self.pages));
        }

        let jobs = (0..self.jobs_per_page)
            .map(|i| self.job(config, page, i))
            .collect();

        Ok(PageOutcome {
            jobs,
            has_next_page: page < self.pages,
            total_pages: Some(self.pages),
        })
    }
}
