//! Supported job sites.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Identifier of a supported job-listing site.
///
/// Serialized as the lower-case wire id (`"indeed"`, `"townwork"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SiteId {
    Indeed,
    Yahoo,
    Townwork,
    Baitoru,
    Hellowork,
    Mahhabaito,
    Linebaito,
    Rikunavi,
    Mynavi,
    Entenshoku,
    Kaigojob,
    Jobmedley,
}

impl SiteId {
    /// Every supported site, in catalogue order.
    pub const ALL: [SiteId; 12] = [
        SiteId::Indeed,
        SiteId::Yahoo,
        SiteId::Townwork,
        SiteId::Baitoru,
        SiteId::Hellowork,
        SiteId::Mahhabaito,
        SiteId::Linebaito,
        SiteId::Rikunavi,
        SiteId::Mynavi,
        SiteId::Entenshoku,
        SiteId::Kaigojob,
        SiteId::Jobmedley,
    ];

    /// Wire id.
    pub fn as_str(&self) -> &'static str {
        match self {
            SiteId::Indeed => "indeed",
            SiteId::Yahoo => "yahoo",
            SiteId::Townwork => "townwork",
            SiteId::Baitoru => "baitoru",
            SiteId::Hellowork => "hellowork",
            SiteId::Mahhabaito => "mahhabaito",
            SiteId::Linebaito => "linebaito",
            SiteId::Rikunavi => "rikunavi",
            SiteId::Mynavi => "mynavi",
            SiteId::Entenshoku => "entenshoku",
            SiteId::Kaigojob => "kaigojob",
            SiteId::Jobmedley => "jobmedley",
        }
    }

    /// Human-readable site name.
    pub fn display_name(&self) -> &'static str {
        match self {
            SiteId::Indeed => "Indeed",
            SiteId::Yahoo => "Yahoo!しごと検索",
            SiteId::Townwork => "タウンワーク",
            SiteId::Baitoru => "バイトル",
            SiteId::Hellowork => "ハローワーク",
            SiteId::Mahhabaito => "マッハバイト",
            SiteId::Linebaito => "LINEバイト",
            SiteId::Rikunavi => "リクナビNEXT",
            SiteId::Mynavi => "マイナビ転職",
            SiteId::Entenshoku => "エン転職",
            SiteId::Kaigojob => "カイゴジョブ",
            SiteId::Jobmedley => "ジョブメドレー",
        }
    }

    /// Short description of the site's listing focus.
    pub fn description(&self) -> &'static str {
        match self {
            SiteId::Indeed => "General job search aggregator",
            SiteId::Yahoo => "Aggregated listings from Yahoo! Japan",
            SiteId::Townwork => "Local part-time and full-time listings",
            SiteId::Baitoru => "Part-time job listings",
            SiteId::Hellowork => "Public employment service listings",
            SiteId::Mahhabaito => "Part-time listings with sign-up bonuses",
            SiteId::Linebaito => "Part-time listings via LINE",
            SiteId::Rikunavi => "Mid-career full-time listings",
            SiteId::Mynavi => "Mid-career full-time listings",
            SiteId::Entenshoku => "Full-time listings with employer reviews",
            SiteId::Kaigojob => "Nursing care listings",
            SiteId::Jobmedley => "Medical and care listings",
        }
    }
}

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SiteId {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        SiteId::ALL
            .into_iter()
            .find(|site| site.as_str() == needle)
            .ok_or_else(|| ConfigError::UnknownSite(s.to_string()))
    }
}

/// Catalogue entry for a site, as shown to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteInfo {
    pub id: SiteId,
    pub name: String,
    pub description: String,
    /// True when an extractor is registered for this site
    pub enabled: bool,
}

impl SiteInfo {
    pub fn new(id: SiteId, enabled: bool) -> Self {
        Self {
            id,
            name: id.display_name().to_string(),
            description: id.description().to_string(),
            enabled,
        }
    }
}
