//! Start request payload as received from the presentation layer.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::config::SiteConfig;
use crate::types::site::SiteId;

fn default_max_pages() -> u32 {
    5
}

/// Raw per-site entry. The site is still an unchecked string here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteConfigRequest {
    pub site: String,
    pub keyword: String,
    #[serde(default)]
    pub location: String,
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
}

/// `{ "configs": [ { "site", "keyword", "location", "maxPages" } ] }`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartRequest {
    pub configs: Vec<SiteConfigRequest>,
}

impl StartRequest {
    /// Resolve site ids and trim free-text fields.
    ///
    /// Range and uniqueness checks happen in the session manager.
    pub fn into_site_configs(self) -> Result<Vec<SiteConfig>, ConfigError> {
        if self.configs.is_empty() {
            return Err(ConfigError::EmptyRequest);
        }

        self.configs
            .into_iter()
            .map(|raw| {
                let site: SiteId = raw.site.parse()?;
                Ok(SiteConfig::new(
                    site,
                    raw.keyword.trim(),
                    raw.location.trim(),
                    raw.max_pages,
                ))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_frontend_payload() {
        let request: StartRequest = serde_json::from_value(serde_json::json!({
            "configs": [
                {"site": "indeed", "keyword": " engineer ", "location": "Tokyo", "maxPages": 2},
                {"site": "townwork", "keyword": "cook"}
            ]
        }))
        .unwrap();

        let configs = request.into_site_configs().unwrap();
        assert_eq!(configs[0], SiteConfig::new(SiteId::Indeed, "engineer", "Tokyo", 2));
        assert_eq!(configs[1].max_pages, 5);
        assert_eq!(configs[1].location, "");
    }

    #[test]
    fn test_unknown_site_is_config_error() {
        let request = StartRequest {
            configs: vec![SiteConfigRequest {
                site: "craigslist".to_string(),
                keyword: "dev".to_string(),
                location: String::new(),
                max_pages: 1,
            }],
        };
        assert_eq!(
            request.into_site_configs().unwrap_err(),
            ConfigError::UnknownSite("craigslist".to_string())
        );
    }

    #[test]
    fn test_empty_request() {
        assert_eq!(
            StartRequest::default().into_site_configs().unwrap_err(),
            ConfigError::EmptyRequest
        );
    }
}
