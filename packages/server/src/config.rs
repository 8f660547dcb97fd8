use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::time::Duration;

use scrape_engine::EngineConfig;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Serve every site with the synthetic demo extractor
    pub demo_mode: bool,
    pub allowed_origins: Vec<String>,
    /// Simulated per-page latency for demo extractors
    pub demo_latency: Duration,
    /// How often expired sessions are evicted
    pub eviction_interval: Duration,
    pub engine: EngineConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            port: env::var("PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            demo_mode: parse_bool(&env::var("DEMO_MODE").unwrap_or_else(|_| "true".to_string()))
                .context("DEMO_MODE must be true or false")?,
            allowed_origins: env::var("ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:3000".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            demo_latency: Duration::from_millis(
                env::var("DEMO_LATENCY_MS")
                    .unwrap_or_else(|_| "500".to_string())
                    .parse()
                    .context("DEMO_LATENCY_MS must be a valid number")?,
            ),
            eviction_interval: Duration::from_secs(
                env::var("EVICTION_INTERVAL_SECS")
                    .unwrap_or_else(|_| "60".to_string())
                    .parse()
                    .context("EVICTION_INTERVAL_SECS must be a valid number")?,
            ),
            engine: EngineConfig::from_env().context("Invalid SCRAPE_* engine setting")?,
        })
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool(" off "), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
