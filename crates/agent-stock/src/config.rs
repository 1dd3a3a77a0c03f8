//! Configuration for market data access

use crate::error::{Result, StockError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_YAHOO_BASE_URL: &str = "https://query2.finance.yahoo.com";
const DEFAULT_YAHOO_COOKIE_URL: &str = "https://fc.yahoo.com";
const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Configuration for market data access
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockConfig {
    /// Cache TTL for price history
    pub cache_ttl_realtime: Duration,

    /// Cache TTL for company summaries and analyst recommendations
    pub cache_ttl_fundamental: Duration,

    /// Request timeout duration
    pub request_timeout: Duration,

    /// Base URL of the quoteSummary API
    pub yahoo_base_url: String,

    /// Page visited once to obtain the session cookie
    pub yahoo_cookie_url: String,

    pub user_agent: String,
}

impl Default for StockConfig {
    fn default() -> Self {
        Self {
            cache_ttl_realtime: Duration::from_secs(60),
            cache_ttl_fundamental: Duration::from_secs(3600),
            request_timeout: Duration::from_secs(30),
            yahoo_base_url: DEFAULT_YAHOO_BASE_URL.to_string(),
            yahoo_cookie_url: DEFAULT_YAHOO_COOKIE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl StockConfig {
    /// Create a new configuration builder
    pub fn builder() -> StockConfigBuilder {
        StockConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.request_timeout.is_zero() {
            return Err(StockError::ConfigError(
                "request_timeout must be greater than 0".to_string(),
            ));
        }

        if self.yahoo_base_url.trim().is_empty() {
            return Err(StockError::ConfigError(
                "yahoo_base_url must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for StockConfig
#[derive(Debug, Default)]
pub struct StockConfigBuilder {
    cache_ttl_realtime: Option<Duration>,
    cache_ttl_fundamental: Option<Duration>,
    request_timeout: Option<Duration>,
    yahoo_base_url: Option<String>,
    yahoo_cookie_url: Option<String>,
    user_agent: Option<String>,
}

impl StockConfigBuilder {
    /// Set cache TTL for price history
    pub fn cache_ttl_realtime(mut self, duration: Duration) -> Self {
        self.cache_ttl_realtime = Some(duration);
        self
    }

    /// Set cache TTL for summaries and recommendations
    pub fn cache_ttl_fundamental(mut self, duration: Duration) -> Self {
        self.cache_ttl_fundamental = Some(duration);
        self
    }

    /// Set request timeout
    pub fn request_timeout(mut self, duration: Duration) -> Self {
        self.request_timeout = Some(duration);
        self
    }

    pub fn yahoo_base_url(mut self, url: impl Into<String>) -> Self {
        self.yahoo_base_url = Some(url.into());
        self
    }

    pub fn yahoo_cookie_url(mut self, url: impl Into<String>) -> Self {
        self.yahoo_cookie_url = Some(url.into());
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<StockConfig> {
        let defaults = StockConfig::default();

        let config = StockConfig {
            cache_ttl_realtime: self.cache_ttl_realtime.unwrap_or(defaults.cache_ttl_realtime),
            cache_ttl_fundamental: self
                .cache_ttl_fundamental
                .unwrap_or(defaults.cache_ttl_fundamental),
            request_timeout: self.request_timeout.unwrap_or(defaults.request_timeout),
            yahoo_base_url: self.yahoo_base_url.unwrap_or(defaults.yahoo_base_url),
            yahoo_cookie_url: self.yahoo_cookie_url.unwrap_or(defaults.yahoo_cookie_url),
            user_agent: self.user_agent.unwrap_or(defaults.user_agent),
        };

        config.validate()?;
        Ok(config)
    }
}
