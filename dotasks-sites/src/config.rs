//! Client and crawl configuration with sensible defaults.
//!
//! [`ClientConfig`] controls the shared HTTP client; [`CrawlConfig`]
//! controls retry and politeness behaviour of paginated crawls. The
//! defaults are tuned for polite scraping of personal accounts.

use crate::error::SiteError;
use serde::{Deserialize, Serialize};

/// Configuration for the shared HTTP client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Per-request timeout in seconds.
    pub timeout_seconds: u64,
    /// Custom User-Agent string. If `None`, one is picked from a built-in
    /// list of realistic browser User-Agents when the client is built.
    pub user_agent: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 15,
            user_agent: None,
        }
    }
}

impl ClientConfig {
    /// Validates this configuration.
    pub fn validate(&self) -> Result<(), SiteError> {
        if self.timeout_seconds == 0 {
            return Err(SiteError::Config(
                "timeout_seconds must be greater than 0".into(),
            ));
        }
        if let Some(ua) = &self.user_agent {
            if ua.trim().is_empty() {
                return Err(SiteError::Config("user_agent must not be blank".into()));
            }
        }
        Ok(())
    }
}

/// Configuration for paginated gallery crawls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Retries allowed per page for transient failures before giving up.
    pub max_page_retries: u32,
    /// Random delay range in milliseconds `(min, max)` between page fetches.
    pub page_delay_ms: (u64, u64),
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_page_retries: 3,
            page_delay_ms: (1000, 3000),
        }
    }
}

impl CrawlConfig {
    /// Validates this configuration.
    pub fn validate(&self) -> Result<(), SiteError> {
        if self.page_delay_ms.0 > self.page_delay_ms.1 {
            return Err(SiteError::Config(
                "page_delay_ms min must be <= max".into(),
            ));
        }
        Ok(())
    }
}
