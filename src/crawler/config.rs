//! # Crawler Configuration Module
//!
//! Settings shared by the static fetcher and the headless renderer. Built with
//! a builder, or derived from the process [`Settings`].
//!
//! ## Key Components
//!
//! - `CrawlerConfig`: user agent, timeouts and browser location
//! - `CrawlerConfigBuilder`: builder pattern implementation for easier configuration

use std::path::PathBuf;
use std::time::Duration;

use crate::config::Settings;

/// Browser-like User-Agent sent by both crawlers
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Configuration for the crawlers
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    /// User agent to use for requests
    pub user_agent: String,

    /// Timeout for a static GET, connect through body
    pub fetch_timeout: Duration,

    /// Deadline for a whole headless render
    pub render_timeout: Duration,

    /// Pause after navigation so client-side rendering can finish
    pub settle_delay: Duration,

    /// Chromium binary; auto-detected when `None`
    pub chrome_path: Option<PathBuf>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            fetch_timeout: Duration::from_secs(15),
            render_timeout: Duration::from_secs(30),
            settle_delay: Duration::from_millis(3000),
            chrome_path: None,
        }
    }
}

/// Builder for CrawlerConfig
#[derive(Debug, Default)]
pub struct CrawlerConfigBuilder {
    config: CrawlerConfig,
}

impl CrawlerConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: CrawlerConfig::default(),
        }
    }

    /// Set the user agent to use for requests
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Set the static fetch timeout
    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.config.fetch_timeout = timeout;
        self
    }

    /// Set the headless render deadline
    pub fn render_timeout(mut self, timeout: Duration) -> Self {
        self.config.render_timeout = timeout;
        self
    }

    /// Set the post-navigation settle delay
    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.config.settle_delay = delay;
        self
    }

    /// Set an explicit Chromium binary
    pub fn chrome_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.chrome_path = Some(path.into());
        self
    }

    /// Build the configuration
    pub fn build(self) -> CrawlerConfig {
        self.config
    }
}

impl CrawlerConfig {
    /// Create a new builder
    pub fn builder() -> CrawlerConfigBuilder {
        CrawlerConfigBuilder::new()
    }

    /// Crawler settings taken from the process settings
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            fetch_timeout: settings.fetch_timeout,
            render_timeout: settings.render_timeout,
            settle_delay: settings.render_settle,
            chrome_path: settings.chrome_path.clone(),
            ..Self::default()
        }
    }
}
