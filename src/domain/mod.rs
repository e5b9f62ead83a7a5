//! # Domain Configuration Module
//!
//! Maps a page URL to the selector configuration stored for its host. The
//! pipeline only ever reads configurations; writes go through
//! [`DomainResolver::save`], which the configuration-authoring workflow calls
//! once a human has accepted a proposal.
//!
//! ## Key Components
//!
//! - `DomainConfig`: crawler kind plus include/exclude selector lists for one host
//! - `ConfigStore`: storage seam for configurations (libsql in production)
//! - `DomainResolver`: host normalization, lookup and the built-in default
//! - `normalize_url` / `normalize_host`: the URL hygiene every entry point applies

mod resolver;
mod host;

pub use resolver::{DomainResolver, parse_selector_list};
pub use host::{MAX_URL_LENGTH, host_of, normalize_host, normalize_url, validate_domain};

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::DbError;

/// How a page is fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CrawlerKind {
    /// Single static HTTP GET
    #[default]
    Get,
    /// Headless browser render
    Js,
}

impl CrawlerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CrawlerKind::Get => "get",
            CrawlerKind::Js => "js",
        }
    }
}

impl fmt::Display for CrawlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CrawlerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "get" => Ok(CrawlerKind::Get),
            "js" => Ok(CrawlerKind::Js),
            other => Err(format!("crawler must be get or js, got {other:?}")),
        }
    }
}

/// Selector configuration for one host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainConfig {
    /// Normalized hostname (lowercase, no leading `www.`)
    pub domain: String,

    /// Static fetch or headless render
    pub crawler: CrawlerKind,

    /// Selectors whose matches make up the content; empty means the whole document
    #[serde(default)]
    pub include: Vec<String>,

    /// Selectors whose matching subtrees are dropped
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Selector the headless renderer waits for before capturing the DOM
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_for: Option<String>,

    /// Time of the last write; `None` for the built-in default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl DomainConfig {
    /// The configuration used when nothing is stored for a host
    pub fn fallback(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            crawler: CrawlerKind::Get,
            include: vec!["body".to_string()],
            exclude: Vec::new(),
            wait_for: None,
            updated_at: None,
        }
    }

    /// Whether this is the built-in default rather than a stored configuration
    pub fn is_fallback(&self) -> bool {
        self.updated_at.is_none()
    }

    /// Same selectors, different crawler
    pub fn with_crawler(mut self, crawler: CrawlerKind) -> Self {
        self.crawler = crawler;
        self
    }
}

/// Storage for domain configurations
///
/// Implementations provide their own concurrency control; the resolver holds
/// no state beyond the store handle.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Exact-match lookup by normalized domain
    async fn find_config(&self, domain: &str) -> Result<Option<DomainConfig>, DbError>;

    /// Insert or replace the configuration for `config.domain`
    async fn upsert_config(&self, config: &DomainConfig) -> Result<DomainConfig, DbError>;

    /// All stored configurations ordered by domain
    async fn list_configs(&self) -> Result<Vec<DomainConfig>, DbError>;

    /// Remove a configuration; returns whether one existed
    async fn delete_config(&self, domain: &str) -> Result<bool, DbError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_config() {
        let config = DomainConfig::fallback("example.org");

        assert_eq!(config.crawler, CrawlerKind::Get);
        assert_eq!(config.include, vec!["body".to_string()]);
        assert!(config.exclude.is_empty());
        assert!(config.is_fallback());
    }

    #[test]
    fn test_crawler_kind_parsing() {
        assert_eq!("get".parse::<CrawlerKind>().unwrap(), CrawlerKind::Get);
        assert_eq!(" JS ".parse::<CrawlerKind>().unwrap(), CrawlerKind::Js);
        assert!("chrome".parse::<CrawlerKind>().is_err());
    }

    #[test]
    fn test_domain_config_json_shape() {
        let config = DomainConfig::fallback("example.org").with_crawler(CrawlerKind::Js);
        let json = serde_json::to_value(&config).unwrap();

        assert_eq!(json["domain"], "example.org");
        assert_eq!(json["crawler"], "js");
        assert_eq!(json["include"][0], "body");
        assert!(json.get("updatedAt").is_none());
    }
}
