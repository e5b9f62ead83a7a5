//! Page crawling
//!
//! Two strategies sit behind the `PageCrawler` trait: a static GET and a
//! headless browser render. `Crawler` picks one from the domain
//! configuration. Neither retries, and a failure with one kind is never
//! retried with the other here; that decision belongs to the caller.

mod config;
mod error;
mod fetch;
mod render;

pub use config::{CrawlerConfig, CrawlerConfigBuilder, DEFAULT_USER_AGENT};
pub use error::{CrawlError, CrawlErrorKind};
pub use fetch::StaticFetcher;
pub use render::HeadlessRenderer;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::domain::{CrawlerKind, DomainConfig};

/// Raw markup of one fetched or rendered page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlResult {
    /// Full page markup
    pub raw_html: String,

    /// URL after redirects
    pub final_url: String,

    /// Which strategy produced the markup
    pub crawler: CrawlerKind,
}

/// Fetches the markup of a page
#[async_trait]
pub trait PageCrawler: Send + Sync {
    async fn crawl(&self, url: &str, config: &DomainConfig) -> Result<CrawlResult, CrawlError>;
}

/// Dispatches to the static fetcher or the headless renderer
#[derive(Debug, Clone)]
pub struct Crawler {
    fetcher: StaticFetcher,
    renderer: HeadlessRenderer,
}

impl Crawler {
    pub fn new(config: CrawlerConfig) -> Result<Self, CrawlError> {
        Ok(Self {
            fetcher: StaticFetcher::new(config.clone())?,
            renderer: HeadlessRenderer::new(config),
        })
    }
}

#[async_trait]
impl PageCrawler for Crawler {
    #[instrument(skip(self, config), fields(domain = %config.domain, crawler = %config.crawler))]
    async fn crawl(&self, url: &str, config: &DomainConfig) -> Result<CrawlResult, CrawlError> {
        let result = match config.crawler {
            CrawlerKind::Get => self.fetcher.crawl(url, config).await,
            CrawlerKind::Js => self.renderer.crawl(url, config).await,
        }?;

        info!(
            bytes = result.raw_html.len(),
            crawler = %result.crawler,
            "Crawled page"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    #[tokio::test]
    async fn test_get_config_uses_static_fetch() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/")
            .with_status(200)
            .with_body("<html><body>hello</body></html>")
            .create_async()
            .await;

        let crawler = Crawler::new(CrawlerConfig::default()).unwrap();
        let result = crawler
            .crawl(&server.url(), &DomainConfig::fallback("127.0.0.1"))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(result.crawler, CrawlerKind::Get);
        assert!(result.raw_html.contains("hello"));
    }

    #[test]
    fn test_crawl_result_json_shape() {
        let result = CrawlResult {
            raw_html: "<p>x</p>".into(),
            final_url: "https://example.org/".into(),
            crawler: CrawlerKind::Js,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["rawHtml"], "<p>x</p>");
        assert_eq!(json["finalUrl"], "https://example.org/");
        assert_eq!(json["crawler"], "js");
    }
}
