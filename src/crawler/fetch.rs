//! Static HTTP fetch

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument};

use super::{CrawlError, CrawlResult, CrawlerConfig, PageCrawler};
use crate::domain::{CrawlerKind, DomainConfig};

/// Single GET per call with a browser User-Agent and a bounded timeout
#[derive(Debug, Clone)]
pub struct StaticFetcher {
    client: Client,
    config: CrawlerConfig,
}

impl StaticFetcher {
    pub fn new(config: CrawlerConfig) -> Result<Self, CrawlError> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.fetch_timeout)
            .build()
            .map_err(|e| CrawlError::Client(e.to_string()))?;

        Ok(Self { client, config })
    }

    #[instrument(skip(self), fields(timeout = ?self.config.fetch_timeout))]
    pub async fn fetch(&self, url: &str) -> Result<CrawlResult, CrawlError> {
        let timeout = self.config.fetch_timeout;
        let response = self
            .client
            .get(url)
            .header(
                reqwest::header::ACCEPT,
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .send()
            .await
            .map_err(|e| CrawlError::from_reqwest(url, e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CrawlError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().to_string();
        let raw_html = response
            .text()
            .await
            .map_err(|e| CrawlError::from_reqwest(url, e, timeout))?;

        debug!(bytes = raw_html.len(), final_url = %final_url, "Fetched page");

        Ok(CrawlResult {
            raw_html,
            final_url,
            crawler: CrawlerKind::Get,
        })
    }
}

#[async_trait]
impl PageCrawler for StaticFetcher {
    async fn crawl(&self, url: &str, _config: &DomainConfig) -> Result<CrawlResult, CrawlError> {
        self.fetch(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::CrawlErrorKind;
    use crate::crawler::config::DEFAULT_USER_AGENT;
    use mockito::{Matcher, Server};

    fn fetcher() -> StaticFetcher {
        StaticFetcher::new(CrawlerConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_sends_browser_user_agent() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/events")
            .match_header("user-agent", DEFAULT_USER_AGENT)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body("<html><body><main>Beach Cleanup</main></body></html>")
            .create_async()
            .await;

        let url = format!("{}/events?page=2", server.url());
        let result = fetcher().fetch(&url).await.unwrap();

        mock.assert_async().await;
        assert!(result.raw_html.contains("Beach Cleanup"));
        assert_eq!(result.final_url, url);
        assert_eq!(result.crawler, CrawlerKind::Get);
    }

    #[tokio::test]
    async fn test_non_success_status_is_network_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/missing")
            .with_status(404)
            .with_body("not here")
            .create_async()
            .await;

        let err = fetcher()
            .fetch(&format!("{}/missing", server.url()))
            .await
            .unwrap_err();

        assert!(matches!(err, CrawlError::Status { status: 404, .. }));
        assert_eq!(err.kind(), CrawlErrorKind::Network);
    }

    #[tokio::test]
    async fn test_connection_failure_is_network_error() {
        let err = fetcher().fetch("http://127.0.0.1:1/").await.unwrap_err();
        assert_eq!(err.kind(), CrawlErrorKind::Network);
    }
}
