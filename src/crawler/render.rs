//! Headless browser rendering
//!
//! Each call launches its own Chromium, renders one page and tears the browser
//! down again. `headless_chrome` is synchronous, so the session runs on the
//! blocking pool. Every browser step draws on one [`RenderBudget`]; the outer
//! deadline adds a teardown grace on top, so the session is dropped before the
//! caller gives up on it.

use std::fmt::Display;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use tracing::{debug, instrument, warn};

use super::{CrawlError, CrawlResult, CrawlerConfig, PageCrawler};
use crate::domain::{CrawlerKind, DomainConfig};

/// Slack on top of the render budget for browser launch and teardown
const TEARDOWN_GRACE: Duration = Duration::from_secs(5);

/// Outer deadline for a render whose browser steps share `render_timeout`
fn outer_deadline(render_timeout: Duration) -> Duration {
    render_timeout + TEARDOWN_GRACE
}

/// Time left for the browser steps of one render
#[derive(Debug, Clone, Copy)]
struct RenderBudget {
    started: Instant,
    limit: Duration,
}

impl RenderBudget {
    fn new(limit: Duration) -> Self {
        Self {
            started: Instant::now(),
            limit,
        }
    }

    fn remaining(&self) -> Duration {
        self.limit.saturating_sub(self.started.elapsed())
    }

    /// Time the next step may take; an exhausted budget is a timeout
    fn step(&self, url: &str) -> Result<Duration, CrawlError> {
        match self.remaining() {
            left if left.is_zero() => Err(self.timeout(url)),
            left => Ok(left),
        }
    }

    fn settle(&self, delay: Duration) -> Duration {
        delay.min(self.remaining())
    }

    /// A step failure, reported as a timeout once the budget is spent
    fn fail(&self, url: &str, err: impl Display) -> CrawlError {
        if self.remaining().is_zero() {
            self.timeout(url)
        } else {
            CrawlError::render(url, err)
        }
    }

    fn timeout(&self, url: &str) -> CrawlError {
        CrawlError::Timeout {
            url: url.to_string(),
            after: self.limit,
        }
    }
}

/// Renders pages in a fresh headless browser per call
#[derive(Debug, Clone)]
pub struct HeadlessRenderer {
    config: CrawlerConfig,
}

impl HeadlessRenderer {
    pub fn new(config: CrawlerConfig) -> Self {
        Self { config }
    }

    #[instrument(skip(self), fields(deadline = ?self.config.render_timeout))]
    pub async fn render(&self, url: &str, wait_for: Option<&str>) -> Result<CrawlResult, CrawlError> {
        let deadline = outer_deadline(self.config.render_timeout);
        let config = self.config.clone();
        let target = url.to_string();
        let wait_for = wait_for.map(str::to_string);

        let task = tokio::task::spawn_blocking(move || {
            render_blocking(&config, &target, wait_for.as_deref())
        });

        match tokio::time::timeout(deadline, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(CrawlError::render(url, join_err)),
            Err(_) => {
                warn!(url = %url, "Headless render exceeded its deadline");
                Err(CrawlError::Timeout {
                    url: url.to_string(),
                    after: self.config.render_timeout,
                })
            }
        }
    }
}

#[async_trait]
impl PageCrawler for HeadlessRenderer {
    async fn crawl(&self, url: &str, config: &DomainConfig) -> Result<CrawlResult, CrawlError> {
        self.render(url, config.wait_for.as_deref()).await
    }
}

/// Owns the browser and tab for one render; closing happens on drop so every
/// exit path releases the Chromium process.
struct BrowserSession {
    tab: Arc<Tab>,
    _browser: Browser,
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        if let Err(e) = self.tab.close(false) {
            debug!("Closing tab failed: {e}");
        }
    }
}

fn launch(config: &CrawlerConfig, url: &str) -> Result<BrowserSession, CrawlError> {
    let options = LaunchOptions::default_builder()
        .headless(true)
        .sandbox(false)
        .path(config.chrome_path.clone())
        .idle_browser_timeout(outer_deadline(config.render_timeout))
        .build()
        .map_err(|e| CrawlError::render(url, e))?;

    let browser = Browser::new(options).map_err(|e| CrawlError::render(url, e))?;
    let tab = browser.new_tab().map_err(|e| CrawlError::render(url, e))?;

    Ok(BrowserSession {
        tab,
        _browser: browser,
    })
}

fn render_blocking(
    config: &CrawlerConfig,
    url: &str,
    wait_for: Option<&str>,
) -> Result<CrawlResult, CrawlError> {
    let budget = RenderBudget::new(config.render_timeout);
    let session = launch(config, url)?;
    let tab = &session.tab;

    tab.set_default_timeout(budget.step(url)?);
    tab.set_user_agent(&config.user_agent, None, None)
        .map_err(|e| budget.fail(url, e))?;

    tab.navigate_to(url)
        .and_then(|tab| tab.wait_until_navigated())
        .map_err(|e| budget.fail(url, e))?;

    std::thread::sleep(budget.settle(config.settle_delay));

    if let Some(selector) = wait_for {
        tab.set_default_timeout(budget.step(url)?);
        tab.wait_for_element(selector)
            .map_err(|e| budget.fail(url, format!("waiting for {selector}: {e}")))?;
    }

    tab.set_default_timeout(budget.step(url)?);
    let raw_html = tab.get_content().map_err(|e| budget.fail(url, e))?;
    let final_url = tab.get_url();

    debug!(bytes = raw_html.len(), final_url = %final_url, "Rendered page");

    Ok(CrawlResult {
        raw_html,
        final_url,
        crawler: CrawlerKind::Js,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::CrawlErrorKind;

    #[tokio::test]
    async fn test_missing_browser_is_render_error() {
        let config = CrawlerConfig::builder()
            .chrome_path("/nonexistent/chromium-for-tests")
            .render_timeout(Duration::from_secs(10))
            .settle_delay(Duration::ZERO)
            .build();

        let err = HeadlessRenderer::new(config)
            .render("https://example.org", None)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), CrawlErrorKind::Render);
    }

    #[test]
    fn test_outer_deadline_outlasts_render_budget() {
        let render_timeout = Duration::from_secs(30);
        assert!(outer_deadline(render_timeout) > render_timeout);
        assert_eq!(outer_deadline(render_timeout) - render_timeout, TEARDOWN_GRACE);
    }

    #[test]
    fn test_budget_bounds_every_step() {
        let budget = RenderBudget::new(Duration::from_secs(30));

        let step = budget.step("https://example.org").unwrap();
        assert!(step <= Duration::from_secs(30));
        assert!(budget.settle(Duration::from_secs(3)) <= Duration::from_secs(3));
        assert!(budget.settle(Duration::from_secs(60)) <= Duration::from_secs(30));
        assert_eq!(budget.fail("https://example.org", "boom").kind(), CrawlErrorKind::Render);
    }

    #[test]
    fn test_spent_budget_is_timeout() {
        let budget = RenderBudget::new(Duration::ZERO);

        let err = budget.step("https://example.org").unwrap_err();
        assert_eq!(err.kind(), CrawlErrorKind::Timeout);
        assert_eq!(budget.settle(Duration::from_secs(3)), Duration::ZERO);
        assert_eq!(budget.fail("https://example.org", "navigation hung").kind(), CrawlErrorKind::Timeout);
        assert!(matches!(err, CrawlError::Timeout { after, .. } if after == Duration::ZERO));
    }
}
