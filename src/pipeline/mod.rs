//! # Pipeline Orchestrator
//!
//! Composes resolution, crawling, reduction and extraction into the
//! operations the outer API/CLI layer calls. Every step runs in sequence and
//! the first failure ends the invocation; nothing is persisted after a
//! failure.

mod proposal;

pub use proposal::{PROPOSE_TOOL_NAME, ProposalSource, ProposedSelectors};

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::config::Settings;
use crate::crawler::{Crawler, CrawlerConfig, PageCrawler};
use crate::domain::{CrawlerKind, DomainConfig, DomainResolver, normalize_url};
use crate::error::{Error, Result};
use crate::extraction::{Extractor, VolunteerOpportunity};
use crate::model::{ModelChoice, providers_from_settings};
use crate::reducer::{CleanedContent, ReducerOptions, reduce, visible_text};
use crate::store::{Database, Opportunity, OpportunityStore};

/// Below this many characters of visible static text, a page is assumed to
/// need client-side rendering
const MIN_STATIC_TEXT_CHARS: usize = 500;

/// Result of scraping one page without persisting it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeOutput {
    pub record: VolunteerOpportunity,
    pub config: DomainConfig,
    pub cleaned: CleanedContent,
}

/// Proposal returned by [`Pipeline::generate_config_from_url`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedConfig {
    pub domain: String,
    pub selectors: ProposedSelectors,
    pub recommended_crawler: CrawlerKind,
    /// Page text after applying the proposed selectors
    pub cleaned_text: String,
    /// All visible page text, for side-by-side review
    pub raw_text: String,
}

/// The crawl, clean and extract pipeline
#[derive(Clone)]
pub struct Pipeline {
    resolver: DomainResolver,
    crawler: Arc<dyn PageCrawler>,
    extractor: Extractor,
    opportunities: Arc<dyn OpportunityStore>,
    reducer: ReducerOptions,
}

impl Pipeline {
    pub fn new(
        resolver: DomainResolver,
        crawler: Arc<dyn PageCrawler>,
        extractor: Extractor,
        opportunities: Arc<dyn OpportunityStore>,
    ) -> Self {
        Self {
            resolver,
            crawler,
            extractor,
            opportunities,
            reducer: ReducerOptions::default(),
        }
    }

    /// Wire the production collaborators from settings
    pub async fn from_settings(settings: &Settings) -> Result<Self> {
        let db = Arc::new(Database::new_from_path(&settings.database_path).await?);
        let crawler = Crawler::new(CrawlerConfig::from_settings(settings))?;
        let providers =
            providers_from_settings(settings).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        let extractor = Extractor::from_settings(providers, settings);
        if !extractor.has_providers() {
            warn!("No model provider configured; set GEMINI_API_KEY or OPENAI_API_KEY");
        }

        Ok(Self::new(
            DomainResolver::new(db.clone()),
            Arc::new(crawler),
            extractor,
            db,
        )
        .with_reducer_options(ReducerOptions::from_settings(settings)))
    }

    pub fn with_reducer_options(mut self, options: ReducerOptions) -> Self {
        self.reducer = options;
        self
    }

    pub fn resolver(&self) -> &DomainResolver {
        &self.resolver
    }

    pub fn opportunities(&self) -> &dyn OpportunityStore {
        &*self.opportunities
    }

    /// Resolve, crawl, reduce and extract without persisting
    #[instrument(skip(self), fields(model = %model))]
    pub async fn scrape(&self, url: &str, model: ModelChoice) -> Result<ScrapeOutput> {
        let url = normalize_url(url)?;
        let config = self.resolver.resolve(&url).await?;

        let page = self.crawler.crawl(url.as_str(), &config).await?;
        let cleaned = reduce(&page.raw_html, &config, &self.reducer)?;
        let record = self
            .extractor
            .extract(&cleaned.text, url.as_str(), model)
            .await?;

        Ok(ScrapeOutput {
            record,
            config,
            cleaned,
        })
    }

    /// Scrape a page and persist the extracted record
    ///
    /// A URL that already has a persisted record is returned as is, without
    /// crawling. Concurrent calls for one URL may both crawl, but the store
    /// keeps a single record and both return it. A crawl failure is surfaced; the other crawler kind is not
    /// tried.
    #[instrument(skip(self), fields(model = %model))]
    pub async fn scrape_and_save(&self, url: &str, model: ModelChoice) -> Result<Opportunity> {
        let normalized = normalize_url(url)?;
        if let Some(existing) = self.opportunities.find_by_url(normalized.as_str()).await? {
            info!(id = existing.id, url = %normalized, "Opportunity already saved");
            return Ok(existing);
        }

        let output = self.scrape(normalized.as_str(), model).await?;
        let saved = self.opportunities.create(&output.record).await?;
        info!(id = saved.id, url = %normalized, "Saved opportunity");
        Ok(saved)
    }

    /// Crawl a page and propose selectors for human review
    ///
    /// Nothing is stored; the reviewed selectors are committed with
    /// [`Pipeline::save_config`].
    #[instrument(skip(self))]
    pub async fn generate_config_from_url(
        &self,
        url: &str,
        model: Option<ModelChoice>,
    ) -> Result<GeneratedConfig> {
        let url = normalize_url(url)?;
        let config = self.resolver.resolve(&url).await?;

        let mut page = self.crawler.crawl(url.as_str(), &config).await?;
        let mut raw_text = visible_text(&page.raw_html);
        let mut recommended_crawler = page.crawler;

        if page.crawler == CrawlerKind::Get && raw_text.chars().count() < MIN_STATIC_TEXT_CHARS {
            info!(
                url = %url,
                chars = raw_text.chars().count(),
                "Static page text is short, rendering headlessly"
            );
            let js = config.clone().with_crawler(CrawlerKind::Js);
            match self.crawler.crawl(url.as_str(), &js).await {
                Ok(rendered) => {
                    raw_text = visible_text(&rendered.raw_html);
                    page = rendered;
                    recommended_crawler = CrawlerKind::Js;
                }
                Err(e) => warn!(url = %url, error = %e, "Headless render failed, keeping static markup"),
            }
        }

        let selectors = proposal::propose(&self.extractor, &page.raw_html, url.as_str(), model).await;

        let proposed = DomainConfig {
            include: selectors.include.clone(),
            exclude: selectors.exclude.clone(),
            ..config.clone()
        };
        let cleaned_text = match reduce(&page.raw_html, &proposed, &self.reducer) {
            Ok(cleaned) => cleaned.text,
            Err(_) => String::new(),
        };

        Ok(GeneratedConfig {
            domain: config.domain,
            selectors,
            recommended_crawler,
            cleaned_text,
            raw_text,
        })
    }

    /// Validate and store a domain configuration
    pub async fn save_config(
        &self,
        domain: &str,
        include: &[String],
        exclude: &[String],
        crawler: CrawlerKind,
        wait_for: Option<&str>,
    ) -> Result<DomainConfig> {
        self.resolver
            .save(domain, include, exclude, crawler, wait_for)
            .await
    }
}
