use std::sync::Arc;

use chrono::Utc;
use scraper::Selector;
use tracing::{debug, instrument};
use url::Url;

use super::{ConfigStore, CrawlerKind, DomainConfig, host_of, validate_domain};
use crate::error::{Error, Result};

/// Longest selector list accepted by `save`, as typed
const MAX_SELECTOR_INPUT: usize = 1000;

/// Resolves the configuration that applies to a URL
#[derive(Clone)]
pub struct DomainResolver {
    store: Arc<dyn ConfigStore>,
}

impl DomainResolver {
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self { store }
    }

    /// Stored configuration for the URL's host, or the built-in default
    #[instrument(skip(self), fields(url = %url))]
    pub async fn resolve(&self, url: &Url) -> Result<DomainConfig> {
        let domain = host_of(url)?;
        match self.store.find_config(&domain).await? {
            Some(config) => {
                debug!(domain = %domain, crawler = %config.crawler, "Using stored configuration");
                Ok(config)
            }
            None => {
                debug!(domain = %domain, "No stored configuration, using default");
                Ok(DomainConfig::fallback(domain))
            }
        }
    }

    /// Stored configuration for a bare domain, without the fallback
    pub async fn get(&self, domain: &str) -> Result<Option<DomainConfig>> {
        let domain = validate_domain(domain)?;
        Ok(self.store.find_config(&domain).await?)
    }

    /// All stored configurations
    pub async fn list(&self) -> Result<Vec<DomainConfig>> {
        Ok(self.store.list_configs().await?)
    }

    /// Remove a stored configuration; returns whether one existed
    pub async fn delete(&self, domain: &str) -> Result<bool> {
        let domain = validate_domain(domain)?;
        Ok(self.store.delete_config(&domain).await?)
    }

    /// Validate and upsert a configuration
    ///
    /// Each selector entry may itself be a comma-separated list; entries are
    /// trimmed, blanks dropped, and every selector must parse.
    #[instrument(skip(self, include, exclude))]
    pub async fn save(
        &self,
        domain: &str,
        include: &[String],
        exclude: &[String],
        crawler: CrawlerKind,
        wait_for: Option<&str>,
    ) -> Result<DomainConfig> {
        let domain = validate_domain(domain)?;
        let include = parse_selector_list(include)?;
        let exclude = parse_selector_list(exclude)?;

        let wait_for = match wait_for.map(str::trim).filter(|s| !s.is_empty()) {
            Some(selector) => {
                check_selector(selector)?;
                Some(selector.to_string())
            }
            None => None,
        };

        let config = DomainConfig {
            domain,
            crawler,
            include,
            exclude,
            wait_for,
            updated_at: Some(Utc::now()),
        };

        let saved = self.store.upsert_config(&config).await?;
        debug!(domain = %saved.domain, "Saved configuration");
        Ok(saved)
    }
}

/// Flatten user-entered selector strings into a validated list
pub fn parse_selector_list(entries: &[String]) -> Result<Vec<String>> {
    let mut selectors = Vec::new();
    for entry in entries {
        if entry.len() > MAX_SELECTOR_INPUT {
            return Err(Error::InvalidConfig(format!(
                "selector list longer than {MAX_SELECTOR_INPUT} characters"
            )));
        }
        for part in split_selectors(entry) {
            check_selector(&part)?;
            if !selectors.contains(&part) {
                selectors.push(part);
            }
        }
    }
    Ok(selectors)
}

/// Split on top-level commas, leaving commas inside `()` or `[]` alone
fn split_selectors(input: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();

    for c in input.chars() {
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    parts.push(current);

    parts
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

fn check_selector(selector: &str) -> Result<()> {
    Selector::parse(selector)
        .map(|_| ())
        .map_err(|e| Error::InvalidConfig(format!("invalid selector {selector:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::DbError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct MemoryStore {
        configs: Mutex<HashMap<String, DomainConfig>>,
        lookups: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ConfigStore for MemoryStore {
        async fn find_config(&self, domain: &str) -> std::result::Result<Option<DomainConfig>, DbError> {
            self.lookups.lock().await.push(domain.to_string());
            Ok(self.configs.lock().await.get(domain).cloned())
        }

        async fn upsert_config(&self, config: &DomainConfig) -> std::result::Result<DomainConfig, DbError> {
            self.configs
                .lock()
                .await
                .insert(config.domain.clone(), config.clone());
            Ok(config.clone())
        }

        async fn list_configs(&self) -> std::result::Result<Vec<DomainConfig>, DbError> {
            let mut configs: Vec<_> = self.configs.lock().await.values().cloned().collect();
            configs.sort_by(|a, b| a.domain.cmp(&b.domain));
            Ok(configs)
        }

        async fn delete_config(&self, domain: &str) -> std::result::Result<bool, DbError> {
            Ok(self.configs.lock().await.remove(domain).is_some())
        }
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_resolve_normalizes_host_before_lookup() {
        let store = Arc::new(MemoryStore::default());
        let resolver = DomainResolver::new(store.clone());

        let url = Url::parse("https://www.Example.ORG/page").unwrap();
        let config = resolver.resolve(&url).await.unwrap();

        assert_eq!(store.lookups.lock().await.as_slice(), ["example.org"]);
        assert_eq!(config, DomainConfig::fallback("example.org"));
    }

    #[tokio::test]
    async fn test_resolve_returns_stored_config() {
        let store = Arc::new(MemoryStore::default());
        let resolver = DomainResolver::new(store);

        resolver
            .save(
                "www.greenearth.org",
                &strings(&["main, .listing"]),
                &strings(&["nav", "footer"]),
                CrawlerKind::Js,
                Some("main"),
            )
            .await
            .unwrap();

        let url = Url::parse("https://greenearth.org/events/1").unwrap();
        let config = resolver.resolve(&url).await.unwrap();

        assert_eq!(config.crawler, CrawlerKind::Js);
        assert_eq!(config.include, strings(&["main", ".listing"]));
        assert_eq!(config.exclude, strings(&["nav", "footer"]));
        assert_eq!(config.wait_for.as_deref(), Some("main"));
        assert!(!config.is_fallback());
    }

    #[tokio::test]
    async fn test_save_rejects_invalid_selector() {
        let resolver = DomainResolver::new(Arc::new(MemoryStore::default()));

        let err = resolver
            .save("example.org", &strings(&["div[[["]), &[], CrawlerKind::Get, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn test_save_rejects_oversized_input() {
        let resolver = DomainResolver::new(Arc::new(MemoryStore::default()));
        let huge = vec!["div".repeat(400)];

        let err = resolver
            .save("example.org", &huge, &[], CrawlerKind::Get, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn test_delete_and_list() {
        let resolver = DomainResolver::new(Arc::new(MemoryStore::default()));
        for domain in ["b.org", "a.org"] {
            resolver
                .save(domain, &strings(&["main"]), &[], CrawlerKind::Get, None)
                .await
                .unwrap();
        }

        let domains: Vec<_> = resolver
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.domain)
            .collect();
        assert_eq!(domains, strings(&["a.org", "b.org"]));

        assert!(resolver.delete("www.a.org").await.unwrap());
        assert!(!resolver.delete("a.org").await.unwrap());
        assert!(resolver.get("a.org").await.unwrap().is_none());
    }

    #[test]
    fn test_split_respects_brackets() {
        assert_eq!(
            split_selectors("div:not(.a, .b), a[title=\"x,y\"] , ,main"),
            strings(&["div:not(.a, .b)", "a[title=\"x,y\"]", "main"])
        );
    }
}
