//! # Content Reducer Module
//!
//! Reduces raw page markup to the bounded text payload handed to the
//! extraction model, driven by a domain's include/exclude selectors.
//!
//! ## Rules
//!
//! - Include matches are collected in document order; a match nested inside
//!   another match is only read once, through its ancestor.
//! - Excluded subtrees never contribute text, even when an include selector
//!   matches inside them.
//! - When no include selector matches, the whole `<body>` is used instead.
//! - `script`, `style`, `noscript` and `template` are always dropped.
//!
//! Reduction is pure and synchronous: the same markup and configuration always
//! produce the same text.

mod text;

use std::collections::HashSet;

use ego_tree::NodeId;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::config::Settings;
use crate::domain::DomainConfig;
use text::{TextBuffer, collect_text};

/// Error type for content reduction
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReductionError {
    /// Nothing readable remained after selection and fallback
    #[error("page has no extractable text")]
    NoContent,
}

/// Options for the reducer
#[derive(Debug, Clone, Copy)]
pub struct ReducerOptions {
    /// Upper bound on the returned text, in bytes
    pub max_bytes: usize,
}

impl Default for ReducerOptions {
    fn default() -> Self {
        Self { max_bytes: 40_000 }
    }
}

impl ReducerOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            max_bytes: settings.max_content_bytes,
        }
    }
}

/// Text left after reduction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanedContent {
    pub text: String,

    /// True when no include selector matched and the whole body was used
    #[serde(default)]
    pub include_fallback: bool,

    /// True when the text was cut to the byte bound
    #[serde(default)]
    pub truncated: bool,
}

/// Reduce `raw_html` to cleaned text using the selectors in `config`
#[instrument(skip(raw_html, config, options), fields(domain = %config.domain, bytes = raw_html.len()))]
pub fn reduce(
    raw_html: &str,
    config: &DomainConfig,
    options: &ReducerOptions,
) -> Result<CleanedContent, ReductionError> {
    let document = Html::parse_document(raw_html);

    let excluded: HashSet<NodeId> = compile(&config.exclude)
        .iter()
        .flat_map(|selector| document.select(selector).map(|el| el.id()))
        .collect();

    let matched: HashSet<NodeId> = compile(&config.include)
        .iter()
        .flat_map(|selector| document.select(selector).map(|el| el.id()))
        .collect();

    let mut roots = include_roots(&document, &matched, &excluded);
    let include_fallback = roots.is_empty();
    if include_fallback {
        if !config.include.is_empty() {
            warn!(
                domain = %config.domain,
                include = ?config.include,
                "No include selector matched, falling back to the whole document"
            );
        }
        roots.push(body_of(&document));
    }

    let mut buf = TextBuffer::default();
    for root in roots {
        collect_text(root, &excluded, &mut buf);
        buf.break_line();
    }
    let mut text = buf.finish();

    let limit = options.max_bytes.min(raw_html.len());
    let truncated = text.len() > limit;
    if truncated {
        truncate_at_char_boundary(&mut text, limit);
        debug!(limit, "Cleaned text truncated");
    }

    if text.trim().is_empty() {
        return Err(ReductionError::NoContent);
    }

    debug!(chars = text.len(), include_fallback, "Reduced page");
    Ok(CleanedContent {
        text,
        include_fallback,
        truncated,
    })
}

/// All visible text of a document, with no selectors applied
pub fn visible_text(raw_html: &str) -> String {
    let document = Html::parse_document(raw_html);
    let mut buf = TextBuffer::default();
    collect_text(body_of(&document), &HashSet::new(), &mut buf);
    buf.finish()
}

/// Visible text under a single element
pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    let mut buf = TextBuffer::default();
    collect_text(element, &HashSet::new(), &mut buf);
    buf.finish()
}

fn compile(selectors: &[String]) -> Vec<Selector> {
    selectors
        .iter()
        .filter_map(|raw| match Selector::parse(raw) {
            Ok(selector) => Some(selector),
            Err(e) => {
                warn!("Skipping invalid selector '{}': {}", raw, e);
                None
            }
        })
        .collect()
}

/// Outermost include matches, in document order, outside excluded subtrees
fn include_roots<'a>(
    document: &'a Html,
    matched: &HashSet<NodeId>,
    excluded: &HashSet<NodeId>,
) -> Vec<ElementRef<'a>> {
    if matched.is_empty() {
        return Vec::new();
    }

    document
        .tree
        .root()
        .descendants()
        .filter(|node| matched.contains(&node.id()))
        .filter(|node| {
            !excluded.contains(&node.id())
                && node
                    .ancestors()
                    .all(|a| !matched.contains(&a.id()) && !excluded.contains(&a.id()))
        })
        .filter_map(ElementRef::wrap)
        .collect()
}

fn body_of(document: &Html) -> ElementRef<'_> {
    let root = document.root_element();
    root.children()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "body")
        .unwrap_or(root)
}

pub(crate) fn truncate_at_char_boundary(text: &mut String, limit: usize) {
    let mut end = limit.min(text.len());
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text.truncate(end);
    let trimmed = text.trim_end().len();
    text.truncate(trimmed);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(include: &[&str], exclude: &[&str]) -> DomainConfig {
        let mut config = DomainConfig::fallback("example.org");
        config.include = include.iter().map(|s| s.to_string()).collect();
        config.exclude = exclude.iter().map(|s| s.to_string()).collect();
        config
    }

    fn run(html: &str, include: &[&str], exclude: &[&str]) -> CleanedContent {
        reduce(html, &config(include, exclude), &ReducerOptions::default()).unwrap()
    }

    #[test]
    fn test_include_main_excludes_nav() {
        let html = "<body><nav>Home</nav><main>Join us! Volunteer Fair, Org: Green Earth</main></body>";
        let cleaned = run(html, &["main"], &["nav"]);

        assert!(cleaned.text.contains("Join us! Volunteer Fair, Org: Green Earth"));
        assert!(!cleaned.text.contains("Home"));
        assert!(!cleaned.include_fallback);
    }

    #[test]
    fn test_unmatched_include_falls_back_to_body() {
        let html = "<html><head><title>Ignored</title></head><body><div>Tree planting</div><footer>Contact</footer></body></html>";
        let cleaned = run(html, &[".does-not-exist"], &["footer"]);

        assert_eq!(cleaned.text, "Tree planting");
        assert!(cleaned.include_fallback);
    }

    #[test]
    fn test_exclude_wins_over_include_on_same_subtree() {
        let html = "<body><section class=\"card\">Secret</section><p>Public</p></body>";
        let cleaned = run(html, &[".card"], &[".card"]);

        assert!(!cleaned.text.contains("Secret"));
        assert_eq!(cleaned.text, "Public");
    }

    #[test]
    fn test_include_inside_excluded_subtree_is_ignored() {
        let html = "<body><aside><p class=\"x\">Sidebar</p></aside><main><p class=\"x\">Body copy</p></main></body>";
        let cleaned = run(html, &[".x"], &["aside"]);

        assert_eq!(cleaned.text, "Body copy");
    }

    #[test]
    fn test_matches_in_document_order_without_duplicates() {
        let html = "<body><div class=\"a\">First <p>inner</p></div><div class=\"b\">Second</div></body>";
        let cleaned = run(html, &[".b", "p", ".a"], &[]);

        assert_eq!(cleaned.text, "First\ninner\nSecond");
    }

    #[test]
    fn test_scripts_and_styles_never_contribute() {
        let html = "<body><script>var x = 'hidden';</script><style>p{}</style><noscript>enable js</noscript><p>Visible</p></body>";
        let cleaned = run(html, &[], &[]);

        assert_eq!(cleaned.text, "Visible");
    }

    #[test]
    fn test_reduction_is_idempotent() {
        let html = "<body><main><h1>Food bank</h1><ul><li>Mon</li><li>Wed</li></ul></main></body>";
        let cfg = config(&["main"], &[]);
        let first = reduce(html, &cfg, &ReducerOptions::default()).unwrap();
        let second = reduce(html, &cfg, &ReducerOptions::default()).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.text, "Food bank\nMon\nWed");
    }

    #[test]
    fn test_empty_page_is_no_content() {
        let err = reduce(
            "<html><body> <script>x()</script> </body></html>",
            &config(&["main"], &[]),
            &ReducerOptions::default(),
        )
        .unwrap_err();

        assert_eq!(err, ReductionError::NoContent);
    }

    #[test]
    fn test_text_is_truncated_on_char_boundary() {
        let html = format!("<body><p>{}</p></body>", "é".repeat(50));
        let cleaned = reduce(
            &html,
            &config(&[], &[]),
            &ReducerOptions { max_bytes: 11 },
        )
        .unwrap();

        assert!(cleaned.truncated);
        assert_eq!(cleaned.text, "é".repeat(5));
    }

    #[test]
    fn test_output_never_longer_than_input() {
        let html = "<p>a</p><p>b</p>";
        let cleaned = run(html, &[], &[]);

        assert!(cleaned.text.len() <= html.len());
    }

    #[test]
    fn test_invalid_selector_is_skipped() {
        let html = "<body><main>Kept</main><nav>Menu</nav></body>";
        let cleaned = run(html, &["main", "div[[["], &["nav"]);

        assert_eq!(cleaned.text, "Kept");
    }

    #[test]
    fn test_visible_text_ignores_head() {
        let text = visible_text("<html><head><title>T</title></head><body><h2>Hi</h2>there</body></html>");
        assert_eq!(text, "Hi\nthere");
    }
}
