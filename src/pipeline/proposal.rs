//! Include/exclude selector proposals for the configuration tooling
//!
//! A model proposal is tried first when a model is chosen; anything that
//! goes wrong with it (no provider, failed call, unparsable selectors, empty
//! include list) drops to a structural heuristic over the document.

use schemars::JsonSchema;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::parse_selector_list;
use crate::extraction::Extractor;
use crate::model::{ModelChoice, ToolRequest, ToolSchema};
use crate::reducer::{element_text, truncate_at_char_boundary};

pub const PROPOSE_TOOL_NAME: &str = "propose_selectors";

const SYSTEM_PROMPT: &str = "You analyze raw HTML of a single volunteer opportunity page and propose minimal CSS include selectors \
capturing ONLY the core descriptive content and exclude selectors removing surrounding boilerplate. Keep selectors short.";

/// Bound on the markup sent with a proposal request
const MAX_PROPOSAL_HTML: usize = 100_000;

const CONTAINER_TAGS: &[&str] = &["main", "article", "section", "div"];

const BOILERPLATE_TAGS: &[&str] = &["nav", "header", "footer", "aside", "form"];

/// Arguments of the `propose_selectors` tool
#[derive(Debug, Deserialize, JsonSchema)]
struct SelectorArgs {
    /// Comma-separated CSS selectors for the main opportunity content (e.g. 'main, article, .event-details').
    include: String,

    /// Comma-separated selectors to remove navigation, headers, footers, sidebars, share widgets (e.g. 'nav, footer, header, aside, .share').
    #[serde(default)]
    exclude: String,
}

/// Where a proposal came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProposalSource {
    Model,
    Heuristic,
}

/// Candidate selectors for human review
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedSelectors {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub source: ProposalSource,
}

pub(crate) fn proposal_request(raw_html: &str, url: &str) -> ToolRequest {
    let mut html = raw_html.to_string();
    truncate_at_char_boundary(&mut html, MAX_PROPOSAL_HTML);

    ToolRequest {
        system: SYSTEM_PROMPT.to_string(),
        user: format!("URL: {url}\nRaw HTML:\n{html}\nReturn selectors via the tool."),
        tool: ToolSchema::for_type::<SelectorArgs>(
            PROPOSE_TOOL_NAME,
            "Return include / exclude selector strings.",
        ),
    }
}

/// Propose selectors, asking `model` first when one is given
pub(crate) async fn propose(
    extractor: &Extractor,
    raw_html: &str,
    url: &str,
    model: Option<ModelChoice>,
) -> ProposedSelectors {
    if let Some(choice) = model {
        match from_model(extractor, raw_html, url, choice).await {
            Ok(proposal) => return proposal,
            Err(reason) => {
                warn!(url, model = %choice, reason = %reason, "Selector proposal failed, using heuristic")
            }
        }
    }
    heuristic(raw_html)
}

async fn from_model(
    extractor: &Extractor,
    raw_html: &str,
    url: &str,
    choice: ModelChoice,
) -> Result<ProposedSelectors, String> {
    let request = proposal_request(raw_html, url);
    let value = extractor
        .invoke_tool(choice, &request)
        .await
        .map_err(|e| e.to_string())?;

    let args: SelectorArgs = serde_json::from_value(value).map_err(|e| e.to_string())?;
    let include = parse_selector_list(&[args.include]).map_err(|e| e.to_string())?;
    if include.is_empty() {
        return Err("model proposed no include selectors".to_string());
    }
    let exclude = parse_selector_list(&[args.exclude]).map_err(|e| e.to_string())?;

    debug!(?include, ?exclude, "Model proposed selectors");
    Ok(ProposedSelectors {
        include,
        exclude,
        source: ProposalSource::Model,
    })
}

/// Largest text container as include, present boilerplate elements as exclude
pub(crate) fn heuristic(raw_html: &str) -> ProposedSelectors {
    let document = Html::parse_document(raw_html);

    let mut best = "body".to_string();
    let mut largest = 0usize;
    for tag in CONTAINER_TAGS {
        let Ok(selector) = Selector::parse(tag) else {
            continue;
        };
        for element in document.select(&selector) {
            let len = element_text(element).chars().filter(|c| !c.is_whitespace()).count();
            if len > largest {
                largest = len;
                best = selector_for(element, tag);
            }
        }
    }

    let exclude = BOILERPLATE_TAGS
        .iter()
        .filter(|tag| {
            Selector::parse(tag)
                .map(|selector| document.select(&selector).next().is_some())
                .unwrap_or(false)
        })
        .map(|tag| tag.to_string())
        .collect();

    ProposedSelectors {
        include: vec![best],
        exclude,
        source: ProposalSource::Heuristic,
    }
}

/// `#id`, else up to two classes, else the bare tag
fn selector_for(element: ElementRef<'_>, tag: &str) -> String {
    let value = element.value();
    if let Some(id) = value.id().filter(|id| is_plain_ident(id)) {
        return format!("#{id}");
    }

    let classes: Vec<&str> = value.classes().filter(|c| is_plain_ident(c)).take(2).collect();
    if !classes.is_empty() {
        return format!(".{}", classes.join("."));
    }

    tag.to_string()
}

fn is_plain_ident(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::ExtractionError;
    use crate::model::mock_model::MockProvider;
    use crate::model::{ExtractionProvider, ProviderError};
    use serde_json::json;
    use std::sync::Arc;

    const PAGE: &str = r#"<html><body>
        <header>Site header</header>
        <nav>Home | About</nav>
        <div class="wrapper">
          <main id="content"><h1>River Cleanup</h1><p>Join Friends of the River on Saturday.</p></main>
        </div>
        <footer>Copyright</footer>
    </body></html>"#;

    fn extractor(mock: &MockProvider) -> Extractor {
        Extractor::new(vec![(
            ModelChoice::Gemini,
            Arc::new(mock.clone()) as Arc<dyn ExtractionProvider>,
        )])
    }

    #[test]
    fn test_heuristic_prefers_largest_container() {
        let proposal = heuristic(PAGE);
        assert_eq!(proposal.include, vec!["#content"]);
        assert_eq!(proposal.exclude, vec!["nav", "header", "footer"]);
        assert_eq!(proposal.source, ProposalSource::Heuristic);
    }

    #[test]
    fn test_heuristic_uses_classes_then_tag() {
        let proposal = heuristic(r#"<body><div class="event-card"><p>Text here</p></div></body>"#);
        assert_eq!(proposal.include, vec![".event-card"]);

        let proposal = heuristic("<body><section><p>Only text</p></section></body>");
        assert_eq!(proposal.include, vec!["section"]);

        let proposal = heuristic("<body><p>No containers</p></body>");
        assert_eq!(proposal.include, vec!["body"]);
        assert!(proposal.exclude.is_empty());
    }

    #[tokio::test]
    async fn test_model_proposal_is_validated() {
        let mock = MockProvider::new(
            "gemini",
            vec![Ok(json!({"include": "main, .details", "exclude": "nav,footer"}))],
        );

        let proposal = propose(&extractor(&mock), PAGE, "https://river.org/e", Some(ModelChoice::Gemini)).await;

        assert_eq!(proposal.source, ProposalSource::Model);
        assert_eq!(proposal.include, vec!["main", ".details"]);
        assert_eq!(proposal.exclude, vec!["nav", "footer"]);

        let requests = mock.requests().await;
        assert_eq!(requests[0].tool.name, PROPOSE_TOOL_NAME);
        assert!(requests[0].user.contains("River Cleanup"));
    }

    #[tokio::test]
    async fn test_bad_model_proposal_falls_back() {
        let mock = MockProvider::new(
            "gemini",
            vec![
                Ok(json!({"include": "main >>> ???", "exclude": ""})),
                Err(ProviderError::Timeout),
            ],
        );
        let extractor = extractor(&mock);

        let invalid = propose(&extractor, PAGE, "https://river.org/e", Some(ModelChoice::Gemini)).await;
        assert_eq!(invalid.source, ProposalSource::Heuristic);

        let failed = propose(&extractor, PAGE, "https://river.org/e", Some(ModelChoice::Gemini)).await;
        assert_eq!(failed.include, vec!["#content"]);
    }

    #[tokio::test]
    async fn test_no_model_skips_provider() {
        let mock = MockProvider::new("gemini", vec![]);
        let proposal = propose(&extractor(&mock), PAGE, "https://river.org/e", None).await;

        assert_eq!(proposal.source, ProposalSource::Heuristic);
        assert_eq!(mock.call_count().await, 0);
    }

    #[tokio::test]
    async fn test_no_providers_is_reported() {
        let err = Extractor::new(Vec::new())
            .invoke_tool(ModelChoice::Gpt, &proposal_request(PAGE, "https://river.org/e"))
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::NoProviders));
    }
}
