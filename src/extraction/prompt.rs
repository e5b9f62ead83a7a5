use crate::model::{ToolRequest, ToolSchema};

use super::VolunteerOpportunity;

pub const EXTRACT_TOOL_NAME: &str = "extract_volunteer_opportunity";

const SYSTEM_PROMPT: &str = "You extract structured, concise volunteer opportunity data from the text of one web page. \
Call the tool exactly once. Fill a field only when the page supports it; leave anything you cannot infer confidently empty instead of guessing.";

const STRICT_SUFFIX: &str = " Your previous answer was rejected. `title` and `organization` are required and must be non-empty strings taken from the page text. \
List fields must be JSON arrays of strings. Dates must be YYYY-MM-DD or empty.";

/// Which instruction variant to send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptMode {
    Normal,
    /// Re-prompt after a rejected answer
    Strict,
}

pub fn extraction_tool() -> ToolSchema {
    ToolSchema::for_type::<VolunteerOpportunity>(
        EXTRACT_TOOL_NAME,
        "Record the volunteer opportunity described on the page.",
    )
}

pub fn extraction_request(text: &str, source_url: &str, mode: PromptMode) -> ToolRequest {
    let system = match mode {
        PromptMode::Normal => SYSTEM_PROMPT.to_string(),
        PromptMode::Strict => format!("{SYSTEM_PROMPT}{STRICT_SUFFIX}"),
    };

    ToolRequest {
        system,
        user: format!("URL: {source_url}\nPage Text:\n{text}"),
        tool: extraction_tool(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_prompt_extends_normal_prompt() {
        let normal = extraction_request("Beach", "https://example.org", PromptMode::Normal);
        let strict = extraction_request("Beach", "https://example.org", PromptMode::Strict);

        assert!(strict.system.starts_with(&normal.system));
        assert!(strict.system.contains("rejected"));
        assert_eq!(normal.user, "URL: https://example.org\nPage Text:\nBeach");
        assert_eq!(normal.tool.name, EXTRACT_TOOL_NAME);
    }
}
