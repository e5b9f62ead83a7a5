//! Visible-text extraction over a parsed document

use std::collections::HashSet;

use ego_tree::NodeId;
use ego_tree::iter::Edge;
use scraper::{ElementRef, Node};

/// Elements that never contribute text
pub(crate) const ALWAYS_STRIPPED: &[&str] = &["script", "style", "noscript", "template"];

const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "body", "caption", "dd", "details", "dialog",
    "div", "dl", "dt", "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2", "h3",
    "h4", "h5", "h6", "header", "hr", "html", "legend", "li", "main", "nav", "ol", "option", "p",
    "pre", "section", "summary", "table", "tbody", "tfoot", "thead", "tr", "ul",
];

const CELL_ELEMENTS: &[&str] = &["td", "th"];

fn is_block(name: &str) -> bool {
    BLOCK_ELEMENTS.contains(&name)
}

/// Accumulates text, collapsing whitespace runs and dropping blank lines
#[derive(Debug, Default)]
pub(crate) struct TextBuffer {
    lines: Vec<String>,
    current: String,
    pending_space: bool,
}

impl TextBuffer {
    pub(crate) fn push_text(&mut self, text: &str) {
        for c in text.chars() {
            if c.is_whitespace() {
                self.pending_space = !self.current.is_empty();
            } else {
                if self.pending_space {
                    self.current.push(' ');
                    self.pending_space = false;
                }
                self.current.push(c);
            }
        }
    }

    pub(crate) fn push_space(&mut self) {
        self.pending_space = !self.current.is_empty();
    }

    pub(crate) fn break_line(&mut self) {
        if !self.current.is_empty() {
            self.lines.push(std::mem::take(&mut self.current));
        }
        self.pending_space = false;
    }

    pub(crate) fn finish(mut self) -> String {
        self.break_line();
        self.lines.join("\n")
    }
}

/// Append the visible text under `root`, skipping the subtrees in `excluded`
pub(crate) fn collect_text(root: ElementRef<'_>, excluded: &HashSet<NodeId>, buf: &mut TextBuffer) {
    let mut skipping: Option<NodeId> = None;

    for edge in root.traverse() {
        match edge {
            Edge::Open(node) => {
                if skipping.is_some() {
                    continue;
                }
                match node.value() {
                    Node::Element(element) => {
                        let name = element.name();
                        if excluded.contains(&node.id()) || ALWAYS_STRIPPED.contains(&name) {
                            skipping = Some(node.id());
                        } else if name == "br" || is_block(name) {
                            buf.break_line();
                        } else if CELL_ELEMENTS.contains(&name) {
                            buf.push_space();
                        }
                    }
                    Node::Text(text) => buf.push_text(text),
                    _ => {}
                }
            }
            Edge::Close(node) => {
                if let Some(id) = skipping {
                    if id == node.id() {
                        skipping = None;
                    }
                    continue;
                }
                if let Node::Element(element) = node.value() {
                    let name = element.name();
                    if is_block(name) {
                        buf.break_line();
                    } else if CELL_ELEMENTS.contains(&name) {
                        buf.push_space();
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_collapses_whitespace() {
        let mut buf = TextBuffer::default();
        buf.push_text("  Join \n\t us ");
        buf.push_text("today");
        buf.break_line();
        buf.break_line();
        buf.push_text("   ");
        buf.push_text("Second\u{a0} line ");

        assert_eq!(buf.finish(), "Join us today\nSecond line");
    }

    #[test]
    fn test_inline_elements_do_not_break_lines() {
        let html = scraper::Html::parse_document(
            "<body><p>Meet at <b>Pier 3</b>, 9am<br>Bring gloves</p><table><tr><td>Sat</td><td>Sun</td></tr></table></body>",
        );
        let mut buf = TextBuffer::default();
        collect_text(html.root_element(), &HashSet::new(), &mut buf);

        assert_eq!(buf.finish(), "Meet at Pier 3, 9am\nBring gloves\nSat Sun");
    }
}
