use once_cell::sync::Lazy;
use regex::Regex;

use crate::dom::{Document, NodeId, SelectorList};

static INLINE_SPACE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t\x{a0}]+").expect("valid whitespace regex"));

const NARROW_CLASS: &str = "narrow";

/// Shapes of content unit the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    /// Rich `<article>` container; the text lives in a nested node.
    Article,
    /// Plain container whose whole text is the content.
    Narrow,
}

impl UnitKind {
    pub fn detect(doc: &Document, unit: NodeId) -> Option<Self> {
        if doc.tag(unit) == Some("article") {
            Some(UnitKind::Article)
        } else if doc.has_class(unit, NARROW_CLASS) {
            Some(UnitKind::Narrow)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct TextExtractor {
    article_text: SelectorList,
}

impl TextExtractor {
    pub fn new(article_text: SelectorList) -> Self {
        Self { article_text }
    }

    /// Classifiable text of `unit`, or `None` when there is none.
    pub fn extract(&self, doc: &Document, unit: NodeId) -> Option<String> {
        let raw = match UnitKind::detect(doc, unit)? {
            UnitKind::Article => doc.text_content(doc.query_first(unit, &self.article_text)?),
            UnitKind::Narrow => doc.text_content(unit),
        };
        normalize(&raw)
    }
}

fn normalize(raw: &str) -> Option<String> {
    let text = raw
        .lines()
        .map(|line| INLINE_SPACE_REGEX.replace_all(line.trim(), " "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    (!text.is_empty()).then_some(text)
}
