use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use super::{Document, NodeId};

static COMPOUND_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"^([A-Za-z][A-Za-z0-9_-]*)?((?:\.[A-Za-z0-9_-]+|\[[A-Za-z0-9_-]+(?:=(?:"[^"]*"|'[^']*'|[^\]"']*))?\])*)$"#,
    )
    .expect("valid selector regex")
});
static PART_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\.([A-Za-z0-9_-]+)|\[([A-Za-z0-9_-]+)(?:=("[^"]*"|'[^']*'|[^\]"']*))?\]"#)
        .expect("valid selector part regex")
});

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectorError {
    #[error("empty selector")]
    Empty,
    #[error("unsupported selector syntax: `{0}`")]
    Unsupported(String),
}

/// A compound selector: optional tag, any number of `.class` and `[attr]`
/// / `[attr="value"]` conditions. Combinators are not supported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    tag: Option<String>,
    classes: Vec<String>,
    attrs: Vec<(String, Option<String>)>,
}

impl Selector {
    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        let Some(tag) = doc.tag(node) else {
            return false;
        };
        if let Some(expected) = &self.tag {
            if !expected.eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if !self.classes.iter().all(|class| doc.has_class(node, class)) {
            return false;
        }
        self.attrs.iter().all(|(name, value)| match (doc.attr(node, name), value) {
            (Some(_), None) => true,
            (Some(actual), Some(expected)) => actual == expected,
            (None, _) => false,
        })
    }
}

impl FromStr for Selector {
    type Err = SelectorError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(SelectorError::Empty);
        }
        let captures = COMPOUND_REGEX
            .captures(raw)
            .ok_or_else(|| SelectorError::Unsupported(raw.to_string()))?;

        let tag = captures.get(1).map(|m| m.as_str().to_ascii_lowercase());
        let mut classes = Vec::new();
        let mut attrs = Vec::new();
        if let Some(rest) = captures.get(2) {
            for part in PART_REGEX.captures_iter(rest.as_str()) {
                if let Some(class) = part.get(1) {
                    classes.push(class.as_str().to_string());
                } else if let Some(name) = part.get(2) {
                    let value = part.get(3).map(|m| unquote(m.as_str()).to_string());
                    attrs.push((name.as_str().to_string(), value));
                }
            }
        }
        Ok(Self {
            tag,
            classes,
            attrs,
        })
    }
}

/// Comma-separated selector group; a node matches if any member matches.
/// Commas inside `[...]` or quotes belong to the member, not the list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorList(Vec<Selector>);

impl SelectorList {
    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        self.0.iter().any(|selector| selector.matches(doc, node))
    }
}

impl FromStr for SelectorList {
    type Err = SelectorError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let selectors = split_members(raw)
            .into_iter()
            .map(str::parse::<Selector>)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self(selectors))
    }
}

fn split_members(raw: &str) -> Vec<&str> {
    let mut members = Vec::new();
    let mut quote: Option<char> = None;
    let mut depth = 0usize;
    let mut start = 0;
    for (idx, ch) in raw.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(ch),
            (None, '[') => depth += 1,
            (None, ']') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                members.push(&raw[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    members.push(&raw[start..]);
    members
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
        .unwrap_or(value)
}
