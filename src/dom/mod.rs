//! In-process document tree standing in for the page DOM.
//!
//! Nodes live in an arena and are addressed by [`NodeId`]. Ids are never
//! reused: removing a node only detaches it, so a stale id still resolves
//! and reports `is_attached() == false`. Structural mutations of the
//! attached tree bump a generation counter published on a `watch` channel,
//! which is what the mutation watcher listens to.

mod event;
mod selector;

use std::{fmt, fmt::Write as _, num::ParseIntError, str::FromStr, sync::Arc};

use parking_lot::Mutex;
use tokio::sync::watch;

pub use event::{ClickEvent, ClickOutcome, Listener};
pub use selector::{SelectorError, SelectorList};

const BLOCK_TAGS: &[&str] = &[
    "article",
    "blockquote",
    "br",
    "div",
    "footer",
    "h1",
    "h2",
    "h3",
    "h4",
    "header",
    "li",
    "main",
    "ol",
    "p",
    "section",
    "ul",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NodeId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<usize>().map(NodeId)
    }
}

#[derive(Clone)]
enum NodeKind {
    Element {
        tag: String,
        classes: Vec<String>,
        attrs: Vec<(String, String)>,
    },
    Text(String),
}

#[derive(Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    listeners: Vec<Listener>,
}

pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
    generation: u64,
    changes: watch::Sender<u64>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Creates a document whose root is an empty `<body>`.
    pub fn new() -> Self {
        let (changes, _) = watch::channel(0);
        let mut doc = Self {
            nodes: Vec::new(),
            root: NodeId(0),
            generation: 0,
            changes,
        };
        doc.root = doc.create_element("body");
        doc
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    #[cfg(test)]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(NodeKind::Element {
            tag: tag.to_ascii_lowercase(),
            classes: Vec::new(),
            attrs: Vec::new(),
        })
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeKind::Text(text.to_string()))
    }

    /// Creates an element with the given classes and appends it to `parent`.
    pub fn append_element(&mut self, parent: NodeId, tag: &str, classes: &[&str]) -> NodeId {
        let node = self.create_element(tag);
        for class in classes {
            self.add_class(node, class);
        }
        self.append_child(parent, node);
        node
    }

    pub fn append_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        let node = self.create_text(text);
        self.append_child(parent, node);
        node
    }

    /// Moves `child` under `parent`, detaching it from any previous parent.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[parent.0].children.push(child);
        self.nodes[child.0].parent = Some(parent);
        if self.is_attached(parent) {
            self.touch();
        }
    }

    /// Detaches `node` from its parent. The subtree stays addressable.
    pub fn remove(&mut self, node: NodeId) {
        let was_attached = self.is_attached(node);
        self.detach(node);
        if was_attached {
            self.touch();
        }
    }

    pub fn clear_children(&mut self, node: NodeId) {
        let children = std::mem::take(&mut self.nodes[node.0].children);
        if children.is_empty() {
            return;
        }
        for child in children {
            self.nodes[child.0].parent = None;
        }
        if self.is_attached(node) {
            self.touch();
        }
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.0].children
    }

    #[cfg(test)]
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node.0).and_then(|n| n.parent)
    }

    pub fn contains(&self, node: NodeId) -> bool {
        node.0 < self.nodes.len()
    }

    pub fn is_attached(&self, node: NodeId) -> bool {
        if !self.contains(node) {
            return false;
        }
        let mut current = node;
        loop {
            if current == self.root {
                return true;
            }
            match self.nodes[current.0].parent {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    pub fn tag(&self, node: NodeId) -> Option<&str> {
        match &self.nodes.get(node.0)?.kind {
            NodeKind::Element { tag, .. } => Some(tag.as_str()),
            NodeKind::Text(_) => None,
        }
    }

    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        match &self.nodes[node.0].kind {
            NodeKind::Element { classes, .. } => classes.iter().any(|c| c == class),
            NodeKind::Text(_) => false,
        }
    }

    /// No-op for text nodes and for classes already present.
    pub fn add_class(&mut self, node: NodeId, class: &str) {
        if let NodeKind::Element { classes, .. } = &mut self.nodes[node.0].kind {
            if !classes.iter().any(|c| c == class) {
                classes.push(class.to_string());
            }
        }
    }

    pub fn remove_class(&mut self, node: NodeId, class: &str) {
        if let NodeKind::Element { classes, .. } = &mut self.nodes[node.0].kind {
            classes.retain(|c| c != class);
        }
    }

    pub fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        match &self.nodes[node.0].kind {
            NodeKind::Element { attrs, .. } => attrs
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str()),
            NodeKind::Text(_) => None,
        }
    }

    pub fn set_attr(&mut self, node: NodeId, name: &str, value: &str) {
        if let NodeKind::Element { attrs, .. } = &mut self.nodes[node.0].kind {
            match attrs.iter_mut().find(|(key, _)| key == name) {
                Some((_, existing)) => *existing = value.to_string(),
                None => attrs.push((name.to_string(), value.to_string())),
            }
        }
    }

    pub fn add_listener(&mut self, node: NodeId, listener: Listener) {
        self.nodes[node.0].listeners.push(listener);
    }

    /// Rendered text of the subtree. Block-level elements are separated by
    /// line breaks, roughly like `innerText`.
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    /// Descendants of `scope` (excluding `scope`) matching `selectors`, in
    /// document order.
    pub fn query_all(&self, scope: NodeId, selectors: &SelectorList) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut stack: Vec<NodeId> = self.nodes[scope.0].children.iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            if selectors.matches(self, node) {
                found.push(node);
            }
            stack.extend(self.nodes[node.0].children.iter().rev().copied());
        }
        found
    }

    pub fn query_first(&self, scope: NodeId, selectors: &SelectorList) -> Option<NodeId> {
        self.query_all(scope, selectors).into_iter().next()
    }

    pub fn outer_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_html(node, &mut out, false);
        out
    }

    /// Like [`Document::outer_html`], with a `data-node` attribute on every
    /// element so an operator can address nodes by id.
    pub fn annotated_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_html(node, &mut out, true);
        out
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            parent: None,
            children: Vec::new(),
            listeners: Vec::new(),
        });
        id
    }

    fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node.0].parent.take() {
            self.nodes[parent.0].children.retain(|c| *c != node);
        }
    }

    fn touch(&mut self) {
        self.generation += 1;
        self.changes.send_replace(self.generation);
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        match &self.nodes[node.0].kind {
            NodeKind::Text(text) => out.push_str(text),
            NodeKind::Element { tag, .. } => {
                let block = BLOCK_TAGS.contains(&tag.as_str());
                if block && !out.is_empty() && !out.ends_with('\n') {
                    out.push('\n');
                }
                for child in &self.nodes[node.0].children {
                    self.collect_text(*child, out);
                }
                if block && !out.is_empty() && !out.ends_with('\n') {
                    out.push('\n');
                }
            }
        }
    }

    fn write_html(&self, node: NodeId, out: &mut String, annotate: bool) {
        match &self.nodes[node.0].kind {
            NodeKind::Text(text) => out.push_str(&escape_html(text)),
            NodeKind::Element {
                tag,
                classes,
                attrs,
            } => {
                out.push('<');
                out.push_str(tag);
                if annotate {
                    let _ = write!(out, " data-node=\"{}\"", node.0);
                }
                if !classes.is_empty() {
                    let _ = write!(out, " class=\"{}\"", escape_html(&classes.join(" ")));
                }
                for (name, value) in attrs {
                    let _ = write!(out, " {}=\"{}\"", name, escape_html(value));
                }
                out.push('>');
                for child in &self.nodes[node.0].children {
                    self.write_html(*child, out, annotate);
                }
                let _ = write!(out, "</{}>", tag);
            }
        }
    }

    /// Listeners along the bubble path, target first.
    fn bubble_path(&self, target: NodeId) -> Vec<Vec<Listener>> {
        let mut path = Vec::new();
        let mut current = Some(target);
        while let Some(node) = current {
            path.push(self.nodes[node.0].listeners.clone());
            current = self.nodes[node.0].parent;
        }
        path
    }

    fn enclosing_link(&self, target: NodeId) -> Option<String> {
        let mut current = Some(target);
        while let Some(node) = current {
            if self.tag(node) == Some("a") {
                if let Some(href) = self.attr(node, "href") {
                    return Some(href.to_string());
                }
            }
            current = self.nodes[node.0].parent;
        }
        None
    }
}

/// Cloneable handle to a document shared between the scanner, the
/// presentation controller and the feed.
#[derive(Clone)]
pub struct SharedDocument {
    inner: Arc<Mutex<Document>>,
}

impl SharedDocument {
    pub fn new(document: Document) -> Self {
        Self {
            inner: Arc::new(Mutex::new(document)),
        }
    }

    pub fn read<R>(&self, f: impl FnOnce(&Document) -> R) -> R {
        f(&self.inner.lock())
    }

    pub fn write<R>(&self, f: impl FnOnce(&mut Document) -> R) -> R {
        f(&mut self.inner.lock())
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.lock().subscribe()
    }

    /// Dispatches a click on `target`, bubbling towards the root. The lock is
    /// released while listeners run so they can mutate the document.
    pub fn click(&self, target: NodeId) -> ClickOutcome {
        let Some((path, link)) = self.read(|doc| {
            doc.contains(target)
                .then(|| (doc.bubble_path(target), doc.enclosing_link(target)))
        }) else {
            return ClickOutcome::default();
        };

        let mut event = ClickEvent::new();
        let mut outcome = ClickOutcome::default();
        for listeners in path {
            for listener in listeners {
                listener(&mut event);
                outcome.listeners_invoked += 1;
            }
            if event.is_propagation_stopped() {
                break;
            }
        }

        outcome.default_prevented = event.is_default_prevented();
        outcome.propagation_stopped = event.is_propagation_stopped();
        if !outcome.default_prevented {
            outcome.navigated_to = link;
        }
        outcome
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
