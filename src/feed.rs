//! Replays a recorded feed into the document the way an infinite-scroll
//! page appends posts.

use std::{path::Path, time::Duration};

use anyhow::{Context, Result};
use serde::Deserialize;
use tokio::{task::JoinHandle, time::sleep};

use crate::{
    dom::{Document, NodeId, SharedDocument},
    infrastructure::shutdown::ShutdownListener,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostKind {
    Article,
    Narrow,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FeedPost {
    pub kind: PostKind,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub href: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
}

/// Parses JSON Lines, skipping blank lines.
pub fn parse_feed(input: &str) -> Result<Vec<FeedPost>> {
    input
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str(line).with_context(|| format!("invalid feed post on line {}", idx + 1))
        })
        .collect()
}

/// Builds the markup for one post under `parent` and returns the unit node.
///
/// Articles get an author line and a `data-testid="tweetText"` body, wrapped
/// in a link when the post has an `href`. Narrow posts are a bare paragraph.
pub fn insert_post(doc: &mut Document, parent: NodeId, post: &FeedPost) -> NodeId {
    match post.kind {
        PostKind::Article => {
            let container = match &post.href {
                Some(href) => {
                    let link = doc.append_element(parent, "a", &[]);
                    doc.set_attr(link, "href", href);
                    link
                }
                None => parent,
            };
            let article = doc.append_element(container, "article", &[]);
            if let Some(author) = &post.author {
                let byline = doc.append_element(article, "div", &["author"]);
                doc.append_text(byline, author);
            }
            let body = doc.append_element(article, "div", &[]);
            doc.set_attr(body, "data-testid", "tweetText");
            if !post.text.is_empty() {
                doc.append_text(body, &post.text);
            }
            article
        }
        PostKind::Narrow => {
            let narrow = doc.append_element(parent, "div", &["narrow"]);
            let paragraph = doc.append_element(narrow, "p", &[]);
            if !post.text.is_empty() {
                doc.append_text(paragraph, &post.text);
            }
            narrow
        }
    }
}

pub struct FeedReplayer {
    posts: Vec<FeedPost>,
    batch_size: usize,
    interval: Duration,
}

impl FeedReplayer {
    pub fn new(posts: Vec<FeedPost>, batch_size: usize, interval: Duration) -> Self {
        Self {
            posts,
            batch_size: batch_size.max(1),
            interval,
        }
    }

    pub async fn load(path: &Path, batch_size: usize, interval: Duration) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read feed {}", path.display()))?;
        let posts = parse_feed(&raw)?;
        tracing::info!(target: "feed", path = %path.display(), posts = posts.len(), "feed loaded");
        Ok(Self::new(posts, batch_size, interval))
    }

    /// Appends one batch per interval under `parent` until the feed runs out
    /// or shutdown is requested. The first batch is appended immediately.
    pub fn spawn(
        self,
        document: SharedDocument,
        parent: NodeId,
        mut shutdown: ShutdownListener,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let total = self.posts.len();
            let mut appended = 0usize;
            for batch in self.posts.chunks(self.batch_size) {
                if appended > 0 {
                    tokio::select! {
                        _ = sleep(self.interval) => {}
                        _ = shutdown.notified() => break,
                    }
                }
                document.write(|doc| {
                    for post in batch {
                        insert_post(doc, parent, post);
                    }
                });
                appended += batch.len();
                tracing::debug!(target: "feed", appended, total, "batch appended");
            }
            tracing::info!(target: "feed", appended, total, "feed replay finished");
        })
    }
}
