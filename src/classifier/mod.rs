//! Classification boundary.
//!
//! Everything behind [`Classifier`] is fail-open: `classify` always resolves
//! to a label, falling back to [`Label::Neutral`] on any failure, and
//! feedback is fire-and-forget.

mod client;
pub mod protocol;

use futures::future::BoxFuture;
use thiserror::Error;

use crate::domain::Label;

pub use client::{ApiClient, HttpClassifier};

pub trait Classifier: Send + Sync {
    fn classify<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Label>;

    /// Best-effort; never awaited by the caller and never reports failure.
    fn submit_feedback(&self, text: &str, label: Label);
}

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("service responded with {0}")]
    Status(reqwest::StatusCode),
    #[error("malformed response: {0}")]
    Malformed(#[from] serde_json::Error),
}
