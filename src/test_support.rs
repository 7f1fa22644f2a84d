use std::{collections::HashMap, time::Duration};

use futures::future::BoxFuture;
use parking_lot::Mutex;

use crate::{classifier::Classifier, domain::Label};

/// Classifier double: answers from a fixed table (NEUTRAL otherwise) and
/// records every call and every feedback submission.
#[derive(Default)]
pub struct ScriptedClassifier {
    labels: HashMap<String, Label>,
    delay: Option<Duration>,
    calls: Mutex<Vec<String>>,
    feedback: Mutex<Vec<(String, Label)>>,
}

impl ScriptedClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_label(mut self, text: &str, label: Label) -> Self {
        self.labels.insert(text.to_string(), label);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn feedback(&self) -> Vec<(String, Label)> {
        self.feedback.lock().clone()
    }

    pub async fn wait_for_feedback(&self, count: usize) {
        for _ in 0..1_000 {
            if self.feedback.lock().len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        panic!("expected {count} feedback events, got {:?}", self.feedback());
    }
}

impl Classifier for ScriptedClassifier {
    fn classify<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Label> {
        self.calls.lock().push(text.to_string());
        Box::pin(async move {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.labels.get(text).cloned().unwrap_or_default()
        })
    }

    fn submit_feedback(&self, text: &str, label: Label) {
        self.feedback.lock().push((text.to_string(), label));
    }
}
