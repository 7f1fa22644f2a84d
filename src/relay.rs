//! Cross-context relay between the page pipeline and the process that owns
//! network access.
//!
//! Requests use the `{action: ...}` message shapes. Classify requests get a
//! single reply; feedback requests get none. If the channel or the reply is
//! lost the page side sees [`RelayError::ChannelLost`] and treats it like a
//! network failure.

use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};

use crate::{
    classifier::Classifier,
    domain::Label,
    infrastructure::shutdown::ShutdownListener,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum RelayRequest {
    Classify { text: String },
    Feedback { text: String, label: Label },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifyReply {
    pub label: Label,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RelayError {
    #[error("relay channel lost")]
    ChannelLost,
    #[error("relay queue is full")]
    Saturated,
}

struct Envelope {
    request: RelayRequest,
    reply: Option<oneshot::Sender<ClassifyReply>>,
}

#[derive(Clone)]
pub struct RelayHandle {
    sender: mpsc::Sender<Envelope>,
}

impl RelayHandle {
    pub async fn classify(&self, text: String) -> Result<ClassifyReply, RelayError> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(Envelope {
                request: RelayRequest::Classify { text },
                reply: Some(reply),
            })
            .await
            .map_err(|_| RelayError::ChannelLost)?;
        response.await.map_err(|_| RelayError::ChannelLost)
    }

    /// One-way send; does not wait for queue space.
    pub fn notify(&self, request: RelayRequest) -> Result<(), RelayError> {
        self.sender
            .try_send(Envelope {
                request,
                reply: None,
            })
            .map_err(|err| match err {
                mpsc::error::TrySendError::Full(_) => RelayError::Saturated,
                mpsc::error::TrySendError::Closed(_) => RelayError::ChannelLost,
            })
    }
}

/// Starts the worker that answers relay requests using `backend`.
///
/// Every request is served on its own task so one slow classification does
/// not hold up the queue.
pub fn spawn_relay(
    backend: Arc<dyn Classifier>,
    capacity: usize,
    mut shutdown: ShutdownListener,
) -> (RelayHandle, JoinHandle<()>) {
    let (sender, mut receiver) = mpsc::channel::<Envelope>(capacity);
    let handle = tokio::spawn(async move {
        loop {
            let envelope = tokio::select! {
                envelope = receiver.recv() => match envelope {
                    Some(envelope) => envelope,
                    None => break,
                },
                _ = shutdown.notified() => break,
            };
            dispatch(backend.clone(), envelope);
        }
        tracing::info!(target: "relay", "relay worker stopped");
    });
    (RelayHandle { sender }, handle)
}

fn dispatch(backend: Arc<dyn Classifier>, envelope: Envelope) {
    match (envelope.request, envelope.reply) {
        (RelayRequest::Classify { text }, Some(reply)) => {
            tokio::spawn(async move {
                let label = backend.classify(&text).await;
                if reply.send(ClassifyReply { label }).is_err() {
                    tracing::debug!(target: "relay", "classify requester went away before reply");
                }
            });
        }
        (RelayRequest::Classify { .. }, None) => {
            tracing::warn!(target: "relay", "classify request without reply channel dropped");
        }
        (RelayRequest::Feedback { text, label }, _) => {
            backend.submit_feedback(&text, label);
        }
    }
}

/// Page-side classifier that goes through the relay.
#[derive(Clone)]
pub struct RelayClassifier {
    relay: RelayHandle,
}

impl RelayClassifier {
    pub fn new(relay: RelayHandle) -> Self {
        Self { relay }
    }
}

impl Classifier for RelayClassifier {
    fn classify<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Label> {
        Box::pin(async move {
            match self.relay.classify(text.to_string()).await {
                Ok(reply) => reply.label,
                Err(err) => {
                    tracing::warn!(target: "relay", error = %err, "classify relay failed; using NEUTRAL");
                    Label::Neutral
                }
            }
        })
    }

    fn submit_feedback(&self, text: &str, label: Label) {
        let request = RelayRequest::Feedback {
            text: text.to_string(),
            label,
        };
        if let Err(err) = self.relay.notify(request) {
            tracing::warn!(target: "relay", error = %err, "feedback not relayed");
        }
    }
}
