use futures::future::BoxFuture;
use reqwest::{Client, Response};
use url::Url;

use super::{
    protocol::{parse_predict_response, FeedbackRequest, PredictRequest, FEEDBACK_PATH, PREDICT_PATH},
    Classifier, ClassifyError,
};
use crate::domain::Label;

/// Thin typed wrapper over the two service endpoints.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    predict_url: Url,
    feedback_url: Url,
}

impl ApiClient {
    pub fn new(http: Client, base: &Url) -> Result<Self, url::ParseError> {
        Ok(Self {
            http,
            predict_url: base.join(PREDICT_PATH)?,
            feedback_url: base.join(FEEDBACK_PATH)?,
        })
    }

    pub async fn predict(&self, text: &str) -> Result<Label, ClassifyError> {
        let response = self
            .http
            .post(self.predict_url.clone())
            .json(&PredictRequest { text })
            .send()
            .await?;
        let body = ensure_success(response)?.bytes().await?;
        parse_predict_response(&body)
    }

    pub async fn feedback(&self, text: &str, label: &Label) -> Result<(), ClassifyError> {
        let response = self
            .http
            .post(self.feedback_url.clone())
            .json(&FeedbackRequest { text, label })
            .send()
            .await?;
        ensure_success(response)?;
        Ok(())
    }
}

fn ensure_success(response: Response) -> Result<Response, ClassifyError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(ClassifyError::Status(status))
    }
}

/// Direct HTTP classifier with the fail-open mapping applied.
#[derive(Clone)]
pub struct HttpClassifier {
    api: ApiClient,
}

impl HttpClassifier {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

impl Classifier for HttpClassifier {
    fn classify<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Label> {
        Box::pin(async move {
            match self.api.predict(text).await {
                Ok(label) => {
                    tracing::debug!(target: "classifier", %label, chars = text.len(), "classified");
                    label
                }
                Err(err) => {
                    tracing::warn!(
                        target: "classifier",
                        error = %err,
                        "classification failed; falling back to NEUTRAL"
                    );
                    Label::Neutral
                }
            }
        })
    }

    fn submit_feedback(&self, text: &str, label: Label) {
        let api = self.api.clone();
        let text = text.to_string();
        tokio::spawn(async move {
            if let Err(err) = api.feedback(&text, &label).await {
                tracing::warn!(target: "classifier", error = %err, %label, "feedback delivery failed");
            }
        });
    }
}
