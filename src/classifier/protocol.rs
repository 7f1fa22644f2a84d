use serde::{Deserialize, Serialize};

use super::ClassifyError;
use crate::domain::Label;

pub const PREDICT_PATH: &str = "predict";
pub const FEEDBACK_PATH: &str = "feedback";

#[derive(Debug, Serialize)]
pub struct PredictRequest<'a> {
    pub text: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct PredictResponse {
    pub label: String,
}

#[derive(Debug, Serialize)]
pub struct FeedbackRequest<'a> {
    pub text: &'a str,
    pub label: &'a Label,
}

/// Decodes a `/predict` body. A missing or non-string `label` is malformed.
pub fn parse_predict_response(body: &[u8]) -> Result<Label, ClassifyError> {
    let response: PredictResponse = serde_json::from_slice(body)?;
    Ok(Label::from(response.label))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_label_field() {
        assert_eq!(
            parse_predict_response(br#"{"label":"HATE","score":0.93}"#).unwrap(),
            Label::Hate
        );
    }

    #[test]
    fn rejects_missing_or_mistyped_label() {
        assert!(matches!(
            parse_predict_response(br#"{"status":"ok"}"#),
            Err(ClassifyError::Malformed(_))
        ));
        assert!(matches!(
            parse_predict_response(br#"{"label":3}"#),
            Err(ClassifyError::Malformed(_))
        ));
        assert!(matches!(
            parse_predict_response(b"<html>"),
            Err(ClassifyError::Malformed(_))
        ));
    }

    #[test]
    fn feedback_body_uses_wire_label() {
        let body = serde_json::to_value(FeedbackRequest {
            text: "some post",
            label: &Label::ManualHide,
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({"text": "some post", "label": "MANUAL_HIDE"})
        );
    }
}
