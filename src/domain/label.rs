use std::fmt;

use serde::{Deserialize, Serialize};

/// Classification outcome or user-supplied correction tag.
///
/// The set is open: anything the service returns that is not one of the
/// known tags is carried through as [`Label::Other`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Label {
    Hate,
    Abuse,
    #[default]
    Neutral,
    ManualHide,
    BadChoice,
    Other(String),
}

impl Label {
    pub fn as_str(&self) -> &str {
        match self {
            Label::Hate => "HATE",
            Label::Abuse => "ABUSE",
            Label::Neutral => "NEUTRAL",
            Label::ManualHide => "MANUAL_HIDE",
            Label::BadChoice => "BAD_CHOICE",
            Label::Other(raw) => raw.as_str(),
        }
    }
}

impl From<&str> for Label {
    fn from(raw: &str) -> Self {
        match raw {
            "HATE" => Label::Hate,
            "ABUSE" => Label::Abuse,
            "NEUTRAL" => Label::Neutral,
            "MANUAL_HIDE" => Label::ManualHide,
            "BAD_CHOICE" => Label::BadChoice,
            other => Label::Other(other.to_string()),
        }
    }
}

impl From<String> for Label {
    fn from(raw: String) -> Self {
        Label::from(raw.as_str())
    }
}

impl From<Label> for String {
    fn from(label: Label) -> Self {
        match label {
            Label::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
