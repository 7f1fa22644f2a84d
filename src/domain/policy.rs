use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::Label;

/// Persisted `filterSetting` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FilterSetting {
    #[default]
    Both,
    Hate,
    Abuse,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unrecognized filter setting `{0}` (expected BOTH, HATE or ABUSE)")]
pub struct ParseSettingError(pub String);

impl FilterSetting {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterSetting::Both => "BOTH",
            FilterSetting::Hate => "HATE",
            FilterSetting::Abuse => "ABUSE",
        }
    }

    pub fn policy(&self) -> HidePolicy {
        let labels = match self {
            FilterSetting::Both => vec![Label::Hate, Label::Abuse],
            FilterSetting::Hate => vec![Label::Hate],
            FilterSetting::Abuse => vec![Label::Abuse],
        };
        HidePolicy { labels }
    }
}

impl FromStr for FilterSetting {
    type Err = ParseSettingError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "BOTH" => Ok(FilterSetting::Both),
            "HATE" => Ok(FilterSetting::Hate),
            "ABUSE" => Ok(FilterSetting::Abuse),
            other => Err(ParseSettingError(other.to_string())),
        }
    }
}

impl fmt::Display for FilterSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Labels that cause a unit to be hidden by default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HidePolicy {
    labels: Vec<Label>,
}

impl HidePolicy {
    /// Labels a user may pick when reporting a visible unit.
    pub const REPORTABLE: [Label; 2] = [Label::Hate, Label::Abuse];

    pub fn hides(&self, label: &Label) -> bool {
        self.labels.contains(label)
    }
}

impl Default for HidePolicy {
    fn default() -> Self {
        FilterSetting::default().policy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hide_decision_matrix() {
        let other = Label::Other("SPAM".into());
        let cases = [
            (FilterSetting::Both, [true, true, false, false]),
            (FilterSetting::Hate, [true, false, false, false]),
            (FilterSetting::Abuse, [false, true, false, false]),
        ];
        for (setting, expected) in cases {
            let policy = setting.policy();
            let labels = [Label::Hate, Label::Abuse, Label::Neutral, other.clone()];
            for (label, hide) in labels.iter().zip(expected) {
                assert_eq!(policy.hides(label), hide, "{setting} / {label}");
            }
        }
    }

    #[test]
    fn default_policy_is_both() {
        assert_eq!(HidePolicy::default(), FilterSetting::Both.policy());
    }

    #[test]
    fn rejects_unknown_setting_values() {
        assert_eq!(
            "NONE".parse::<FilterSetting>(),
            Err(ParseSettingError("NONE".into()))
        );
        assert_eq!("HATE".parse::<FilterSetting>(), Ok(FilterSetting::Hate));
    }
}
