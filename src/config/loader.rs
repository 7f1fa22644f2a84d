use std::{env, path::PathBuf, time::Duration};

use url::Url;

use super::env::{
    AppConfig, ClassifierConfig, ConfigError, DirectoryConfig, FeedConfig, LoggingConfig,
    PipelineConfig, RelayConfig, SettingsConfig,
};
use crate::dom::SelectorList;

const DEFAULT_API_BASE: &str = "http://localhost:5000";
const DEFAULT_UNIT_SELECTORS: &str = "article, div.narrow";
const DEFAULT_TEXT_SELECTOR: &str = r#"div[data-testid="tweetText"]"#;

pub fn load_config() -> Result<AppConfig, ConfigError> {
    AppConfig::from_env()
}

impl AppConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let classifier = ClassifierConfig {
            api_base: parse_base_url(
                "CLASSIFIER_API_BASE",
                &env::var("CLASSIFIER_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
            )?,
        };

        let settings = SettingsConfig {
            path: parse_path("SETTINGS_PATH"),
            poll_interval: parse_millis("SETTINGS_POLL_INTERVAL_MS", 1_000),
        };

        let pipeline = PipelineConfig {
            unit_selectors: parse_selectors("UNIT_SELECTORS", DEFAULT_UNIT_SELECTORS)?,
            text_selector: parse_selectors("ARTICLE_TEXT_SELECTOR", DEFAULT_TEXT_SELECTOR)?,
            ack_delay: parse_millis("ACK_DELAY_MS", 1_000),
            evict_detached: env::var("TRACKER_EVICT_DETACHED")
                .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
                .unwrap_or(false),
        };

        let relay = RelayConfig {
            queue_capacity: parse_usize("RELAY_QUEUE_CAPACITY", 64).max(1),
        };

        let feed = FeedConfig {
            path: parse_path("FEED_PATH"),
            batch_size: parse_usize("FEED_BATCH_SIZE", 5).max(1),
            interval: parse_millis("FEED_INTERVAL_MS", 1_500),
            output_path: parse_path("OUTPUT_PATH"),
        };

        let directories = DirectoryConfig {
            logs_dir: env::var("LOGS_DIR").unwrap_or_else(|_| "logs".to_string()),
            data_dir: env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string()),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        };

        Ok(Self {
            classifier,
            settings,
            pipeline,
            relay,
            feed,
            directories,
            logging,
        })
    }
}

/// Parses the service base URL, forcing a trailing slash so endpoint paths
/// join underneath it instead of replacing the last segment.
pub(crate) fn parse_base_url(key: &'static str, raw: &str) -> Result<Url, ConfigError> {
    let mut url = Url::parse(raw.trim()).map_err(|source| ConfigError::InvalidUrl { key, source })?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn parse_selectors(key: &'static str, default: &str) -> Result<SelectorList, ConfigError> {
    let raw = env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string());
    raw.parse()
        .map_err(|source| ConfigError::InvalidSelector { key, source })
}

fn parse_path(key: &str) -> Option<PathBuf> {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
}

fn parse_millis(key: &str, default: u64) -> Duration {
    Duration::from_millis(
        env::var(key)
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(default),
    )
}

fn parse_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gains_trailing_slash() {
        let url = parse_base_url("TEST", "http://localhost:5000/api").unwrap();
        assert_eq!(url.join("predict").unwrap().as_str(), "http://localhost:5000/api/predict");

        let root = parse_base_url("TEST", "http://localhost:5000").unwrap();
        assert_eq!(root.join("feedback").unwrap().as_str(), "http://localhost:5000/feedback");
    }

    #[test]
    fn invalid_base_url_names_the_variable() {
        let err = parse_base_url("CLASSIFIER_API_BASE", "not a url").unwrap_err();
        assert!(err.to_string().contains("CLASSIFIER_API_BASE"));
    }

    #[test]
    fn default_selectors_parse() {
        assert!(DEFAULT_UNIT_SELECTORS.parse::<SelectorList>().is_ok());
        assert!(DEFAULT_TEXT_SELECTOR.parse::<SelectorList>().is_ok());
    }
}
