use std::{path::PathBuf, time::Duration};

use thiserror::Error;
use url::Url;

use crate::dom::{SelectorError, SelectorList};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub classifier: ClassifierConfig,
    pub settings: SettingsConfig,
    pub pipeline: PipelineConfig,
    pub relay: RelayConfig,
    pub feed: FeedConfig,
    pub directories: DirectoryConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub api_base: Url,
}

#[derive(Debug, Clone)]
pub struct SettingsConfig {
    /// Overrides `<data_dir>/settings.json` when set.
    pub path: Option<PathBuf>,
    pub poll_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub unit_selectors: SelectorList,
    pub text_selector: SelectorList,
    pub ack_delay: Duration,
    pub evict_detached: bool,
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub queue_capacity: usize,
}

#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub path: Option<PathBuf>,
    pub batch_size: usize,
    pub interval: Duration,
    pub output_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    pub logs_dir: String,
    pub data_dir: String,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid URL in {key}: {source}")]
    InvalidUrl {
        key: &'static str,
        #[source]
        source: url::ParseError,
    },
    #[error("invalid selector in {key}: {source}")]
    InvalidSelector {
        key: &'static str,
        #[source]
        source: SelectorError,
    },
}
