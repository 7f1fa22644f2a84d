pub mod env;
mod loader;

pub use env::{AppConfig, DirectoryConfig, PipelineConfig, SettingsConfig};
pub use loader::load_config;
