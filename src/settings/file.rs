use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use tokio::{task::JoinHandle, time::sleep};

use super::SettingsStore;
use crate::{domain::FilterSetting, infrastructure::shutdown::ShutdownListener};

const FILTER_SETTING_KEY: &str = "filterSetting";

/// JSON key-value file holding the persisted preferences.
#[derive(Debug, Clone)]
pub struct FileSettings {
    path: PathBuf,
}

impl FileSettings {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw `filterSetting` value; `None` when the file or key is absent.
    pub async fn load(&self) -> Result<Option<String>> {
        let Some(entries) = self.read_entries().await? else {
            return Ok(None);
        };
        Ok(entries
            .get(FILTER_SETTING_KEY)
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    /// Writes `filterSetting`, keeping any other keys in the file.
    pub async fn save(&self, setting: FilterSetting) -> Result<()> {
        let mut entries = self.read_entries().await?.unwrap_or_default();
        entries.insert(
            FILTER_SETTING_KEY.to_string(),
            Value::String(setting.as_str().to_string()),
        );
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let body = serde_json::to_vec_pretty(&Value::Object(entries))?;
        tokio::fs::write(&self.path, body)
            .await
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        Ok(())
    }

    async fn read_entries(&self) -> Result<Option<Map<String, Value>>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read {}", self.path.display()))
            }
        };
        let value: Value = serde_json::from_slice(&bytes)
            .with_context(|| format!("invalid settings file {}", self.path.display()))?;
        match value {
            Value::Object(entries) => Ok(Some(entries)),
            _ => anyhow::bail!("settings file {} is not a JSON object", self.path.display()),
        }
    }
}

/// Loads the setting once, then polls the file and applies external
/// changes until shutdown. A value that disappears is not a change.
pub fn spawn_settings_watcher(
    store: Arc<SettingsStore>,
    backend: FileSettings,
    interval: Duration,
    mut shutdown: ShutdownListener,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last_value = match backend.load().await {
            Ok(value) => {
                store.apply_loaded(value.as_deref());
                value
            }
            Err(err) => {
                tracing::warn!(target: "settings", error = %err, "initial settings load failed; using BOTH");
                None
            }
        };
        tracing::info!(
            target: "settings",
            path = %backend.path().display(),
            setting = %store.current_setting(),
            "settings loaded"
        );

        loop {
            tokio::select! {
                _ = sleep(interval) => {}
                _ = shutdown.notified() => break,
            }
            match backend.load().await {
                Ok(Some(value)) if last_value.as_deref() != Some(value.as_str()) => {
                    store.apply_change(&value);
                    last_value = Some(value);
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::debug!(target: "settings", error = %err, "settings poll failed");
                }
            }
        }
        tracing::info!(target: "settings", "settings watcher stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::shutdown::Shutdown;

    #[tokio::test]
    async fn missing_file_loads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileSettings::new(dir.path().join("settings.json"));
        assert_eq!(backend.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn save_preserves_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        tokio::fs::write(&path, br#"{"theme":"dark"}"#).await.unwrap();

        let backend = FileSettings::new(&path);
        backend.save(FilterSetting::Abuse).await.unwrap();

        assert_eq!(backend.load().await.unwrap().as_deref(), Some("ABUSE"));
        let raw: Value = serde_json::from_slice(&tokio::fs::read(&path).await.unwrap()).unwrap();
        assert_eq!(raw["theme"], "dark");
    }

    #[tokio::test]
    async fn watcher_applies_initial_value_and_later_changes() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileSettings::new(dir.path().join("nested").join("settings.json"));
        backend.save(FilterSetting::Hate).await.unwrap();

        let store = Arc::new(SettingsStore::new());
        let (shutdown, _) = Shutdown::new();
        let handle = spawn_settings_watcher(
            store.clone(),
            backend.clone(),
            Duration::from_millis(10),
            shutdown.subscribe(),
        );

        wait_until(|| store.current_setting() == FilterSetting::Hate).await;
        backend.save(FilterSetting::Abuse).await.unwrap();
        wait_until(|| store.current_setting() == FilterSetting::Abuse).await;

        shutdown.trigger();
        handle.await.unwrap();
    }

    async fn wait_until(condition: impl Fn() -> bool) {
        for _ in 0..500 {
            if condition() {
                return;
            }
            sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached");
    }
}
