use std::{fs, path::PathBuf};

use anyhow::{Context, Result};

use crate::config::{DirectoryConfig, SettingsConfig};

const SETTINGS_FILENAME: &str = "settings.json";

#[derive(Debug, Clone)]
pub struct ResolvedPaths {
    pub logs_dir: PathBuf,
    pub data_dir: PathBuf,
    pub settings_path: PathBuf,
}

pub fn ensure_directories(dirs: &DirectoryConfig, settings: &SettingsConfig) -> Result<ResolvedPaths> {
    let logs_dir = ensure_dir(&dirs.logs_dir)?;
    let data_dir = ensure_dir(&dirs.data_dir)?;
    let settings_path = settings
        .path
        .clone()
        .unwrap_or_else(|| data_dir.join(SETTINGS_FILENAME));

    let probe_file = data_dir.join(".write-test");
    fs::write(&probe_file, b"ok")
        .with_context(|| format!("data directory {} is not writable", data_dir.display()))?;
    fs::remove_file(&probe_file)?;
    Ok(ResolvedPaths {
        logs_dir,
        data_dir,
        settings_path,
    })
}

fn ensure_dir(path: &str) -> Result<PathBuf> {
    let dir = PathBuf::from(path);
    if !dir.exists() {
        fs::create_dir_all(&dir).with_context(|| format!("failed to create directory {}", path))?;
    }
    Ok(dir.canonicalize().unwrap_or(dir))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn settings_default_into_data_dir() {
        let root = tempfile::tempdir().unwrap();
        let dirs = DirectoryConfig {
            logs_dir: root.path().join("logs").display().to_string(),
            data_dir: root.path().join("data").display().to_string(),
        };
        let settings = SettingsConfig {
            path: None,
            poll_interval: Duration::from_secs(1),
        };

        let paths = ensure_directories(&dirs, &settings).unwrap();
        assert!(paths.logs_dir.is_dir());
        assert_eq!(paths.settings_path, paths.data_dir.join("settings.json"));
    }
}
