//! Hide-policy settings.
//!
//! The store starts at BOTH and is filled in asynchronously; units processed
//! before the first load completes use the default. Policy changes only
//! affect units classified afterwards.

mod file;

use parking_lot::RwLock;

use crate::domain::{FilterSetting, HidePolicy};

pub use file::{spawn_settings_watcher, FileSettings};

#[derive(Debug, Default)]
pub struct SettingsStore {
    setting: RwLock<FilterSetting>,
}

impl SettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_policy(&self) -> HidePolicy {
        self.setting.read().policy()
    }

    pub fn current_setting(&self) -> FilterSetting {
        *self.setting.read()
    }

    pub fn set(&self, setting: FilterSetting) {
        let previous = std::mem::replace(&mut *self.setting.write(), setting);
        if previous != setting {
            tracing::info!(target: "settings", from = %previous, to = %setting, "hide policy updated");
        }
    }

    /// Applies the value read at startup. An absent value means BOTH.
    pub fn apply_loaded(&self, value: Option<&str>) {
        match value {
            None => self.set(FilterSetting::Both),
            Some(raw) => self.apply_change(raw),
        }
    }

    /// Applies an externally changed value. Unrecognized values leave the
    /// current policy in place.
    pub fn apply_change(&self, raw: &str) {
        match raw.parse::<FilterSetting>() {
            Ok(setting) => self.set(setting),
            Err(err) => {
                tracing::warn!(
                    target: "settings",
                    error = %err,
                    current = %self.current_setting(),
                    "ignoring filter setting"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Label;

    #[test]
    fn starts_with_both() {
        let store = SettingsStore::new();
        assert!(store.current_policy().hides(&Label::Hate));
        assert!(store.current_policy().hides(&Label::Abuse));
    }

    #[test]
    fn absent_value_loads_as_both() {
        let store = SettingsStore::new();
        store.set(FilterSetting::Hate);
        store.apply_loaded(None);
        assert_eq!(store.current_setting(), FilterSetting::Both);
    }

    #[test]
    fn unrecognized_change_keeps_previous_policy() {
        let store = SettingsStore::new();
        store.apply_change("ABUSE");
        store.apply_change("EVERYTHING");
        assert_eq!(store.current_setting(), FilterSetting::Abuse);
        assert!(!store.current_policy().hides(&Label::Hate));
    }
}
