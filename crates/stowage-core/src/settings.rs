//! Runtime settings store
//!
//! Operators tune link lifetimes and the document preview template at runtime, so
//! these values are read through `SettingsStore` on every request instead of being
//! baked into `Config`.

use std::collections::HashMap;
use std::sync::RwLock;

/// Setting names read by the explorer.
pub mod names {
    /// TTL in seconds of source links and redirected previews.
    pub const PREVIEW_TIMEOUT: &str = "preview_timeout";
    /// TTL in seconds of download sessions.
    pub const DOWNLOAD_TIMEOUT: &str = "download_timeout";
    /// TTL in seconds of the download URL handed to the document preview service.
    pub const DOC_PREVIEW_TIMEOUT: &str = "doc_preview_timeout";
    /// Template containing `{$src}` and/or `{$srcB64}` placeholders.
    pub const OFFICE_PREVIEW_SERVICE: &str = "office_preview_service";
    /// Largest file in bytes served as a text preview.
    pub const MAX_EDIT_SIZE: &str = "max_edit_size";
}

pub const DEFAULT_TIMEOUT_SECS: i64 = 60;
pub const DEFAULT_MAX_EDIT_SIZE: i64 = 2 << 20;

pub trait SettingsStore: Send + Sync {
    fn get_setting(&self, name: &str) -> Option<String>;

    /// Integer setting, falling back to `default` when missing or unparsable.
    fn get_int_setting(&self, name: &str, default: i64) -> i64 {
        self.get_setting(name)
            .and_then(|value| value.trim().parse().ok())
            .unwrap_or(default)
    }
}

/// In-process settings map, seeded with the defaults the explorer expects.
#[derive(Debug, Default)]
pub struct MemorySettings {
    values: RwLock<HashMap<String, String>>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let settings = Self::new();
        settings.set(names::PREVIEW_TIMEOUT, DEFAULT_TIMEOUT_SECS.to_string());
        settings.set(names::DOWNLOAD_TIMEOUT, DEFAULT_TIMEOUT_SECS.to_string());
        settings.set(names::DOC_PREVIEW_TIMEOUT, DEFAULT_TIMEOUT_SECS.to_string());
        settings.set(names::MAX_EDIT_SIZE, DEFAULT_MAX_EDIT_SIZE.to_string());
        settings.set(
            names::OFFICE_PREVIEW_SERVICE,
            "https://view.officeapps.live.com/op/view.aspx?src={$src}",
        );
        settings
    }

    pub fn set(&self, name: &str, value: impl Into<String>) {
        let mut values = self.values.write().unwrap_or_else(|e| e.into_inner());
        values.insert(name.to_string(), value.into());
    }
}

impl SettingsStore for MemorySettings {
    fn get_setting(&self, name: &str) -> Option<String> {
        let values = self.values.read().unwrap_or_else(|e| e.into_inner());
        values.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_setting_falls_back_to_default() {
        let settings = MemorySettings::new();
        assert_eq!(settings.get_int_setting(names::PREVIEW_TIMEOUT, 60), 60);

        settings.set(names::PREVIEW_TIMEOUT, "not-a-number");
        assert_eq!(settings.get_int_setting(names::PREVIEW_TIMEOUT, 60), 60);

        settings.set(names::PREVIEW_TIMEOUT, " 300 ");
        assert_eq!(settings.get_int_setting(names::PREVIEW_TIMEOUT, 60), 300);
    }

    #[test]
    fn test_defaults_contain_preview_template() {
        let settings = MemorySettings::with_defaults();
        let template = settings
            .get_setting(names::OFFICE_PREVIEW_SERVICE)
            .unwrap_or_default();
        assert!(template.contains("{$src}"));
    }
}
