//! Helideck configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{HelideckError, Result};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HelideckConfig {
    #[serde(default)]
    pub notifications: NotificationConfig,
}

impl HelideckConfig {
    /// Load config from the default path (~/.helideck/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| HelideckError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| HelideckError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path())
    }

    /// Save config to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| HelideckError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the Helideck home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".helideck")
    }
}

/// Where the notification center keeps its records between sessions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Nothing survives the process.
    Memory,
    /// One JSON file per key under `data_dir`.
    File,
    /// Key/value table in `data_dir/notifications.db`.
    #[default]
    Sqlite,
}

/// Notification center + toast configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default)]
    pub storage: StorageBackend,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_storage_key")]
    pub storage_key: String,
    #[serde(default = "default_max_records")]
    pub max_records: usize,
    #[serde(default)]
    pub toast: ToastDurations,
}

fn default_data_dir() -> String { "~/.helideck/notifications".into() }
fn default_storage_key() -> String { "helideckNotifications".into() }
fn default_max_records() -> usize { 100 }

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            storage: StorageBackend::default(),
            data_dir: default_data_dir(),
            storage_key: default_storage_key(),
            max_records: default_max_records(),
            toast: ToastDurations::default(),
        }
    }
}

impl NotificationConfig {
    /// `data_dir` with `~` and env vars expanded.
    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.data_dir).to_string())
    }
}

/// Default auto-dismiss durations (milliseconds) per severity.
/// Loading toasts never auto-dismiss, so they have no entry here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToastDurations {
    #[serde(default = "default_success_ms")]
    pub success_ms: u64,
    #[serde(default = "default_info_ms")]
    pub info_ms: u64,
    #[serde(default = "default_warning_ms")]
    pub warning_ms: u64,
    #[serde(default = "default_error_ms")]
    pub error_ms: u64,
}

fn default_success_ms() -> u64 { 5000 }
fn default_info_ms() -> u64 { 5000 }
fn default_warning_ms() -> u64 { 6000 }
fn default_error_ms() -> u64 { 7000 }

impl Default for ToastDurations {
    fn default() -> Self {
        Self {
            success_ms: default_success_ms(),
            info_ms: default_info_ms(),
            warning_ms: default_warning_ms(),
            error_ms: default_error_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = HelideckConfig::default();
        assert_eq!(cfg.notifications.storage, StorageBackend::Sqlite);
        assert_eq!(cfg.notifications.storage_key, "helideckNotifications");
        assert_eq!(cfg.notifications.max_records, 100);
        assert_eq!(cfg.notifications.toast.error_ms, 7000);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let cfg: HelideckConfig = toml::from_str(
            r#"
            [notifications]
            storage = "file"
            max_records = 20

            [notifications.toast]
            warning_ms = 9000
            "#,
        )
        .unwrap();
        assert_eq!(cfg.notifications.storage, StorageBackend::File);
        assert_eq!(cfg.notifications.max_records, 20);
        assert_eq!(cfg.notifications.toast.warning_ms, 9000);
        assert_eq!(cfg.notifications.toast.success_ms, 5000);
        assert_eq!(cfg.notifications.storage_key, "helideckNotifications");
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = std::env::temp_dir().join("helideck-config-test");
        let path = dir.join("config.toml");
        let mut cfg = HelideckConfig::default();
        cfg.notifications.storage = StorageBackend::Memory;
        cfg.save_to(&path).unwrap();

        let loaded = HelideckConfig::load_from(&path).unwrap();
        assert_eq!(loaded.notifications.storage, StorageBackend::Memory);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_bad_toml_is_config_error() {
        let dir = std::env::temp_dir().join("helideck-config-bad");
        std::fs::create_dir_all(&dir).ok();
        let path = dir.join("config.toml");
        std::fs::write(&path, "notifications = 5").unwrap();
        let err = HelideckConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, HelideckError::Config(_)));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_data_path_expands_tilde() {
        let cfg = NotificationConfig::default();
        assert!(!cfg.data_path().to_string_lossy().starts_with('~'));
    }
}
