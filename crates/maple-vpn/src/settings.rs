//! Plugin Settings
//!
//! The app stores two values for the background task: which configuration
//! file the engine should run, and which outbound interface it should bind.
//!
//! ```toml
//! CONFIG_PATH = "C:\\Users\\me\\maple\\config\\default.conf"
//! NETIF = "192.168.1.23,fe80::1"
//! ```
//!
//! JSON is accepted too, picked by the `.json` extension.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use tracing::debug;

/// Settings key of the active configuration file path
pub const CONFIG_PATH_SETTING_KEY: &str = "CONFIG_PATH";

/// Settings key of the outbound interface selector
pub const NETIF_SETTING_KEY: &str = "NETIF";

/// On-disk settings format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsFormat {
    Toml,
    Json,
}

impl SettingsFormat {
    /// Pick a format from a file extension (`.json` → JSON, else TOML)
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => SettingsFormat::Json,
            _ => SettingsFormat::Toml,
        }
    }
}

/// Settings errors
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Serialize error: {0}")]
    Serialize(String),

    #[error("Unknown settings key: {0}")]
    UnknownKey(String),
}

/// Values the background task reads on connect
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginSettings {
    /// Path of the configuration file the engine runs
    #[serde(rename = "CONFIG_PATH", default)]
    pub config_path: String,
    /// Outbound interface selector; empty lets the engine choose
    #[serde(rename = "NETIF", default)]
    pub netif: String,
}

impl PluginSettings {
    /// Create settings for a configuration file
    pub fn new(config_path: impl Into<String>) -> Self {
        Self {
            config_path: config_path.into(),
            netif: String::new(),
        }
    }

    /// Outbound interface selector, `None` when unset
    pub fn outbound_interface(&self) -> Option<&str> {
        if self.netif.is_empty() {
            None
        } else {
            Some(&self.netif)
        }
    }

    /// Look a value up by its settings key
    pub fn get(&self, key: &str) -> Result<&str, SettingsError> {
        match key {
            CONFIG_PATH_SETTING_KEY => Ok(&self.config_path),
            NETIF_SETTING_KEY => Ok(&self.netif),
            other => Err(SettingsError::UnknownKey(other.to_string())),
        }
    }

    /// Store a value by its settings key
    pub fn set(&mut self, key: &str, value: impl Into<String>) -> Result<(), SettingsError> {
        match key {
            CONFIG_PATH_SETTING_KEY => self.config_path = value.into(),
            NETIF_SETTING_KEY => self.netif = value.into(),
            other => return Err(SettingsError::UnknownKey(other.to_string())),
        }
        Ok(())
    }

    /// Parse from TOML
    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        toml::from_str(content).map_err(|e| SettingsError::Parse(e.to_string()))
    }

    /// Parse from JSON
    pub fn from_json(content: &str) -> Result<Self, SettingsError> {
        serde_json::from_str(content).map_err(|e| SettingsError::Parse(e.to_string()))
    }

    /// Serialize to TOML
    pub fn to_toml(&self) -> Result<String, SettingsError> {
        toml::to_string_pretty(self).map_err(|e| SettingsError::Serialize(e.to_string()))
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, SettingsError> {
        serde_json::to_string_pretty(self).map_err(|e| SettingsError::Serialize(e.to_string()))
    }

    /// Load from `path`. A missing file yields default settings.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No settings at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };

        match SettingsFormat::for_path(path) {
            SettingsFormat::Toml => Self::from_toml(&content),
            SettingsFormat::Json => Self::from_json(&content),
        }
    }

    /// Write to `path` in the format its extension selects
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let content = match SettingsFormat::for_path(path) {
            SettingsFormat::Toml => self.to_toml()?,
            SettingsFormat::Json => self.to_json()?,
        };
        fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_empty_netif_means_none() {
        let mut settings = PluginSettings::new("/tmp/a.conf");
        assert_eq!(settings.outbound_interface(), None);

        settings.netif = "10.0.0.2".into();
        assert_eq!(settings.outbound_interface(), Some("10.0.0.2"));
    }

    #[test]
    fn test_keys() {
        let mut settings = PluginSettings::default();
        settings.set(CONFIG_PATH_SETTING_KEY, "a.conf").unwrap();
        settings.set(NETIF_SETTING_KEY, "eth0").unwrap();

        assert_eq!(settings.get(CONFIG_PATH_SETTING_KEY).unwrap(), "a.conf");
        assert_eq!(settings.get(NETIF_SETTING_KEY).unwrap(), "eth0");
        assert!(matches!(
            settings.set("THEME", "dark"),
            Err(SettingsError::UnknownKey(_))
        ));
    }

    #[test]
    fn test_toml_uses_setting_keys() {
        let settings = PluginSettings::from_toml("CONFIG_PATH = \"x.conf\"\n").unwrap();

        assert_eq!(settings.config_path, "x.conf");
        assert!(settings.netif.is_empty());
        assert!(settings.to_toml().unwrap().contains("CONFIG_PATH"));
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let settings = PluginSettings::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(settings, PluginSettings::default());
    }

    #[test]
    fn test_save_and_load_both_formats() {
        let dir = tempdir().unwrap();
        let mut settings = PluginSettings::new("config/default.conf");
        settings.netif = "192.168.1.23".into();

        for name in ["settings.toml", "settings.json"] {
            let path = dir.path().join(name);
            settings.save(&path).unwrap();
            assert_eq!(PluginSettings::load(&path).unwrap(), settings);
        }

        let json = fs::read_to_string(dir.path().join("settings.json")).unwrap();
        assert!(json.trim_start().starts_with('{'));
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            PluginSettings::from_json("{ not json"),
            Err(SettingsError::Parse(_))
        ));
    }
}
