use std::path::PathBuf;
use std::time::Duration;

use dentro_core::overrides::DEFAULT_CLOUD_EXCLUDED;
use dentro_core::{DeviceOverrides, SyncSettings, TieBreak};
use serde::{Deserialize, Serialize};

/// Source of a configuration value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Default,
    File,
    Environment,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::File => write!(f, "file"),
            ConfigSource::Environment => write!(f, "environment"),
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }
}

fn default_debounce_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    30
}

/// Sync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Server URL (e.g., "http://localhost:8080" or "https://sync.example.com")
    pub server_url: Option<String>,
    /// API key identifying the clinic account
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Sync in the background after a quiet period following edits
    #[serde(default)]
    pub auto_sync: bool,
    #[serde(default = "default_debounce_secs")]
    pub debounce_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// How exact `updatedAt` ties are settled
    #[serde(default)]
    pub tie_break: TieBreak,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            server_url: None,
            api_key: None,
            auto_sync: false,
            debounce_secs: default_debounce_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            tie_break: TieBreak::default(),
        }
    }
}

impl SyncConfig {
    /// Returns true if sync is configured (has both server_url and api_key)
    pub fn is_configured(&self) -> bool {
        self.server_url.is_some() && self.api_key.is_some()
    }

    pub fn settings(&self) -> SyncSettings {
        SyncSettings {
            debounce: Duration::from_secs(self.debounce_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs.max(1)),
            tie_break: self.tie_break,
        }
    }
}

fn default_cloud_excluded() -> Vec<String> {
    DEFAULT_CLOUD_EXCLUDED.iter().map(|k| k.to_string()).collect()
}

/// Preferences that belong to this device and never come from the cloud row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub language: Option<String>,
    pub theme: Option<String>,
    #[serde(skip_serializing)]
    pub pin: Option<String>,
    /// Settings keys kept out of the pushed snapshot
    #[serde(default = "default_cloud_excluded")]
    pub cloud_excluded_settings: Vec<String>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            language: None,
            theme: None,
            pin: None,
            cloud_excluded_settings: default_cloud_excluded(),
        }
    }
}

impl DeviceConfig {
    pub fn overrides(&self) -> DeviceOverrides {
        DeviceOverrides {
            language: self.language.clone(),
            theme: self.theme.clone(),
            pin: self.pin.clone(),
            cloud_excluded: self.cloud_excluded_settings.clone(),
        }
    }
}

/// Application configuration with source tracking
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Directory holding the local snapshot
    pub data_dir: ConfigValue<PathBuf>,
    /// Config file path used (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
    pub sync: SyncConfig,
    pub device: DeviceConfig,
}

/// Internal struct for deserializing config file
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    data_dir: Option<PathBuf>,
    sync: Option<SyncConfig>,
    device: Option<DeviceConfig>,
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut data_dir = ConfigValue::new(Self::default_data_dir(), ConfigSource::Default);
        let mut config_file = None;
        let mut sync = SyncConfig::default();
        let mut device = DeviceConfig::default();

        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            let file_config: ConfigFile = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;

            config_file = Some(path.clone());

            if let Some(dir) = file_config.data_dir {
                // Relative paths are resolved against the config file's directory
                let resolved = if dir.is_relative() {
                    path.parent().map(|p| p.join(&dir)).unwrap_or(dir)
                } else {
                    dir
                };
                data_dir = ConfigValue::new(resolved, ConfigSource::File);
            }
            if let Some(sync_config) = file_config.sync {
                sync = sync_config;
            }
            if let Some(device_config) = file_config.device {
                device = device_config;
            }
        }

        if let Ok(dir) = std::env::var("DENTRO_DATA_DIR") {
            data_dir = ConfigValue::new(PathBuf::from(dir), ConfigSource::Environment);
        }
        if let Ok(url) = std::env::var("DENTRO_SYNC_URL") {
            sync.server_url = Some(url);
        }
        if let Ok(key) = std::env::var("DENTRO_SYNC_API_KEY") {
            sync.api_key = Some(key);
        }
        if let Ok(language) = std::env::var("DENTRO_LANGUAGE") {
            device.language = Some(language);
        }
        if let Ok(theme) = std::env::var("DENTRO_THEME") {
            device.theme = Some(theme);
        }

        Ok(Self {
            data_dir,
            config_file,
            sync,
            device,
        })
    }

    /// Default config directory (platform-specific):
    /// - Linux: ~/.config/dentro/
    /// - macOS: ~/Library/Application Support/dentro/
    /// - Windows: %APPDATA%/dentro/
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("dentro")
    }

    /// Default data directory (platform-specific):
    /// - Linux: ~/.local/share/dentro/
    /// - macOS: ~/Library/Application Support/dentro/
    /// - Windows: %APPDATA%/dentro/
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("dentro")
    }

    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join("config.yaml")
    }
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("nonexistent.yaml");

        let config = Config::load(Some(config_path)).unwrap();
        assert!(config.data_dir.value.ends_with("dentro"));
        assert_eq!(config.data_dir.source, ConfigSource::Default);
        assert!(config.config_file.is_none());
        assert_eq!(config.sync.debounce_secs, 10);
        assert_eq!(config.sync.request_timeout_secs, 30);
        assert_eq!(config.sync.tie_break, TieBreak::PreferLocal);
        assert_eq!(
            config.device.cloud_excluded_settings,
            vec![
                "rxBackgroundImage",
                "consentBackgroundImage",
                "instructionsBackgroundImage"
            ]
        );
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "data_dir: /custom/clinic").unwrap();
        writeln!(file, "sync:").unwrap();
        writeln!(file, "  server_url: http://localhost:8080").unwrap();
        writeln!(file, "  api_key: secret").unwrap();
        writeln!(file, "  auto_sync: true").unwrap();
        writeln!(file, "  tie_break: content_digest").unwrap();
        writeln!(file, "device:").unwrap();
        writeln!(file, "  language: ar").unwrap();
        writeln!(file, "  pin: \"1234\"").unwrap();

        let config = Config::load(Some(config_path.clone())).unwrap();
        assert_eq!(config.data_dir.value, PathBuf::from("/custom/clinic"));
        assert_eq!(config.data_dir.source, ConfigSource::File);
        assert_eq!(config.config_file, Some(config_path));
        assert!(config.sync.is_configured());
        assert!(config.sync.auto_sync);
        assert_eq!(config.sync.debounce_secs, 10);
        assert_eq!(config.sync.tie_break, TieBreak::ContentDigest);

        let overrides = config.device.overrides();
        assert_eq!(overrides.language.as_deref(), Some("ar"));
        assert_eq!(overrides.pin.as_deref(), Some("1234"));
        assert_eq!(overrides.cloud_excluded.len(), 3);
    }

    #[test]
    fn test_relative_data_dir_resolves_against_config_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        std::fs::write(&config_path, "data_dir: clinic\n").unwrap();

        let config = Config::load(Some(config_path)).unwrap();
        assert_eq!(config.data_dir.value, temp_dir.path().join("clinic"));
    }

    #[test]
    #[ignore] // Run with --ignored; env vars can pollute parallel tests
    fn test_env_var_overrides_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "data_dir: /from/file").unwrap();

        std::env::set_var("DENTRO_DATA_DIR", "/from/env");

        let config = Config::load(Some(config_path)).unwrap();
        assert_eq!(config.data_dir.value, PathBuf::from("/from/env"));
        assert_eq!(config.data_dir.source, ConfigSource::Environment);

        std::env::remove_var("DENTRO_DATA_DIR");
    }

    #[test]
    fn test_invalid_yaml_error() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "invalid: yaml: content: [").unwrap();

        let result = Config::load(Some(config_path));
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_partial_sync_section() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "sync:").unwrap();
        writeln!(file, "  server_url: http://localhost:8080").unwrap();
        writeln!(file, "  debounce_secs: 3").unwrap();

        let config = Config::load(Some(config_path)).unwrap();
        assert_eq!(config.data_dir.source, ConfigSource::Default);
        assert!(!config.sync.is_configured());

        let settings = config.sync.settings();
        assert_eq!(settings.debounce, Duration::from_secs(3));
        assert_eq!(settings.request_timeout, Duration::from_secs(30));
    }
}
