use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::utils;

/// Current configuration version
pub const CURRENT_CONFIG_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Explicit database location. Unset means the profile's data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<String>,
    #[serde(default = "default_connect_retries")]
    pub connect_retries: u32,
    #[serde(default = "default_connect_retry_delay_secs")]
    pub connect_retry_delay_secs: u64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default = "default_config_version")]
    pub config_version: Option<u32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: None,
            connect_retries: default_connect_retries(),
            connect_retry_delay_secs: default_connect_retry_delay_secs(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            config_version: Some(CURRENT_CONFIG_VERSION),
        }
    }
}

// Default value functions
fn default_connect_retries() -> u32 {
    5
}

fn default_connect_retry_delay_secs() -> u64 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "compact".to_string()
}

fn default_config_version() -> Option<u32> {
    Some(CURRENT_CONFIG_VERSION)
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config directory: {0}")]
    ConfigDirError(String),
    #[error("Failed to read config file: {0}")]
    ReadError(String),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Failed to write config file: {0}")]
    WriteError(String),
}

impl Config {
    /// Load configuration from the profile's config file, or create the
    /// default one if missing
    pub fn load_with_profile(profile: utils::Profile) -> Result<Self, ConfigError> {
        let config_path = Self::get_config_path(profile)?;
        Self::load_or_create(&config_path)
    }

    /// Load `path`, writing the defaults there first when it does not exist.
    /// The database path is left unset so it follows the active profile.
    pub fn load_or_create(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            return Self::load_from_path(path);
        }
        let mut config = Config::default();
        config.save_to_path(path)?;
        Ok(config)
    }

    /// Load configuration from an explicit file. A missing file yields the
    /// defaults without writing anything.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError(e.to_string()))?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to an explicit file
    pub fn save_to_path(&mut self, path: &Path) -> Result<(), ConfigError> {
        // Ensure config version is set before saving
        self.config_version = Some(CURRENT_CONFIG_VERSION);

        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError(e.to_string()))?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::WriteError(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string).map_err(|e| ConfigError::WriteError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the config file
    pub fn get_config_path(profile: utils::Profile) -> Result<PathBuf, ConfigError> {
        let config_dir = utils::get_config_dir(profile)
            .ok_or_else(|| ConfigError::ConfigDirError("Could not determine config directory".to_string()))?;
        Ok(config_dir.join("config.toml"))
    }

    /// Get default database path for a specific profile
    pub fn default_database_path_for_profile(profile: utils::Profile) -> String {
        if let Some(data_dir) = utils::get_data_dir(profile) {
            data_dir.join("famchart.db").to_string_lossy().to_string()
        } else {
            format!("~/.local/share/{}/famchart.db", profile.app_name())
        }
    }

    /// Get the expanded database path (with ~ expansion), falling back to
    /// the profile's default location
    pub fn get_database_path(&self, profile: utils::Profile) -> PathBuf {
        match &self.database_path {
            Some(path) => utils::expand_path(path),
            None => utils::expand_path(&Self::default_database_path_for_profile(profile)),
        }
    }

    pub fn connect_retry_delay(&self) -> Duration {
        Duration::from_secs(self.connect_retry_delay_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: Config = toml::from_str(r#"database_path = "/tmp/house.db""#).unwrap();
        assert_eq!(config.database_path.as_deref(), Some("/tmp/house.db"));
        assert_eq!(config.connect_retries, 5);
        assert_eq!(config.connect_retry_delay(), Duration::from_secs(5));
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, "compact");
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("famchart").join("config.toml");

        let mut config = Config {
            database_path: Some("~/famchart.db".to_string()),
            connect_retries: 2,
            config_version: None,
            ..Config::default()
        };
        config.save_to_path(&path).unwrap();
        assert_eq!(config.config_version, Some(CURRENT_CONFIG_VERSION));

        let loaded = Config::load_from_path(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = Config::load_from_path(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(loaded.connect_retries, 5);
    }

    #[test]
    fn dev_profile_keeps_its_own_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("famchart-dev").join("config.toml");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "connect_retries = 2\n").unwrap();

        let config = Config::load_or_create(&path).unwrap();
        assert_eq!(config.connect_retries, 2);
        assert_eq!(config.database_path, None);

        let dev = config.get_database_path(utils::Profile::Dev);
        let prod = config.get_database_path(utils::Profile::Prod);
        assert_eq!(
            dev,
            utils::expand_path(&Config::default_database_path_for_profile(utils::Profile::Dev))
        );
        assert_ne!(dev, prod);
    }

    #[test]
    fn explicit_database_path_wins_over_profile() {
        let config = Config {
            database_path: Some("/srv/famchart/house.db".to_string()),
            ..Config::default()
        };
        assert_eq!(
            config.get_database_path(utils::Profile::Dev),
            PathBuf::from("/srv/famchart/house.db")
        );
    }

    #[test]
    fn first_load_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("famchart").join("config.toml");

        let created = Config::load_or_create(&path).unwrap();
        assert!(path.exists());
        assert_eq!(Config::load_or_create(&path).unwrap(), created);
        assert!(!fs::read_to_string(&path).unwrap().contains("database_path"));
    }

    #[test]
    fn invalid_toml_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "connect_retries = \"many\"").unwrap();
        assert!(matches!(Config::load_from_path(&path), Err(ConfigError::ParseError(_))));
    }
}
