use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::utils;

/// Current configuration version
pub const CURRENT_CONFIG_VERSION: u32 = 1;

/// Environment variable consulted when no API key is configured
pub const API_KEY_ENV: &str = "CALPLAN_SUGGESTION_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default)]
    pub weather: WeatherConfig,
    #[serde(default)]
    pub suggestion: SuggestionConfig,
    #[serde(default = "default_config_version")]
    pub config_version: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    #[serde(default = "default_forecast_url")]
    pub forecast_url: String,
    /// Substring matched server-side against the location name
    #[serde(default = "default_location_filter")]
    pub location_filter: String,
    /// No explicit timeout when unset
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestionConfig {
    #[serde(default = "default_suggestion_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_top_p")]
    pub top_p: f64,
    #[serde(default = "default_top_k")]
    pub top_k: u32,
    #[serde(default = "default_repetition_penalty")]
    pub repetition_penalty: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_stop")]
    pub stop: Vec<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            weather: WeatherConfig::default(),
            suggestion: SuggestionConfig::default(),
            config_version: Some(CURRENT_CONFIG_VERSION),
        }
    }
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            forecast_url: default_forecast_url(),
            location_filter: default_location_filter(),
            timeout_secs: None,
        }
    }
}

impl Default for SuggestionConfig {
    fn default() -> Self {
        Self {
            endpoint: default_suggestion_endpoint(),
            api_key: None,
            model: default_model(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            top_k: default_top_k(),
            repetition_penalty: default_repetition_penalty(),
            max_tokens: default_max_tokens(),
            stop: default_stop(),
            timeout_secs: None,
        }
    }
}

impl SuggestionConfig {
    /// Configured key, else the environment variable. Blank counts as unset.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok().filter(|k| !k.trim().is_empty()))
    }
}

// Default value functions
fn default_database_path() -> String {
    // This is a fallback - actual profile will be determined at load time
    if let Some(data_dir) = utils::get_data_dir(utils::Profile::Prod) {
        data_dir.join("CalendarPlanner.db").to_string_lossy().to_string()
    } else {
        "~/.local/share/calplan/CalendarPlanner.db".to_string()
    }
}

fn default_forecast_url() -> String {
    "https://api.data.gov.my/weather/forecast".to_string()
}

fn default_location_filter() -> String {
    "Cheras".to_string()
}

fn default_suggestion_endpoint() -> String {
    "https://api.arliai.com/v1/chat/completions".to_string()
}

fn default_model() -> String {
    "Meta-Llama-3.1-8B-Instruct".to_string()
}

fn default_temperature() -> f64 {
    0.5
}

fn default_top_p() -> f64 {
    0.9
}

fn default_top_k() -> u32 {
    40
}

fn default_repetition_penalty() -> f64 {
    1.1
}

fn default_max_tokens() -> u32 {
    100
}

fn default_stop() -> Vec<String> {
    vec![".".to_string()]
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
    /// Load configuration for a profile, creating the default file if missing
    pub fn load_with_profile(profile: utils::Profile) -> Result<Self, ConfigError> {
        let config_path = Self::get_config_path(profile)?;
        Self::load_from(config_path, profile)
    }

    /// Load configuration from an explicit path, creating it if missing.
    /// The database path is only forced to the profile default when the file is new.
    pub fn load_from(config_path: PathBuf, profile: utils::Profile) -> Result<Self, ConfigError> {
        if config_path.exists() {
            let contents = fs::read_to_string(&config_path)
                .map_err(|e| ConfigError::ReadError(e.to_string()))?;
            let config: Config = toml::from_str(&contents)?;
            tracing::debug!(path = %config_path.display(), "loaded config");
            Ok(config)
        } else {
            let mut config = Config::default();
            config.database_path = Self::default_database_path_for_profile(profile);
            if let Err(ref e) = config.save_to(&config_path) {
                tracing::error!(
                    path = %config_path.display(),
                    error = %e,
                    "failed to save config file"
                );
            }
            Ok(config)
        }
    }

    /// Write the configuration as TOML, creating parent directories
    pub fn save_to(&mut self, config_path: &Path) -> Result<(), ConfigError> {
        self.config_version = Some(CURRENT_CONFIG_VERSION);

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError(e.to_string()))?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::WriteError(format!("Failed to serialize config: {}", e)))?;

        fs::write(config_path, toml_string).map_err(|e| ConfigError::WriteError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the config file
    pub fn get_config_path(profile: utils::Profile) -> Result<PathBuf, ConfigError> {
        let config_dir = utils::get_config_dir(profile).ok_or_else(|| {
            ConfigError::ConfigDirError("Could not determine config directory".to_string())
        })?;
        Ok(config_dir.join("config.toml"))
    }

    /// Get default database path for a specific profile
    fn default_database_path_for_profile(profile: utils::Profile) -> String {
        if let Some(data_dir) = utils::get_data_dir(profile) {
            data_dir.join("CalendarPlanner.db").to_string_lossy().to_string()
        } else {
            match profile {
                utils::Profile::Dev => "~/.local/share/calplan-dev/CalendarPlanner.db".to_string(),
                utils::Profile::Prod => "~/.local/share/calplan/CalendarPlanner.db".to_string(),
            }
        }
    }

    /// Get the expanded database path (with ~ expansion)
    pub fn get_database_path(&self) -> PathBuf {
        utils::expand_path(&self.database_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let config: Config = toml::from_str(
            r#"
            database_path = "/tmp/plan.db"

            [weather]
            location_filter = "Petaling"
            "#,
        )
        .unwrap();

        assert_eq!(config.database_path, "/tmp/plan.db");
        assert_eq!(config.weather.location_filter, "Petaling");
        assert_eq!(config.weather.forecast_url, default_forecast_url());
        assert_eq!(config.weather.timeout_secs, None);
        assert_eq!(config.suggestion.max_tokens, 100);
        assert_eq!(config.suggestion.stop, vec!["."]);
    }

    #[test]
    fn missing_file_is_created_then_reloaded() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut created = Config::load_from(path.clone(), utils::Profile::Dev).unwrap();
        assert!(path.exists());

        created.weather.location_filter = "Kajang".to_string();
        created.save_to(&path).unwrap();

        let reloaded = Config::load_from(path, utils::Profile::Dev).unwrap();
        assert_eq!(reloaded.weather.location_filter, "Kajang");
        assert_eq!(reloaded.database_path, created.database_path);
    }

    #[test]
    fn configured_key_beats_environment() {
        let config = SuggestionConfig {
            api_key: Some("from-file".to_string()),
            ..SuggestionConfig::default()
        };
        assert_eq!(config.resolved_api_key().as_deref(), Some("from-file"));
    }
}
