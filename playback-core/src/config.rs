use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::streaming::classifier::DEFAULT_MANIFEST_EXTENSIONS;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
const LOG_FORMATS: &[&str] = &["full", "compact"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

impl ConfigError {
    fn invalid(message: impl Into<String>) -> Self {
        ConfigError::Invalid {
            message: message.into(),
        }
    }
}

/// Controller configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Source classification settings
    pub classifier: ClassifierConfig,

    /// Error recovery bounds
    pub recovery: RecoveryConfig,

    /// Options handed to the streaming engine
    pub engine: EngineConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Path extensions that identify a segment manifest, without the dot
    pub manifest_extensions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Load restarts allowed before a recurring network error fails the session
    pub network_max_retries: u32,

    /// In-place media recoveries allowed over a session's lifetime
    pub media_max_recoveries: u32,

    /// Run buffer recovery on stalls
    pub stall_recovery: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Ask the engine for low-latency playlist handling
    pub low_latency: bool,

    /// Forward buffer target, in milliseconds on disk
    #[serde(with = "crate::serde_helpers::duration_ms")]
    pub max_buffer_length: Duration,

    /// Enable the engine's own debug output
    pub debug: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (full, compact)
    pub format: String,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            manifest_extensions: DEFAULT_MANIFEST_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        }
    }
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            network_max_retries: 1,
            media_max_recoveries: 3,
            stall_recovery: true,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            low_latency: false,
            max_buffer_length: Duration::from_secs(30),
            debug: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "full".to_string(),
        }
    }
}

impl ControllerConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: ControllerConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.classifier.manifest_extensions.is_empty() {
            return Err(ConfigError::invalid(
                "At least one manifest extension must be configured",
            ));
        }

        for ext in &self.classifier.manifest_extensions {
            if ext.is_empty() || ext.contains('.') || ext.chars().any(char::is_whitespace) {
                return Err(ConfigError::invalid(format!(
                    "Manifest extension {:?} must be a bare extension like \"m3u8\"",
                    ext
                )));
            }
        }

        if self.recovery.media_max_recoveries == 0 {
            return Err(ConfigError::invalid(
                "Media recovery bound must be greater than 0",
            ));
        }

        if !LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::invalid(format!(
                "Unknown log level: {}",
                self.logging.level
            )));
        }

        if !LOG_FORMATS.contains(&self.logging.format.as_str()) {
            return Err(ConfigError::invalid(format!(
                "Unknown log format: {}",
                self.logging.format
            )));
        }

        Ok(())
    }
}

/// Loads, saves and validates a `ControllerConfig` file
pub struct ConfigManager {
    config_path: PathBuf,
    config: ControllerConfig,
}

impl ConfigManager {
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            config: ControllerConfig::default(),
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Load configuration from file, writing the defaults when it does not exist
    pub async fn load(&mut self) -> Result<(), ConfigError> {
        if !tokio::fs::try_exists(&self.config_path)
            .await
            .unwrap_or(false)
        {
            self.save().await?;
            return Ok(());
        }

        let content = tokio::fs::read_to_string(&self.config_path)
            .await
            .map_err(|source| ConfigError::Read {
                path: self.config_path.clone(),
                source,
            })?;

        self.config = ControllerConfig::from_toml_str(&content)?;
        Ok(())
    }

    pub async fn save(&self) -> Result<(), ConfigError> {
        let content = self.config.to_toml_string()?;

        if let Some(parent) = self.config_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|source| ConfigError::Write {
                        path: parent.to_path_buf(),
                        source,
                    })?;
            }
        }

        tokio::fs::write(&self.config_path, content)
            .await
            .map_err(|source| ConfigError::Write {
                path: self.config_path.clone(),
                source,
            })?;

        Ok(())
    }

    pub fn get_config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn get_config_mut(&mut self) -> &mut ControllerConfig {
        &mut self.config
    }

    pub fn update_config(&mut self, config: ControllerConfig) -> Result<(), ConfigError> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    pub fn into_config(self) -> ControllerConfig {
        self.config
    }
}

/// Environment-based configuration override
pub struct EnvConfigOverride;

impl EnvConfigOverride {
    /// Apply `PLAYBACK_*` environment variable overrides to configuration
    pub fn apply_overrides(config: &mut ControllerConfig) {
        Self::apply_from(config, |key| std::env::var(key).ok());
    }

    fn apply_from<F>(config: &mut ControllerConfig, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(exts) = lookup("PLAYBACK_MANIFEST_EXTENSIONS") {
            let exts: Vec<String> = exts
                .split(',')
                .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
                .filter(|ext| !ext.is_empty())
                .collect();
            if !exts.is_empty() {
                config.classifier.manifest_extensions = exts;
            }
        }

        if let Some(retries) = lookup("PLAYBACK_NETWORK_MAX_RETRIES") {
            if let Ok(retries) = retries.parse::<u32>() {
                config.recovery.network_max_retries = retries;
            }
        }

        if let Some(recoveries) = lookup("PLAYBACK_MEDIA_MAX_RECOVERIES") {
            if let Ok(recoveries) = recoveries.parse::<u32>() {
                config.recovery.media_max_recoveries = recoveries;
            }
        }

        if let Some(enabled) = lookup("PLAYBACK_STALL_RECOVERY") {
            config.recovery.stall_recovery = enabled.to_lowercase() == "true";
        }

        if let Some(level) = lookup("PLAYBACK_LOG_LEVEL") {
            config.logging.level = level;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config_is_valid() {
        let config = ControllerConfig::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.classifier.manifest_extensions, vec!["m3u8"]);
        assert_eq!(config.recovery.network_max_retries, 1);
        assert_eq!(config.recovery.media_max_recoveries, 3);
        assert!(config.recovery.stall_recovery);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = ControllerConfig::from_toml_str(
            r#"
            [recovery]
            network_max_retries = 2

            [engine]
            max_buffer_length = 1500
            "#,
        )
        .unwrap();

        assert_eq!(config.recovery.network_max_retries, 2);
        assert_eq!(config.recovery.media_max_recoveries, 3);
        assert_eq!(config.engine.max_buffer_length, Duration::from_millis(1500));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = ControllerConfig::default();
        config.classifier.manifest_extensions.clear();
        assert!(config.validate().is_err());

        let mut config = ControllerConfig::default();
        config.classifier.manifest_extensions = vec![".m3u8".to_string()];
        assert!(config.validate().is_err());

        let mut config = ControllerConfig::default();
        config.recovery.media_max_recoveries = 0;
        assert!(config.validate().is_err());

        let mut config = ControllerConfig::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());

        let mut config = ControllerConfig::default();
        config.logging.format = "json".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_network_retries_is_allowed() {
        let mut config = ControllerConfig::default();
        config.recovery.network_max_retries = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("PLAYBACK_MANIFEST_EXTENSIONS", ".M3U8, mpd"),
            ("PLAYBACK_NETWORK_MAX_RETRIES", "4"),
            ("PLAYBACK_MEDIA_MAX_RECOVERIES", "not-a-number"),
            ("PLAYBACK_STALL_RECOVERY", "FALSE"),
            ("PLAYBACK_LOG_LEVEL", "debug"),
        ]
        .into_iter()
        .collect();

        let mut config = ControllerConfig::default();
        EnvConfigOverride::apply_from(&mut config, |key| {
            vars.get(key).map(|value| value.to_string())
        });

        assert_eq!(config.classifier.manifest_extensions, vec!["m3u8", "mpd"]);
        assert_eq!(config.recovery.network_max_retries, 4);
        assert_eq!(config.recovery.media_max_recoveries, 3);
        assert!(!config.recovery.stall_recovery);
        assert_eq!(config.logging.level, "debug");
    }

    #[tokio::test]
    async fn test_config_manager_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("playback.toml");

        let mut manager = ConfigManager::new(&path);
        manager.load().await.unwrap();

        assert!(path.exists());
        assert_eq!(manager.get_config(), &ControllerConfig::default());
    }

    #[tokio::test]
    async fn test_config_manager_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("playback.toml");

        let mut manager = ConfigManager::new(&path);
        let mut config = ControllerConfig::default();
        config.recovery.media_max_recoveries = 5;
        config.engine.low_latency = true;
        manager.update_config(config.clone()).unwrap();
        manager.save().await.unwrap();

        let mut reloaded = ConfigManager::new(&path);
        reloaded.load().await.unwrap();
        assert_eq!(reloaded.get_config(), &config);
    }

    #[tokio::test]
    async fn test_config_manager_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("playback.toml");
        tokio::fs::write(&path, "[recovery]\nmedia_max_recoveries = 0\n")
            .await
            .unwrap();

        let mut manager = ConfigManager::new(&path);
        let result = manager.load().await;

        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }
}
