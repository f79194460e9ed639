//! Configuration for executions
//!
//! Supports multiple configuration sources with the following precedence (highest to lowest):
//! 1. Per-run settings passed to `run_with`
//! 2. Environment variables (EXECUTION_* prefix)
//! 3. Configuration file (TOML)
//! 4. Default values

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::logger::SharedLogger;

/// Construction-time configuration of one execution
///
/// Unknown fields are rejected rather than silently merged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExecutionConfig {
    /// Timeout in milliseconds (0 = disabled)
    pub timeout_ms: u64,

    /// Mask inputs so the work observes none
    pub ignore: bool,
}

impl ExecutionConfig {
    /// Parse from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::ConfigParse {
            message: e.message().to_string(),
            source: Some(e),
        })
    }

    /// Load a standalone execution config file, then apply env overrides
    pub fn load(path: &Path) -> Result<Self> {
        let content = read_config_file(path)?;
        let mut config = Self::from_toml_str(&content)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Set the timeout
    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set input masking
    pub fn ignore(mut self, ignore: bool) -> Self {
        self.ignore = ignore;
        self
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("EXECUTION_TIMEOUT_MS") {
            if let Ok(ms) = val.trim().parse() {
                self.timeout_ms = ms;
            }
        }
        if let Ok(val) = std::env::var("EXECUTION_IGNORE") {
            self.ignore = parse_bool(&val);
        }
    }
}

/// Per-run settings applied directly onto the instance
#[derive(Clone, Default)]
pub struct RunSettings {
    /// Replace the instance timeout (0 disables it)
    pub timeout_ms: Option<u64>,

    /// Replace the input mask
    pub ignore: Option<bool>,

    /// Replace the logger
    pub logger: Option<SharedLogger>,
}

impl RunSettings {
    /// Settings that only replace the timeout
    pub fn timeout(timeout_ms: u64) -> Self {
        Self {
            timeout_ms: Some(timeout_ms),
            ..Default::default()
        }
    }

    /// Settings that only replace the input mask
    pub fn ignore(ignore: bool) -> Self {
        Self {
            ignore: Some(ignore),
            ..Default::default()
        }
    }
}

impl std::fmt::Debug for RunSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunSettings")
            .field("timeout_ms", &self.timeout_ms)
            .field("ignore", &self.ignore)
            .field("logger", &self.logger.is_some())
            .finish()
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSettings {
    /// Log level: trace, debug, info, warn, error
    pub level: String,

    /// Log file path (empty = no file logging)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// Number of rotated log files to keep
    pub max_files: u32,

    /// Enable JSON formatted logging
    pub json_format: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            max_files: 5,
            json_format: false,
        }
    }
}

/// File-level settings: execution defaults plus logging
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub execution: ExecutionConfig,
    pub logging: LoggingSettings,
}

impl Settings {
    /// Load settings from a TOML file with environment variable overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = Self::default();

        // 1. Load from config file if given
        if let Some(path) = path {
            let content = read_config_file(path)?;
            settings = Self::from_toml_str(&content)?;
        }

        // 2. Apply environment variable overrides
        settings.apply_env_overrides();

        // 3. Expand paths
        if let Some(ref file) = settings.logging.file {
            settings.logging.file = Some(expand_path(file));
        }

        // 4. Validate
        settings.validate()?;

        Ok(settings)
    }

    /// Parse from TOML text without env overrides
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::ConfigParse {
            message: e.message().to_string(),
            source: Some(e),
        })
    }

    fn apply_env_overrides(&mut self) {
        self.execution.apply_env_overrides();

        if let Ok(val) = std::env::var("EXECUTION_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = std::env::var("EXECUTION_LOG_FILE") {
            self.logging.file = Some(val);
        }
        if let Ok(val) = std::env::var("EXECUTION_LOG_JSON") {
            self.logging.json_format = parse_bool(&val);
        }
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(Error::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_levels.join(", ")
            )));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<String> {
    let path = PathBuf::from(expand_path(&path.to_string_lossy()));
    if !path.exists() {
        return Err(Error::Config(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }
    debug!(path = %path.display(), "Loading configuration file");
    let content = fs::read_to_string(&path)?;
    info!(path = %path.display(), "Configuration loaded from file");
    Ok(content)
}

fn parse_bool(val: &str) -> bool {
    matches!(val.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

/// Expand ~ and environment variables in paths
fn expand_path(path: &str) -> String {
    shellexpand::full(path)
        .unwrap_or(std::borrow::Cow::Borrowed(path))
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_config_defaults() {
        let config = ExecutionConfig::default();
        assert_eq!(config.timeout_ms, 0);
        assert!(!config.ignore);
    }

    #[test]
    fn test_execution_config_from_toml() {
        let config = ExecutionConfig::from_toml_str("timeout_ms = 100\nignore = true\n").unwrap();
        assert_eq!(config, ExecutionConfig::default().timeout_ms(100).ignore(true));
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let err = ExecutionConfig::from_toml_str("timeout_ms = 1\nforce = true\n").unwrap_err();
        assert!(matches!(err, Error::ConfigParse { .. }));
        assert!(err.to_string().contains("force"));
    }

    #[test]
    fn test_settings_sections() {
        let settings = Settings::from_toml_str(
            r#"
[execution]
timeout_ms = 250

[logging]
level = "debug"
json_format = true
"#,
        )
        .unwrap();
        assert_eq!(settings.execution.timeout_ms, 250);
        assert_eq!(settings.logging.level, "debug");
        assert!(settings.logging.json_format);
        assert_eq!(settings.logging.max_files, 5);
    }

    #[test]
    fn test_invalid_log_level() {
        let mut settings = Settings::default();
        settings.logging.level = "loud".to_string();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("true"));
        assert!(parse_bool(" YES "));
        assert!(parse_bool("1"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool("nope"));
    }

    #[test]
    fn test_run_settings_helpers() {
        assert_eq!(RunSettings::timeout(100).timeout_ms, Some(100));
        assert_eq!(RunSettings::ignore(true).ignore, Some(true));
        assert!(RunSettings::default().logger.is_none());
    }
}
