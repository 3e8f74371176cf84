//! Configuration types for Sessiontap

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::event::{ConsoleLevel, DEFAULT_MAX_LEN};
use crate::{Result, TapError};

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Which interceptors are installed while recording
    pub interceptors: InterceptorToggles,
    /// Console interception settings
    pub console: ConsoleConfig,
    /// Serialization limits
    pub limits: LimitsConfig,
    /// Media capture settings
    pub capture: CaptureConfig,
}

/// Per-family interceptor switches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterceptorToggles {
    /// console methods
    pub console: bool,
    /// fetch and XHR
    pub network: bool,
    /// localStorage / sessionStorage
    pub storage: bool,
    /// IndexedDB
    pub indexed_db: bool,
}

impl Default for InterceptorToggles {
    fn default() -> Self {
        Self {
            console: true,
            network: true,
            storage: true,
            indexed_db: true,
        }
    }
}

/// Console interception settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Levels that are recorded
    pub levels: Vec<ConsoleLevel>,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            levels: ConsoleLevel::ALL.to_vec(),
        }
    }
}

/// Serialization limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Cap, in characters, for any serialized value
    pub max_serialized_len: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_serialized_len: DEFAULT_MAX_LEN,
        }
    }
}

/// Media capture settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Encoder chunk interval in milliseconds
    pub timeslice_ms: u64,
    /// How long stop waits for the encoder to confirm, in milliseconds
    pub stop_timeout_ms: u64,
    /// Container/codec preferences, first supported wins
    pub mime_preferences: Vec<String>,
    /// Mix in microphone audio when available
    pub microphone: bool,
    /// Ask for system audio with the display stream
    pub system_audio: bool,
    /// Pre-select the current tab in the picker
    pub prefer_current_tab: bool,
    /// Microphone echo cancellation
    pub echo_cancellation: bool,
    /// Microphone noise suppression
    pub noise_suppression: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            timeslice_ms: 1000,
            stop_timeout_ms: 5000,
            mime_preferences: vec![
                "video/webm;codecs=vp9,opus".to_string(),
                "video/webm;codecs=vp8,opus".to_string(),
                "video/webm".to_string(),
            ],
            microphone: true,
            system_audio: true,
            prefer_current_tab: true,
            echo_cancellation: true,
            noise_suppression: true,
        }
    }
}

impl CaptureConfig {
    /// Encoder chunk interval
    #[must_use]
    pub fn timeslice(&self) -> Duration {
        Duration::from_millis(self.timeslice_ms)
    }

    /// Stop confirmation bound
    #[must_use]
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

impl RecorderConfig {
    /// Load configuration from TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read, parsed or validated
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TapError::ConfigError(format!("Failed to read config file: {e}")))?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    ///
    /// # Errors
    ///
    /// Returns error if the text cannot be parsed or validated
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| TapError::ConfigError(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns error if configuration is invalid
    pub fn validate(&self) -> Result<()> {
        if self.capture.mime_preferences.is_empty() {
            return Err(TapError::ConfigError(
                "capture.mime_preferences cannot be empty".to_string(),
            ));
        }

        if let Some(i) = self.capture.mime_preferences.iter().position(String::is_empty) {
            return Err(TapError::ConfigError(format!(
                "capture.mime_preferences[{i}] cannot be empty"
            )));
        }

        if self.capture.timeslice_ms == 0 {
            return Err(TapError::ConfigError(
                "capture.timeslice_ms must be > 0".to_string(),
            ));
        }

        if self.capture.stop_timeout_ms == 0 {
            return Err(TapError::ConfigError(
                "capture.stop_timeout_ms must be > 0".to_string(),
            ));
        }

        if self.limits.max_serialized_len == 0 {
            return Err(TapError::ConfigError(
                "limits.max_serialized_len must be > 0".to_string(),
            ));
        }

        if self.interceptors.console && self.console.levels.is_empty() {
            return Err(TapError::ConfigError(
                "console.levels cannot be empty while the console interceptor is enabled"
                    .to_string(),
            ));
        }

        if let Some(i) = self
            .console
            .levels
            .iter()
            .enumerate()
            .position(|(i, level)| self.console.levels[..i].contains(level))
        {
            return Err(TapError::ConfigError(format!(
                "console.levels[{i}] repeats level '{}'",
                self.console.levels[i]
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_defaults() {
        let config = RecorderConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.limits.max_serialized_len, 500);
        assert_eq!(config.capture.timeslice(), Duration::from_secs(1));
        assert_eq!(config.capture.mime_preferences[0], "video/webm;codecs=vp9,opus");
        assert_eq!(config.console.levels.len(), 5);
    }

    #[test]
    fn test_config_parse_partial() {
        let config_toml = r#"
            [interceptors]
            indexed_db = false

            [console]
            levels = ["warn", "error"]

            [capture]
            timeslice_ms = 250
        "#;

        let config = RecorderConfig::from_toml_str(config_toml).unwrap();
        assert!(config.interceptors.console);
        assert!(!config.interceptors.indexed_db);
        assert_eq!(config.console.levels, vec![ConsoleLevel::Warn, ConsoleLevel::Error]);
        assert_eq!(config.capture.timeslice_ms, 250);
        assert_eq!(config.capture.stop_timeout_ms, 5000);
    }

    #[test]
    fn test_config_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        let config_toml = r#"
            [limits]
            max_serialized_len = 80
        "#;
        file.write_all(config_toml.as_bytes()).unwrap();

        let config = RecorderConfig::from_file(file.path()).unwrap();
        assert_eq!(config.limits.max_serialized_len, 80);
    }

    #[test]
    fn test_invalid_config_empty_mime_preferences() {
        let config_toml = r"
            [capture]
            mime_preferences = []
        ";

        let err = RecorderConfig::from_toml_str(config_toml).unwrap_err();
        assert!(matches!(err, TapError::ConfigError(_)));
    }

    #[test]
    fn test_invalid_config_zero_limits() {
        let mut config = RecorderConfig::default();
        config.capture.timeslice_ms = 0;
        assert!(config.validate().is_err());

        let mut config = RecorderConfig::default();
        config.limits.max_serialized_len = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_levels_only_rejected_when_console_enabled() {
        let mut config = RecorderConfig::default();
        config.console.levels.clear();
        assert!(config.validate().is_err());

        config.interceptors.console = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_level_is_rejected() {
        let config_toml = r#"
            [console]
            levels = ["trace"]
        "#;
        assert!(RecorderConfig::from_toml_str(config_toml).is_err());
    }

    #[test]
    fn test_duplicate_level_is_rejected() {
        let config_toml = r#"
            [console]
            levels = ["log", "warn", "log"]
        "#;
        let err = RecorderConfig::from_toml_str(config_toml).unwrap_err();
        assert!(matches!(err, TapError::ConfigError(ref m) if m.contains("console.levels[2]")));
    }
}
