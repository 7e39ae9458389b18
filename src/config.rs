//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! The robot's address and channel are deliberately absent: they are fixed
//! in [`crate::transport`]. The configuration only names the local RFCOMM
//! node bound to that address, the window title and where logs go.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::{HarnessError, Result};
use crate::transport::link::RFCOMM_BAUD_RATE;

/// Where the binary looks for its configuration
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Line rates the RFCOMM TTY driver accepts without complaint
const SUPPORTED_BAUD_RATES: &[u32] = &[9600, 57600, 115200, 230400, 460800, 921600];

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub link: LinkConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Local side of the Bluetooth link
#[derive(Debug, Deserialize, Clone)]
pub struct LinkConfig {
    #[serde(default = "default_tty_path")]
    pub tty_path: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
}

/// Diagnostics window
#[derive(Debug, Deserialize, Clone)]
pub struct DisplayConfig {
    #[serde(default = "default_title")]
    pub title: String,
}

/// Log file output
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions
fn default_tty_path() -> String { "/dev/rfcomm0".to_string() }
fn default_baud_rate() -> u32 { RFCOMM_BAUD_RATE }

fn default_title() -> String { "Joystick Drive".to_string() }

fn default_log_dir() -> String { "./logs".to_string() }
fn default_log_level() -> String { "info".to_string() }

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            tty_path: default_tty_path(),
            baud_rate: default_baud_rate(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use joydrive::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to defaults
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be loaded
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    fn validate(&self) -> Result<()> {
        if self.link.tty_path.is_empty() {
            return Err(invalid("link tty_path cannot be empty"));
        }

        if !SUPPORTED_BAUD_RATES.contains(&self.link.baud_rate) {
            return Err(invalid(format!(
                "baud_rate must be one of: {}",
                SUPPORTED_BAUD_RATES
                    .iter()
                    .map(|rate| rate.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }

        if self.logging.log_dir.is_empty() {
            return Err(invalid("logging log_dir cannot be empty"));
        }

        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(invalid(format!(
                "logging level must be one of: {}",
                LOG_LEVELS.join(", ")
            )));
        }

        Ok(())
    }
}

fn invalid(msg: impl std::fmt::Display) -> HarnessError {
    HarnessError::Config(toml::de::Error::custom(msg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();
        temp_file.flush().unwrap();
        temp_file
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.link.tty_path, "/dev/rfcomm0");
        assert_eq!(config.link.baud_rate, 115200);
        assert_eq!(config.display.title, "Joystick Drive");
        assert_eq!(config.logging.log_dir, "./logs");
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_config_from_file() {
        let file = write_config(
            r#"
[link]
tty_path = "/dev/rfcomm1"

[display]
title = "Bench"

[logging]
level = "debug"
"#,
        );

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.link.tty_path, "/dev/rfcomm1");
        assert_eq!(config.link.baud_rate, 115200);
        assert_eq!(config.display.title, "Bench");
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let file = write_config("");
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.link.tty_path, "/dev/rfcomm0");
    }

    #[test]
    fn test_empty_tty_path() {
        let mut config = Config::default();
        config.link.tty_path = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unsupported_baud_rate() {
        let mut config = Config::default();
        config.link.baud_rate = 420000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_log_dir() {
        let mut config = Config::default();
        config.logging.log_dir = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_log_level() {
        let mut config = Config::default();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_remote_address_is_not_configurable() {
        let file = write_config(
            r#"
[link]
address = "00:11:22:33:44:55"
channel = 3
"#,
        );

        // Unknown keys are ignored; the fixed address still applies
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.link.tty_path, "/dev/rfcomm0");
    }

    #[test]
    fn test_invalid_toml_is_rejected() {
        let file = write_config("[link\ntty_path = ");
        assert!(matches!(Config::load(file.path()), Err(HarnessError::Config(_))));
    }

    #[test]
    fn test_load_or_default_without_file() {
        let config = Config::load_or_default("/nonexistent/joydrive.toml").unwrap();
        assert_eq!(config.display.title, "Joystick Drive");
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        assert!(matches!(
            Config::load("/nonexistent/joydrive.toml"),
            Err(HarnessError::Io(_))
        ));
    }
}
