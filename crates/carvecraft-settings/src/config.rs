//! Configuration for CarveCraft
//!
//! Configuration is organized into sections:
//! - Connection (port, baud rate, command timeout)
//! - Job execution (flow control, line delay)
//! - Jogging (step, feed rate)
//! - Console (history length)
//!
//! Files are JSON or TOML, chosen by extension, and stored in the platform
//! config directory by default.

use carvecraft_core::{ConnectionSettings, DEFAULT_BAUD_RATE, SUPPORTED_BAUD_RATES};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, SettingsError, SettingsResult};

/// Connection section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Last used port; empty when none was chosen
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Reply timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            timeout_ms: 5000,
        }
    }
}

impl ConnectionConfig {
    /// Connection settings for `port`, or for the saved port when `None`
    pub fn connection_settings(&self, port: Option<&str>) -> ConnectionSettings {
        ConnectionSettings::new(port.unwrap_or(&self.port), self.baud_rate)
    }
}

/// Line pacing mode for jobs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowControlMode {
    /// Wait for each acknowledgment only
    #[default]
    Acknowledged,
    /// Wait a fixed delay after each line
    FixedDelay,
}

/// Job execution section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    /// Pacing mode
    pub flow_control: FlowControlMode,
    /// Delay after each line in `fixed_delay` mode, in milliseconds
    pub line_delay_ms: u64,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            flow_control: FlowControlMode::Acknowledged,
            line_delay_ms: 200,
        }
    }
}

/// Jog section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JogConfig {
    /// Default jog distance in mm
    pub step: f64,
    /// Default jog feed rate in mm/min
    pub feed_rate: f64,
}

impl Default for JogConfig {
    fn default() -> Self {
        Self {
            step: 1.0,
            feed_rate: 500.0,
        }
    }
}

/// Console section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Entries kept before the oldest are dropped
    pub max_entries: usize,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            max_entries: carvecraft_core::console::DEFAULT_MAX_ENTRIES,
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Recently run programs, newest first
    pub recent_files: Vec<PathBuf>,
    /// Connection settings
    pub connection: ConnectionConfig,
    /// Job execution
    pub job: JobConfig,
    /// Jog defaults
    pub jog: JogConfig,
    /// Console
    pub console: ConsoleConfig,
}

/// Maximum number of recent files remembered
const MAX_RECENT_FILES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Toml,
}

fn format_of(path: &Path) -> SettingsResult<Format> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => Ok(Format::Json),
        Some("toml") => Ok(Format::Toml),
        other => Err(ConfigError::UnsupportedFormat(other.unwrap_or("").to_string()).into()),
    }
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Default config file location (`<config dir>/carvecraft/config.toml`)
    pub fn default_path() -> SettingsResult<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("carvecraft").join("config.toml"))
            .ok_or_else(|| {
                ConfigError::UnsupportedPlatform("no configuration directory".to_string()).into()
            })
    }

    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let format = format_of(path)?;
        let content = std::fs::read_to_string(path)
            .map_err(|e| SettingsError::LoadError(format!("{}: {}", path.display(), e)))?;

        let config: Self = match format {
            Format::Json => serde_json::from_str(&content)?,
            Format::Toml => toml::from_str(&content)?,
        };

        config.validate()?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load config from file, falling back to defaults when it does not exist
    pub fn load_or_default(path: &Path) -> SettingsResult<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to file (JSON or TOML), creating parent directories
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;

        let content = match format_of(path)? {
            Format::Json => serde_json::to_string_pretty(self)?,
            Format::Toml => toml::to_string_pretty(self)?,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SettingsError::ConfigDirectory(e.to_string()))?;
        }
        std::fs::write(path, content)
            .map_err(|e| SettingsError::SaveError(format!("{}: {}", path.display(), e)))?;

        tracing::debug!("Saved config to {}", path.display());
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> SettingsResult<()> {
        if !SUPPORTED_BAUD_RATES.contains(&self.connection.baud_rate) {
            return Err(SettingsError::invalid(
                "connection.baud_rate",
                format!("{} is not a supported baud rate", self.connection.baud_rate),
            ));
        }

        if self.connection.timeout_ms == 0 {
            return Err(SettingsError::invalid(
                "connection.timeout_ms",
                "must be > 0",
            ));
        }

        if self.job.flow_control == FlowControlMode::FixedDelay && self.job.line_delay_ms == 0 {
            return Err(SettingsError::invalid(
                "job.line_delay_ms",
                "must be > 0 in fixed_delay mode",
            ));
        }

        if self.jog.step.is_nan() || self.jog.step <= 0.0 {
            return Err(SettingsError::invalid("jog.step", "must be > 0"));
        }

        if self.jog.feed_rate.is_nan() || self.jog.feed_rate <= 0.0 {
            return Err(SettingsError::invalid("jog.feed_rate", "must be > 0"));
        }

        if self.console.max_entries == 0 {
            return Err(SettingsError::invalid("console.max_entries", "must be > 0"));
        }

        Ok(())
    }

    /// Add file to recent files list
    pub fn add_recent_file(&mut self, path: PathBuf) {
        self.recent_files.retain(|f| f != &path);
        self.recent_files.insert(0, path);
        self.recent_files.truncate(MAX_RECENT_FILES);
    }
}
