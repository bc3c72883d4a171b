//! Configuration management for firmware-testkit
//!
//! Harness settings are persisted as TOML in a platform-specific config
//! file. Missing sections fall back to their defaults.
//!
//! ## Config File Locations
//!
//! | Platform | Path |
//! |----------|------|
//! | Linux | `~/.config/firmware-testkit/config.toml` |
//! | macOS | `~/Library/Application Support/firmware-testkit/config.toml` |
//! | Windows | `%APPDATA%\firmware-testkit\config.toml` |
//!
//! ## Example
//!
//! ```no_run
//! use firmware_testkit::Config;
//!
//! let mut config = Config::load().unwrap_or_default();
//! config.orchestrator.abort_on_first_error = true;
//! config.save().expect("Failed to save config");
//! ```

use crate::orchestrator::{OrchestratorSettings, UnconsumedReportPolicy};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error type for configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to determine config directory
    #[error("Could not determine config directory")]
    NoConfigDir,
    /// IO error reading or writing config file
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// Failed to parse config file
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Failed to serialize config
    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Returns the path to the config file.
///
/// Creates the config directory if it doesn't exist.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
    let app_dir = config_dir.join("firmware-testkit");

    if !app_dir.exists() {
        fs::create_dir_all(&app_dir)?;
    }

    Ok(app_dir.join("config.toml"))
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    /// Cycle timing and error policy
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    /// Simulated key matrix
    #[serde(default)]
    pub matrix: MatrixConfig,
    /// Binary run loop
    #[serde(default)]
    pub run: RunConfig,
}

/// Cycle timing and error policy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Simulated time per cycle
    pub cycle_duration_ms: u64,
    /// Log every assertion and report, not only failures
    pub debug: bool,
    /// Stop the run after the first recorded error
    pub abort_on_first_error: bool,
    /// Treat a report nobody queued an assertion for as an error
    pub error_if_report_without_queued_assertions: bool,
    pub unconsumed_report_policy: UnconsumedReportPolicy,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            cycle_duration_ms: 5,
            debug: false,
            abort_on_first_error: false,
            error_if_report_without_queued_assertions: false,
            unconsumed_report_policy: UnconsumedReportPolicy::QueuedOnly,
        }
    }
}

/// Key matrix dimensions
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MatrixConfig {
    pub rows: u8,
    pub cols: u8,
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self { rows: 4, cols: 16 }
    }
}

/// How the binary drives the simulator
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum RunMode {
    /// One cycle per line of key events on stdin
    #[default]
    RemoteControlled,
    /// Cycles paced against the wall clock
    Realtime,
}

/// Binary run loop configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RunConfig {
    pub mode: RunMode,
    /// Realtime loop length in simulated milliseconds; 0 runs until Ctrl-C
    pub realtime_duration_ms: u64,
    /// Where to write the JSON session report, if anywhere
    pub report_path: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            mode: RunMode::RemoteControlled,
            realtime_duration_ms: 0,
            report_path: None,
        }
    }
}

impl Config {
    /// Load configuration from the default config file.
    ///
    /// Returns the default configuration if the file doesn't exist.
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to the default config file.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = config_path()?;
        self.save_to(&path)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Settings for building a driver or simulator
    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            cycle_duration_ms: self.orchestrator.cycle_duration_ms,
            debug: self.orchestrator.debug,
            abort_on_first_error: self.orchestrator.abort_on_first_error,
            error_if_report_without_queued_assertions: self
                .orchestrator
                .error_if_report_without_queued_assertions,
            unconsumed_report_policy: self.orchestrator.unconsumed_report_policy,
            rows: self.matrix.rows,
            cols: self.matrix.cols,
        }
    }
}
