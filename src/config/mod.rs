//! Monitor configuration.
//!
//! Loaded from TOML; every field has a default so a partial file (or none at
//! all) yields a working setup.

pub mod rower;

pub use rower::RowerSettings;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration of the rowing monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Default log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log level of the stroke detection and physics engine
    pub engine_log_level: String,
    /// Two sensors are fitted and the impulse sign encodes the flywheel state
    pub dual_sensor: bool,
    /// Interval for web client updates in milliseconds
    pub web_update_interval_ms: u64,
    /// Interval for peripheral (BLE) updates in milliseconds
    pub peripheral_update_interval_ms: u64,
    /// Number of stroke phases used to smooth displayed values
    pub num_of_phases_for_averaging_screen_data: usize,
    /// Seconds without a completed drive before the session is paused
    pub maximum_stroke_time: f64,
    /// Seconds before a silent heart rate monitor reads as zero
    pub heartrate_timeout_secs: f64,
    /// Rowing machine specific settings
    pub rower_settings: RowerSettings,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            engine_log_level: "warn".to_string(),
            dual_sensor: false,
            web_update_interval_ms: 1000,
            peripheral_update_interval_ms: 1000,
            num_of_phases_for_averaging_screen_data: 6,
            maximum_stroke_time: 10.0,
            heartrate_timeout_secs: 6.0,
            rower_settings: RowerSettings::default(),
        }
    }
}

impl MonitorConfig {
    /// Validate the rower settings and monitor-level invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.rower_settings.validate()?;

        if self.num_of_phases_for_averaging_screen_data == 0 {
            return Err(ConfigError::InvalidSetting(
                "num_of_phases_for_averaging_screen_data must be at least 1".to_string(),
            ));
        }
        if self.web_update_interval_ms == 0 || self.peripheral_update_interval_ms == 0 {
            return Err(ConfigError::InvalidSetting(
                "update intervals must be positive".to_string(),
            ));
        }
        if !(self.maximum_stroke_time > self.rower_settings.minimum_cycle_length()) {
            return Err(ConfigError::InvalidSetting(format!(
                "maximum_stroke_time ({}) must exceed minimum_drive_time + minimum_recovery_time",
                self.maximum_stroke_time
            )));
        }
        if !(self.heartrate_timeout_secs.is_finite() && self.heartrate_timeout_secs > 0.0) {
            return Err(ConfigError::InvalidSetting(
                "heartrate_timeout_secs must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// Tracing filter directive built from the configured log levels.
    pub fn log_filter(&self) -> String {
        format!(
            "{},rustrow::engine={}",
            self.log_level, self.engine_log_level
        )
    }

    pub fn web_update_interval(&self) -> Duration {
        Duration::from_millis(self.web_update_interval_ms)
    }

    pub fn peripheral_update_interval(&self) -> Duration {
        Duration::from_millis(self.peripheral_update_interval_ms)
    }
}

/// Get the configuration file path.
pub fn get_config_path() -> PathBuf {
    directories::ProjectDirs::from("com", "rustrow", "RustRow")
        .map(|dirs| dirs.config_dir().join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("config.toml"))
}

/// Load configuration from the default location, falling back to defaults
/// when no file exists.
pub fn load_config() -> Result<MonitorConfig, ConfigError> {
    let path = get_config_path();
    if !path.exists() {
        tracing::info!("No config at {}, using defaults", path.display());
        return Ok(MonitorConfig::default());
    }
    load_config_from(&path)
}

/// Load and validate configuration from a file.
pub fn load_config_from(path: &Path) -> Result<MonitorConfig, ConfigError> {
    let content =
        std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;

    let config: MonitorConfig =
        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

    config.validate()?;
    tracing::debug!("Loaded config from {}", path.display());

    Ok(config)
}

/// Save configuration to a file.
pub fn save_config_to(config: &MonitorConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
    }

    let content =
        toml::to_string_pretty(config).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

    std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

    Ok(())
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Invalid setting: {0}")]
    InvalidSetting(String),
}
