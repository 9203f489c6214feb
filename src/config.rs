//! Configuration management for the motion alert engine.
//!
//! Configuration is loaded from an optional file and then overridden by
//! environment variables prefixed with `MOTION_SENTRY` (for example
//! `MOTION_SENTRY_DETECTION__THRESHOLD=25`).

use crate::core_modules::alert_manager::{DEFAULT_EVENT_CHANNEL_CAPACITY, ManagerSettings};
use crate::core_modules::motion_estimator::{
    DEFAULT_NOISE_FLOOR, DEFAULT_SENSITIVITY_MULTIPLIER, EstimatorSettings,
};
use crate::core_modules::motion_gate::{DEFAULT_COOLDOWN_MS, DEFAULT_THRESHOLD, GateSettings};
use crate::parallel_pipeline::DEFAULT_FRAME_QUEUE_SIZE;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

pub const ENV_PREFIX: &str = "MOTION_SENTRY";

pub const THRESHOLD_RANGE: (f64, f64) = (10.0, 100.0);
pub const SENSITIVITY_RANGE: (f64, f64) = (0.1, 2.0);

/// Main configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MonitorConfig {
    #[serde(default)]
    pub detection: DetectionConfig,

    #[serde(default)]
    pub alerts: AlertConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Known cameras; frames from unlisted sources are still accepted.
    #[serde(default)]
    pub sources: Vec<SourceConfig>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Motion detection tunables.
#[derive(Debug, Clone, Deserialize)]
pub struct DetectionConfig {
    /// Intensity a reading must exceed to raise an alert (10-100)
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    /// Scales raw frame difference into intensity (0.1-2.0)
    #[serde(default = "default_sensitivity_multiplier")]
    pub sensitivity_multiplier: f64,

    /// Minimum spacing between alerts of the same source
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,

    /// Summed per-pixel channel difference treated as sensor noise
    #[serde(default = "default_noise_floor")]
    pub noise_floor: u32,
}

/// Alert side-effect toggles.
#[derive(Debug, Clone, Deserialize)]
pub struct AlertConfig {
    #[serde(default = "default_true")]
    pub sound_enabled: bool,

    #[serde(default = "default_true")]
    pub notifications_enabled: bool,

    /// Buffered alert events per subscriber
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

/// Frame hand-off settings for the async pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Frames queued per source before submitters wait or drop
    #[serde(default = "default_frame_queue_size")]
    pub frame_queue_size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SourceConfig {
    pub id: String,

    /// Display name; defaults to the id
    #[serde(default)]
    pub name: Option<String>,
}

impl SourceConfig {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format (json, pretty)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}
fn default_sensitivity_multiplier() -> f64 {
    DEFAULT_SENSITIVITY_MULTIPLIER
}
fn default_cooldown_ms() -> u64 {
    DEFAULT_COOLDOWN_MS
}
fn default_noise_floor() -> u32 {
    DEFAULT_NOISE_FLOOR
}
fn default_true() -> bool {
    true
}
fn default_event_channel_capacity() -> usize {
    DEFAULT_EVENT_CHANNEL_CAPACITY
}
fn default_frame_queue_size() -> usize {
    DEFAULT_FRAME_QUEUE_SIZE
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            sensitivity_multiplier: default_sensitivity_multiplier(),
            cooldown_ms: default_cooldown_ms(),
            noise_floor: default_noise_floor(),
        }
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            sound_enabled: true,
            notifications_enabled: true,
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            frame_queue_size: default_frame_queue_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl MonitorConfig {
    /// Load configuration from an optional file, then environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from_str(contents, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        let detection = &self.detection;

        if !(THRESHOLD_RANGE.0..=THRESHOLD_RANGE.1).contains(&detection.threshold) {
            return Err(ConfigValidationError::InvalidValue {
                field: "detection.threshold".to_string(),
                message: format!(
                    "must be between {} and {}",
                    THRESHOLD_RANGE.0, THRESHOLD_RANGE.1
                ),
            });
        }

        if !(SENSITIVITY_RANGE.0..=SENSITIVITY_RANGE.1).contains(&detection.sensitivity_multiplier) {
            return Err(ConfigValidationError::InvalidValue {
                field: "detection.sensitivity_multiplier".to_string(),
                message: format!(
                    "must be between {} and {}",
                    SENSITIVITY_RANGE.0, SENSITIVITY_RANGE.1
                ),
            });
        }

        if self.pipeline.frame_queue_size == 0 {
            return Err(ConfigValidationError::InvalidValue {
                field: "pipeline.frame_queue_size".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }

        let mut seen = HashSet::new();
        for source in &self.sources {
            if source.id.trim().is_empty() {
                return Err(ConfigValidationError::MissingField("sources.id".to_string()));
            }
            if !seen.insert(source.id.as_str()) {
                return Err(ConfigValidationError::InvalidValue {
                    field: "sources.id".to_string(),
                    message: format!("duplicate source id {}", source.id),
                });
            }
        }

        Ok(())
    }
}

impl DetectionConfig {
    pub fn estimator_settings(&self) -> EstimatorSettings {
        EstimatorSettings {
            sensitivity_multiplier: self.sensitivity_multiplier,
            noise_floor: self.noise_floor,
        }
    }

    pub fn gate_settings(&self) -> GateSettings {
        GateSettings {
            threshold: self.threshold,
            cooldown_ms: self.cooldown_ms,
        }
    }
}

impl AlertConfig {
    pub fn manager_settings(&self) -> ManagerSettings {
        ManagerSettings {
            sound_enabled: self.sound_enabled,
            notifications_enabled: self.notifications_enabled,
            event_channel_capacity: self.event_channel_capacity,
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}
