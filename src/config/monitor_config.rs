//! Monitor configuration structures and TOML loading.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use super::defaults;
use crate::types::SensorKind;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("failed to parse config file {0}: {1}")]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Policy for collapsing a filtered acceleration series into a vibration reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReductionMode {
    /// Per-axis maximum of filtered acceleration combined as a Euclidean
    /// norm, rounded to 2 decimals. Matches the latest station firmware
    /// pairing; yields a scalar reading.
    #[default]
    MaxAccelMagnitude,
    /// Mean displacement per axis after double integration. Yields a
    /// per-axis triple reading.
    MeanDisplacement,
}

/// Policy for range-checking vibration readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VibrationCheckMode {
    /// Scalar readings against the single magnitude bound; triple readings
    /// per-axis against independent bounds.
    #[default]
    PerAxis,
    /// Collapse every reading to its magnitude and check the single bound.
    MagnitudeOnly,
}

/// Limits for one environmental sensor channel.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SensorLimits {
    /// Operationally meaningful band; violation is an anomaly.
    pub acceptable_min: f64,
    pub acceptable_max: f64,
    /// Hardware ceiling/floor; violation means a saturated or failed
    /// sensor, logged but never a classification reason.
    pub extreme_min: f64,
    pub extreme_max: f64,
    /// Trend early-warning margin relative to the acceptable bounds.
    pub warning_margin: f64,
    /// Reserved reading meaning "sensor disconnected/faulted".
    #[serde(default)]
    pub sentinel: Option<f64>,
}

/// Vibration-specific limits (two range-check shapes).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VibrationLimits {
    /// Single bound for scalar magnitude readings (m/s²).
    pub magnitude_max: f64,
    /// Independent per-axis bounds for triple readings (m/s²).
    pub axis_max: [f64; 3],
    pub warning_margin: f64,
    pub sentinel: f64,
}

impl Default for VibrationLimits {
    fn default() -> Self {
        Self {
            magnitude_max: defaults::VIBRATION_MAGNITUDE_MAX,
            axis_max: defaults::VIBRATION_AXIS_MAX,
            warning_margin: defaults::VIBRATION_WARNING_MARGIN,
            sentinel: defaults::VIBRATION_SENTINEL,
        }
    }
}

/// Per-sensor limit table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorTable {
    pub temperature: SensorLimits,
    pub humidity: SensorLimits,
    pub ambient_light: SensorLimits,
    pub particle_count: SensorLimits,
    pub vibration: VibrationLimits,
}

impl Default for SensorTable {
    fn default() -> Self {
        Self {
            temperature: SensorLimits {
                acceptable_min: defaults::TEMP_ACCEPTABLE_MIN,
                acceptable_max: defaults::TEMP_ACCEPTABLE_MAX,
                extreme_min: defaults::TEMP_EXTREME_MIN,
                extreme_max: defaults::TEMP_EXTREME_MAX,
                warning_margin: defaults::TEMP_WARNING_MARGIN,
                sentinel: Some(defaults::TEMP_SENTINEL),
            },
            humidity: SensorLimits {
                acceptable_min: defaults::HUMIDITY_ACCEPTABLE_MIN,
                acceptable_max: defaults::HUMIDITY_ACCEPTABLE_MAX,
                extreme_min: defaults::HUMIDITY_EXTREME_MIN,
                extreme_max: defaults::HUMIDITY_EXTREME_MAX,
                warning_margin: defaults::HUMIDITY_WARNING_MARGIN,
                sentinel: Some(defaults::HUMIDITY_SENTINEL),
            },
            ambient_light: SensorLimits {
                acceptable_min: defaults::LIGHT_ACCEPTABLE_MIN,
                acceptable_max: defaults::LIGHT_ACCEPTABLE_MAX,
                extreme_min: defaults::LIGHT_EXTREME_MIN,
                extreme_max: defaults::LIGHT_EXTREME_MAX,
                warning_margin: defaults::LIGHT_WARNING_MARGIN,
                sentinel: None,
            },
            particle_count: SensorLimits {
                acceptable_min: defaults::PARTICLE_ACCEPTABLE_MIN,
                acceptable_max: defaults::PARTICLE_ACCEPTABLE_MAX,
                extreme_min: defaults::PARTICLE_EXTREME_MIN,
                extreme_max: defaults::PARTICLE_EXTREME_MAX,
                warning_margin: defaults::PARTICLE_WARNING_MARGIN,
                sentinel: Some(defaults::PARTICLE_SENTINEL),
            },
            vibration: VibrationLimits::default(),
        }
    }
}

impl SensorTable {
    /// Limits for an environmental channel; `None` for vibration, which
    /// carries its own two-shape limit structure.
    pub fn limits(&self, sensor: SensorKind) -> Option<&SensorLimits> {
        match sensor {
            SensorKind::Temperature => Some(&self.temperature),
            SensorKind::Humidity => Some(&self.humidity),
            SensorKind::AmbientLight => Some(&self.ambient_light),
            SensorKind::ParticleCount => Some(&self.particle_count),
            SensorKind::Vibration => None,
        }
    }
}

/// Top-level monitor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Cache retention horizon (seconds).
    pub retention_horizon_secs: u64,
    /// Symmetric context-capture radius around an anomaly (seconds).
    pub context_radius_secs: u64,
    /// Accelerometer nominal sample rate (Hz).
    pub sample_rate_hz: f64,
    /// High-pass cutoff for gravity removal (Hz).
    pub highpass_cutoff_hz: f64,
    pub reduction: ReductionMode,
    pub vibration_check: VibrationCheckMode,
    pub sensors: SensorTable,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            retention_horizon_secs: defaults::RETENTION_HORIZON_SECS,
            context_radius_secs: defaults::CONTEXT_RADIUS_SECS,
            sample_rate_hz: defaults::SAMPLE_RATE_HZ,
            highpass_cutoff_hz: defaults::HIGHPASS_CUTOFF_HZ,
            reduction: ReductionMode::default(),
            vibration_check: VibrationCheckMode::default(),
            sensors: SensorTable::default(),
        }
    }
}

impl MonitorConfig {
    /// Load configuration using the standard search order.
    ///
    /// Never fails: falls back to built-in defaults so the engine can
    /// always start.
    pub fn load() -> Self {
        if let Ok(path) = std::env::var("FABWATCH_CONFIG") {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded monitor config from FABWATCH_CONFIG");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from FABWATCH_CONFIG, falling back");
                    }
                }
            } else {
                warn!(path = %path, "FABWATCH_CONFIG points to non-existent file, falling back");
            }
        }

        let local = PathBuf::from("fabwatch.toml");
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded monitor config from ./fabwatch.toml");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./fabwatch.toml, using defaults");
                }
            }
        }

        info!("Using built-in default monitor config");
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let config: Self =
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Sanity-check ranges and rates.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate_hz <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "sample_rate_hz must be positive, got {}",
                self.sample_rate_hz
            )));
        }
        if self.highpass_cutoff_hz <= 0.0 || self.highpass_cutoff_hz >= self.sample_rate_hz / 2.0 {
            return Err(ConfigError::Invalid(format!(
                "highpass_cutoff_hz {} outside (0, nyquist={})",
                self.highpass_cutoff_hz,
                self.sample_rate_hz / 2.0
            )));
        }
        for sensor in [
            SensorKind::Temperature,
            SensorKind::Humidity,
            SensorKind::AmbientLight,
            SensorKind::ParticleCount,
        ] {
            // limits() is Some for every environmental channel
            if let Some(limits) = self.sensors.limits(sensor) {
                if limits.acceptable_min > limits.acceptable_max {
                    return Err(ConfigError::Invalid(format!(
                        "{sensor}: acceptable_min {} > acceptable_max {}",
                        limits.acceptable_min, limits.acceptable_max
                    )));
                }
                if limits.extreme_min > limits.extreme_max {
                    return Err(ConfigError::Invalid(format!(
                        "{sensor}: extreme_min {} > extreme_max {}",
                        limits.extreme_min, limits.extreme_max
                    )));
                }
                if limits.warning_margin < 0.0 {
                    return Err(ConfigError::Invalid(format!(
                        "{sensor}: negative warning_margin {}",
                        limits.warning_margin
                    )));
                }
            }
        }
        if self.sensors.vibration.magnitude_max <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "vibration magnitude_max must be positive, got {}",
                self.sensors.vibration.magnitude_max
            )));
        }
        Ok(())
    }

    pub fn retention_horizon(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.retention_horizon_secs as i64)
    }

    pub fn context_radius(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.context_radius_secs as i64)
    }
}
