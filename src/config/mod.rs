//! Monitor Configuration Module
//!
//! Consolidates the per-sensor limit tables that were previously scattered
//! across divergent analysis scripts into a single structure: each sensor
//! carries its acceptable range, hardware extremes, trend warning margin,
//! and disconnect sentinel. Loaded once at startup.
//!
//! ## Loading Order
//!
//! 1. `FABWATCH_CONFIG` environment variable (path to TOML file)
//! 2. `fabwatch.toml` in the current working directory
//! 3. Built-in defaults (matching the deployed threshold values)

mod monitor_config;
pub mod defaults;

pub use monitor_config::{
    ConfigError, MonitorConfig, ReductionMode, SensorLimits, SensorTable, VibrationCheckMode,
    VibrationLimits,
};
