//! Built-in default values for the monitor configuration.
//!
//! Defaults mirror the deployed facility thresholds. Sentinel readings
//! are reserved values the station firmware emits when a sensor has
//! faulted or disconnected; they have no physical meaning and must
//! never be classified as real data.

/// Cache retention horizon (seconds): 5 hours of context.
pub const RETENTION_HORIZON_SECS: u64 = 5 * 60 * 60;

/// Symmetric time radius around an anomaly for context capture (seconds).
pub const CONTEXT_RADIUS_SECS: u64 = 300;

/// Accelerometer nominal sample rate (Hz).
pub const SAMPLE_RATE_HZ: f64 = 500.0;

/// High-pass cutoff for gravity/DC removal (Hz).
pub const HIGHPASS_CUTOFF_HZ: f64 = 1.0;

// === Acceptable ranges ===
pub const TEMP_ACCEPTABLE_MIN: f64 = 18.0;
pub const TEMP_ACCEPTABLE_MAX: f64 = 30.0;
pub const HUMIDITY_ACCEPTABLE_MIN: f64 = 30.0;
pub const HUMIDITY_ACCEPTABLE_MAX: f64 = 70.0;
pub const LIGHT_ACCEPTABLE_MIN: f64 = 0.0;
pub const LIGHT_ACCEPTABLE_MAX: f64 = 1000.0;
pub const PARTICLE_ACCEPTABLE_MIN: f64 = 0.0;
pub const PARTICLE_ACCEPTABLE_MAX: f64 = 150.0;

// === Sensor hardware extremes ===
pub const TEMP_EXTREME_MIN: f64 = -40.0;
pub const TEMP_EXTREME_MAX: f64 = 85.0;
pub const HUMIDITY_EXTREME_MIN: f64 = 0.0;
pub const HUMIDITY_EXTREME_MAX: f64 = 100.0;
pub const LIGHT_EXTREME_MIN: f64 = 0.0;
pub const LIGHT_EXTREME_MAX: f64 = 120_000.0;
pub const PARTICLE_EXTREME_MIN: f64 = 0.0;
pub const PARTICLE_EXTREME_MAX: f64 = 1000.0;

// === Trend early-warning margins ===
pub const TEMP_WARNING_MARGIN: f64 = 2.0;
pub const HUMIDITY_WARNING_MARGIN: f64 = 5.0;
pub const LIGHT_WARNING_MARGIN: f64 = 100.0;
pub const PARTICLE_WARNING_MARGIN: f64 = 25.0;
pub const VIBRATION_WARNING_MARGIN: f64 = 0.05;

// === Disconnect sentinels (firmware fault codes) ===
pub const TEMP_SENTINEL: f64 = -500.0;
pub const HUMIDITY_SENTINEL: f64 = 150.0;
pub const PARTICLE_SENTINEL: f64 = 65535.0;
pub const VIBRATION_SENTINEL: f64 = -1.0;

// === Vibration bounds ===
/// Single magnitude bound for scalar vibration readings (m/s²).
pub const VIBRATION_MAGNITUDE_MAX: f64 = 1.0;
/// Independent per-axis bounds for triple readings (m/s²).
pub const VIBRATION_AXIS_MAX: [f64; 3] = [0.8, 0.8, 0.8];
