//! Range classification of a single measurement.
//!
//! Two tiers of limits apply to every reported sensor field:
//!
//! - the **acceptable range**, the operationally meaningful band;
//!   a violation appends a named reason to the result, and
//! - the **hardware extremes**, the sensor's physical ceiling/floor;
//!   a violation is logged as a hardware fault but contributes no
//!   reason, so "sensor saturated" stays distinguishable from "value in
//!   a bad but plausible region".
//!
//! Sentinel readings (firmware fault codes) are recognized first and
//! reported out-of-band; they drive the Disconnected status, never a
//! range reason. Classification is a pure function of the measurement
//! and the configured table; absence of a field is always a valid
//! state, and nothing here can fail.

use tracing::warn;

use crate::config::{MonitorConfig, SensorLimits, VibrationCheckMode};
use crate::types::{Measurement, SensorKind, Vibration};

/// Result of classifying one measurement.
#[derive(Debug, Clone, Default)]
pub struct Classification {
    /// Named out-of-range reasons; empty means every reported field is
    /// inside its acceptable range.
    pub reasons: Vec<String>,
    /// Sensors whose reading matched the disconnect sentinel.
    pub disconnected: Vec<SensorKind>,
}

impl Classification {
    pub fn is_anomalous(&self) -> bool {
        !self.reasons.is_empty()
    }

    pub fn is_disconnected(&self) -> bool {
        !self.disconnected.is_empty()
    }
}

/// Sentinel comparison tolerance. Fault codes are exact integers at the
/// firmware boundary; the epsilon only absorbs float transport noise.
const SENTINEL_EPS: f64 = 1e-9;

fn matches_sentinel(value: f64, sentinel: Option<f64>) -> bool {
    sentinel.is_some_and(|s| (value - s).abs() < SENTINEL_EPS)
}

/// Classify one measurement against the configured sensor table.
pub fn classify(measurement: &Measurement, config: &MonitorConfig) -> Classification {
    let mut result = Classification::default();

    for sensor in [
        SensorKind::Temperature,
        SensorKind::Humidity,
        SensorKind::AmbientLight,
        SensorKind::ParticleCount,
    ] {
        let Some(value) = measurement.sensor_value(sensor) else {
            continue;
        };
        let Some(limits) = config.sensors.limits(sensor) else {
            continue;
        };

        if matches_sentinel(value, limits.sentinel) {
            result.disconnected.push(sensor);
            continue;
        }

        if !value.is_finite() {
            warn!(
                station = %measurement.station,
                sensor = %sensor,
                "Non-finite sensor value excluded from classification"
            );
            continue;
        }

        check_environmental(measurement, sensor, value, limits, &mut result);
    }

    if let Some(vibration) = measurement.vibration {
        classify_vibration(measurement, vibration, config, &mut result);
    }

    result
}

fn check_environmental(
    measurement: &Measurement,
    sensor: SensorKind,
    value: f64,
    limits: &SensorLimits,
    result: &mut Classification,
) {
    if value < limits.extreme_min || value > limits.extreme_max {
        // Hardware fault territory: the reading is outside what the
        // part can physically report.
        warn!(
            station = %measurement.station,
            sensor = %sensor,
            value,
            extreme_min = limits.extreme_min,
            extreme_max = limits.extreme_max,
            "Reading beyond sensor hardware extremes, possible sensor failure"
        );
    }

    if value < limits.acceptable_min || value > limits.acceptable_max {
        result.reasons.push(format!("{} out of range", sensor.label()));
    }
}

fn classify_vibration(
    measurement: &Measurement,
    vibration: Vibration,
    config: &MonitorConfig,
    result: &mut Classification,
) {
    let limits = &config.sensors.vibration;

    if let Vibration::Scalar(v) = vibration {
        if (v - limits.sentinel).abs() < SENTINEL_EPS {
            result.disconnected.push(SensorKind::Vibration);
            return;
        }
    }

    if !vibration.is_finite() {
        result.reasons.push("Invalid vibration data".to_string());
        return;
    }

    let out_of_range = match (config.vibration_check, vibration) {
        (VibrationCheckMode::PerAxis, Vibration::Axes(axes)) => axes
            .iter()
            .zip(limits.axis_max.iter())
            .any(|(value, bound)| value.abs() > *bound),
        (VibrationCheckMode::PerAxis, Vibration::Scalar(v)) => v.abs() > limits.magnitude_max,
        (VibrationCheckMode::MagnitudeOnly, v) => v.magnitude().abs() > limits.magnitude_max,
    };

    if out_of_range {
        result
            .reasons
            .push(format!("{} out of range", SensorKind::Vibration.label()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Station;
    use chrono::Utc;

    fn in_range_measurement() -> Measurement {
        let mut m = Measurement::new(Station::Photolithography, Utc::now());
        m.temperature = Some(22.0);
        m.humidity = Some(50.0);
        m.ambient_light = Some(400.0);
        m.vibration = Some(Vibration::Scalar(0.2));
        m
    }

    #[test]
    fn fully_in_range_yields_no_reasons() {
        let config = MonitorConfig::default();
        let result = classify(&in_range_measurement(), &config);
        assert!(result.reasons.is_empty());
        assert!(!result.is_disconnected());
    }

    #[test]
    fn classification_is_deterministic() {
        let config = MonitorConfig::default();
        let mut m = in_range_measurement();
        m.temperature = Some(35.0);
        m.humidity = Some(80.0);
        let first = classify(&m, &config);
        let second = classify(&m, &config);
        assert_eq!(first.reasons, second.reasons);
        assert_eq!(
            first.reasons,
            vec!["Temperature out of range", "Humidity out of range"]
        );
    }

    #[test]
    fn extreme_violation_is_not_a_separate_reason() {
        let config = MonitorConfig::default();
        let mut m = in_range_measurement();
        m.temperature = Some(120.0); // beyond the 85 °C hardware ceiling
        let result = classify(&m, &config);
        // Still just the one acceptable-range reason.
        assert_eq!(result.reasons, vec!["Temperature out of range"]);
    }

    #[test]
    fn sentinel_reading_reports_disconnect_not_reason() {
        let config = MonitorConfig::default();
        let mut m = in_range_measurement();
        m.temperature = Some(-500.0);
        let result = classify(&m, &config);
        assert!(result.reasons.is_empty());
        assert_eq!(result.disconnected, vec![SensorKind::Temperature]);

        let mut m = in_range_measurement();
        m.vibration = Some(Vibration::Scalar(-1.0));
        let result = classify(&m, &config);
        assert!(result.reasons.is_empty());
        assert_eq!(result.disconnected, vec![SensorKind::Vibration]);
    }

    #[test]
    fn absent_fields_are_valid() {
        let config = MonitorConfig::default();
        let m = Measurement::new(Station::Sputtering, Utc::now());
        let result = classify(&m, &config);
        assert!(result.reasons.is_empty());
        assert!(!result.is_disconnected());
    }

    #[test]
    fn vibration_tuple_checked_per_axis() {
        let config = MonitorConfig::default();
        let mut m = in_range_measurement();
        // One axis over its 0.8 bound, magnitude also over 1.0, but the
        // per-axis path is what fires.
        m.vibration = Some(Vibration::Axes([0.9, 0.0, 0.0]));
        let result = classify(&m, &config);
        assert_eq!(result.reasons, vec!["Vibration out of range"]);

        m.vibration = Some(Vibration::Axes([0.5, -0.5, 0.5]));
        let result = classify(&m, &config);
        assert!(result.reasons.is_empty());
    }

    #[test]
    fn magnitude_only_mode_collapses_tuples() {
        let mut config = MonitorConfig::default();
        config.vibration_check = VibrationCheckMode::MagnitudeOnly;
        let mut m = in_range_measurement();
        // Each axis below 0.8 but norm ≈ 1.04 > 1.0
        m.vibration = Some(Vibration::Axes([0.6, 0.6, 0.6]));
        let result = classify(&m, &config);
        assert_eq!(result.reasons, vec!["Vibration out of range"]);
    }

    #[test]
    fn non_finite_vibration_is_named_invalid() {
        let config = MonitorConfig::default();
        let mut m = in_range_measurement();
        m.vibration = Some(Vibration::Scalar(f64::NAN));
        let result = classify(&m, &config);
        assert_eq!(result.reasons, vec!["Invalid vibration data"]);

        m.vibration = Some(Vibration::Axes([0.1, f64::INFINITY, 0.0]));
        let result = classify(&m, &config);
        assert_eq!(result.reasons, vec!["Invalid vibration data"]);
    }
}
