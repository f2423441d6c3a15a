//! Measurement types
//!
//! One [`Measurement`] is a timestamped set of sensor readings for one
//! work station. Stations report different sensor subsets each cycle;
//! absent fields mean "sensor not reported", never an error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Physical work station installation in the fabrication facility.
///
/// Wire codes match the node topic keys used by the station firmware
/// (`PL`, `SC`, `SP`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Station {
    /// Photolithography bay: temperature, humidity, ambient light, vibration
    Photolithography,
    /// Spin-coating bay: temperature, humidity, particle count, vibration
    SpinCoating,
    /// Sputtering bay: temperature, humidity, ambient light
    Sputtering,
}

impl Station {
    pub const ALL: [Self; 3] = [
        Self::Photolithography,
        Self::SpinCoating,
        Self::Sputtering,
    ];

    /// Two-letter station code used on the wire.
    pub fn code(self) -> &'static str {
        match self {
            Self::Photolithography => "PL",
            Self::SpinCoating => "SC",
            Self::Sputtering => "SP",
        }
    }

    /// Key used for this station's sub-object in a bundled message.
    pub fn bundle_key(self) -> &'static str {
        match self {
            Self::Photolithography => "PL_data",
            Self::SpinCoating => "SC_data",
            Self::Sputtering => "SP_data",
        }
    }

    /// Parse a station code (`PL`/`SC`/`SP`), case-insensitive.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.to_ascii_uppercase().as_str() {
            "PL" => Some(Self::Photolithography),
            "SC" => Some(Self::SpinCoating),
            "SP" => Some(Self::Sputtering),
            _ => None,
        }
    }
}

impl std::fmt::Display for Station {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Sensor channels a station may report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    Temperature,
    Humidity,
    AmbientLight,
    ParticleCount,
    Vibration,
}

impl SensorKind {
    pub const ALL: [Self; 5] = [
        Self::Temperature,
        Self::Humidity,
        Self::AmbientLight,
        Self::ParticleCount,
        Self::Vibration,
    ];

    /// Human-readable label used in reasons and CSV headers.
    pub fn label(self) -> &'static str {
        match self {
            Self::Temperature => "Temperature",
            Self::Humidity => "Humidity",
            Self::AmbientLight => "Ambient light",
            Self::ParticleCount => "Particle count",
            Self::Vibration => "Vibration",
        }
    }

    /// Display unit appended to published values.
    pub fn unit(self) -> &'static str {
        match self {
            Self::Temperature => "°C",
            Self::Humidity => "%",
            Self::AmbientLight => "lx",
            Self::ParticleCount => "",
            Self::Vibration => "m/s²",
        }
    }
}

impl std::fmt::Display for SensorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A vibration reading from the motion conditioning pipeline.
///
/// The max-acceleration reduction yields a scalar magnitude; the
/// mean-displacement reduction yields a per-axis triple. Both occur on
/// the wire, so both are first-class here.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Vibration {
    Scalar(f64),
    Axes([f64; 3]),
}

impl Vibration {
    /// Euclidean magnitude; identity for scalar readings.
    pub fn magnitude(self) -> f64 {
        match self {
            Self::Scalar(v) => v,
            Self::Axes([x, y, z]) => (x * x + y * y + z * z).sqrt(),
        }
    }

    pub fn is_finite(self) -> bool {
        match self {
            Self::Scalar(v) => v.is_finite(),
            Self::Axes(a) => a.iter().all(|v| v.is_finite()),
        }
    }
}

/// One timestamped set of sensor readings for one station.
///
/// Immutable once inserted into the cache. `time` is always present
/// after ingestion; the engine stamps wall-clock time when the source
/// omitted it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Measurement {
    pub station: Station,
    pub time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ambient_light: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub particle_count: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vibration: Option<Vibration>,
}

impl Measurement {
    /// Empty measurement for a station at a given time.
    pub fn new(station: Station, time: DateTime<Utc>) -> Self {
        Self {
            station,
            time,
            temperature: None,
            humidity: None,
            ambient_light: None,
            particle_count: None,
            vibration: None,
        }
    }

    /// Scalar value for a sensor channel, if reported this cycle.
    ///
    /// Vibration collapses to its magnitude so trend logic can treat
    /// every channel as a single series.
    pub fn sensor_value(&self, sensor: SensorKind) -> Option<f64> {
        match sensor {
            SensorKind::Temperature => self.temperature,
            SensorKind::Humidity => self.humidity,
            SensorKind::AmbientLight => self.ambient_light,
            SensorKind::ParticleCount => self.particle_count,
            SensorKind::Vibration => self.vibration.map(Vibration::magnitude),
        }
    }
}

/// Health status attached to a measurement before publication.
///
/// Precedence when assigning: `Disconnected` (sentinel reading) over
/// `Bad` (range violation) over `Degraded` (trend early warning) over
/// `Good`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Good,
    Degraded,
    Bad,
    Disconnected,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Good => write!(f, "Good"),
            Self::Degraded => write!(f, "Degraded"),
            Self::Bad => write!(f, "Bad"),
            Self::Disconnected => write!(f, "Disconnected"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn station_codes_round_trip() {
        for station in Station::ALL {
            assert_eq!(Station::from_code(station.code()), Some(station));
        }
        assert_eq!(Station::from_code("pl"), Some(Station::Photolithography));
        assert_eq!(Station::from_code("XX"), None);
    }

    #[test]
    fn vibration_magnitude() {
        assert_eq!(Vibration::Scalar(0.42).magnitude(), 0.42);
        let v = Vibration::Axes([3.0, 4.0, 0.0]);
        assert!((v.magnitude() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn vibration_deserializes_both_shapes() {
        let scalar: Vibration = serde_json::from_str("0.37").unwrap();
        assert_eq!(scalar, Vibration::Scalar(0.37));
        let axes: Vibration = serde_json::from_str("[0.1, -0.2, 0.05]").unwrap();
        assert_eq!(axes, Vibration::Axes([0.1, -0.2, 0.05]));
    }

    #[test]
    fn sensor_value_collapses_vibration() {
        let mut m = Measurement::new(Station::SpinCoating, Utc::now());
        m.vibration = Some(Vibration::Axes([0.0, 3.0, 4.0]));
        let mag = m.sensor_value(SensorKind::Vibration).unwrap();
        assert!((mag - 5.0).abs() < 1e-12);
        assert!(m.sensor_value(SensorKind::Temperature).is_none());
    }
}
