//! Shared types for the telemetry decoding and anomaly-context engine.

mod measurement;

pub use measurement::{Measurement, SensorKind, Station, Status, Vibration};
