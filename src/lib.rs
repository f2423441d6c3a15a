//! FabWatch: Telemetry Decoding & Anomaly-Context Engine
//!
//! Monitors environmental and vibration sensors across the fabrication
//! facility's work stations, decodes raw instrument output into physical
//! units, and screens the resulting stream for out-of-range or degrading
//! conditions, preserving the temporal context around every anomaly.
//!
//! ## Architecture
//!
//! - **Acquisition**: packed accelerometer frame decoding, motion
//!   conditioning, and inbound measurement sources
//! - **Analysis**: measurement cache, range classification, trend early
//!   warning, anomaly context capture, and the orchestrating engine
//! - **Storage**: the three CSV-shaped log files the diagnosis tooling
//!   reads

pub mod acquisition;
pub mod analysis;
pub mod config;
pub mod storage;
pub mod types;

// Re-export commonly used types
pub use analysis::{
    AnalysisEngine, ChannelPublisher, ContextRecorder, EngineStats, EnrichedMeasurement,
    JsonLinePublisher, MeasurementCache, ResultPublisher, TrendWarning,
};
pub use config::MonitorConfig;
pub use storage::{CsvLogs, StorageError};
pub use types::{Measurement, SensorKind, Station, Status, Vibration};
