//! Measurement source abstraction.
//!
//! The engine consumes a lazy sequence of parsed readings; what carries
//! them (a broker subscription, a pipe, a replay file) is an external
//! collaborator with at-least-once delivery. Two inbound shapes are
//! accepted per line:
//!
//! - a flat per-station object: `{"station":"PL","temperature":22.5,...}`
//! - the aggregator bundle: `{"PL_data":{...},"SC_data":{...},
//!   "SP_data":{...},"time":"..."}` with one shared timestamp.
//!
//! Raw hex `vibration` payloads are decoded and conditioned here, so the
//! engine only ever sees physical readings. Absent keys mean "sensor not
//! reported this cycle", never an error.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader, Stdin};
use tracing::warn;

use super::{frame, motion};
use crate::config::MonitorConfig;
use crate::types::{Station, Vibration};

/// Events produced by a measurement source.
pub enum SourceEvent {
    /// One inbound message's worth of readings (a bundle yields up to
    /// three, a flat object exactly one).
    Readings(Vec<RawReading>),
    /// Source reached end of data.
    Eof,
}

/// One station's readings for one cycle, timestamp still in wire form.
///
/// `time` of `None` means the source did not report one; the engine
/// stamps wall-clock time in that case.
#[derive(Debug, Clone)]
pub struct RawReading {
    pub station: Station,
    pub time: Option<String>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub ambient_light: Option<f64>,
    pub particle_count: Option<f64>,
    pub vibration: Option<Vibration>,
}

/// Trait abstracting where measurements come from.
#[async_trait]
pub trait MeasurementSource: Send + 'static {
    /// Read the next event. Malformed lines are skipped internally; an
    /// `Err` is unrecoverable.
    async fn next_event(&mut self) -> anyhow::Result<SourceEvent>;

    /// Human-readable name for logging.
    fn source_name(&self) -> &str;
}

/// Message parsing errors. Local to one line, never fatal.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown station code {0:?}")]
    UnknownStation(String),

    #[error("message carries no station data")]
    EmptyMessage,
}

/// Vibration as it appears on the wire: a raw hex frame, an
/// already-conditioned scalar, or a per-axis triple.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum WireVibration {
    Scalar(f64),
    Axes([f64; 3]),
    RawHex(String),
}

/// One station sub-object on the wire.
#[derive(Debug, Clone, Default, Deserialize)]
struct NodeFields {
    temperature: Option<f64>,
    humidity: Option<f64>,
    ambient_light: Option<f64>,
    particle_count: Option<f64>,
    vibration: Option<WireVibration>,
}

#[derive(Debug, Deserialize)]
struct BundleMessage {
    #[serde(rename = "PL_data")]
    pl: Option<NodeFields>,
    #[serde(rename = "SC_data")]
    sc: Option<NodeFields>,
    #[serde(rename = "SP_data")]
    sp: Option<NodeFields>,
    time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FlatMessage {
    station: String,
    time: Option<String>,
    #[serde(flatten)]
    fields: NodeFields,
}

/// Parse one inbound JSON line into per-station readings.
pub fn parse_message(line: &str, config: &MonitorConfig) -> Result<Vec<RawReading>, IngestError> {
    let value: serde_json::Value = serde_json::from_str(line)?;

    let is_bundle = Station::ALL
        .iter()
        .any(|s| value.get(s.bundle_key()).is_some());

    if is_bundle {
        let bundle: BundleMessage = serde_json::from_value(value)?;
        let mut readings = Vec::new();
        for (station, fields) in [
            (Station::Photolithography, bundle.pl),
            (Station::SpinCoating, bundle.sc),
            (Station::Sputtering, bundle.sp),
        ] {
            if let Some(fields) = fields {
                readings.push(node_to_reading(station, bundle.time.clone(), fields, config));
            }
        }
        if readings.is_empty() {
            return Err(IngestError::EmptyMessage);
        }
        return Ok(readings);
    }

    let flat: FlatMessage = serde_json::from_value(value)?;
    let station = Station::from_code(&flat.station)
        .ok_or_else(|| IngestError::UnknownStation(flat.station.clone()))?;
    Ok(vec![node_to_reading(station, flat.time, flat.fields, config)])
}

/// Leading characters of a raw payload for diagnostics. Cuts on a char
/// boundary; a byte index could land inside a multi-byte character and
/// panic the slice.
fn snippet(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn node_to_reading(
    station: Station,
    time: Option<String>,
    fields: NodeFields,
    config: &MonitorConfig,
) -> RawReading {
    let vibration = fields
        .vibration
        .and_then(|wire| resolve_vibration(station, wire, config));
    RawReading {
        station,
        time,
        temperature: fields.temperature,
        humidity: fields.humidity,
        ambient_light: fields.ambient_light,
        particle_count: fields.particle_count,
        vibration,
    }
}

/// Decode and condition a wire vibration value.
///
/// Frame errors are local to one reading: the field is dropped for this
/// cycle with a diagnostic, the rest of the measurement survives.
fn resolve_vibration(
    station: Station,
    wire: WireVibration,
    config: &MonitorConfig,
) -> Option<Vibration> {
    let hex = match wire {
        WireVibration::Scalar(v) => return Some(Vibration::Scalar(v)),
        WireVibration::Axes(axes) => return Some(Vibration::Axes(axes)),
        WireVibration::RawHex(hex) => hex,
    };

    if frame::is_fault_payload(&hex) {
        return Some(Vibration::Scalar(motion::DISCONNECTED_VIBRATION));
    }

    let samples = match frame::parse_hex(&hex).and_then(|bytes| frame::decode_ms2(&bytes)) {
        Ok(samples) => samples,
        Err(e) => {
            warn!(
                station = %station,
                error = %e,
                snippet = %snippet(&hex, 32),
                "Rejecting malformed vibration frame"
            );
            return None;
        }
    };

    match motion::condition(
        &samples,
        config.reduction,
        config.highpass_cutoff_hz,
        config.sample_rate_hz,
    ) {
        Ok(reading) => Some(reading),
        Err(e) => {
            warn!(
                station = %station,
                error = %e,
                samples = samples.len(),
                "Skipping vibration conditioning"
            );
            None
        }
    }
}

// ============================================================================
// Stdin Source (JSON per line)
// ============================================================================

/// Reads one JSON message per line from stdin.
pub struct StdinSource {
    reader: BufReader<Stdin>,
    config: MonitorConfig,
    line: String,
}

impl StdinSource {
    pub fn new(config: MonitorConfig) -> Self {
        Self {
            reader: BufReader::new(tokio::io::stdin()),
            config,
            line: String::with_capacity(4096),
        }
    }
}

#[async_trait]
impl MeasurementSource for StdinSource {
    async fn next_event(&mut self) -> anyhow::Result<SourceEvent> {
        loop {
            self.line.clear();
            let bytes = self.reader.read_line(&mut self.line).await?;
            if bytes == 0 {
                return Ok(SourceEvent::Eof);
            }
            let line = self.line.trim();
            if line.is_empty() {
                continue;
            }
            match parse_message(line, &self.config) {
                Ok(readings) => return Ok(SourceEvent::Readings(readings)),
                Err(e) => {
                    warn!(
                        error = %e,
                        snippet = %snippet(line, 80),
                        "Skipping unparseable inbound message"
                    );
                }
            }
        }
    }

    fn source_name(&self) -> &str {
        "stdin-json"
    }
}

// ============================================================================
// Replay Source (pre-parsed readings, for tests and file replay)
// ============================================================================

/// Replays pre-parsed readings, one per event, with optional delay.
pub struct ReplaySource {
    readings: std::vec::IntoIter<RawReading>,
    delay_ms: u64,
    yielded_first: bool,
}

impl ReplaySource {
    pub fn new(readings: Vec<RawReading>, delay_ms: u64) -> Self {
        Self {
            readings: readings.into_iter(),
            delay_ms,
            yielded_first: false,
        }
    }
}

#[async_trait]
impl MeasurementSource for ReplaySource {
    async fn next_event(&mut self) -> anyhow::Result<SourceEvent> {
        if self.yielded_first && self.delay_ms > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(self.delay_ms)).await;
        }
        match self.readings.next() {
            Some(reading) => {
                self.yielded_first = true;
                Ok(SourceEvent::Readings(vec![reading]))
            }
            None => Ok(SourceEvent::Eof),
        }
    }

    fn source_name(&self) -> &str {
        "replay"
    }
}
