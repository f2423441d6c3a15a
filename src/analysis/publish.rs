//! Outbound publication boundary.
//!
//! The engine hands each enriched measurement to a [`ResultPublisher`];
//! what sits behind it (message broker, pipe to a plotting front end) is
//! an external collaborator. Transient publish failures are tolerated by
//! the caller; they never crash the stream.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;

use super::engine::EnrichedMeasurement;
use crate::types::Vibration;

/// Sink for enriched measurements.
#[async_trait]
pub trait ResultPublisher: Send + 'static {
    async fn publish(&mut self, enriched: &EnrichedMeasurement) -> anyhow::Result<()>;

    /// Human-readable name for logging.
    fn publisher_name(&self) -> &str;
}

/// Renders one enriched measurement for display consumers: numeric
/// sensor values become "value + unit" strings and a `status` field is
/// appended.
#[derive(Debug, Clone, Serialize)]
struct DisplayRecord {
    station: String,
    time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    humidity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ambient_light: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    particle_count: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    vibration: Option<Value>,
    status: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    reasons: Vec<String>,
}

/// Render an enriched measurement as the display-facing JSON value.
pub fn render_display(enriched: &EnrichedMeasurement) -> Value {
    let m = &enriched.measurement;
    let with_unit = |v: Option<f64>, unit: &str| {
        v.map(|x| {
            if unit.is_empty() {
                format!("{x}")
            } else {
                format!("{x} {unit}")
            }
        })
    };
    let record = DisplayRecord {
        station: m.station.code().to_string(),
        time: m.time.to_rfc3339(),
        temperature: with_unit(m.temperature, "°C"),
        humidity: with_unit(m.humidity, "%"),
        ambient_light: with_unit(m.ambient_light, "lx"),
        particle_count: with_unit(m.particle_count, ""),
        vibration: m.vibration.map(|v| match v {
            Vibration::Scalar(s) => json!(format!("{s} m/s²")),
            Vibration::Axes(axes) => json!(axes),
        }),
        status: enriched.status.to_string(),
        reasons: enriched.reasons.clone(),
    };
    serde_json::to_value(record).unwrap_or(Value::Null)
}

/// Publishes one JSON object per line to stdout, the shape the results
/// topic carries.
pub struct JsonLinePublisher {
    stdout: tokio::io::Stdout,
}

impl JsonLinePublisher {
    pub fn new() -> Self {
        Self {
            stdout: tokio::io::stdout(),
        }
    }
}

impl Default for JsonLinePublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResultPublisher for JsonLinePublisher {
    async fn publish(&mut self, enriched: &EnrichedMeasurement) -> anyhow::Result<()> {
        let mut line = render_display(enriched).to_string();
        line.push('\n');
        self.stdout.write_all(line.as_bytes()).await?;
        self.stdout.flush().await?;
        Ok(())
    }

    fn publisher_name(&self) -> &str {
        "stdout-json"
    }
}

/// Publishes into an mpsc channel, used by tests and embedding callers.
pub struct ChannelPublisher {
    tx: tokio::sync::mpsc::UnboundedSender<EnrichedMeasurement>,
}

impl ChannelPublisher {
    pub fn new() -> (Self, tokio::sync::mpsc::UnboundedReceiver<EnrichedMeasurement>) {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl ResultPublisher for ChannelPublisher {
    async fn publish(&mut self, enriched: &EnrichedMeasurement) -> anyhow::Result<()> {
        self.tx
            .send(enriched.clone())
            .map_err(|_| anyhow::anyhow!("result channel closed"))?;
        Ok(())
    }

    fn publisher_name(&self) -> &str {
        "channel"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Measurement, Station, Status};
    use chrono::{TimeZone, Utc};

    #[test]
    fn display_record_renders_units_and_status() {
        let mut m = Measurement::new(
            Station::Photolithography,
            Utc.timestamp_opt(1_700_000_000, 0).single().unwrap(),
        );
        m.temperature = Some(23.5);
        m.particle_count = Some(42.0);
        m.vibration = Some(Vibration::Scalar(0.3));

        let enriched = EnrichedMeasurement {
            measurement: m,
            status: Status::Good,
            reasons: Vec::new(),
            trend_warnings: Vec::new(),
        };
        let value = render_display(&enriched);
        assert_eq!(value["temperature"], "23.5 °C");
        assert_eq!(value["particle_count"], "42");
        assert_eq!(value["vibration"], "0.3 m/s²");
        assert_eq!(value["status"], "Good");
        assert!(value.get("humidity").is_none());
        assert!(value.get("reasons").is_none());
    }

    #[test]
    fn axes_vibration_renders_as_array() {
        let mut m = Measurement::new(
            Station::SpinCoating,
            Utc.timestamp_opt(1_700_000_000, 0).single().unwrap(),
        );
        m.vibration = Some(Vibration::Axes([0.1, 0.2, 0.3]));
        let enriched = EnrichedMeasurement {
            measurement: m,
            status: Status::Bad,
            reasons: vec!["Vibration out of range".to_string()],
            trend_warnings: Vec::new(),
        };
        let value = render_display(&enriched);
        assert!(value["vibration"].is_array());
        assert_eq!(value["status"], "Bad");
        assert_eq!(value["reasons"][0], "Vibration out of range");
    }
}
