//! Per-measurement analysis engine.
//!
//! Orchestrates one measurement through its lifecycle: timestamp
//! normalization, cache update, range/sentinel classification, trend
//! watch, context capture, status assignment, publication. The engine
//! owns the cache and the pending-window set; all stations' streams
//! funnel through its sequential loop, which is the single-writer
//! serialization point mandated for the shared state.

use chrono::{DateTime, NaiveDateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::cache::MeasurementCache;
use super::classifier::{classify, Classification};
use super::context::ContextRecorder;
use super::publish::ResultPublisher;
use super::trend::{watch_trends, TrendWarning};
use crate::acquisition::source::{MeasurementSource, RawReading, SourceEvent};
use crate::config::MonitorConfig;
use crate::storage::CsvLogs;
use crate::types::{Measurement, Status};

/// A measurement enriched with its classification outcome.
#[derive(Debug, Clone)]
pub struct EnrichedMeasurement {
    pub measurement: Measurement,
    pub status: Status,
    pub reasons: Vec<String>,
    pub trend_warnings: Vec<TrendWarning>,
}

/// Counters reported at shutdown.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineStats {
    pub measurements_processed: u64,
    pub anomalies_detected: u64,
    pub context_rows_written: u64,
    pub disconnected_cycles: u64,
    pub degraded_cycles: u64,
    pub dropped_invalid_timestamp: u64,
    pub publish_failures: u64,
}

/// The streaming analysis engine.
pub struct AnalysisEngine {
    config: MonitorConfig,
    cache: MeasurementCache,
    recorder: ContextRecorder,
    logs: CsvLogs,
    stats: EngineStats,
}

impl AnalysisEngine {
    pub fn new(config: MonitorConfig, logs: CsvLogs) -> Self {
        let cache = MeasurementCache::new(config.retention_horizon());
        let recorder = ContextRecorder::new(config.context_radius());
        Self {
            config,
            cache,
            recorder,
            logs,
            stats: EngineStats::default(),
        }
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    pub fn cache(&self) -> &MeasurementCache {
        &self.cache
    }

    /// Process one raw reading through the full lifecycle.
    ///
    /// Returns `None` when the reading is dropped (malformed timestamp).
    /// Storage failures are logged and tolerated; the stream never
    /// halts on a bad disk write.
    pub fn process(&mut self, raw: RawReading) -> Option<EnrichedMeasurement> {
        // --- Timestamp normalization ---
        let time = match &raw.time {
            None => Utc::now(),
            Some(text) => match parse_timestamp(text) {
                Some(t) => t,
                None => {
                    self.stats.dropped_invalid_timestamp += 1;
                    error!(
                        station = %raw.station,
                        raw_time = %truncate(text, 40),
                        "Dropping measurement with malformed timestamp"
                    );
                    return None;
                }
            },
        };

        let mut measurement = Measurement::new(raw.station, time);
        measurement.temperature = raw.temperature;
        measurement.humidity = raw.humidity;
        measurement.ambient_light = raw.ambient_light;
        measurement.particle_count = raw.particle_count;
        measurement.vibration = raw.vibration;

        // --- Cache update + rolling snapshot rewrite ---
        self.cache.insert(measurement.clone());
        if let Err(e) = self
            .logs
            .rewrite_measurements(&self.cache.snapshot_newest_first())
        {
            warn!(error = %e, "Failed to rewrite measurements log");
        }

        // --- Post-anomaly context for already-open windows ---
        match self.recorder.record_post_context(&measurement, &self.logs) {
            Ok(rows) => self.stats.context_rows_written += rows as u64,
            Err(e) => warn!(error = %e, "Failed to write post-anomaly context"),
        }

        // --- Classification ---
        let classification = classify(&measurement, &self.config);
        let trend_warnings = watch_trends(&self.cache, &measurement, &self.config);

        if classification.is_anomalous() {
            self.stats.anomalies_detected += 1;
            match self.recorder.record_anomaly(
                &measurement,
                &classification.reasons,
                &self.cache,
                &self.logs,
            ) {
                Ok(rows) => self.stats.context_rows_written += rows as u64,
                Err(e) => warn!(error = %e, "Failed to write anomaly context"),
            }
        }

        // --- Status assignment ---
        let status = assign_status(&classification, &trend_warnings);
        match status {
            Status::Disconnected => self.stats.disconnected_cycles += 1,
            Status::Degraded => self.stats.degraded_cycles += 1,
            _ => {}
        }

        self.stats.measurements_processed += 1;

        Some(EnrichedMeasurement {
            measurement,
            status,
            reasons: classification.reasons,
            trend_warnings,
        })
    }

    /// Run the engine until the source is exhausted or cancellation.
    ///
    /// On shutdown, in-flight classification finishes, pending context
    /// writes are flushed, and still-open anomaly windows are abandoned.
    pub async fn run<S, P>(
        mut self,
        source: &mut S,
        publisher: &mut P,
        cancel: CancellationToken,
    ) -> EngineStats
    where
        S: MeasurementSource,
        P: ResultPublisher,
    {
        info!(
            source = source.source_name(),
            publisher = publisher.publisher_name(),
            "Analysis engine started"
        );

        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Shutdown signal received");
                    break;
                }
                result = source.next_event() => match result {
                    Ok(event) => event,
                    Err(e) => {
                        warn!(error = %e, "Measurement source error");
                        break;
                    }
                },
            };

            let readings = match event {
                SourceEvent::Readings(readings) => readings,
                SourceEvent::Eof => {
                    info!(
                        processed = self.stats.measurements_processed,
                        "Source reached end of data"
                    );
                    break;
                }
            };

            for raw in readings {
                let Some(enriched) = self.process(raw) else {
                    continue;
                };
                if let Err(e) = publisher.publish(&enriched).await {
                    // Transport unavailability is the collaborator's
                    // problem; keep ingesting.
                    self.stats.publish_failures += 1;
                    warn!(error = %e, "Failed to publish enriched measurement");
                }
            }
        }

        self.recorder.abandon_pending();

        let stats = self.stats;
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        info!("FINAL STATISTICS");
        info!("   Measurements processed: {}", stats.measurements_processed);
        info!("   Anomalies detected:     {}", stats.anomalies_detected);
        info!("   Context rows written:   {}", stats.context_rows_written);
        info!("   Disconnected cycles:    {}", stats.disconnected_cycles);
        info!("   Degraded cycles:        {}", stats.degraded_cycles);
        info!("   Dropped (bad time):     {}", stats.dropped_invalid_timestamp);
        info!("   Publish failures:       {}", stats.publish_failures);
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        stats
    }
}

/// Status precedence: Disconnected > Bad > Degraded > Good.
fn assign_status(classification: &Classification, trends: &[TrendWarning]) -> Status {
    if classification.is_disconnected() {
        Status::Disconnected
    } else if classification.is_anomalous() {
        Status::Bad
    } else if !trends.is_empty() {
        Status::Degraded
    } else {
        Status::Good
    }
}

/// Parse the timestamp shapes the station tooling emits: RFC 3339,
/// naive ISO-8601 (`2024-01-17T12:00:00`), and the legacy
/// space-separated form (`2024-01-17 12:00:00`). Naive times are taken
/// as UTC.
fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(text) {
        return Some(t.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }
    None
}

fn truncate(s: &str, max_len: usize) -> &str {
    match s.char_indices().nth(max_len) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Station;

    fn engine() -> (tempfile::TempDir, AnalysisEngine) {
        let dir = tempfile::tempdir().unwrap();
        let logs = CsvLogs::create(dir.path()).unwrap();
        let engine = AnalysisEngine::new(MonitorConfig::default(), logs);
        (dir, engine)
    }

    fn reading(station: Station, time: &str) -> RawReading {
        RawReading {
            station,
            time: Some(time.to_string()),
            temperature: None,
            humidity: None,
            ambient_light: None,
            particle_count: None,
            vibration: None,
        }
    }

    #[test]
    fn timestamp_shapes() {
        assert!(parse_timestamp("2024-01-17T12:00:00Z").is_some());
        assert!(parse_timestamp("2024-01-17T12:00:00+02:00").is_some());
        assert!(parse_timestamp("2024-01-17T12:00:00").is_some());
        assert!(parse_timestamp("2024-01-17 12:00:00").is_some());
        assert!(parse_timestamp("yesterday").is_none());
        assert!(parse_timestamp("").is_none());
    }

    #[test]
    fn malformed_timestamp_drops_measurement() {
        let (_dir, mut engine) = engine();
        let result = engine.process(reading(Station::Photolithography, "not-a-time"));
        assert!(result.is_none());
        assert_eq!(engine.stats().dropped_invalid_timestamp, 1);
        assert_eq!(engine.stats().measurements_processed, 0);
    }

    #[test]
    fn absent_timestamp_gets_wall_clock() {
        let (_dir, mut engine) = engine();
        let mut raw = reading(Station::Photolithography, "ignored");
        raw.time = None;
        raw.temperature = Some(22.0);
        let enriched = engine.process(raw).unwrap();
        let age = Utc::now() - enriched.measurement.time;
        assert!(age.num_seconds().abs() < 5);
        assert_eq!(enriched.status, Status::Good);
    }

    #[test]
    fn status_precedence() {
        let (_dir, mut engine) = engine();

        // Out of range -> Bad
        let mut raw = reading(Station::SpinCoating, "2024-01-17T12:00:00");
        raw.temperature = Some(35.0);
        let enriched = engine.process(raw).unwrap();
        assert_eq!(enriched.status, Status::Bad);

        // Sentinel beats out-of-range on another field
        let mut raw = reading(Station::SpinCoating, "2024-01-17T12:00:10");
        raw.temperature = Some(35.0);
        raw.humidity = Some(150.0);
        let enriched = engine.process(raw).unwrap();
        assert_eq!(enriched.status, Status::Disconnected);
        assert_eq!(enriched.reasons, vec!["Temperature out of range"]);
    }

    #[test]
    fn trend_only_yields_degraded() {
        let (_dir, mut engine) = engine();
        for (i, humidity) in [60.0, 63.0].iter().enumerate() {
            let mut raw = reading(
                Station::Photolithography,
                &format!("2024-01-17T12:00:{:02}", i * 10),
            );
            raw.humidity = Some(*humidity);
            let enriched = engine.process(raw).unwrap();
            assert_eq!(enriched.status, Status::Good);
        }
        let mut raw = reading(Station::Photolithography, "2024-01-17T12:00:20");
        raw.humidity = Some(66.0);
        let enriched = engine.process(raw).unwrap();
        assert_eq!(enriched.status, Status::Degraded);
        assert!(enriched.reasons.is_empty());
        assert_eq!(enriched.trend_warnings.len(), 1);
    }
}
