//! Anomaly context capture.
//!
//! When a measurement is classified out of range, every cached entry for
//! the same station within a symmetric time radius is preserved to the
//! context log, labeled by its position relative to the anomaly. The
//! anomaly also opens a pending window so that measurements arriving
//! *after* it, up to `error_time + radius`, are captured too.
//!
//! Windows live only for the process lifetime; on shutdown any still-open
//! windows are abandoned, so post-anomaly context after exit is dropped.

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use super::cache::MeasurementCache;
use crate::storage::{CsvLogs, StorageError};
use crate::types::{Measurement, Station};

/// Position labels written to the context log.
pub mod labels {
    pub const EXACT: &str = "Exact moment";
    pub const SURROUNDING: &str = "Surrounding Errors";
    pub const POST: &str = "Surrounding Errors (post)";
}

/// An open post-anomaly capture window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnomalyEvent {
    pub station: Station,
    pub error_time: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
}

/// Captures surrounding context for anomalies and tracks pending
/// post-anomaly windows.
#[derive(Debug)]
pub struct ContextRecorder {
    radius: Duration,
    pending: Vec<AnomalyEvent>,
}

impl ContextRecorder {
    pub fn new(radius: Duration) -> Self {
        Self {
            radius,
            pending: Vec::new(),
        }
    }

    /// Open windows (for shutdown reporting and tests).
    pub fn pending_windows(&self) -> &[AnomalyEvent] {
        &self.pending
    }

    /// Record an out-of-range measurement: one anomaly row, context rows
    /// for every same-station cached entry within ±radius, and a pending
    /// window for post-anomaly capture.
    ///
    /// Returns the number of context rows written.
    pub fn record_anomaly(
        &mut self,
        measurement: &Measurement,
        reasons: &[String],
        cache: &MeasurementCache,
        logs: &CsvLogs,
    ) -> Result<usize, StorageError> {
        let error_time = measurement.time;
        let context = format!("Out-of-range measurement at {}", error_time.to_rfc3339());
        logs.append_out_of_range(measurement, reasons, &context)?;

        let related_to = format!("Related to {}", error_time.to_rfc3339());
        let mut rows = 0usize;
        for entry in cache.station_window(
            measurement.station,
            error_time - self.radius,
            error_time + self.radius,
        ) {
            let position = if entry.time == error_time {
                labels::EXACT
            } else {
                labels::SURROUNDING
            };
            logs.append_context(entry, &related_to, position)?;
            rows += 1;
        }

        self.pending.push(AnomalyEvent {
            station: measurement.station,
            error_time,
            deadline: error_time + self.radius,
        });

        info!(
            station = %measurement.station,
            time = %error_time,
            reasons = ?reasons,
            context_rows = rows,
            "Anomaly recorded with surrounding context"
        );
        Ok(rows)
    }

    /// Feed a newly arrived measurement to the live windows.
    ///
    /// Runs for every measurement regardless of its own classification:
    /// each same-station window whose deadline covers it gets one
    /// post-context row. Same-station windows past their deadline are
    /// dropped afterwards; another station's clock never expires them.
    ///
    /// Returns the number of context rows written.
    pub fn record_post_context(
        &mut self,
        measurement: &Measurement,
        logs: &CsvLogs,
    ) -> Result<usize, StorageError> {
        let mut rows = 0usize;
        for event in &self.pending {
            if event.station == measurement.station
                && measurement.time > event.error_time
                && measurement.time <= event.deadline
            {
                let related_to = format!("Related to {}", event.error_time.to_rfc3339());
                logs.append_context(measurement, &related_to, labels::POST)?;
                rows += 1;
            }
        }

        // Expire only against the same station's stream time: one station
        // reporting a skewed future timestamp must not close another
        // station's open windows.
        let now = measurement.time;
        let before = self.pending.len();
        self.pending
            .retain(|event| event.station != measurement.station || event.deadline >= now);
        let expired = before - self.pending.len();
        if expired > 0 {
            info!(expired, live = self.pending.len(), "Anomaly windows expired");
        }

        Ok(rows)
    }

    /// Abandon all pending windows (shutdown path).
    pub fn abandon_pending(&mut self) {
        if !self.pending.is_empty() {
            warn!(
                abandoned = self.pending.len(),
                "Shutting down with open anomaly windows, post-anomaly context dropped"
            );
            self.pending.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Station;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).single().unwrap()
    }

    fn temp_measurement(station: Station, secs: i64, temp: f64) -> Measurement {
        let mut m = Measurement::new(station, at(secs));
        m.temperature = Some(temp);
        m
    }

    fn setup() -> (tempfile::TempDir, CsvLogs, MeasurementCache, ContextRecorder) {
        let dir = tempfile::tempdir().unwrap();
        let logs = CsvLogs::create(dir.path()).unwrap();
        let cache = MeasurementCache::new(Duration::hours(5));
        let recorder = ContextRecorder::new(Duration::seconds(300));
        (dir, logs, cache, recorder)
    }

    #[test]
    fn captures_exactly_the_radius_window_with_labels() {
        let (_dir, logs, mut cache, mut recorder) = setup();

        // Two priors inside the radius, one outside, one other-station.
        cache.insert(temp_measurement(Station::Photolithography, -400, 21.0));
        cache.insert(temp_measurement(Station::Photolithography, -10, 22.0));
        cache.insert(temp_measurement(Station::Photolithography, -5, 23.0));
        cache.insert(temp_measurement(Station::SpinCoating, -5, 23.0));
        let anomaly = temp_measurement(Station::Photolithography, 0, 35.0);
        cache.insert(anomaly.clone());

        let rows = recorder
            .record_anomaly(
                &anomaly,
                &["Temperature out of range".to_string()],
                &cache,
                &logs,
            )
            .unwrap();
        assert_eq!(rows, 3);

        let contents = std::fs::read_to_string(logs.context_path()).unwrap();
        assert_eq!(contents.matches(labels::SURROUNDING).count(), 2);
        assert_eq!(contents.matches(labels::EXACT).count(), 1);

        let out = std::fs::read_to_string(logs.out_of_range_path()).unwrap();
        assert!(out.contains("Temperature out of range"));
        assert_eq!(recorder.pending_windows().len(), 1);
    }

    #[test]
    fn post_window_capture_and_expiry() {
        let (_dir, logs, mut cache, mut recorder) = setup();
        let anomaly = temp_measurement(Station::Photolithography, 0, 35.0);
        cache.insert(anomaly.clone());
        recorder
            .record_anomaly(&anomaly, &["Temperature out of range".to_string()], &cache, &logs)
            .unwrap();

        // Within deadline, same station
        let follow = temp_measurement(Station::Photolithography, 10, 22.0);
        assert_eq!(recorder.record_post_context(&follow, &logs).unwrap(), 1);

        // Same station but other window has a different station
        let other = temp_measurement(Station::Sputtering, 20, 22.0);
        assert_eq!(recorder.record_post_context(&other, &logs).unwrap(), 0);

        // Past the 300 s deadline: no row, window dropped
        let late = temp_measurement(Station::Photolithography, 301, 22.0);
        assert_eq!(recorder.record_post_context(&late, &logs).unwrap(), 0);
        assert!(recorder.pending_windows().is_empty());

        let contents = std::fs::read_to_string(logs.context_path()).unwrap();
        assert_eq!(contents.matches(labels::POST).count(), 1);
    }

    #[test]
    fn cross_station_time_skew_does_not_expire_windows() {
        let (_dir, logs, mut cache, mut recorder) = setup();
        let anomaly = temp_measurement(Station::Photolithography, 0, 35.0);
        cache.insert(anomaly.clone());
        recorder
            .record_anomaly(&anomaly, &["Temperature out of range".to_string()], &cache, &logs)
            .unwrap();

        // Another station reports hours ahead of the anomaly's clock.
        let skewed = temp_measurement(Station::Sputtering, 10_000, 22.0);
        assert_eq!(recorder.record_post_context(&skewed, &logs).unwrap(), 0);
        assert_eq!(recorder.pending_windows().len(), 1);

        // The anomalous station's own follow-up is still captured.
        let follow = temp_measurement(Station::Photolithography, 10, 22.0);
        assert_eq!(recorder.record_post_context(&follow, &logs).unwrap(), 1);
    }

    #[test]
    fn abandon_pending_clears_windows() {
        let (_dir, logs, mut cache, mut recorder) = setup();
        let anomaly = temp_measurement(Station::SpinCoating, 0, 35.0);
        cache.insert(anomaly.clone());
        recorder
            .record_anomaly(&anomaly, &["Temperature out of range".to_string()], &cache, &logs)
            .unwrap();
        recorder.abandon_pending();
        assert!(recorder.pending_windows().is_empty());
    }
}
