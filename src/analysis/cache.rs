//! Bounded, time-ordered store of recent measurements.
//!
//! The cache is the shared substrate the classifier, trend watcher, and
//! context recorder read. It is owned exclusively by the engine and
//! mutated only through [`MeasurementCache::insert`]; the engine's
//! sequential processing loop is the single-writer serialization point.

use chrono::{DateTime, Duration, Utc};

use crate::types::{Measurement, SensorKind, Station};

/// Insertion-ordered measurement store pruned to a retention horizon.
#[derive(Debug)]
pub struct MeasurementCache {
    entries: Vec<Measurement>,
    horizon: Duration,
}

impl MeasurementCache {
    pub fn new(horizon: Duration) -> Self {
        Self {
            entries: Vec::new(),
            horizon,
        }
    }

    /// Append a measurement, then prune entries older than
    /// `newest time − horizon`.
    ///
    /// A duplicate (station, time) pair replaces the earlier entry, so
    /// at-least-once redelivery from the transport is self-correcting.
    pub fn insert(&mut self, measurement: Measurement) {
        if let Some(existing) = self
            .entries
            .iter_mut()
            .find(|m| m.station == measurement.station && m.time == measurement.time)
        {
            *existing = measurement;
        } else {
            self.entries.push(measurement);
        }

        // Prune relative to the newest timestamp seen, not the wall
        // clock, so replayed historical streams keep their context.
        if let Some(newest) = self.entries.iter().map(|m| m.time).max() {
            let cutoff = newest - self.horizon;
            self.entries.retain(|m| m.time >= cutoff);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Measurement> {
        self.entries.iter()
    }

    /// Full snapshot, newest first, the shape of the rolling
    /// measurements log.
    pub fn snapshot_newest_first(&self) -> Vec<&Measurement> {
        let mut snapshot: Vec<&Measurement> = self.entries.iter().collect();
        snapshot.sort_by(|a, b| b.time.cmp(&a.time));
        snapshot
    }

    /// Same-station entries within `[start, end]`, in insertion order.
    pub fn station_window(
        &self,
        station: Station,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> impl Iterator<Item = &Measurement> {
        self.entries
            .iter()
            .filter(move |m| m.station == station && m.time >= start && m.time <= end)
    }

    /// The most recent `n` values of one sensor for one station, oldest
    /// first, skipping cycles where the sensor was absent.
    pub fn recent_sensor_values(&self, station: Station, sensor: SensorKind, n: usize) -> Vec<f64> {
        let mut values: Vec<(DateTime<Utc>, f64)> = self
            .entries
            .iter()
            .filter(|m| m.station == station)
            .filter_map(|m| m.sensor_value(sensor).map(|v| (m.time, v)))
            .collect();
        values.sort_by_key(|(t, _)| *t);
        values
            .into_iter()
            .rev()
            .take(n)
            .rev()
            .map(|(_, v)| v)
            .collect()
    }

    /// Oldest surviving entry timestamp, if any.
    pub fn oldest_time(&self) -> Option<DateTime<Utc>> {
        self.entries.iter().map(|m| m.time).min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).single().unwrap()
    }

    fn measurement(station: Station, secs: i64, temp: f64) -> Measurement {
        let mut m = Measurement::new(station, at(secs));
        m.temperature = Some(temp);
        m
    }

    #[test]
    fn prunes_beyond_horizon() {
        let mut cache = MeasurementCache::new(Duration::seconds(100));
        for secs in [0, 50, 99, 150, 260] {
            cache.insert(measurement(Station::Photolithography, secs, 20.0));
        }
        // Newest is t=260, cutoff 160: only t=260 survives.
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.oldest_time(), Some(at(260)));

        let mut cache = MeasurementCache::new(Duration::seconds(100));
        for secs in 0..=120 {
            cache.insert(measurement(Station::Photolithography, secs, 20.0));
        }
        let oldest = cache.oldest_time().unwrap();
        assert!(oldest >= at(120) - Duration::seconds(100));
    }

    #[test]
    fn duplicate_station_time_replaces() {
        let mut cache = MeasurementCache::new(Duration::hours(5));
        cache.insert(measurement(Station::SpinCoating, 10, 20.0));
        cache.insert(measurement(Station::SpinCoating, 10, 25.0));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.iter().next().unwrap().temperature, Some(25.0));

        // Same time, different station: both kept.
        cache.insert(measurement(Station::Sputtering, 10, 21.0));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn station_window_is_station_scoped_and_inclusive() {
        let mut cache = MeasurementCache::new(Duration::hours(5));
        cache.insert(measurement(Station::Photolithography, 0, 20.0));
        cache.insert(measurement(Station::Photolithography, 30, 21.0));
        cache.insert(measurement(Station::SpinCoating, 30, 22.0));
        cache.insert(measurement(Station::Photolithography, 61, 23.0));

        let window: Vec<_> = cache
            .station_window(Station::Photolithography, at(0), at(60))
            .collect();
        assert_eq!(window.len(), 2);
        assert!(window.iter().all(|m| m.station == Station::Photolithography));
    }

    #[test]
    fn recent_sensor_values_skips_gaps() {
        let mut cache = MeasurementCache::new(Duration::hours(5));
        cache.insert(measurement(Station::Sputtering, 0, 60.0));
        // Cycle without temperature
        cache.insert(Measurement::new(Station::Sputtering, at(10)));
        cache.insert(measurement(Station::Sputtering, 20, 63.0));
        cache.insert(measurement(Station::Sputtering, 30, 66.0));

        let values = cache.recent_sensor_values(Station::Sputtering, SensorKind::Temperature, 3);
        assert_eq!(values, vec![60.0, 63.0, 66.0]);
    }
}
