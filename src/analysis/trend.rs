//! Trend-based early warning.
//!
//! Looks at the three most recent cached values for each sensor a
//! measurement reports. A strictly monotonic run toward a bound with the
//! newest value inside the sensor's warning margin flags an early
//! warning. Advisory only: it feeds the Degraded status tier and never
//! appends to the range classifier's reasons.

use tracing::debug;

use super::cache::MeasurementCache;
use crate::config::MonitorConfig;
use crate::types::{Measurement, SensorKind};

/// Which bound the series is approaching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendDirection {
    RisingTowardMax,
    FallingTowardMin,
}

/// One early-warning flag for a station/sensor pair.
#[derive(Debug, Clone)]
pub struct TrendWarning {
    pub sensor: SensorKind,
    pub direction: TrendDirection,
    /// Newest value in the run.
    pub latest: f64,
    /// The bound being approached.
    pub bound: f64,
}

/// Number of consecutive points required for a trend call.
const TREND_POINTS: usize = 3;

/// Evaluate trends for every sensor the measurement reports.
///
/// The measurement itself is expected to already be in the cache, so
/// the three most recent cached values include it. Fewer than three
/// qualifying points means no warning, not an error.
pub fn watch_trends(
    cache: &MeasurementCache,
    measurement: &Measurement,
    config: &MonitorConfig,
) -> Vec<TrendWarning> {
    let mut warnings = Vec::new();

    for sensor in SensorKind::ALL {
        if measurement.sensor_value(sensor).is_none() {
            continue;
        }

        let (min_bound, max_bound, margin) = match config.sensors.limits(sensor) {
            Some(limits) => (
                Some(limits.acceptable_min),
                limits.acceptable_max,
                limits.warning_margin,
            ),
            // Vibration carries its own limit shape; the trend series is
            // its magnitude against the single magnitude bound. There is
            // no lower-bound warning; quiet is never a problem.
            None => {
                let v = &config.sensors.vibration;
                (None, v.magnitude_max, v.warning_margin)
            }
        };

        let values = cache.recent_sensor_values(measurement.station, sensor, TREND_POINTS);
        if values.len() < TREND_POINTS {
            continue;
        }

        let rising = values.windows(2).all(|w| w[1] > w[0]);
        let falling = values.windows(2).all(|w| w[1] < w[0]);
        let latest = values[values.len() - 1];

        if rising && latest >= max_bound - margin {
            debug!(
                station = %measurement.station,
                sensor = %sensor,
                latest,
                bound = max_bound,
                "Trend early warning: rising toward upper bound"
            );
            warnings.push(TrendWarning {
                sensor,
                direction: TrendDirection::RisingTowardMax,
                latest,
                bound: max_bound,
            });
        } else if let Some(min_bound) = min_bound {
            if falling && latest <= min_bound + margin {
                debug!(
                    station = %measurement.station,
                    sensor = %sensor,
                    latest,
                    bound = min_bound,
                    "Trend early warning: falling toward lower bound"
                );
                warnings.push(TrendWarning {
                    sensor,
                    direction: TrendDirection::FallingTowardMin,
                    latest,
                    bound: min_bound,
                });
            }
        }
    }

    warnings
}
