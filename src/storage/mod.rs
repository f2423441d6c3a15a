//! CSV-shaped persisted state.
//!
//! Three files, matching the layout the diagnosis tooling reads:
//!
//! - `measurements.csv`: rolling full-cache snapshot, newest first,
//!   rewritten on every insert;
//! - `out_of_range.csv`: append-only, one row per anomaly with its
//!   reasons and context label;
//! - `context_data.csv`: append-only, one row per cached measurement
//!   captured as surrounding context.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::types::{Measurement, Vibration};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error on {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

const MEASUREMENTS_FILE: &str = "measurements.csv";
const OUT_OF_RANGE_FILE: &str = "out_of_range.csv";
const CONTEXT_FILE: &str = "context_data.csv";

const MEASUREMENT_COLUMNS: [&str; 7] = [
    "Station",
    "Temperature (°C)",
    "Humidity (%)",
    "Ambient Light (lx)",
    "Particle Count",
    "Vibration (m/s²)",
    "Timestamp",
];

/// Handles to the three log files in one data directory.
#[derive(Debug, Clone)]
pub struct CsvLogs {
    measurements_path: PathBuf,
    out_of_range_path: PathBuf,
    context_path: PathBuf,
}

impl CsvLogs {
    /// Create the log files in `dir`, truncating any previous run and
    /// writing headers.
    pub fn create(dir: &Path) -> Result<Self, StorageError> {
        std::fs::create_dir_all(dir).map_err(|e| StorageError::Io {
            path: dir.to_path_buf(),
            source: e,
        })?;

        let logs = Self {
            measurements_path: dir.join(MEASUREMENTS_FILE),
            out_of_range_path: dir.join(OUT_OF_RANGE_FILE),
            context_path: dir.join(CONTEXT_FILE),
        };

        logs.rewrite_measurements(&[])?;

        let mut writer = truncating_writer(&logs.out_of_range_path)?;
        let mut header: Vec<&str> = MEASUREMENT_COLUMNS.to_vec();
        header.extend(["Reasons", "Context"]);
        write_record(&mut writer, &logs.out_of_range_path, &header)?;
        flush(&mut writer, &logs.out_of_range_path)?;

        let mut writer = truncating_writer(&logs.context_path)?;
        let mut header: Vec<&str> = MEASUREMENT_COLUMNS.to_vec();
        header.extend(["Related To", "Position"]);
        write_record(&mut writer, &logs.context_path, &header)?;
        flush(&mut writer, &logs.context_path)?;

        Ok(logs)
    }

    /// Rewrite the rolling measurements log from a newest-first cache
    /// snapshot.
    pub fn rewrite_measurements(&self, newest_first: &[&Measurement]) -> Result<(), StorageError> {
        let mut writer = truncating_writer(&self.measurements_path)?;
        write_record(&mut writer, &self.measurements_path, &MEASUREMENT_COLUMNS)?;
        for measurement in newest_first {
            let row = measurement_row(measurement);
            write_record(&mut writer, &self.measurements_path, &row)?;
        }
        flush(&mut writer, &self.measurements_path)
    }

    /// Append one anomaly row to the out-of-range log.
    pub fn append_out_of_range(
        &self,
        measurement: &Measurement,
        reasons: &[String],
        context: &str,
    ) -> Result<(), StorageError> {
        let mut writer = appending_writer(&self.out_of_range_path)?;
        let mut row = measurement_row(measurement);
        row.push(reasons.join("; "));
        row.push(context.to_string());
        write_record(&mut writer, &self.out_of_range_path, &row)?;
        flush(&mut writer, &self.out_of_range_path)
    }

    /// Append one captured context row.
    pub fn append_context(
        &self,
        measurement: &Measurement,
        related_to: &str,
        position: &str,
    ) -> Result<(), StorageError> {
        let mut writer = appending_writer(&self.context_path)?;
        let mut row = measurement_row(measurement);
        row.push(related_to.to_string());
        row.push(position.to_string());
        write_record(&mut writer, &self.context_path, &row)?;
        flush(&mut writer, &self.context_path)
    }

    pub fn measurements_path(&self) -> &Path {
        &self.measurements_path
    }

    pub fn out_of_range_path(&self) -> &Path {
        &self.out_of_range_path
    }

    pub fn context_path(&self) -> &Path {
        &self.context_path
    }
}

fn measurement_row(m: &Measurement) -> Vec<String> {
    let opt = |v: Option<f64>| v.map_or_else(String::new, |x| format!("{x}"));
    let vibration = match m.vibration {
        None => String::new(),
        Some(Vibration::Scalar(v)) => format!("{v}"),
        Some(Vibration::Axes([x, y, z])) => format!("{x};{y};{z}"),
    };
    vec![
        m.station.code().to_string(),
        opt(m.temperature),
        opt(m.humidity),
        opt(m.ambient_light),
        opt(m.particle_count),
        vibration,
        m.time.to_rfc3339(),
    ]
}

fn truncating_writer(path: &Path) -> Result<csv::Writer<File>, StorageError> {
    let file = File::create(path).map_err(|e| StorageError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(csv::Writer::from_writer(file))
}

fn appending_writer(path: &Path) -> Result<csv::Writer<File>, StorageError> {
    let file = OpenOptions::new()
        .append(true)
        .open(path)
        .map_err(|e| StorageError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
    Ok(csv::Writer::from_writer(file))
}

fn write_record<S: AsRef<[u8]>>(
    writer: &mut csv::Writer<File>,
    path: &Path,
    record: &[S],
) -> Result<(), StorageError> {
    writer.write_record(record).map_err(|e| StorageError::Csv {
        path: path.to_path_buf(),
        source: e,
    })
}

fn flush(writer: &mut csv::Writer<File>, path: &Path) -> Result<(), StorageError> {
    writer.flush().map_err(|e| StorageError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}
