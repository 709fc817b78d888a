//! # CSV measurement source
//!
//! [`CsvMeasurements`] streams corrected measurements from a comma-separated
//! file. The file is **reopened for every pass**, so memory stays constant no
//! matter how large the file is, and the pipeline can iterate it once for the
//! bootstrap pass and once for the full pass.
//!
//! ## Format
//! -----------------
//! One header line, then one event per line with 16 numeric columns:
//!
//! ```text
//! phi0,phi1,phi2,phi3,phi4,phi5,z0,z1,z2,z3,z4,z5,inv_pt,phi,cot_theta,vz
//! ```
//!
//! Lines starting with `#` are comments. Rows that cannot be parsed, or that
//! do not have exactly 16 columns, are skipped with a warning.
use std::fs::File;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use csv::{ReaderBuilder, Trim};
use log::warn;

use crate::constants::N_VARIABLES_VIEW;
use crate::measurements::{Measurement, MeasurementSource};
use crate::trackpca_errors::TrackPcaError;

/// Number of columns of one CSV row.
pub const CSV_COLUMNS: usize = 2 * N_VARIABLES_VIEW + 4;

/// Streaming CSV-backed [`MeasurementSource`].
#[derive(Debug, Clone)]
pub struct CsvMeasurements {
    path: Utf8PathBuf,
}

impl CsvMeasurements {
    /// Point a source at `path`. The file is checked for existence but not read.
    pub fn new(path: impl AsRef<Utf8Path>) -> Result<Self, TrackPcaError> {
        let path = path.as_ref().to_path_buf();
        // Surface a missing file here rather than at the first pass.
        File::open(&path)?;
        Ok(CsvMeasurements { path })
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

fn measurement_from_row(values: &[f64]) -> Option<Measurement> {
    if values.len() != CSV_COLUMNS {
        return None;
    }
    let mut phi = [0.0; N_VARIABLES_VIEW];
    let mut z = [0.0; N_VARIABLES_VIEW];
    phi.copy_from_slice(&values[..N_VARIABLES_VIEW]);
    z.copy_from_slice(&values[N_VARIABLES_VIEW..2 * N_VARIABLES_VIEW]);
    let tail = &values[2 * N_VARIABLES_VIEW..];
    Some(Measurement::from_arrays(
        phi, z, tail[0], tail[1], tail[2], tail[3],
    ))
}

/// One data row of the file, keyed by the line it starts on.
#[derive(Debug, PartialEq)]
enum Row {
    Parsed(Measurement),
    Skipped { line: u64, reason: String },
}

fn csv_reader<R: io::Read>(input: R) -> csv::Reader<R> {
    ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .comment(Some(b'#'))
        .from_reader(input)
}

fn read_rows<R: io::Read>(reader: csv::Reader<R>) -> impl Iterator<Item = Row> {
    reader.into_records().map(|record| {
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                return Row::Skipped {
                    line: err.position().map_or(0, |p| p.line()),
                    reason: err.to_string(),
                };
            }
        };
        let line = record.position().map_or(0, |p| p.line());
        match record.deserialize::<Vec<f64>>(None) {
            Ok(values) => match measurement_from_row(&values) {
                Some(measurement) => Row::Parsed(measurement),
                None => Row::Skipped {
                    line,
                    reason: format!("{} columns, expected {CSV_COLUMNS}", values.len()),
                },
            },
            Err(err) => Row::Skipped {
                line,
                reason: err.to_string(),
            },
        }
    })
}

impl MeasurementSource for CsvMeasurements {
    fn measurements(&self) -> Result<Box<dyn Iterator<Item = Measurement> + '_>, TrackPcaError> {
        let path = &self.path;
        let rows = read_rows(csv_reader(File::open(path)?)).filter_map(move |row| match row {
            Row::Parsed(measurement) => Some(measurement),
            Row::Skipped { line, reason } => {
                warn!("{path}: skipping line {line}: {reason}");
                None
            }
        });
        Ok(Box::new(rows))
    }
}
