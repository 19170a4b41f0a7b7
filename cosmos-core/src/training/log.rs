//! The metric table persisted as `result.csv`.
//!
//! The header is always `epoch,time` followed by metric names in the order
//! they were first seen. Cells for metrics a row did not report are left
//! empty. Every write renders the whole table again.

use super::metrics::{EpochMetrics, MetricRow};
use crate::error::CosmosError;
use crate::persistence::atomic_write;
use std::io;
use std::path::Path;

/// File name of the log inside the output directory.
pub const RESULT_FILE: &str = "result.csv";
pub const EPOCH_COLUMN: &str = "epoch";
pub const TIME_COLUMN: &str = "time";

fn is_reserved(name: &str) -> bool {
    name == EPOCH_COLUMN || name == TIME_COLUMN
}

/// Ordered sequence of metric rows plus the metric column set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricLog {
    columns: Vec<String>,
    rows: Vec<MetricRow>,
}

impl MetricLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Metric columns in header order, without `epoch` and `time`.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Full header as written to disk.
    pub fn header(&self) -> Vec<&str> {
        [EPOCH_COLUMN, TIME_COLUMN]
            .into_iter()
            .chain(self.columns.iter().map(String::as_str))
            .collect()
    }

    pub fn rows(&self) -> &[MetricRow] {
        &self.rows
    }

    pub fn last(&self) -> Option<&MetricRow> {
        self.rows.last()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Epoch number the next appended row will get.
    pub fn next_epoch(&self) -> u64 {
        self.rows.len() as u64 + 1
    }

    /// Append a row numbered `next_epoch()`. Unseen metric names widen the
    /// header; names colliding with `epoch` or `time` are dropped.
    pub fn push(&mut self, time: i64, metrics: &EpochMetrics) -> &MetricRow {
        let mut kept = EpochMetrics::new();
        for (name, value) in metrics.iter() {
            if is_reserved(name) {
                tracing::warn!(metric = name, "Ignoring metric with reserved column name");
                continue;
            }
            if !self.columns.iter().any(|c| c == name) {
                self.columns.push(name.to_string());
            }
            kept.insert(name, value);
        }

        let index = self.rows.len();
        self.rows.push(MetricRow {
            epoch: self.next_epoch(),
            time,
            metrics: kept,
        });
        &self.rows[index]
    }

    /// Parse a log from CSV. Missing `epoch`/`time` columns, duplicate
    /// columns, ragged rows and non-numeric cells are all errors.
    pub fn from_reader<R: io::Read>(reader: R) -> Result<Self, CosmosError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(reader);
        let headers = reader.headers()?.clone();

        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| CosmosError::corrupt_log(format!("missing `{name}` column")))
        };
        let epoch_idx = find(EPOCH_COLUMN)?;
        let time_idx = find(TIME_COLUMN)?;

        let mut columns: Vec<(usize, String)> = Vec::new();
        for (idx, name) in headers.iter().enumerate() {
            if idx == epoch_idx || idx == time_idx {
                continue;
            }
            if is_reserved(name) || columns.iter().any(|(_, c)| c == name) {
                return Err(CosmosError::corrupt_log(format!("duplicate `{name}` column")));
            }
            columns.push((idx, name.to_string()));
        }

        let mut rows = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record = record?;
            // Header is line 1.
            let line = line + 2;
            let cell = |idx: usize| record.get(idx).unwrap_or("");

            let epoch = parse_integer(cell(epoch_idx))
                .and_then(|v| u64::try_from(v).ok())
                .ok_or_else(|| CosmosError::corrupt_log(format!("bad epoch on line {line}")))?;
            let time = parse_integer(cell(time_idx))
                .ok_or_else(|| CosmosError::corrupt_log(format!("bad time on line {line}")))?;

            let mut metrics = EpochMetrics::new();
            for (idx, name) in &columns {
                let raw = cell(*idx);
                if raw.is_empty() {
                    continue;
                }
                let value = raw.parse::<f64>().map_err(|_| {
                    CosmosError::corrupt_log(format!("non-numeric `{name}` on line {line}"))
                })?;
                metrics.insert(name.as_str(), value);
            }

            rows.push(MetricRow {
                epoch,
                time,
                metrics,
            });
        }

        Ok(Self {
            columns: columns.into_iter().map(|(_, name)| name).collect(),
            rows,
        })
    }

    pub fn read(path: &Path) -> Result<Self, CosmosError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(io::BufReader::new(file))
    }

    /// Render the whole table as CSV.
    pub fn to_csv(&self) -> Result<Vec<u8>, CosmosError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(self.header())?;
        for row in &self.rows {
            let mut record = Vec::with_capacity(self.columns.len() + 2);
            record.push(row.epoch.to_string());
            record.push(row.time.to_string());
            record.extend(self.columns.iter().map(|name| {
                row.metrics
                    .get(name)
                    .map(|v| v.to_string())
                    .unwrap_or_default()
            }));
            writer.write_record(&record)?;
        }
        writer
            .into_inner()
            .map_err(|e| CosmosError::Io(e.into_error()))
    }

    /// Rewrite `path` with the full table.
    pub fn write(&self, path: &Path) -> Result<(), CosmosError> {
        atomic_write(path, &self.to_csv()?)?;
        Ok(())
    }
}

/// Integers may have been written as `3.0` by other tools.
fn parse_integer(cell: &str) -> Option<i64> {
    cell.parse::<i64>().ok().or_else(|| {
        cell.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && v.fract() == 0.0)
            .map(|v| v as i64)
    })
}
