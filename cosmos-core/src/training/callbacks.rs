//! Training callbacks and the per-epoch metric logger.

use super::log::{MetricLog, RESULT_FILE};
use super::metrics::{EpochMetrics, MetricRow};
use crate::config::CosmosConfig;
use crate::error::CosmosError;
use chrono::Utc;
use std::path::{Path, PathBuf};

/// Action a callback can request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    Continue,
}

/// Trait for training callbacks.
pub trait TrainingCallback: Send + Sync {
    /// Called at the end of each epoch with epoch number and current metrics.
    fn on_epoch_end(&mut self, epoch: usize, metrics: &EpochMetrics) -> CallbackAction;
}

/// Why an existing log was discarded when the logger was opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecovery {
    pub path: PathBuf,
    pub reason: String,
}

/// Appends one row per epoch to `<output_dir>/result.csv`.
///
/// An existing log is reloaded on open so numbering resumes after a restart.
/// The logger owns the file exclusively; concurrent writers race on it.
#[derive(Debug)]
pub struct MetricLogger {
    path: PathBuf,
    log: MetricLog,
    keys: Vec<String>,
    recovery: Option<LogRecovery>,
}

impl MetricLogger {
    /// Open the log for `config.output_dir`, creating the directory if needed.
    ///
    /// Keys come from the existing header when the file parses, otherwise from
    /// `config.metrics.keys`. An unreadable file does not fail the open; see
    /// [`MetricLogger::recovery`].
    pub fn open(config: &CosmosConfig) -> Result<Self, CosmosError> {
        if config.output_dir.as_os_str().is_empty() {
            return Err(CosmosError::MissingSetting("output_dir"));
        }
        std::fs::create_dir_all(&config.output_dir)?;
        let path = config.output_dir.join(RESULT_FILE);

        let mut logger = Self {
            path,
            log: MetricLog::new(),
            keys: config.metrics.keys.clone(),
            recovery: None,
        };

        if logger.path.exists() {
            match MetricLog::read(&logger.path) {
                Ok(log) => {
                    logger.keys = log.columns().to_vec();
                    tracing::info!(
                        path = %logger.path.display(),
                        rows = log.len(),
                        "Resuming metric log"
                    );
                    logger.log = log;
                }
                Err(e) => {
                    tracing::warn!(
                        path = %logger.path.display(),
                        error = %e,
                        "Existing metric log is unreadable, starting a new one"
                    );
                    logger.recovery = Some(LogRecovery {
                        path: logger.path.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        Ok(logger)
    }

    /// Append a row and rewrite the file.
    ///
    /// `epoch` is ignored: rows are numbered by position, starting at 1.
    pub fn on_epoch_end(
        &mut self,
        _epoch: usize,
        metrics: &EpochMetrics,
    ) -> Result<&MetricRow, CosmosError> {
        let index = self.append(metrics)?;
        Ok(&self.log.rows()[index])
    }

    fn append(&mut self, metrics: &EpochMetrics) -> Result<usize, CosmosError> {
        let time = Utc::now().timestamp();
        let index = self.log.len();
        let epoch = self.log.push(time, metrics).epoch;
        self.log.write(&self.path)?;
        tracing::debug!(epoch, metrics = metrics.len(), "Logged epoch");
        Ok(index)
    }

    /// Append values positionally aligned with [`MetricLogger::keys`].
    ///
    /// After a reload that order is the column order of the existing header.
    /// Fewer values than keys leaves the trailing keys empty for this row.
    pub fn update(&mut self, values: &[f64]) -> Result<&MetricRow, CosmosError> {
        if values.len() > self.keys.len() {
            return Err(CosmosError::KeyMismatch {
                values: values.len(),
                keys: self.keys.len(),
            });
        }
        let metrics: EpochMetrics = self
            .keys
            .iter()
            .map(String::as_str)
            .zip(values.iter().copied())
            .collect();
        let epoch = self.log.next_epoch() as usize;
        self.on_epoch_end(epoch, &metrics)
    }

    /// Keys used by [`MetricLogger::update`], in header order when a log was reloaded.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn log(&self) -> &MetricLog {
        &self.log
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    /// Set when an existing log could not be read and was replaced by an empty one.
    pub fn recovery(&self) -> Option<&LogRecovery> {
        self.recovery.as_ref()
    }
}

impl TrainingCallback for MetricLogger {
    fn on_epoch_end(&mut self, _epoch: usize, metrics: &EpochMetrics) -> CallbackAction {
        if let Err(e) = self.append(metrics) {
            tracing::warn!(error = %e, path = %self.path.display(), "Failed to write metric log");
        }
        CallbackAction::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> CosmosConfig {
        CosmosConfig::new(dir.path().join("out"))
    }

    fn epochs(logger: &MetricLogger) -> Vec<u64> {
        logger.log().rows().iter().map(|r| r.epoch).collect()
    }

    #[test]
    fn test_open_creates_output_dir() {
        let dir = TempDir::new().unwrap();
        let logger = MetricLogger::open(&config(&dir).with_keys(["acc"])).unwrap();
        assert!(dir.path().join("out").is_dir());
        assert!(logger.is_empty());
        assert_eq!(logger.keys(), ["acc".to_string()]);
        assert!(logger.recovery().is_none());
    }

    #[test]
    fn test_open_requires_output_dir() {
        let err = MetricLogger::open(&CosmosConfig::default()).unwrap_err();
        assert!(matches!(err, CosmosError::MissingSetting("output_dir")));
    }

    #[test]
    fn test_epoch_argument_is_ignored() {
        let dir = TempDir::new().unwrap();
        let mut logger = MetricLogger::open(&config(&dir)).unwrap();
        for epoch in [7, 0, 7, 3] {
            logger
                .on_epoch_end(epoch, &EpochMetrics::new().with("loss", 0.5))
                .unwrap();
        }
        assert_eq!(epochs(&logger), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_each_append_rewrites_file() {
        let dir = TempDir::new().unwrap();
        let mut logger = MetricLogger::open(&config(&dir)).unwrap();
        logger
            .on_epoch_end(0, &EpochMetrics::new().with("loss", 1.5))
            .unwrap();
        logger
            .on_epoch_end(0, &EpochMetrics::new().with("loss", 0.5).with("acc", 0.25))
            .unwrap();

        let on_disk = MetricLog::read(logger.path()).unwrap();
        assert_eq!(&on_disk, logger.log());
        assert_eq!(on_disk.header(), vec!["epoch", "time", "loss", "acc"]);
        assert_eq!(on_disk.rows()[0].metrics.get("acc"), None);
    }

    #[test]
    fn test_reload_takes_keys_from_header() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        std::fs::create_dir_all(&out).unwrap();
        std::fs::write(out.join(RESULT_FILE), "epoch,time,acc,loss\n1,10,0.5,0.25\n").unwrap();

        let mut logger = MetricLogger::open(&config(&dir).with_keys(["ignored"])).unwrap();
        assert_eq!(logger.keys(), ["acc".to_string(), "loss".to_string()]);
        assert_eq!(logger.len(), 1);

        logger
            .on_epoch_end(0, &EpochMetrics::new().with("loss", 0.125).with("acc", 0.75))
            .unwrap();
        let text = std::fs::read_to_string(logger.path()).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("epoch,time,acc,loss"));
        assert_eq!(lines.next(), Some("1,10,0.5,0.25"));
        assert!(lines.next().unwrap().starts_with("2,"));
    }

    #[test]
    fn test_update_after_reload_follows_header_order() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        std::fs::create_dir_all(&out).unwrap();
        std::fs::write(out.join(RESULT_FILE), "epoch,time,loss,acc\n1,10,0.5,0.25\n").unwrap();

        let mut logger = MetricLogger::open(&config(&dir).with_keys(["acc", "loss"])).unwrap();
        assert_eq!(logger.keys(), ["loss".to_string(), "acc".to_string()]);

        let row = logger.update(&[0.125, 0.75]).unwrap().clone();
        assert_eq!(row.epoch, 2);
        assert_eq!(row.metrics.get("loss"), Some(0.125));
        assert_eq!(row.metrics.get("acc"), Some(0.75));
    }

    #[test]
    fn test_corrupt_log_starts_fresh_and_reports() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        std::fs::create_dir_all(&out).unwrap();
        std::fs::write(out.join(RESULT_FILE), "not,a,metric log\nx\n").unwrap();

        let mut logger = MetricLogger::open(&config(&dir).with_keys(["acc", "loss"])).unwrap();
        let recovery = logger.recovery().expect("recovery should be reported");
        assert_eq!(recovery.path, out.join(RESULT_FILE));
        assert!(logger.is_empty());
        assert_eq!(logger.keys(), ["acc".to_string(), "loss".to_string()]);

        logger.update(&[0.5, 0.25]).unwrap();
        let on_disk = MetricLog::read(logger.path()).unwrap();
        assert_eq!(on_disk.len(), 1);
        assert_eq!(on_disk.rows()[0].epoch, 1);
    }

    #[test]
    fn test_update_too_many_values() {
        let dir = TempDir::new().unwrap();
        let mut logger = MetricLogger::open(&config(&dir).with_keys(["acc", "loss"])).unwrap();

        let err = logger.update(&[0.1, 0.2, 0.3]).unwrap_err();
        assert!(matches!(err, CosmosError::KeyMismatch { values: 3, keys: 2 }));
        assert!(logger.is_empty());
        assert!(!logger.path().exists());
    }

    #[test]
    fn test_update_fewer_values_than_keys() {
        let dir = TempDir::new().unwrap();
        let mut logger = MetricLogger::open(&config(&dir).with_keys(["acc", "loss"])).unwrap();

        let row = logger.update(&[0.5]).unwrap().clone();
        assert_eq!(row.epoch, 1);
        assert_eq!(row.metrics, EpochMetrics::new().with("acc", 0.5));

        let text = std::fs::read_to_string(logger.path()).unwrap();
        assert_eq!(text.lines().next(), Some("epoch,time,acc"));
    }

    #[test]
    fn test_update_with_no_keys_and_no_values() {
        let dir = TempDir::new().unwrap();
        let mut logger = MetricLogger::open(&config(&dir)).unwrap();
        logger.update(&[]).unwrap();
        assert_eq!(epochs(&logger), vec![1]);
    }

    #[test]
    fn test_callback_trait_appends_and_continues() {
        let dir = TempDir::new().unwrap();
        let mut logger = MetricLogger::open(&config(&dir)).unwrap();
        let callback: &mut dyn TrainingCallback = &mut logger;

        let action = callback.on_epoch_end(1, &EpochMetrics::new().with("loss", 0.5));
        assert_eq!(action, CallbackAction::Continue);
        assert_eq!(logger.len(), 1);
    }

    #[test]
    fn test_callback_trait_survives_write_failure() {
        let dir = TempDir::new().unwrap();
        let mut logger = MetricLogger::open(&config(&dir)).unwrap();
        // Replace the output directory with a file so the rewrite fails.
        std::fs::remove_dir_all(dir.path().join("out")).unwrap();
        std::fs::write(dir.path().join("out"), b"").unwrap();

        let action =
            TrainingCallback::on_epoch_end(&mut logger, 1, &EpochMetrics::new().with("loss", 0.5));
        assert_eq!(action, CallbackAction::Continue);
    }
}
