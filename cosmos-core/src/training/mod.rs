//! Training-side logging: per-epoch metrics appended to `result.csv`.

pub mod callbacks;
pub mod log;
pub mod metrics;

pub use callbacks::{CallbackAction, LogRecovery, MetricLogger, TrainingCallback};
pub use log::{MetricLog, RESULT_FILE};
pub use metrics::{EpochMetrics, MetricRow};
