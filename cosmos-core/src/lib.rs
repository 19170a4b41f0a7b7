//! # cosmos-core: training metric logging and result sync
//!
//! Two independent pieces that share one [`CosmosConfig`]:
//!
//! - [`MetricLogger`] appends a row per epoch to `<output_dir>/result.csv` and
//!   resumes numbering from an existing file.
//! - [`SyncClient`] archives `output_dir`, uploads it to the remote store, and
//!   downloads saved revisions back into it.

pub mod config;
pub mod error;
pub mod persistence;
pub mod sync;
pub mod training;

pub use config::{CosmosConfig, MetricsConfig, SyncSettings, SyncTarget, load_config};
pub use error::CosmosError;
pub use sync::{LoadOutcome, SyncClient, TransferOutcome};
pub use training::{
    CallbackAction, EpochMetrics, LogRecovery, MetricLog, MetricLogger, MetricRow,
    TrainingCallback,
};
