//! Result sync: archive the output directory and move it to or from the remote store.

pub mod archive;
pub mod client;
pub mod notebook;

pub use client::{LoadOutcome, SyncClient, TransferOutcome};
