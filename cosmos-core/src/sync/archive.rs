//! Tar staging through the system `tar` binary.
//!
//! Archives always hold a single top-level entry, the output directory itself,
//! and extraction strips that entry so its contents land directly in the
//! destination.

use crate::error::CosmosError;
use std::path::Path;
use tokio::process::Command;

/// Archive `dir` into `archive` with `dir`'s own name as the top-level entry.
pub async fn create(dir: &Path, archive: &Path) -> Result<(), CosmosError> {
    let dir = tokio::fs::canonicalize(dir).await?;
    let archive = std::path::absolute(archive)?;
    let (Some(parent), Some(name)) = (dir.parent(), dir.file_name()) else {
        return Err(CosmosError::archive(format!(
            "cannot archive {}",
            dir.display()
        )));
    };

    let mut cmd = Command::new("tar");
    cmd.arg("-cf").arg(&archive).arg("-C").arg(parent).arg(name);
    run(cmd).await
}

/// Extract `archive` into `dest`, dropping the archive's top-level directory.
///
/// `dest` is created if absent.
pub async fn extract(archive: &Path, dest: &Path) -> Result<(), CosmosError> {
    let archive = std::path::absolute(archive)?;
    tokio::fs::create_dir_all(dest).await?;

    let mut cmd = Command::new("tar");
    cmd.arg("-xf")
        .arg(&archive)
        .arg("-C")
        .arg(dest)
        .arg("--strip-components=1");
    run(cmd).await
}

async fn run(mut cmd: Command) -> Result<(), CosmosError> {
    tracing::debug!(command = ?cmd.as_std(), "Running tar");
    let output = cmd
        .output()
        .await
        .map_err(|e| CosmosError::archive(format!("failed to run tar: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(CosmosError::archive(format!(
            "tar exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }
    Ok(())
}
