//! Atomic file writes for files living inside the output directory.
//!
//! Every rewrite of `result.csv` or `description.txt` goes through a `.tmp`
//! sibling followed by a rename, so a crash mid-write never leaves a
//! truncated file behind.

use std::io;
use std::path::Path;

/// Atomically write raw bytes to a file.
///
/// Writes to a `.tmp` sibling file, then atomically renames to the target path.
/// Creates parent directories if they don't exist.
pub fn atomic_write(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, data)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
