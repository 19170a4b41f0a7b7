//! Snapshot of the most recently edited notebook, copied next to the results.

use crate::error::CosmosError;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Most recently modified file under `dir` with the given extension.
pub fn latest_notebook(dir: &Path, extension: &str) -> Option<PathBuf> {
    let extension = OsStr::new(extension);
    WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension() == Some(extension))
        .filter_map(|e| {
            let modified = e.metadata().ok()?.modified().ok()?;
            Some((modified, e.into_path()))
        })
        .max_by_key(|(modified, _)| *modified)
        .map(|(_, path)| path)
}

/// Copy the latest notebook into `output_dir`. No match is a no-op.
pub fn snapshot_latest(
    dir: &Path,
    extension: &str,
    output_dir: &Path,
) -> Result<Option<PathBuf>, CosmosError> {
    let Some(source) = latest_notebook(dir, extension) else {
        tracing::debug!(dir = %dir.display(), "No notebook to snapshot");
        return Ok(None);
    };
    let Some(name) = source.file_name() else {
        return Ok(None);
    };

    std::fs::create_dir_all(output_dir)?;
    let target = output_dir.join(name);
    // Copying a file onto itself would truncate it.
    if target.exists() && std::fs::canonicalize(&target)? == std::fs::canonicalize(&source)? {
        return Ok(Some(target));
    }

    std::fs::copy(&source, &target)?;
    tracing::info!(
        source = %source.display(),
        target = %target.display(),
        "Snapshotted notebook"
    );
    Ok(Some(target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn write_with_mtime(path: &Path, body: &str, age_secs: u64) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, body).unwrap();
        let file = std::fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(age_secs))
            .unwrap();
    }

    #[test]
    fn test_latest_notebook_picks_newest_match() {
        let tmp = TempDir::new().unwrap();
        let nb = tmp.path().join("notebooks");
        write_with_mtime(&nb.join("old.ipynb"), "{}", 600);
        write_with_mtime(&nb.join("nested").join("new.ipynb"), "{\"cells\":[]}", 10);
        write_with_mtime(&nb.join("newest.py"), "print()", 0);

        let latest = latest_notebook(&nb, "ipynb").unwrap();
        assert_eq!(latest, nb.join("nested").join("new.ipynb"));
    }

    #[test]
    fn test_snapshot_copies_into_output_dir() {
        let tmp = TempDir::new().unwrap();
        let nb = tmp.path().join("notebooks");
        write_with_mtime(&nb.join("train.ipynb"), "{\"cells\":[1]}", 0);
        let out = tmp.path().join("out");

        let copied = snapshot_latest(&nb, "ipynb", &out).unwrap().unwrap();
        assert_eq!(copied, out.join("train.ipynb"));
        assert_eq!(std::fs::read_to_string(copied).unwrap(), "{\"cells\":[1]}");
    }

    #[test]
    fn test_snapshot_without_match_is_noop() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("out");
        let copied = snapshot_latest(&tmp.path().join("missing"), "ipynb", &out).unwrap();
        assert!(copied.is_none());
        assert!(!out.exists());
    }

    #[test]
    fn test_snapshot_inside_output_dir_keeps_content() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("out");
        write_with_mtime(&out.join("train.ipynb"), "keep me", 0);

        let copied = snapshot_latest(&out, "ipynb", &out).unwrap().unwrap();
        assert_eq!(std::fs::read_to_string(copied).unwrap(), "keep me");
    }
}
