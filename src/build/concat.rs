//! Merging several sources into one synthetic source.

use crate::error::{BuildError, BuildResult};
use crate::source::modified_time;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// What [`concatenate`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcatOutcome {
    /// The merge file was rewritten
    Written,
    /// Every input is older than the merge file
    UpToDate,
}

/// Whether the merge file at `target` must be rebuilt from `sources`.
pub fn is_stale(sources: &[PathBuf], target: &Path) -> BuildResult<bool> {
    let Ok(target_modified) = fs::metadata(target).and_then(|m| m.modified()) else {
        return Ok(true);
    };
    for source in sources {
        if modified_time(source)? > target_modified {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Merge `sources`, in order and without separators, into `target`.
///
/// Nothing is written when the merge file is newer than every input. A stale
/// merge file is deleted before being rewritten.
pub fn concatenate(sources: &[PathBuf], target: &Path) -> BuildResult<ConcatOutcome> {
    if !is_stale(sources, target)? {
        tracing::debug!(target = %target.display(), "Concatenation up to date");
        return Ok(ConcatOutcome::UpToDate);
    }

    match fs::remove_file(target) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(BuildError::io(target, e)),
    }
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|source| BuildError::DirectoryCreateFailure {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let mut merged = File::create(target).map_err(|e| BuildError::io(target, e))?;
    for source in sources {
        tracing::debug!(source = %source.display(), "Concatenating");
        let content = fs::read(source).map_err(|e| BuildError::io(source, e))?;
        merged.write_all(&content).map_err(|e| BuildError::io(target, e))?;
    }
    merged.flush().map_err(|e| BuildError::io(target, e))?;
    Ok(ConcatOutcome::Written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn set_age(path: &Path, secs: u64) {
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(SystemTime::now() - Duration::from_secs(secs))
            .unwrap();
    }

    #[test]
    fn test_concatenates_in_order_without_separator() {
        let temp = TempDir::new().unwrap();
        let a = write(temp.path(), "a.less", "X");
        let b = write(temp.path(), "b.less", "Y");
        let target = temp.path().join("all.less");

        assert_eq!(concatenate(&[a, b], &target).unwrap(), ConcatOutcome::Written);
        assert_eq!(fs::read_to_string(&target).unwrap(), "XY");
    }

    #[test]
    fn test_rewrites_only_when_an_input_is_newer() {
        let temp = TempDir::new().unwrap();
        let a = write(temp.path(), "a.less", "X");
        let b = write(temp.path(), "b.less", "Y");
        set_age(&a, 100);
        set_age(&b, 100);
        let target = temp.path().join("all.less");
        let sources = vec![a.clone(), b.clone()];

        concatenate(&sources, &target).unwrap();
        set_age(&target, 50);
        assert_eq!(concatenate(&sources, &target).unwrap(), ConcatOutcome::UpToDate);

        fs::write(&b, "Z").unwrap();
        assert_eq!(concatenate(&sources, &target).unwrap(), ConcatOutcome::Written);
        assert_eq!(fs::read_to_string(&target).unwrap(), "XZ");
    }

    #[test]
    fn test_missing_input_fails() {
        let temp = TempDir::new().unwrap();
        let a = write(temp.path(), "a.less", "X");
        let err = concatenate(&[a, temp.path().join("gone.less")], &temp.path().join("all.less"))
            .unwrap_err();
        assert!(matches!(err, BuildError::NotFound { .. }));
    }

    #[test]
    fn test_creates_parent_directory() {
        let temp = TempDir::new().unwrap();
        let a = write(temp.path(), "a.less", "X");
        let target = temp.path().join("generated").join("all.less");
        concatenate(&[a], &target).unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "X");
    }
}
