//! Source file discovery for the build system.
//!
//! Resolves a configuration's include and exclude glob patterns against its
//! source directory. Discovery sits behind the [`Scanner`] trait so callers
//! can substitute their own file enumeration.

use glob::{glob, MatchOptions, Pattern};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error during source discovery.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Invalid glob pattern
    #[error("Invalid glob pattern '{0}': {1}")]
    InvalidPattern(String, #[source] glob::PatternError),
    /// IO error during file enumeration
    #[error("IO error during discovery: {0}")]
    Io(#[from] std::io::Error),
}

/// Enumerates source files below a root directory.
pub trait Scanner: Send + Sync {
    /// Files under `root` matching any of `includes` and none of `excludes`.
    ///
    /// Returned paths are relative to `root`, sorted and free of duplicates.
    fn scan(
        &self,
        root: &Path,
        includes: &[String],
        excludes: &[String],
    ) -> Result<Vec<PathBuf>, DiscoveryError>;
}

/// [`Scanner`] backed by the `glob` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct GlobScanner;

impl Scanner for GlobScanner {
    fn scan(
        &self,
        root: &Path,
        includes: &[String],
        excludes: &[String],
    ) -> Result<Vec<PathBuf>, DiscoveryError> {
        if !root.is_dir() {
            return Ok(Vec::new());
        }

        let excludes = excludes
            .iter()
            .map(|p| Pattern::new(p).map_err(|e| DiscoveryError::InvalidPattern(p.clone(), e)))
            .collect::<Result<Vec<_>, _>>()?;
        let options = MatchOptions { require_literal_separator: true, ..MatchOptions::new() };

        let mut files = BTreeSet::new();
        for pattern in includes {
            for path in discover_files(root, pattern)? {
                let Ok(relative) = path.strip_prefix(root) else {
                    continue;
                };
                if excludes.iter().any(|ex| ex.matches_path_with(relative, options)) {
                    continue;
                }
                files.insert(relative.to_path_buf());
            }
        }
        Ok(files.into_iter().collect())
    }
}

/// Discover files matching a glob pattern.
///
/// # Arguments
/// - `base_dir` - Base directory to resolve patterns from
/// - `pattern` - Glob pattern to match
///
/// # Returns
/// Sorted list of matching file paths.
pub fn discover_files(base_dir: &Path, pattern: &str) -> Result<Vec<PathBuf>, DiscoveryError> {
    let escaped_base = Pattern::escape(&base_dir.to_string_lossy());
    let full_pattern = Path::new(&escaped_base).join(pattern);
    let pattern_str = full_pattern.to_string_lossy();

    let paths =
        glob(&pattern_str).map_err(|e| DiscoveryError::InvalidPattern(pattern.to_string(), e))?;

    let mut files = Vec::new();
    for entry in paths {
        match entry {
            Ok(path) => {
                if path.is_file() {
                    files.push(path);
                }
            }
            Err(e) => {
                tracing::warn!("error reading path: {}", e);
            }
        }
    }

    files.sort();
    Ok(files)
}
