//! Error taxonomy for the build engine.
//!
//! Per-file errors are turned into [`Diagnostic`](crate::diagnostic::Diagnostic)s
//! by the orchestrator. Only [`BuildError::ConfigurationConflict`] aborts a whole run.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result alias used across the crate.
pub type BuildResult<T> = Result<T, BuildError>;

/// Errors raised while resolving, concatenating or compiling sources.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BuildError {
    /// Root or imported source file does not exist
    #[error("source not found: {}", .path.display())]
    NotFound { path: PathBuf },

    /// Read or write failure
    #[error("I/O error on {}: {source}", .path.display())]
    IoFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The backend rejected the source
    #[error("compilation failed for {}: {message}", .path.display())]
    CompileFailure { path: PathBuf, message: String },

    /// An output directory could not be created
    #[error("cannot create output directory {}: {source}", .path.display())]
    DirectoryCreateFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Two mutually exclusive options were set together
    #[error("configuration conflict: {0}")]
    ConfigurationConflict(String),

    /// Include/exclude patterns could not be expanded
    #[error(transparent)]
    Discovery(#[from] crate::build::DiscoveryError),
}

impl BuildError {
    /// Wrap an I/O error, mapping `NotFound` onto [`BuildError::NotFound`].
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        let path = path.as_ref().to_path_buf();
        if source.kind() == std::io::ErrorKind::NotFound {
            BuildError::NotFound { path }
        } else {
            BuildError::IoFailure { path, source }
        }
    }

    /// Short kind label used in diagnostics and JSON reports.
    pub fn kind(&self) -> &'static str {
        match self {
            BuildError::NotFound { .. } => "NotFound",
            BuildError::IoFailure { .. } => "IOFailure",
            BuildError::CompileFailure { .. } => "CompileFailure",
            BuildError::DirectoryCreateFailure { .. } => "DirectoryCreateFailure",
            BuildError::ConfigurationConflict(_) => "ConfigurationConflict",
            BuildError::Discovery(_) => "Discovery",
        }
    }
}
