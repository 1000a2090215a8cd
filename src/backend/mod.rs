//! Compiler backends.
//!
//! A [`CompilerBackend`] turns one [`SourceTree`] into one output file. Two
//! backends exist:
//!
//! - [`EmbeddedEngine`] runs a transformation function in-process
//! - [`ExternalProcessEngine`] delegates to an external executable through a
//!   private temporary workspace
//!
//! Both apply the same staleness and force rules through [`needs_compile`].
//! The backend for a configuration is chosen once by [`for_configuration`].

pub mod embedded;
pub mod encoding;
pub mod external;
pub mod transform;

pub use embedded::EmbeddedEngine;
pub use encoding::{OutputEncoding, DEFAULT_ENCODING};
pub use external::ExternalProcessEngine;

use crate::config::BuildConfiguration;
use crate::error::{BuildError, BuildResult};
use crate::source::{output_is_stale, SourceTree};
use std::fs;
use std::path::Path;

/// Per-compile options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompileOptions {
    pub encoding: OutputEncoding,
    pub compress: bool,
    pub force: bool,
}

/// What a compile call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileOutcome {
    /// The output file was (re)written
    Written,
    /// The output was newer than every source; nothing was written
    UpToDate,
}

impl CompileOutcome {
    /// Whether an output file was written.
    pub fn is_written(&self) -> bool {
        matches!(self, CompileOutcome::Written)
    }
}

/// Compiles a source tree to an output file.
pub trait CompilerBackend: Send + Sync {
    /// Compile `source` into `output` if it is stale or `options.force` is set.
    fn compile(
        &self,
        source: &SourceTree,
        output: &Path,
        options: &CompileOptions,
    ) -> BuildResult<CompileOutcome>;

    /// Short backend name for logging.
    fn name(&self) -> &'static str;

    /// Release resources held by the backend.
    fn close(self: Box<Self>) -> BuildResult<()> {
        Ok(())
    }
}

/// Shared staleness rule for every backend.
pub fn needs_compile(source: &SourceTree, output: &Path, options: &CompileOptions) -> bool {
    output_is_stale(output, source.last_modified_including_imports(), options.force)
}

/// Encode `css` and write it to `output`.
pub(crate) fn write_output(output: &Path, css: &str, encoding: OutputEncoding) -> BuildResult<()> {
    let bytes = encoding.encode(css).map_err(|e| BuildError::IoFailure {
        path: output.to_path_buf(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
    })?;
    fs::write(output, bytes).map_err(|e| BuildError::io(output, e))
}

/// Construct the backend a configuration asks for.
///
/// A custom engine script and an external executable cannot be combined.
pub fn for_configuration(config: &BuildConfiguration) -> BuildResult<Box<dyn CompilerBackend>> {
    match (&config.custom_engine_script, &config.external_executable) {
        (Some(script), Some(executable)) => Err(BuildError::ConfigurationConflict(format!(
            "configuration '{}' sets both custom_engine_script ({}) and external_executable ({})",
            config.name,
            script.display(),
            executable.display()
        ))),
        (None, Some(executable)) => Ok(Box::new(ExternalProcessEngine::new(executable)?)),
        (Some(script), None) => Ok(Box::new(EmbeddedEngine::with_custom_script(script)?)),
        (None, None) => Ok(Box::new(EmbeddedEngine::new())),
    }
}
