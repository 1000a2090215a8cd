//! In-process compiler backend.

use super::{needs_compile, transform, write_output, CompileOptions, CompileOutcome, CompilerBackend};
use crate::error::{BuildError, BuildResult};
use crate::source::SourceTree;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Pure transformation function: `(text, compress) -> css | message`.
pub type TransformFn = dyn Fn(&str, bool) -> Result<String, String> + Send + Sync;

/// Compiles with a transformation function running in this process.
///
/// The source tree's normalized content (imports inlined) is handed to the
/// transform. An optional custom engine script is prepended to every
/// compilation, which lets a project provide shared definitions.
#[derive(Clone)]
pub struct EmbeddedEngine {
    transform: Arc<TransformFn>,
    prelude: Option<String>,
}

impl fmt::Debug for EmbeddedEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddedEngine").field("prelude", &self.prelude.is_some()).finish()
    }
}

impl Default for EmbeddedEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl EmbeddedEngine {
    /// Engine using the built-in transform.
    pub fn new() -> Self {
        Self::with_transform(transform::transform)
    }

    /// Engine using a caller-supplied transform.
    pub fn with_transform<F>(transform: F) -> Self
    where
        F: Fn(&str, bool) -> Result<String, String> + Send + Sync + 'static,
    {
        Self { transform: Arc::new(transform), prelude: None }
    }

    /// Engine using the built-in transform with `script` prepended to every source.
    pub fn with_custom_script(script: &Path) -> BuildResult<Self> {
        let prelude = fs::read_to_string(script).map_err(|e| BuildError::io(script, e))?;
        tracing::debug!(script = %script.display(), "Loaded custom engine script");
        Ok(Self { prelude: Some(prelude), ..Self::new() })
    }
}

impl CompilerBackend for EmbeddedEngine {
    fn compile(
        &self,
        source: &SourceTree,
        output: &Path,
        options: &CompileOptions,
    ) -> BuildResult<CompileOutcome> {
        if !needs_compile(source, output, options) {
            return Ok(CompileOutcome::UpToDate);
        }

        let mut text = self.prelude.clone().unwrap_or_default();
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(&source.normalized_content());

        let css = (self.transform)(&text, options.compress).map_err(|message| {
            BuildError::CompileFailure { path: source.root().path().to_path_buf(), message }
        })?;
        write_output(output, &css, options.encoding)?;
        Ok(CompileOutcome::Written)
    }

    fn name(&self) -> &'static str {
        "embedded"
    }
}
