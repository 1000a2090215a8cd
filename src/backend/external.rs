//! Out-of-process compiler backend.
//!
//! The engine owns a private temporary workspace holding the runtime script
//! the external executable runs. Each compile stages the normalized source in
//! a temporary input file inside that workspace, spawns
//!
//! ```text
//! <executable> <script> <input> <output> <true|false>
//! ```
//!
//! and reads the temporary output file back. Both temporaries are removed
//! whether or not the process succeeded. The workspace itself is removed by
//! [`CompilerBackend::close`], or on drop.

use super::{needs_compile, write_output, CompileOptions, CompileOutcome, CompilerBackend};
use crate::error::{BuildError, BuildResult};
use crate::source::SourceTree;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;
use tempfile::{NamedTempFile, TempDir};

/// Name of the bundled runtime script inside the workspace.
pub const RUNTIME_SCRIPT: &str = "lessc.js";

const BUNDLED_RUNTIME: &str = include_str!("runtime/lessc.js");

/// Delegates compilation to an external executable.
#[derive(Debug)]
pub struct ExternalProcessEngine {
    executable: PathBuf,
    script: PathBuf,
    workspace: TempDir,
}

impl ExternalProcessEngine {
    /// Create an engine running the bundled runtime script with `executable`.
    pub fn new(executable: impl AsRef<Path>) -> BuildResult<Self> {
        Self::with_runtime_script(executable, RUNTIME_SCRIPT, BUNDLED_RUNTIME)
    }

    /// Create an engine staging `contents` as the runtime script `name`.
    pub fn with_runtime_script(
        executable: impl AsRef<Path>,
        name: &str,
        contents: &str,
    ) -> BuildResult<Self> {
        let workspace = tempfile::Builder::new()
            .prefix("lessc-")
            .tempdir()
            .map_err(|e| BuildError::io(std::env::temp_dir(), e))?;
        let script = workspace.path().join(name);
        fs::write(&script, contents).map_err(|e| BuildError::io(&script, e))?;
        tracing::debug!(workspace = %workspace.path().display(), "Staged external compiler runtime");

        Ok(Self { executable: executable.as_ref().to_path_buf(), script, workspace })
    }

    /// Directory holding the runtime script and per-compile temporaries.
    pub fn workspace(&self) -> &Path {
        self.workspace.path()
    }

    /// Path of the staged runtime script.
    pub fn script(&self) -> &Path {
        &self.script
    }

    fn temp_file(&self, prefix: &str, suffix: &str) -> BuildResult<NamedTempFile> {
        tempfile::Builder::new()
            .prefix(prefix)
            .suffix(suffix)
            .tempfile_in(self.workspace.path())
            .map_err(|e| BuildError::io(self.workspace.path(), e))
    }

    /// Run the executable on `text`, returning the produced CSS.
    fn run(&self, root: &Path, text: &str, compress: bool) -> BuildResult<String> {
        let start = Instant::now();

        let mut input = self.temp_file("lessc-input-", ".less")?;
        input.write_all(text.as_bytes()).map_err(|e| BuildError::io(input.path(), e))?;
        input.flush().map_err(|e| BuildError::io(input.path(), e))?;
        let output = self.temp_file("lessc-output-", ".css")?;

        let result = Command::new(&self.executable)
            .arg(&self.script)
            .arg(input.path())
            .arg(output.path())
            .arg(compress.to_string())
            .output()
            .map_err(|source| BuildError::IoFailure { path: self.executable.clone(), source })
            .and_then(|out| {
                let mut captured = String::from_utf8_lossy(&out.stdout).into_owned();
                captured.push_str(&String::from_utf8_lossy(&out.stderr));
                if !captured.trim().is_empty() {
                    tracing::info!("{}", captured.trim_end());
                }
                if !out.status.success() {
                    let message = if captured.trim().is_empty() {
                        fs::read_to_string(output.path())
                            .ok()
                            .filter(|produced| !produced.trim().is_empty())
                            .unwrap_or_else(|| {
                                format!("{} exited with {}", self.executable.display(), out.status)
                            })
                    } else {
                        captured
                    };
                    return Err(BuildError::CompileFailure { path: root.to_path_buf(), message });
                }
                fs::read_to_string(output.path()).map_err(|e| BuildError::io(output.path(), e))
            });

        remove_temp(input);
        remove_temp(output);

        let produced = result?;
        tracing::debug!(
            "Finished compilation of LESS source in {} ms",
            start.elapsed().as_millis()
        );
        Ok(produced)
    }
}

fn remove_temp(file: NamedTempFile) {
    let path = file.path().to_path_buf();
    if let Err(e) = file.close() {
        tracing::warn!(path = %path.display(), error = %e, "Could not delete temp file");
    }
}

impl CompilerBackend for ExternalProcessEngine {
    fn compile(
        &self,
        source: &SourceTree,
        output: &Path,
        options: &CompileOptions,
    ) -> BuildResult<CompileOutcome> {
        if !needs_compile(source, output, options) {
            return Ok(CompileOutcome::UpToDate);
        }
        let css = self.run(source.root().path(), &source.normalized_content(), options.compress)?;
        write_output(output, &css, options.encoding)?;
        Ok(CompileOutcome::Written)
    }

    fn name(&self) -> &'static str {
        "external"
    }

    fn close(self: Box<Self>) -> BuildResult<()> {
        let path = self.workspace.path().to_path_buf();
        self.workspace.close().map_err(|e| BuildError::io(path, e))
    }
}
