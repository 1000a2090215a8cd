//! Build orchestration for one configuration.
//!
//! A pass resolves the configuration's sources, merges them when
//! concatenation is configured, then compiles each candidate in list order.
//! Per-file failures are reported to the diagnostic sink and never stop the
//! remaining files.

use crate::backend::{needs_compile, CompileOutcome, CompilerBackend};
use crate::build::concat::{concatenate, ConcatOutcome};
use crate::build::{BuildContext, ConfigurationResult, FileResult, FileStatus};
use crate::config::BuildConfiguration;
use crate::diagnostic::Diagnostic;
use crate::error::{BuildError, BuildResult};
use crate::source::SourceTree;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Runs configurations against a backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildOrchestrator {
    /// Whether the pass belongs to a watch loop
    watching: bool,
}

impl BuildOrchestrator {
    /// Create an orchestrator for a single pass.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark passes as part of a watch loop, which quiets up-to-date messages.
    pub fn with_watching(mut self, watching: bool) -> Self {
        self.watching = watching;
        self
    }

    /// Run one pass of `config`.
    ///
    /// Returns every diagnostic reported during the pass. The caller decides
    /// whether they are fatal.
    pub fn run(
        &self,
        config: &BuildConfiguration,
        backend: &dyn CompilerBackend,
        ctx: &BuildContext<'_>,
    ) -> ConfigurationResult {
        let start = Instant::now();
        let mut result = ConfigurationResult::new(&config.name);
        log_parameters(config, backend);

        let files = match ctx.scanner().scan(
            &config.source_directory,
            &config.includes,
            &config.excludes,
        ) {
            Ok(files) => files,
            Err(e) => {
                abort(&mut result, ctx, &config.source_directory, &BuildError::from(e));
                result.duration = start.elapsed();
                return result;
            }
        };

        if files.is_empty() {
            tracing::info!(configuration = %config.name, "Nothing to compile - no LESS sources found");
            result.duration = start.elapsed();
            return result;
        }

        let candidates = match config.concatenation_target() {
            Some(target) => match merge(config, &files, &target) {
                Ok(relative) => vec![relative],
                Err(e) => {
                    abort(&mut result, ctx, &target, &e);
                    result.duration = start.elapsed();
                    return result;
                }
            },
            None => files,
        };

        for relative in candidates {
            let source = config.source_directory.join(&relative);
            let output = config.output_path(&relative);
            ctx.sink().clear(&source);

            let status = match self.compile_file(config, backend, &source, &output) {
                Ok(CompileOutcome::Written) => {
                    ctx.notifier().notify_written(&output);
                    FileStatus::Compiled
                }
                Ok(CompileOutcome::UpToDate) => FileStatus::Skipped,
                Err(e) => {
                    let diagnostic = Diagnostic::from_error(&source, &e);
                    ctx.sink().report(diagnostic.clone());
                    result.diagnostics.push(diagnostic);
                    FileStatus::Failed(e.to_string())
                }
            };
            result.add_file(FileResult { source, output, status });
        }

        result.duration = start.elapsed();
        tracing::debug!(
            configuration = %config.name,
            compiled = result.compiled_count(),
            skipped = result.skipped_count(),
            failed = result.failed_count(),
            "Configuration finished in {} ms",
            result.duration.as_millis()
        );
        result
    }

    fn compile_file(
        &self,
        config: &BuildConfiguration,
        backend: &dyn CompilerBackend,
        source: &Path,
        output: &Path,
    ) -> BuildResult<CompileOutcome> {
        let tree = SourceTree::load(source, &config.resolver())?;

        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent).map_err(|e| BuildError::DirectoryCreateFailure {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let options = config.compile_options();
        if needs_compile(&tree, output, &options) {
            tracing::info!("Compiling LESS source: {}", source.display());
        }
        let outcome = backend.compile(&tree, output, &options)?;
        if outcome == CompileOutcome::UpToDate && !self.watching {
            tracing::info!("Bypassing LESS source: {} (not modified)", source.display());
        }
        Ok(outcome)
    }
}

/// Concatenate the matched files into the merge file.
///
/// Returns the merge file relative to the source directory.
fn merge(config: &BuildConfiguration, files: &[PathBuf], target: &Path) -> BuildResult<PathBuf> {
    let sources: Vec<PathBuf> = files
        .iter()
        .map(|relative| config.source_directory.join(relative))
        .filter(|path| {
            let is_target = path == target;
            if is_target {
                tracing::warn!(
                    path = %path.display(),
                    "Merge file matches the include patterns; leaving it out of the concatenation"
                );
            }
            !is_target
        })
        .collect();

    if concatenate(&sources, target)? == ConcatOutcome::Written {
        tracing::info!("Concatenated {} sources into {}", sources.len(), target.display());
    }

    Ok(target
        .strip_prefix(&config.source_directory)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| target.file_name().map(PathBuf::from).unwrap_or_default()))
}

fn abort(result: &mut ConfigurationResult, ctx: &BuildContext<'_>, file: &Path, error: &BuildError) {
    ctx.sink().clear(file);
    let diagnostic = Diagnostic::from_error(file, error);
    ctx.sink().report(diagnostic.clone());
    result.diagnostics.push(diagnostic);
    result.aborted = Some(error.to_string());
}

fn log_parameters(config: &BuildConfiguration, backend: &dyn CompilerBackend) {
    tracing::debug!(
        configuration = %config.name,
        source_directory = %config.source_directory.display(),
        output_directory = %config.output_directory.display(),
        includes = ?config.includes,
        excludes = ?config.excludes,
        compress = config.compress,
        force = config.force,
        encoding = %config.encoding,
        backend = backend.name(),
        "Configuration parameters"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::EmbeddedEngine;
    use crate::build::{DiscoveryError, Scanner};
    use crate::diagnostic::{CollectingSink, RecordingNotifier};
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct FixedScanner(Vec<PathBuf>);

    impl Scanner for FixedScanner {
        fn scan(&self, _: &Path, _: &[String], _: &[String]) -> Result<Vec<PathBuf>, DiscoveryError> {
            Ok(self.0.clone())
        }
    }

    #[derive(Default)]
    struct CountingScanner {
        calls: Mutex<usize>,
    }

    impl Scanner for CountingScanner {
        fn scan(&self, root: &Path, i: &[String], e: &[String]) -> Result<Vec<PathBuf>, DiscoveryError> {
            *self.calls.lock().unwrap() += 1;
            crate::build::GlobScanner.scan(root, i, e)
        }
    }

    fn setup() -> (TempDir, BuildConfiguration) {
        let temp = TempDir::new().unwrap();
        let config = BuildConfiguration::new("test", temp.path().join("less"), temp.path().join("css"));
        fs::create_dir_all(&config.source_directory).unwrap();
        (temp, config)
    }

    fn write(config: &BuildConfiguration, name: &str, content: &str) {
        let path = config.source_directory.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_compiles_every_file_and_mirrors_tree() {
        let (_temp, config) = setup();
        write(&config, "main.less", "a { color: red; }");
        write(&config, "widgets/button.less", "b { color: blue; }");
        let sink = CollectingSink::new();
        let notifier = RecordingNotifier::new();
        let ctx = BuildContext::logging().with_sink(&sink).with_notifier(&notifier);

        let result = BuildOrchestrator::new().run(&config, &EmbeddedEngine::new(), &ctx);
        assert!(result.is_success());
        assert_eq!(result.compiled_count(), 2);
        assert!(config.output_directory.join("main.css").exists());
        assert!(config.output_directory.join("widgets/button.css").exists());
        assert_eq!(notifier.count(), 2);
    }

    #[test]
    fn test_failure_does_not_block_siblings() {
        let (_temp, config) = setup();
        write(&config, "a.less", "a { color: @undefined; }");
        write(&config, "b.less", "b { color: blue; }");
        let sink = CollectingSink::new();
        let ctx = BuildContext::logging().with_sink(&sink);

        let result = BuildOrchestrator::new().run(&config, &EmbeddedEngine::new(), &ctx);
        assert_eq!(result.failed_count(), 1);
        assert_eq!(result.compiled_count(), 1);
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.diagnostics()[0].file, config.source_directory.join("a.less"));
        assert_eq!(sink.diagnostics()[0].line, 1);
        assert!(config.output_directory.join("b.css").exists());
    }

    #[test]
    fn test_diagnostics_are_cleared_when_fixed() {
        let (_temp, config) = setup();
        write(&config, "a.less", "a {");
        let sink = CollectingSink::new();
        let ctx = BuildContext::logging().with_sink(&sink);
        let orchestrator = BuildOrchestrator::new();

        orchestrator.run(&config, &EmbeddedEngine::new(), &ctx);
        assert_eq!(sink.len(), 1);

        write(&config, "a.less", "a { }");
        let result = orchestrator.run(&config, &EmbeddedEngine::new(), &ctx);
        assert!(result.is_success());
        assert!(sink.is_empty());
    }

    #[test]
    fn test_blocked_output_directory_fails_only_that_file() {
        let (_temp, config) = setup();
        write(&config, "a.less", "a { }");
        write(&config, "sub/a.less", "b { }");
        fs::create_dir_all(&config.output_directory).unwrap();
        fs::write(config.output_directory.join("sub"), "not a directory").unwrap();
        let sink = CollectingSink::new();
        let ctx = BuildContext::logging().with_sink(&sink);

        let result = BuildOrchestrator::new().run(&config, &EmbeddedEngine::new(), &ctx);
        assert_eq!(result.failed_count(), 1);
        assert_eq!(result.compiled_count(), 1);
        assert_eq!(result.diagnostics[0].cause.as_deref(), Some("DirectoryCreateFailure"));
        assert_eq!(sink.diagnostics()[0].file, config.source_directory.join("sub/a.less"));
        assert!(config.output_directory.join("a.css").exists());
    }

    #[test]
    fn test_missing_import_is_reported_for_importing_file() {
        let (_temp, config) = setup();
        write(&config, "main.less", "@import \"nowhere\";");
        let sink = CollectingSink::new();
        let ctx = BuildContext::logging().with_sink(&sink);

        let result = BuildOrchestrator::new().run(&config, &EmbeddedEngine::new(), &ctx);
        assert_eq!(result.failed_count(), 1);
        assert_eq!(result.diagnostics[0].cause.as_deref(), Some("NotFound"));
    }

    #[test]
    fn test_empty_source_set_is_skipped() {
        let (_temp, config) = setup();
        let notifier = RecordingNotifier::new();
        let ctx = BuildContext::logging().with_notifier(&notifier);

        let result = BuildOrchestrator::new().run(&config, &EmbeddedEngine::new(), &ctx);
        assert!(result.is_success());
        assert!(result.files.is_empty());
        assert!(!config.output_directory.exists());
    }

    #[test]
    fn test_scanner_called_once_per_pass() {
        let (_temp, config) = setup();
        write(&config, "main.less", "a {}");
        let scanner = CountingScanner::default();
        let ctx = BuildContext::logging().with_scanner(&scanner);

        BuildOrchestrator::new().run(&config, &EmbeddedEngine::new(), &ctx);
        assert_eq!(*scanner.calls.lock().unwrap(), 1);
    }

    #[test]
    fn test_concatenation_compiles_merge_file_only() {
        let (_temp, config) = setup();
        let config = config.with_concatenate_to(PathBuf::from("all.less"));
        write(&config, "a.less", ".a { color: red; }\n");
        write(&config, "b.less", ".b { color: blue; }\n");
        let scanner = FixedScanner(vec![PathBuf::from("a.less"), PathBuf::from("b.less")]);
        let ctx = BuildContext::logging().with_scanner(&scanner);

        let result = BuildOrchestrator::new().run(&config, &EmbeddedEngine::new(), &ctx);
        assert!(result.is_success());
        assert_eq!(result.files.len(), 1);
        assert_eq!(
            fs::read_to_string(config.source_directory.join("all.less")).unwrap(),
            ".a { color: red; }\n.b { color: blue; }\n"
        );
        assert_eq!(
            fs::read_to_string(config.output_directory.join("all.css")).unwrap(),
            ".a { color: red; }\n.b { color: blue; }\n"
        );
        assert!(!config.output_directory.join("a.css").exists());
    }

    #[test]
    fn test_concatenation_failure_aborts_configuration() {
        let (_temp, config) = setup();
        let config = config.with_concatenate_to(PathBuf::from("all.less"));
        let scanner = FixedScanner(vec![PathBuf::from("missing.less")]);
        let sink = CollectingSink::new();
        let ctx = BuildContext::logging().with_scanner(&scanner).with_sink(&sink);

        let result = BuildOrchestrator::new().run(&config, &EmbeddedEngine::new(), &ctx);
        assert!(result.aborted.is_some());
        assert!(result.files.is_empty());
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_invalid_pattern_aborts_configuration() {
        let (_temp, config) = setup();
        let config = config.with_includes(vec!["[".to_string()]);
        let sink = CollectingSink::new();
        let ctx = BuildContext::logging().with_sink(&sink);

        let result = BuildOrchestrator::new().run(&config, &EmbeddedEngine::new(), &ctx);
        assert!(result.aborted.is_some());
        assert_eq!(result.diagnostics[0].cause.as_deref(), Some("Discovery"));
    }
}
