//! Build result types.
//!
//! Contains types for representing the outcome of orchestration passes.

use crate::diagnostic::Diagnostic;
use std::path::PathBuf;
use std::time::Duration;

/// Status of a single source file in a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    /// Output was written
    Compiled,
    /// Output already up to date
    Skipped,
    /// Compilation failed with error
    Failed(String),
}

impl FileStatus {
    /// Check if the status indicates success.
    pub fn is_success(&self) -> bool {
        matches!(self, FileStatus::Compiled | FileStatus::Skipped)
    }

    /// Check if the status indicates failure.
    pub fn is_failure(&self) -> bool {
        matches!(self, FileStatus::Failed(_))
    }
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileStatus::Compiled => write!(f, "compiled"),
            FileStatus::Skipped => write!(f, "skipped"),
            FileStatus::Failed(err) => write!(f, "failed: {}", err),
        }
    }
}

/// Result of processing one source file.
#[derive(Debug, Clone)]
pub struct FileResult {
    /// Source file
    pub source: PathBuf,
    /// Output file
    pub output: PathBuf,
    /// Status
    pub status: FileStatus,
}

/// Result of running one configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfigurationResult {
    /// Configuration name
    pub name: String,
    /// Per-file results, in processing order
    pub files: Vec<FileResult>,
    /// Diagnostics reported during the run
    pub diagnostics: Vec<Diagnostic>,
    /// Configuration-level failure that stopped the run early
    pub aborted: Option<String>,
    /// Run duration
    pub duration: Duration,
}

impl ConfigurationResult {
    /// Create an empty result for `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }

    /// Record a file outcome.
    pub fn add_file(&mut self, result: FileResult) {
        self.files.push(result);
    }

    /// Outputs written in this run.
    pub fn written(&self) -> Vec<&PathBuf> {
        self.files
            .iter()
            .filter(|f| f.status == FileStatus::Compiled)
            .map(|f| &f.output)
            .collect()
    }

    /// Number of compiled files.
    pub fn compiled_count(&self) -> usize {
        self.files.iter().filter(|f| f.status == FileStatus::Compiled).count()
    }

    /// Number of up-to-date files.
    pub fn skipped_count(&self) -> usize {
        self.files.iter().filter(|f| f.status == FileStatus::Skipped).count()
    }

    /// Number of failed files.
    pub fn failed_count(&self) -> usize {
        self.files.iter().filter(|f| f.status.is_failure()).count()
    }

    /// True when nothing failed and no diagnostic was reported.
    pub fn is_success(&self) -> bool {
        self.diagnostics.is_empty() && self.aborted.is_none() && self.failed_count() == 0
    }
}

/// Result of a complete pass over every configuration.
#[derive(Debug, Default)]
pub struct RunResult {
    /// Results for each configuration, in configuration order
    pub configurations: Vec<ConfigurationResult>,
    /// Total duration
    pub total_duration: Duration,
}

impl RunResult {
    /// Create a new empty result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a configuration result.
    pub fn add_result(&mut self, result: ConfigurationResult) {
        self.configurations.push(result);
    }

    /// Set the total duration.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.total_duration = duration;
        self
    }

    /// Total compiled files.
    pub fn compiled_count(&self) -> usize {
        self.configurations.iter().map(ConfigurationResult::compiled_count).sum()
    }

    /// Total up-to-date files.
    pub fn skipped_count(&self) -> usize {
        self.configurations.iter().map(ConfigurationResult::skipped_count).sum()
    }

    /// Total failed files.
    pub fn failed_count(&self) -> usize {
        self.configurations.iter().map(ConfigurationResult::failed_count).sum()
    }

    /// Check if the overall pass succeeded.
    pub fn is_success(&self) -> bool {
        self.configurations.iter().all(ConfigurationResult::is_success)
    }

    /// All diagnostics, in configuration order.
    pub fn diagnostics(&self) -> Vec<&Diagnostic> {
        self.configurations.iter().flat_map(|c| c.diagnostics.iter()).collect()
    }

    /// All outputs written.
    pub fn all_outputs(&self) -> Vec<&PathBuf> {
        self.configurations.iter().flat_map(|c| c.written()).collect()
    }

    /// Format a summary of the pass.
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();

        let compiled = self.compiled_count();
        let skipped = self.skipped_count();
        let failed = self.failed_count();
        let total = compiled + skipped + failed;

        if self.is_success() {
            lines.push(format!(
                "Build succeeded: {} compiled, {} up to date ({} total) in {:?}",
                compiled, skipped, total, self.total_duration
            ));
        } else {
            lines.push(format!(
                "Build failed: {} compiled, {} up to date, {} failed ({} total)",
                compiled, skipped, failed, total
            ));
            for config in &self.configurations {
                if let Some(reason) = &config.aborted {
                    lines.push(format!("  - [{}] {}", config.name, reason));
                }
            }
            let diagnostics = self.diagnostics();
            for diagnostic in diagnostics.iter().take(5) {
                lines.push(format!("  - {}", diagnostic));
            }
            if diagnostics.len() > 5 {
                lines.push(format!("  ... and {} more", diagnostics.len() - 5));
            }
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, status: FileStatus) -> FileResult {
        FileResult {
            source: PathBuf::from(format!("{}.less", name)),
            output: PathBuf::from(format!("{}.css", name)),
            status,
        }
    }

    #[test]
    fn test_file_status() {
        assert!(FileStatus::Compiled.is_success());
        assert!(FileStatus::Skipped.is_success());
        assert!(FileStatus::Failed("x".into()).is_failure());
        assert_eq!(FileStatus::Failed("boom".into()).to_string(), "failed: boom");
    }

    #[test]
    fn test_configuration_result_counts() {
        let mut result = ConfigurationResult::new("site");
        result.add_file(file("a", FileStatus::Compiled));
        result.add_file(file("b", FileStatus::Skipped));
        result.add_file(file("c", FileStatus::Failed("bad".into())));

        assert_eq!(result.compiled_count(), 1);
        assert_eq!(result.skipped_count(), 1);
        assert_eq!(result.failed_count(), 1);
        assert_eq!(result.written(), vec![&PathBuf::from("a.css")]);
        assert!(!result.is_success());
    }

    #[test]
    fn test_run_result_summary_success() {
        let mut site = ConfigurationResult::new("site");
        site.add_file(file("a", FileStatus::Compiled));
        let mut run = RunResult::new();
        run.add_result(site);

        assert!(run.is_success());
        assert!(run.summary().starts_with("Build succeeded: 1 compiled, 0 up to date (1 total)"));
    }

    #[test]
    fn test_run_result_summary_failure() {
        let mut site = ConfigurationResult::new("site");
        site.add_file(file("a", FileStatus::Failed("bad".into())));
        site.diagnostics.push(Diagnostic::error("a.less", "bad"));
        let mut admin = ConfigurationResult::new("admin");
        admin.aborted = Some("cannot write merge file".into());
        let mut run = RunResult::new();
        run.add_result(site);
        run.add_result(admin);

        let summary = run.summary();
        assert!(summary.starts_with("Build failed: 0 compiled, 0 up to date, 1 failed (1 total)"));
        assert!(summary.contains("[admin] cannot write merge file"));
        assert!(summary.contains("ERROR in a.less: bad"));
    }
}
