//! Diagnostics and the host-facing collaborator traits.
//!
//! The orchestrator never returns per-file errors directly. It reports them to a
//! [`DiagnosticSink`] so that every file of a pass is attempted before the
//! caller decides whether the run failed. Written outputs are announced to an
//! [`OutputNotifier`].

use crate::error::BuildError;
use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, OnceLock};

/// Diagnostic severity. The engine only emits errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

/// A problem attributed to one source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// Source file the problem belongs to
    pub file: PathBuf,
    /// Line number (1-indexed, 0 if unknown)
    pub line: usize,
    /// Column number (1-indexed, 0 if unknown)
    pub column: usize,
    /// Severity
    pub severity: Severity,
    /// Human readable message
    pub message: String,
    /// Error kind that produced this diagnostic
    pub cause: Option<String>,
}

impl Diagnostic {
    /// Create an error diagnostic without location information.
    pub fn error(file: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line: 0,
            column: 0,
            severity: Severity::Error,
            message: message.into(),
            cause: None,
        }
    }

    /// Set the location.
    pub fn with_location(mut self, line: usize, column: usize) -> Self {
        self.line = line;
        self.column = column;
        self
    }

    /// Set the cause label.
    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    /// Build a diagnostic for `file` from a [`BuildError`].
    ///
    /// Compile failures keep the backend's raw message, and a `line N` /
    /// `column M` mention inside it becomes the diagnostic location.
    pub fn from_error(file: impl Into<PathBuf>, error: &BuildError) -> Self {
        let message = match error {
            BuildError::CompileFailure { message, .. } if !message.trim().is_empty() => {
                message.trim().to_string()
            }
            BuildError::CompileFailure { .. } => "Error compiling source".to_string(),
            other => other.to_string(),
        };
        let (line, column) = extract_location(&message);
        Diagnostic::error(file, message).with_location(line, column).with_cause(error.kind())
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} in {}", self.severity, self.file.display())?;
        if self.line > 0 {
            write!(f, ":{}", self.line)?;
            if self.column > 0 {
                write!(f, ":{}", self.column)?;
            }
        }
        write!(f, ": {}", self.message)
    }
}

fn location_patterns() -> &'static (Regex, Regex) {
    static PATTERNS: OnceLock<(Regex, Regex)> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        (
            Regex::new(r"(?i)\bline\s*:?\s*(\d+)").expect("valid line regex"),
            Regex::new(r"(?i)\bcol(?:umn)?\s*:?\s*(\d+)").expect("valid column regex"),
        )
    })
}

/// Pull `line N` and `column M` out of a compiler message; 0 when absent.
fn extract_location(message: &str) -> (usize, usize) {
    let (line_re, column_re) = location_patterns();
    let grab = |re: &Regex| {
        re.captures(message)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0)
    };
    (grab(line_re), grab(column_re))
}

/// Receives diagnostics from the orchestrator.
///
/// Implementations must tolerate concurrent calls; configurations may be
/// processed in parallel against one sink.
pub trait DiagnosticSink: Send + Sync {
    /// Record a diagnostic.
    fn report(&self, diagnostic: Diagnostic);

    /// Forget every diagnostic previously reported for `file`.
    fn clear(&self, file: &Path);
}

/// Receives the path of every output file the engine actually wrote.
pub trait OutputNotifier: Send + Sync {
    /// Called once per written output.
    fn notify_written(&self, output: &Path);
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// In-memory sink that keeps the current diagnostics per file.
#[derive(Debug, Default)]
pub struct CollectingSink {
    entries: Mutex<Vec<Diagnostic>>,
}

impl CollectingSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all current diagnostics, in report order.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        lock(&self.entries).clone()
    }

    /// Diagnostics currently held for one file.
    pub fn for_file(&self, file: &Path) -> Vec<Diagnostic> {
        lock(&self.entries).iter().filter(|d| d.file == file).cloned().collect()
    }

    /// Number of held diagnostics.
    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    /// Whether no diagnostics are held.
    pub fn is_empty(&self) -> bool {
        lock(&self.entries).is_empty()
    }
}

impl DiagnosticSink for CollectingSink {
    fn report(&self, diagnostic: Diagnostic) {
        lock(&self.entries).push(diagnostic);
    }

    fn clear(&self, file: &Path) {
        lock(&self.entries).retain(|d| d.file != file);
    }
}

/// Sink that only logs diagnostics.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingSink;

impl DiagnosticSink for LoggingSink {
    fn report(&self, diagnostic: Diagnostic) {
        tracing::error!(file = %diagnostic.file.display(), "{}", diagnostic);
    }

    fn clear(&self, _file: &Path) {}
}

/// Notifier that logs written outputs at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingNotifier;

impl OutputNotifier for LoggingNotifier {
    fn notify_written(&self, output: &Path) {
        tracing::debug!(output = %output.display(), "output written");
    }
}

/// Notifier that remembers every written output.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    written: Mutex<Vec<PathBuf>>,
}

impl RecordingNotifier {
    /// Create an empty notifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// All outputs written so far, in notification order.
    pub fn written(&self) -> Vec<PathBuf> {
        lock(&self.written).clone()
    }

    /// Number of notifications received.
    pub fn count(&self) -> usize {
        lock(&self.written).len()
    }

    /// Drop the recorded notifications.
    pub fn reset(&self) {
        lock(&self.written).clear();
    }
}

impl OutputNotifier for RecordingNotifier {
    fn notify_written(&self, output: &Path) {
        lock(&self.written).push(output.to_path_buf());
    }
}
