//! Collaborators handed to the orchestrator for a run.

use crate::build::discovery::{GlobScanner, Scanner};
use crate::diagnostic::{DiagnosticSink, LoggingNotifier, LoggingSink, OutputNotifier};

/// Build context carrying the host collaborators for one run.
///
/// Nothing is global: every orchestration pass receives the scanner that
/// enumerates sources, the sink that collects diagnostics and the notifier
/// that hears about written outputs.
#[derive(Clone, Copy)]
pub struct BuildContext<'a> {
    scanner: &'a dyn Scanner,
    sink: &'a dyn DiagnosticSink,
    notifier: &'a dyn OutputNotifier,
}

static GLOB_SCANNER: GlobScanner = GlobScanner;
static LOGGING_NOTIFIER: LoggingNotifier = LoggingNotifier;
static LOGGING_SINK: LoggingSink = LoggingSink;

impl<'a> BuildContext<'a> {
    /// Create a context from explicit collaborators.
    pub fn new(
        scanner: &'a dyn Scanner,
        sink: &'a dyn DiagnosticSink,
        notifier: &'a dyn OutputNotifier,
    ) -> Self {
        Self { scanner, sink, notifier }
    }

    /// Context with glob scanning and logging for both sink and notifier.
    pub fn logging() -> Self {
        Self::new(&GLOB_SCANNER, &LOGGING_SINK, &LOGGING_NOTIFIER)
    }

    /// Replace the scanner.
    pub fn with_scanner(mut self, scanner: &'a dyn Scanner) -> Self {
        self.scanner = scanner;
        self
    }

    /// Replace the diagnostic sink.
    pub fn with_sink(mut self, sink: &'a dyn DiagnosticSink) -> Self {
        self.sink = sink;
        self
    }

    /// Replace the output notifier.
    pub fn with_notifier(mut self, notifier: &'a dyn OutputNotifier) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn scanner(&self) -> &'a dyn Scanner {
        self.scanner
    }

    pub fn sink(&self) -> &'a dyn DiagnosticSink {
        self.sink
    }

    pub fn notifier(&self) -> &'a dyn OutputNotifier {
        self.notifier
    }
}

impl std::fmt::Debug for BuildContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildContext").finish_non_exhaustive()
    }
}
