//! Watch mode for continuous recompilation
//!
//! The [`WatchScheduler`] re-runs every watched configuration at its own
//! polling interval until a [`CancellationToken`] fires. Staleness is decided
//! from modification times on every tick, so no filesystem notification
//! backend is involved.

use crate::build::{BuildContext, BuildOrchestrator, BuildSession, ConfigurationResult, RunResult};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Name of the watch thread.
pub const WATCH_THREAD_NAME: &str = "lessbuild-watch";

/// Error during watch mode
#[derive(Debug, Error)]
pub enum WatchError {
    /// No configuration has watching enabled
    #[error("No configuration has watch enabled")]
    NothingToWatch,
    /// Failed to start the watch thread
    #[error("Failed to start watch thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Lifecycle of a scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Stopping,
    Stopped,
}

/// Shared stop flag with an interruptible sleep.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    fn flag(&self) -> MutexGuard<'_, bool> {
        self.inner.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Request a stop and wake any sleeper.
    pub fn cancel(&self) {
        *self.flag() = true;
        self.inner.1.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self.flag()
    }

    /// Sleep up to `timeout`. Returns true if cancelled before or during the sleep.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let guard = self.flag();
        let (guard, _) = self
            .inner
            .1
            .wait_timeout_while(guard, timeout, |cancelled| !*cancelled)
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard
    }
}

/// Tracks files with errors across ticks for recovery detection
#[derive(Debug, Default)]
pub struct ErrorTracker {
    /// Files with errors in the latest run of each configuration
    files_with_errors: HashMap<String, HashSet<PathBuf>>,
}

impl ErrorTracker {
    /// Create a new error tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Update tracker with a configuration result, returns list of fixed files
    pub fn update(&mut self, result: &ConfigurationResult) -> Vec<PathBuf> {
        let current: HashSet<PathBuf> = result.diagnostics.iter().map(|d| d.file.clone()).collect();
        let previous = self.files_with_errors.insert(result.name.clone(), current.clone());

        let mut fixed: Vec<PathBuf> = previous
            .map(|prev| prev.difference(&current).cloned().collect())
            .unwrap_or_default();
        fixed.sort();
        fixed
    }

    /// Check if there are any tracked errors
    pub fn has_errors(&self) -> bool {
        self.files_with_errors.values().any(|files| !files.is_empty())
    }

    /// Get the number of files with errors
    pub fn error_count(&self) -> usize {
        self.files_with_errors.values().map(HashSet::len).sum()
    }
}

/// Format duration for display
fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1000 {
        format!("{}ms", millis)
    } else {
        format!("{:.2}s", duration.as_secs_f64())
    }
}

/// Re-runs watched configurations at their polling interval.
#[derive(Debug)]
pub struct WatchScheduler {
    session: BuildSession,
    state: SchedulerState,
    next_due: Vec<Option<Instant>>,
    tracker: ErrorTracker,
    downgraded: Vec<String>,
    ticks: usize,
}

impl WatchScheduler {
    /// Create an idle scheduler over `session`.
    pub fn new(session: BuildSession) -> Self {
        let next_due = vec![None; session.len()];
        Self {
            session,
            state: SchedulerState::Idle,
            next_due,
            tracker: ErrorTracker::new(),
            downgraded: Vec::new(),
            ticks: 0,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn session(&self) -> &BuildSession {
        &self.session
    }

    /// Names of configurations whose `force` flag was cleared on start.
    pub fn downgraded(&self) -> &[String] {
        &self.downgraded
    }

    /// Number of ticks that ran at least one configuration.
    pub fn ticks(&self) -> usize {
        self.ticks
    }

    /// Whether any configuration is watched.
    pub fn has_watched(&self) -> bool {
        self.session.configurations().any(|c| c.watch)
    }

    /// Enter the running state, clearing `force` on watched configurations.
    pub fn start(&mut self) {
        if self.state != SchedulerState::Idle {
            return;
        }
        for entry in self.session.entries_mut() {
            if entry.config.watch && entry.config.force {
                entry.config = entry.config.without_force();
                tracing::info!(configuration = %entry.config.name, "Disabled the 'force' flag in watch mode.");
                self.downgraded.push(entry.config.name.clone());
            }
        }
        self.state = SchedulerState::Running;
    }

    /// Earliest instant at which a watched configuration is due.
    pub fn next_due(&self) -> Option<Instant> {
        self.session
            .configurations()
            .zip(&self.next_due)
            .filter(|(config, _)| config.watch)
            .map(|(_, due)| due.unwrap_or_else(Instant::now))
            .min()
    }

    /// Run every watched configuration due at `now`.
    pub fn tick(&mut self, ctx: &BuildContext<'_>, now: Instant) -> RunResult {
        self.start();

        let due: Vec<bool> = self
            .session
            .configurations()
            .zip(&self.next_due)
            .map(|(config, next)| config.watch && next.map_or(true, |at| at <= now))
            .collect();

        let orchestrator = BuildOrchestrator::new().with_watching(true);
        let result = self.session.run_matching(ctx, orchestrator, |i, _| due[i]);

        for (i, config) in self.session.configurations().enumerate() {
            if due[i] {
                self.next_due[i] = Some(now + config.watch_interval);
            }
        }
        if !result.configurations.is_empty() {
            self.ticks += 1;
        }
        for configuration in &result.configurations {
            self.report(configuration);
        }
        result
    }

    fn report(&mut self, result: &ConfigurationResult) {
        for fixed in self.tracker.update(result) {
            tracing::info!(configuration = %result.name, "Fixed: {}", fixed.display());
        }
        if result.is_success() {
            if result.compiled_count() > 0 {
                tracing::info!(
                    configuration = %result.name,
                    "Build complete ({}) - {} compiled",
                    format_duration(result.duration),
                    result.compiled_count()
                );
            }
        } else {
            let errors = result.diagnostics.len();
            tracing::warn!(
                configuration = %result.name,
                "Build failed ({}) - {} error{}",
                format_duration(result.duration),
                errors,
                if errors == 1 { "" } else { "s" }
            );
        }
    }

    /// Tick until `token` is cancelled.
    ///
    /// Cancellation is observed between ticks; a compile in progress always
    /// finishes.
    pub fn run(&mut self, ctx: &BuildContext<'_>, token: &CancellationToken) -> Result<(), WatchError> {
        if !self.has_watched() {
            return Err(WatchError::NothingToWatch);
        }
        self.start();
        tracing::info!("Watching for changes...");

        while !token.is_cancelled() {
            self.tick(ctx, Instant::now());
            let wait = self
                .next_due()
                .map(|due| due.saturating_duration_since(Instant::now()))
                .unwrap_or(Duration::ZERO);
            if token.wait_timeout(wait) {
                break;
            }
        }

        self.state = SchedulerState::Stopping;
        tracing::info!("Stopping watch mode");
        self.state = SchedulerState::Stopped;
        Ok(())
    }

    /// Run on a dedicated named thread with logging collaborators.
    ///
    /// The thread hands the scheduler back when it stops.
    pub fn spawn(
        mut self,
        token: CancellationToken,
    ) -> Result<JoinHandle<Result<WatchScheduler, WatchError>>, WatchError> {
        if !self.has_watched() {
            return Err(WatchError::NothingToWatch);
        }
        std::thread::Builder::new()
            .name(WATCH_THREAD_NAME.to_string())
            .spawn(move || {
                let ctx = BuildContext::logging();
                self.run(&ctx, &token)?;
                Ok(self)
            })
            .map_err(WatchError::Spawn)
    }

    /// Give back the session, e.g. to close its backends.
    pub fn into_session(self) -> BuildSession {
        self.session
    }
}
