//! A set of configurations with their constructed backends.
//!
//! Backends are built for every configuration before anything compiles, so a
//! conflicting configuration aborts the whole run up front.

use crate::backend::{self, CompilerBackend};
use crate::build::{BuildContext, BuildOrchestrator, ConfigurationResult, RunResult};
use crate::config::BuildConfiguration;
use crate::error::BuildResult;
use rayon::prelude::*;
use std::time::Instant;

pub(crate) struct SessionEntry {
    pub(crate) config: BuildConfiguration,
    pub(crate) backend: Box<dyn CompilerBackend>,
}

/// Configurations ready to run, each with its own backend.
pub struct BuildSession {
    entries: Vec<SessionEntry>,
    jobs: usize,
    pool: Option<rayon::ThreadPool>,
}

impl std::fmt::Debug for BuildSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildSession")
            .field("configurations", &self.entries.iter().map(|e| &e.config.name).collect::<Vec<_>>())
            .field("jobs", &self.jobs)
            .field("worker_threads", &self.worker_threads())
            .finish()
    }
}

impl BuildSession {
    /// Construct a backend for every configuration.
    ///
    /// Fails with the first construction error, releasing any backend
    /// already built.
    pub fn prepare(configs: Vec<BuildConfiguration>) -> BuildResult<Self> {
        let mut entries: Vec<SessionEntry> = Vec::with_capacity(configs.len());
        for config in configs {
            match backend::for_configuration(&config) {
                Ok(backend) => {
                    tracing::debug!(configuration = %config.name, backend = backend.name(), "Backend ready");
                    entries.push(SessionEntry { config, backend });
                }
                Err(e) => {
                    let _ = close_all(entries);
                    return Err(e);
                }
            }
        }
        Ok(Self { entries, jobs: 1, pool: None })
    }

    /// Build a session from configurations and already constructed backends.
    pub fn from_parts(parts: Vec<(BuildConfiguration, Box<dyn CompilerBackend>)>) -> Self {
        let entries =
            parts.into_iter().map(|(config, backend)| SessionEntry { config, backend }).collect();
        Self { entries, jobs: 1, pool: None }
    }

    /// Number of configurations processed in parallel.
    ///
    /// The worker pool is started here and reused by every later run. If it
    /// cannot be started, runs fall back to sequential processing.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self.pool = None;
        if self.jobs > 1 {
            match rayon::ThreadPoolBuilder::new()
                .num_threads(self.jobs)
                .thread_name(|i| format!("lessbuild-worker-{}", i))
                .build()
            {
                Ok(pool) => self.pool = Some(pool),
                Err(e) => {
                    tracing::warn!(error = %e, "Could not start worker pool; running sequentially")
                }
            }
        }
        self
    }

    pub fn jobs(&self) -> usize {
        self.jobs
    }

    /// Size of the worker pool, if one is running.
    pub fn worker_threads(&self) -> Option<usize> {
        self.pool.as_ref().map(rayon::ThreadPool::current_num_threads)
    }

    /// Configurations in declaration order.
    pub fn configurations(&self) -> impl Iterator<Item = &BuildConfiguration> {
        self.entries.iter().map(|e| &e.config)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn entries_mut(&mut self) -> &mut [SessionEntry] {
        &mut self.entries
    }

    /// Run every configuration once.
    pub fn run_once(&self, ctx: &BuildContext<'_>) -> RunResult {
        self.run_matching(ctx, BuildOrchestrator::new(), |_, _| true)
    }

    /// Run the configurations accepted by `select(index, config)`, in parallel
    /// when `jobs > 1`.
    pub fn run_matching<F>(
        &self,
        ctx: &BuildContext<'_>,
        orchestrator: BuildOrchestrator,
        select: F,
    ) -> RunResult
    where
        F: Fn(usize, &BuildConfiguration) -> bool,
    {
        let start = Instant::now();
        let selected: Vec<&SessionEntry> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(i, e)| select(*i, &e.config))
            .map(|(_, e)| e)
            .collect();
        let run = |entry: &&SessionEntry| -> ConfigurationResult {
            orchestrator.run(&entry.config, entry.backend.as_ref(), ctx)
        };

        let results: Vec<ConfigurationResult> = match &self.pool {
            Some(pool) if selected.len() > 1 => pool.install(|| selected.par_iter().map(run).collect()),
            _ => selected.iter().map(run).collect(),
        };

        let mut result = RunResult::new();
        for configuration in results {
            result.add_result(configuration);
        }
        result.with_duration(start.elapsed())
    }

    /// Release every backend, returning the first failure.
    pub fn close(self) -> BuildResult<()> {
        close_all(self.entries)
    }
}

fn close_all(entries: Vec<SessionEntry>) -> BuildResult<()> {
    let mut first_error = None;
    for entry in entries {
        if let Err(e) = entry.backend.close() {
            tracing::warn!(configuration = %entry.config.name, error = %e, "Could not release backend");
            first_error.get_or_insert(e);
        }
    }
    first_error.map_or(Ok(()), Err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::RecordingNotifier;
    use crate::error::BuildError;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn config(temp: &TempDir, name: &str, out: &str) -> BuildConfiguration {
        BuildConfiguration::new(name, temp.path().join("less"), temp.path().join(out))
    }

    #[test]
    fn test_conflict_aborts_before_any_compile() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("less")).unwrap();
        fs::write(temp.path().join("less/a.less"), "a {}").unwrap();
        let configs = vec![
            config(&temp, "ok", "css"),
            config(&temp, "bad", "css2")
                .with_custom_engine_script(PathBuf::from("x.less"))
                .with_external_executable(PathBuf::from("node")),
        ];

        let err = BuildSession::prepare(configs).unwrap_err();
        assert!(matches!(err, BuildError::ConfigurationConflict(_)));
        assert!(!temp.path().join("css").exists());
    }

    #[test]
    fn test_same_file_into_disjoint_outputs() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("less")).unwrap();
        fs::write(temp.path().join("less/site.less"), "a { color: red; }").unwrap();
        let session = BuildSession::prepare(vec![
            config(&temp, "plain", "css"),
            config(&temp, "min", "min").with_compress(true),
        ])
        .unwrap()
        .with_jobs(2);

        let notifier = RecordingNotifier::new();
        let ctx = BuildContext::logging().with_notifier(&notifier);
        let result = session.run_once(&ctx);

        assert!(result.is_success());
        assert_eq!(result.compiled_count(), 2);
        assert_eq!(fs::read_to_string(temp.path().join("css/site.css")).unwrap(), "a { color: red; }\n");
        assert_eq!(fs::read_to_string(temp.path().join("min/site.css")).unwrap(), "a{color:red}");
        assert_eq!(result.configurations[0].name, "plain");
        assert_eq!(result.configurations[1].name, "min");
        session.close().unwrap();
    }

    #[test]
    fn test_worker_pool_is_started_once_and_reused() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("less")).unwrap();
        fs::write(temp.path().join("less/a.less"), "a {}").unwrap();
        let session = BuildSession::prepare(vec![
            config(&temp, "one", "css1"),
            config(&temp, "two", "css2"),
        ])
        .unwrap();
        assert_eq!(session.worker_threads(), None);

        let session = session.with_jobs(2);
        assert_eq!(session.worker_threads(), Some(2));
        let ctx = BuildContext::logging();
        assert_eq!(session.run_once(&ctx).compiled_count(), 2);
        assert_eq!(session.run_once(&ctx).skipped_count(), 2);
        assert_eq!(session.worker_threads(), Some(2));

        assert_eq!(session.with_jobs(1).worker_threads(), None);
    }

    #[test]
    fn test_run_matching_filters_configurations() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("less")).unwrap();
        fs::write(temp.path().join("less/a.less"), "a {}").unwrap();
        let session = BuildSession::prepare(vec![
            config(&temp, "once", "css"),
            config(&temp, "watched", "css2").with_watch(true),
        ])
        .unwrap();

        let result =
            session.run_matching(&BuildContext::logging(), BuildOrchestrator::new(), |_, c| !c.watch);
        assert_eq!(result.configurations.len(), 1);
        assert_eq!(result.configurations[0].name, "once");
        assert!(!temp.path().join("css2").exists());
    }
}
