//! Command-line interface implementation
//!
//! This module provides the CLI entry point and dispatches to submodules
//! for specific command implementations.

mod build;
mod list;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::config::{
    configurations, find_config, load_config, merge_cli_overrides, project_root, BuildConfiguration,
    CliOverrides, LessConfig,
};

/// Exit codes
pub(crate) const EXIT_SUCCESS: u8 = 0;
pub(crate) const EXIT_ERROR: u8 = 1;
pub(crate) const EXIT_INVALID_ARGS: u8 = 2;

/// lessbuild - Incremental LESS stylesheet builds
#[derive(Parser)]
#[command(name = "lessbuild")]
#[command(about = "lessbuild - Compile LESS sources to CSS, recompiling only what changed")]
#[command(version)]
pub struct Cli {
    /// Path to lessbuild.toml (searched upward from the current directory if omitted)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the source directory of every configuration
    #[arg(long, global = true)]
    pub source: Option<PathBuf>,

    /// Override the output directory of every configuration
    #[arg(long, global = true)]
    pub output: Option<PathBuf>,

    /// Number of configurations processed in parallel
    #[arg(short, long, global = true, value_parser = clap::value_parser!(u16).range(1..))]
    pub jobs: Option<u16>,

    /// Show debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compile every configuration once, or keep watching with --watch
    Compile {
        /// Keep watching for changes after the first pass
        #[arg(short, long)]
        watch: bool,

        /// Recompile even when outputs are up to date
        #[arg(short, long)]
        force: bool,

        /// Minify the generated CSS
        #[arg(long)]
        compress: bool,

        /// Diagnostic report format
        #[arg(long, value_enum, default_value = "text")]
        format: ReportFormat,
    },

    /// Watch every configuration and recompile on change
    Watch {
        /// Minify the generated CSS
        #[arg(long)]
        compress: bool,
    },

    /// List the resolved sources of every configuration with their imports
    List,
}

/// How compile diagnostics are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human readable lines on stderr
    Text,
    /// One JSON object per diagnostic on stdout
    Json,
}

/// Run the CLI application
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    crate::logging::init_logging(cli.verbose);

    let mut overrides = CliOverrides {
        source: cli.source.clone(),
        output: cli.output.clone(),
        jobs: cli.jobs.map(usize::from),
        ..Default::default()
    };

    match cli.command {
        Commands::Compile { watch, force, compress, format } => {
            overrides.watch = watch.then_some(true);
            overrides.force = force.then_some(true);
            overrides.compress = compress.then_some(true);
            build::run_compile(cli.config.as_deref(), &overrides, format)
        }
        Commands::Watch { compress } => {
            overrides.watch = Some(true);
            overrides.compress = compress.then_some(true);
            build::run_compile(cli.config.as_deref(), &overrides, ReportFormat::Text)
        }
        Commands::List => list::run_list(cli.config.as_deref(), &overrides),
    }
}

/// A loaded project: the parsed file and the directory paths resolve against.
pub(crate) struct Project {
    pub config: LessConfig,
    pub root: PathBuf,
}

impl Project {
    /// Resolved configurations, in declaration order.
    pub fn configurations(&self) -> Result<Vec<BuildConfiguration>, ExitCode> {
        configurations(&self.config, &self.root).map_err(|e| {
            eprintln!("Error: {}", e);
            ExitCode::from(EXIT_INVALID_ARGS)
        })
    }
}

/// Locate and load the project configuration, applying CLI overrides.
pub(crate) fn load_project(
    config_path: Option<&Path>,
    overrides: &CliOverrides,
) -> Result<Project, ExitCode> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let path = config_path.map(Path::to_path_buf).or_else(find_config);

    let (mut config, root) = match &path {
        Some(path) => {
            tracing::debug!("Using config: {}", path.display());
            let config = load_config(Some(path)).map_err(|e| {
                eprintln!("Error loading config: {}", e);
                ExitCode::from(EXIT_INVALID_ARGS)
            })?;
            let root = project_root(path)
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| cwd.clone());
            (config, root)
        }
        None => {
            tracing::debug!("No lessbuild.toml found, using defaults");
            (crate::config::default_config(), cwd)
        }
    };

    merge_cli_overrides(&mut config, overrides);
    Ok(Project { config, root })
}

/// Whether the project asks for execution to be skipped; logs when it does.
pub(crate) fn skipped(project: &Project) -> bool {
    if project.config.project.skip {
        tracing::info!("Skipping execution per configuration");
    }
    project.config.project.skip
}
