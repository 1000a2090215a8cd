//! Configuration loading and discovery for `lessbuild.toml`
//!
//! Provides functions to find, load, and merge configuration, and to turn the
//! parsed file into [`BuildConfiguration`] values.

use super::configuration::{BuildConfiguration, OutputNaming};
use super::schema::{CompileParams, LessConfig, ProjectConfig};
use crate::backend::OutputEncoding;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Name of the configuration file.
pub const CONFIG_FILE_NAME: &str = "lessbuild.toml";

/// Configuration loading error
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// File I/O error
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error
    #[error("Failed to parse lessbuild.toml: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error
    #[error("Config validation failed:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Validation(Vec<String>),
}

/// CLI arguments that can override config values
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    /// Override source directory of every configuration
    pub source: Option<PathBuf>,
    /// Override output directory of every configuration
    pub output: Option<PathBuf>,
    /// Force recompilation
    pub force: Option<bool>,
    /// Enable watch mode
    pub watch: Option<bool>,
    /// Minify output
    pub compress: Option<bool>,
    /// Number of configurations processed in parallel
    pub jobs: Option<usize>,
}

/// Find lessbuild.toml by walking up from the current working directory.
pub fn find_config() -> Option<PathBuf> {
    env::current_dir().ok().and_then(find_config_from)
}

/// Find lessbuild.toml by walking up from a specific directory.
pub fn find_config_from(start: PathBuf) -> Option<PathBuf> {
    let mut current = start;

    loop {
        let config_path = current.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Load configuration from a lessbuild.toml file.
///
/// If a path is provided, loads from that file. Otherwise, uses `find_config()`
/// to locate the config file. If no config file is found, returns a default
/// configuration.
///
/// # Example
/// ```ignore
/// let config = load_config(None)?;
/// let config = load_config(Some(Path::new("site/lessbuild.toml")))?;
/// ```
pub fn load_config(path: Option<&Path>) -> Result<LessConfig, ConfigError> {
    let config_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => find_config(),
    };

    match config_path {
        Some(p) => load_config_file(&p),
        None => Ok(default_config()),
    }
}

/// Load configuration from a specific file path.
fn load_config_file(path: &Path) -> Result<LessConfig, ConfigError> {
    let contents = fs::read_to_string(path)?;
    let config: LessConfig = toml::from_str(&contents)?;

    let errors = config.validate();
    if !errors.is_empty() {
        return Err(ConfigError::Validation(errors.into_iter().map(|e| e.to_string()).collect()));
    }
    if config.compile.is_some() && !config.configurations.is_empty() {
        tracing::warn!(
            path = %path.display(),
            "Both [compile] and [[configuration]] are present; ignoring [compile]"
        );
    }

    Ok(config)
}

/// Create a default configuration when no lessbuild.toml is found.
///
/// The project name is the current directory name.
pub fn default_config() -> LessConfig {
    let project_name = env::current_dir()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "unnamed".to_string());

    LessConfig {
        project: ProjectConfig { name: project_name, ..ProjectConfig::default() },
        compile: None,
        configurations: Vec::new(),
    }
}

/// Merge CLI overrides into a configuration.
///
/// CLI arguments take precedence over config file values and apply to every
/// configuration the file declares.
pub fn merge_cli_overrides(config: &mut LessConfig, overrides: &CliOverrides) {
    if let Some(jobs) = overrides.jobs {
        config.project.jobs = jobs.max(1);
    }

    let apply = |params: &mut CompileParams| {
        if let Some(ref source) = overrides.source {
            params.source_directory = source.clone();
        }
        if let Some(ref output) = overrides.output {
            params.output_directory = output.clone();
        }
        if let Some(force) = overrides.force {
            params.force = force;
        }
        if let Some(watch) = overrides.watch {
            params.watch = watch;
        }
        if let Some(compress) = overrides.compress {
            params.compress = compress;
        }
    };

    if config.configurations.is_empty() {
        apply(config.compile.get_or_insert_with(CompileParams::default));
    } else {
        config.configurations.iter_mut().for_each(apply);
    }
}

/// Get the project root directory from a config file path.
///
/// Returns the parent directory of the lessbuild.toml file.
pub fn project_root(config_path: &Path) -> Option<&Path> {
    config_path.parent()
}

/// Resolve a path relative to the project root.
///
/// If the path is absolute, returns it unchanged.
/// If relative, joins it with the project root.
pub fn resolve_path(project_root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        project_root.join(path)
    }
}

/// Build the configurations declared by `config`, resolving paths against `root`.
pub fn configurations(
    config: &LessConfig,
    root: &Path,
) -> Result<Vec<BuildConfiguration>, ConfigError> {
    let project_encoding = parse_encoding("project.encoding", &config.project.encoding)?;
    let fallback_name =
        if config.project.name.is_empty() { "default" } else { config.project.name.as_str() };

    config
        .params()
        .into_iter()
        .enumerate()
        .map(|(i, (prefix, params))| {
            let name = match &params.name {
                Some(name) => name.clone(),
                None if config.configurations.is_empty() => fallback_name.to_string(),
                None => format!("configuration-{}", i + 1),
            };
            let encoding = match &params.encoding {
                Some(encoding) => parse_encoding(&format!("{}.encoding", prefix), encoding)?,
                None => project_encoding,
            };
            Ok(build_configuration(name, &params, encoding, root))
        })
        .collect()
}

fn parse_encoding(field: &str, value: &str) -> Result<OutputEncoding, ConfigError> {
    value.parse().map_err(|e: String| ConfigError::Validation(vec![format!("{}: {}", field, e)]))
}

fn build_configuration(
    name: String,
    params: &CompileParams,
    encoding: OutputEncoding,
    root: &Path,
) -> BuildConfiguration {
    let naming = match &params.output_file_name {
        Some(template) => OutputNaming::Template {
            template: template.clone(),
            source_suffix: params.source_suffix.clone(),
        },
        None => OutputNaming::Suffix {
            source_suffix: params.source_suffix.clone(),
            file_suffix: params.output_file_suffix.clone().unwrap_or_default(),
            output_suffix: params.output_suffix.clone(),
        },
    };

    let mut config = BuildConfiguration::new(
        name,
        resolve_path(root, &params.source_directory),
        resolve_path(root, &params.output_directory),
    )
    .with_includes(params.includes.clone())
    .with_excludes(params.excludes.clone())
    .with_compress(params.compress)
    .with_force(params.force)
    .with_watch(params.watch)
    .with_watch_interval(Duration::from_millis(params.watch_interval.max(1)))
    .with_encoding(encoding)
    .with_naming(naming)
    .with_include_paths(params.include_paths.iter().map(|p| resolve_path(root, p)).collect());

    if let Some(script) = &params.custom_engine_script {
        config = config.with_custom_engine_script(resolve_path(root, script));
    }
    if let Some(executable) = &params.external_executable {
        config = config.with_external_executable(executable.clone());
    }
    if let Some(target) = &params.concatenate_to {
        config = config.with_concatenate_to(target.clone());
    }
    config
}
