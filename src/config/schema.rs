//! Configuration schema types for `lessbuild.toml`
//!
//! Defines the structure and validation rules for project configuration.
//! A file either carries a list of `[[configuration]]` tables or a single
//! legacy `[compile]` table.

use crate::backend::{OutputEncoding, DEFAULT_ENCODING};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

/// Project metadata section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name
    #[serde(default)]
    pub name: String,
    /// Default output encoding for every configuration
    #[serde(default = "default_encoding")]
    pub encoding: String,
    /// Skip execution entirely
    #[serde(default)]
    pub skip: bool,
    /// Number of configurations processed in parallel
    #[serde(default = "default_jobs")]
    pub jobs: usize,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self { name: String::new(), encoding: default_encoding(), skip: false, jobs: default_jobs() }
    }
}

fn default_encoding() -> String {
    DEFAULT_ENCODING.to_string()
}

fn default_jobs() -> usize {
    1
}

/// Parameters of one source-to-output mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileParams {
    /// Configuration name (list entries only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Directory scanned for sources
    #[serde(default = "default_source_directory")]
    pub source_directory: PathBuf,
    /// Directory receiving outputs
    #[serde(default = "default_output_directory")]
    pub output_directory: PathBuf,
    /// Glob patterns selecting sources
    #[serde(default = "default_includes")]
    pub includes: Vec<String>,
    /// Glob patterns removing sources
    #[serde(default)]
    pub excludes: Vec<String>,
    /// Minify output
    #[serde(default)]
    pub compress: bool,
    /// Always recompile
    #[serde(default)]
    pub force: bool,
    /// Keep watching after the first pass
    #[serde(default)]
    pub watch: bool,
    /// Watch polling interval in milliseconds
    #[serde(default = "default_watch_interval")]
    pub watch_interval: u64,
    /// Output encoding (falls back to `project.encoding`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    /// Script prepended by the embedded engine
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_engine_script: Option<PathBuf>,
    /// Executable for the external engine
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_executable: Option<PathBuf>,
    /// Output name template with a `{fileName}` placeholder
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_file_name: Option<String>,
    /// Inserted before the output suffix
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_file_suffix: Option<String>,
    /// Suffix of source files
    #[serde(default = "default_source_suffix")]
    pub source_suffix: String,
    /// Suffix of output files
    #[serde(default = "default_output_suffix")]
    pub output_suffix: String,
    /// Additional import search directories
    #[serde(default)]
    pub include_paths: Vec<PathBuf>,
    /// Merge every matched source into this file before compiling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concatenate_to: Option<PathBuf>,
}

impl Default for CompileParams {
    fn default() -> Self {
        Self {
            name: None,
            source_directory: default_source_directory(),
            output_directory: default_output_directory(),
            includes: default_includes(),
            excludes: Vec::new(),
            compress: false,
            force: false,
            watch: false,
            watch_interval: default_watch_interval(),
            encoding: None,
            custom_engine_script: None,
            external_executable: None,
            output_file_name: None,
            output_file_suffix: None,
            source_suffix: default_source_suffix(),
            output_suffix: default_output_suffix(),
            include_paths: Vec::new(),
            concatenate_to: None,
        }
    }
}

fn default_source_directory() -> PathBuf {
    PathBuf::from("src/main/less")
}

fn default_output_directory() -> PathBuf {
    PathBuf::from("target/css")
}

fn default_includes() -> Vec<String> {
    vec!["**/*.less".to_string()]
}

fn default_watch_interval() -> u64 {
    1000
}

fn default_source_suffix() -> String {
    ".less".to_string()
}

fn default_output_suffix() -> String {
    ".css".to_string()
}

/// Root configuration structure for `lessbuild.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LessConfig {
    /// Project metadata
    #[serde(default)]
    pub project: ProjectConfig,
    /// Legacy single configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compile: Option<CompileParams>,
    /// Explicit configuration list
    #[serde(default, rename = "configuration", skip_serializing_if = "Vec::is_empty")]
    pub configurations: Vec<CompileParams>,
}

/// Validation error with context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigValidationError {
    /// Path to the invalid field (e.g., "configuration[1].watch_interval")
    pub field: String,
    /// Error message
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "lessbuild.toml: '{}' {}", self.field, self.message)
    }
}

impl LessConfig {
    /// The parameter tables that produce configurations, with their field prefix.
    ///
    /// The explicit list wins over the legacy table. With neither present a
    /// single default table is used.
    pub fn params(&self) -> Vec<(String, CompileParams)> {
        if !self.configurations.is_empty() {
            self.configurations
                .iter()
                .enumerate()
                .map(|(i, p)| (format!("configuration[{}]", i), p.clone()))
                .collect()
        } else {
            vec![("compile".to_string(), self.compile.clone().unwrap_or_default())]
        }
    }

    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();
        let mut push = |field: String, message: &str| {
            errors.push(ConfigValidationError { field, message: message.to_string() })
        };

        if self.project.jobs == 0 {
            push("project.jobs".to_string(), "must be a positive integer");
        }
        if self.project.encoding.parse::<OutputEncoding>().is_err() {
            push("project.encoding".to_string(), "is not a supported encoding");
        }

        let mut names = HashSet::new();
        for (prefix, params) in self.params() {
            if params.watch_interval == 0 {
                push(format!("{}.watch_interval", prefix), "must be a positive integer");
            }
            if params.includes.is_empty() {
                push(format!("{}.includes", prefix), "must contain at least one glob pattern");
            }
            if params.source_suffix.is_empty() {
                push(format!("{}.source_suffix", prefix), "must be a non-empty string");
            }
            if let Some(encoding) = &params.encoding {
                if encoding.parse::<OutputEncoding>().is_err() {
                    push(format!("{}.encoding", prefix), "is not a supported encoding");
                }
            }
            if let Some(name) = &params.name {
                if name.is_empty() {
                    push(format!("{}.name", prefix), "must be a non-empty string");
                } else if !names.insert(name.clone()) {
                    push(format!("{}.name", prefix), "duplicates another configuration name");
                }
            }
        }

        errors
    }

    /// Check if validation passed
    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }
}
