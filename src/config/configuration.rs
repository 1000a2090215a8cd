//! The resolved, immutable parameters of one source-to-output mapping.

use crate::backend::{CompileOptions, OutputEncoding};
use crate::source::{ImportResolver, DEFAULT_SOURCE_SUFFIX};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Placeholder replaced by the input file name in output name templates.
pub const FILE_NAME_PLACEHOLDER: &str = "{fileName}";

/// Default watch polling interval.
pub const DEFAULT_WATCH_INTERVAL: Duration = Duration::from_millis(1000);

/// How an output file name is derived from its input file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputNaming {
    /// `<stem><file_suffix><output_suffix>`, e.g. `a.less` -> `a-min.css`
    Suffix { source_suffix: String, file_suffix: String, output_suffix: String },
    /// Template with `{fileName}` standing for the input name minus its source suffix
    Template { template: String, source_suffix: String },
}

impl Default for OutputNaming {
    fn default() -> Self {
        OutputNaming::Suffix {
            source_suffix: DEFAULT_SOURCE_SUFFIX.to_string(),
            file_suffix: String::new(),
            output_suffix: ".css".to_string(),
        }
    }
}

impl OutputNaming {
    /// Suffix of source files.
    pub fn source_suffix(&self) -> &str {
        match self {
            OutputNaming::Suffix { source_suffix, .. } | OutputNaming::Template { source_suffix, .. } => {
                source_suffix
            }
        }
    }

    /// Output file name for the input file name `input`.
    pub fn file_name(&self, input: &str) -> String {
        let stem = input.strip_suffix(self.source_suffix()).unwrap_or(input);
        match self {
            OutputNaming::Suffix { file_suffix, output_suffix, .. } => {
                format!("{}{}{}", stem, file_suffix, output_suffix)
            }
            OutputNaming::Template { template, .. } => template.replace(FILE_NAME_PLACEHOLDER, stem),
        }
    }
}

/// One configured mapping from a source directory to an output directory.
///
/// Values are built once by the config loader and only read afterwards;
/// [`BuildConfiguration::without_force`] returns a modified copy.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildConfiguration {
    pub name: String,
    pub source_directory: PathBuf,
    pub output_directory: PathBuf,
    pub includes: Vec<String>,
    pub excludes: Vec<String>,
    pub compress: bool,
    pub force: bool,
    pub watch: bool,
    pub watch_interval: Duration,
    pub encoding: OutputEncoding,
    pub custom_engine_script: Option<PathBuf>,
    pub external_executable: Option<PathBuf>,
    pub naming: OutputNaming,
    pub include_paths: Vec<PathBuf>,
    /// Merge file, relative to `source_directory`
    pub concatenate_to: Option<PathBuf>,
}

impl BuildConfiguration {
    /// Configuration with default settings for the given directories.
    pub fn new(
        name: impl Into<String>,
        source_directory: impl Into<PathBuf>,
        output_directory: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            source_directory: source_directory.into(),
            output_directory: output_directory.into(),
            includes: vec![format!("**/*{}", DEFAULT_SOURCE_SUFFIX)],
            excludes: Vec::new(),
            compress: false,
            force: false,
            watch: false,
            watch_interval: DEFAULT_WATCH_INTERVAL,
            encoding: OutputEncoding::default(),
            custom_engine_script: None,
            external_executable: None,
            naming: OutputNaming::default(),
            include_paths: Vec::new(),
            concatenate_to: None,
        }
    }

    pub fn with_includes(mut self, includes: Vec<String>) -> Self {
        self.includes = includes;
        self
    }

    pub fn with_excludes(mut self, excludes: Vec<String>) -> Self {
        self.excludes = excludes;
        self
    }

    pub fn with_compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_watch(mut self, watch: bool) -> Self {
        self.watch = watch;
        self
    }

    pub fn with_watch_interval(mut self, interval: Duration) -> Self {
        self.watch_interval = interval;
        self
    }

    pub fn with_encoding(mut self, encoding: OutputEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_custom_engine_script(mut self, script: PathBuf) -> Self {
        self.custom_engine_script = Some(script);
        self
    }

    pub fn with_external_executable(mut self, executable: PathBuf) -> Self {
        self.external_executable = Some(executable);
        self
    }

    pub fn with_naming(mut self, naming: OutputNaming) -> Self {
        self.naming = naming;
        self
    }

    pub fn with_include_paths(mut self, include_paths: Vec<PathBuf>) -> Self {
        self.include_paths = include_paths;
        self
    }

    pub fn with_concatenate_to(mut self, target: PathBuf) -> Self {
        self.concatenate_to = Some(target);
        self
    }

    /// Copy of this configuration with `force` cleared.
    pub fn without_force(&self) -> Self {
        Self { force: false, ..self.clone() }
    }

    /// Options handed to the backend for every file.
    pub fn compile_options(&self) -> CompileOptions {
        CompileOptions { encoding: self.encoding, compress: self.compress, force: self.force }
    }

    /// Import resolver for this configuration's sources.
    pub fn resolver(&self) -> ImportResolver {
        ImportResolver::new(self.naming.source_suffix()).with_include_paths(self.include_paths.clone())
    }

    /// Absolute merge file path, if concatenation is configured.
    pub fn concatenation_target(&self) -> Option<PathBuf> {
        self.concatenate_to.as_ref().map(|target| self.source_directory.join(target))
    }

    /// Output path for a source given relative to `source_directory`.
    pub fn output_path(&self, relative: &Path) -> PathBuf {
        let name = relative.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        let mut output = self.output_directory.clone();
        if let Some(parent) = relative.parent() {
            output.push(parent);
        }
        output.push(self.naming.file_name(&name));
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffix_naming() {
        let naming = OutputNaming::default();
        assert_eq!(naming.file_name("main.less"), "main.css");
        assert_eq!(naming.file_name("README"), "README.css");

        let naming = OutputNaming::Suffix {
            source_suffix: ".less".into(),
            file_suffix: "-min".into(),
            output_suffix: ".css".into(),
        };
        assert_eq!(naming.file_name("main.less"), "main-min.css");
    }

    #[test]
    fn test_template_naming() {
        let naming =
            OutputNaming::Template { template: "{fileName}.min.css".into(), source_suffix: ".less".into() };
        assert_eq!(naming.file_name("theme.less"), "theme.min.css");

        let fixed = OutputNaming::Template { template: "all.css".into(), source_suffix: ".less".into() };
        assert_eq!(fixed.file_name("merged.less"), "all.css");
    }

    #[test]
    fn test_output_path_mirrors_tree() {
        let config = BuildConfiguration::new("c", "/src", "/out");
        assert_eq!(
            config.output_path(Path::new("widgets/button.less")),
            PathBuf::from("/out/widgets/button.css")
        );
        assert_eq!(config.output_path(Path::new("main.less")), PathBuf::from("/out/main.css"));
    }

    #[test]
    fn test_without_force_only_changes_force() {
        let config = BuildConfiguration::new("c", "/src", "/out").with_force(true).with_compress(true);
        let relaxed = config.without_force();
        assert!(!relaxed.force);
        assert!(config.force);
        assert_eq!(relaxed, config.clone().with_force(false));
    }

    #[test]
    fn test_concatenation_target_is_under_source_directory() {
        let config = BuildConfiguration::new("c", "/src", "/out").with_concatenate_to("all.less".into());
        assert_eq!(config.concatenation_target(), Some(PathBuf::from("/src/all.less")));
    }
}
