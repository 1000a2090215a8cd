//! List command: resolved sources and their import trees

use std::path::Path;
use std::process::ExitCode;

use super::{load_project, skipped, EXIT_ERROR, EXIT_SUCCESS};
use crate::build::{GlobScanner, Scanner};
use crate::config::{BuildConfiguration, CliOverrides};
use crate::source::{render_tree, SourceTree};

/// Run the list command
pub fn run_list(config_path: Option<&Path>, overrides: &CliOverrides) -> ExitCode {
    let project = match load_project(config_path, overrides) {
        Ok(project) => project,
        Err(code) => return code,
    };
    if skipped(&project) {
        return ExitCode::from(EXIT_SUCCESS);
    }
    let configs = match project.configurations() {
        Ok(configs) => configs,
        Err(code) => return code,
    };

    let mut failed = false;
    for config in &configs {
        match list_configuration(config, &GlobScanner) {
            Ok(lines) => {
                for line in lines {
                    println!("{}", line);
                }
            }
            Err(message) => {
                eprintln!("Error: {}", message);
                failed = true;
            }
        }
    }

    ExitCode::from(if failed { EXIT_ERROR } else { EXIT_SUCCESS })
}

/// Render every resolved root of `config` with its transitive imports.
///
/// Unresolvable roots are shown with the reason instead of a tree.
pub(crate) fn list_configuration(config: &BuildConfiguration, scanner: &dyn Scanner) -> Result<Vec<String>, String> {
    let files = scanner
        .scan(&config.source_directory, &config.includes, &config.excludes)
        .map_err(|e| e.to_string())?;

    let mut lines = vec![format!("[{}] {}", config.name, config.source_directory.display())];
    if files.is_empty() {
        lines.push("  (no sources)".to_string());
    }
    let resolver = config.resolver();
    for relative in files {
        let label = relative.display().to_string();
        match SourceTree::load(&config.source_directory.join(&relative), &resolver) {
            Ok(tree) => lines.extend(render_tree(&tree, &label)),
            Err(e) => lines.push(format!("{} ({})", label, e)),
        }
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_list_renders_import_trees() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("less");
        fs::create_dir_all(src.join("partials")).unwrap();
        fs::write(src.join("main.less"), "@import \"partials/a\";\n@import \"partials/b\";").unwrap();
        fs::write(src.join("partials/a.less"), "a {}").unwrap();
        fs::write(src.join("partials/b.less"), "b {}").unwrap();
        let config = BuildConfiguration::new("site", &src, temp.path().join("css"))
            .with_excludes(vec!["partials/**".to_string()]);

        let lines = list_configuration(&config, &GlobScanner).unwrap();
        assert_eq!(lines[0], format!("[site] {}", src.display()));
        assert_eq!(&lines[1..], &["main.less", "|-- partials/a", "`-- partials/b"]);
    }

    #[test]
    fn test_list_reports_missing_import_inline() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("less");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("main.less"), "@import \"gone\";").unwrap();
        let config = BuildConfiguration::new("site", &src, temp.path().join("css"));

        let lines = list_configuration(&config, &GlobScanner).unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("main.less ("));
    }

    #[test]
    fn test_list_empty_configuration() {
        let temp = TempDir::new().unwrap();
        let config = BuildConfiguration::new("site", temp.path().join("less"), temp.path().join("css"));
        let lines = list_configuration(&config, &GlobScanner).unwrap();
        assert_eq!(lines[1], "  (no sources)");
    }
}
