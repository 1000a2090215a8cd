//! Compile and watch command implementations

use std::path::Path;
use std::process::ExitCode;
use std::time::Instant;

use super::{load_project, skipped, ReportFormat, EXIT_ERROR, EXIT_SUCCESS};
use crate::build::{BuildContext, BuildOrchestrator, BuildSession, RunResult};
use crate::config::CliOverrides;
use crate::watch::{CancellationToken, WatchScheduler};

/// Run the compile command (also used by `watch`)
pub fn run_compile(config_path: Option<&Path>, overrides: &CliOverrides, format: ReportFormat) -> ExitCode {
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

    let start = Instant::now();
    let session = match BuildSession::prepare(configs) {
        Ok(session) => session.with_jobs(project.config.project.jobs),
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let ctx = BuildContext::logging();
    let watched = session.configurations().filter(|c| c.watch).count();
    let mut success = true;

    if watched < session.len() {
        let result = session.run_matching(&ctx, BuildOrchestrator::new(), |_, c| !c.watch);
        report(&result, format);
        success = result.is_success();
        tracing::info!("Complete compile job finished in {} ms", start.elapsed().as_millis());
    }

    let session = if watched > 0 { watch(session) } else { Ok(session) };
    let session = match session {
        Ok(session) => session,
        Err(code) => return code,
    };

    if let Err(e) = session.close() {
        eprintln!("Error: {}", e);
        return ExitCode::from(EXIT_ERROR);
    }
    if success {
        ExitCode::from(EXIT_SUCCESS)
    } else {
        ExitCode::from(EXIT_ERROR)
    }
}

/// Watch until Ctrl+C, handing the session back for cleanup.
fn watch(session: BuildSession) -> Result<BuildSession, ExitCode> {
    let token = CancellationToken::new();
    let handler_token = token.clone();
    if let Err(e) = ctrlc::set_handler(move || handler_token.cancel()) {
        eprintln!("Error setting Ctrl+C handler: {}", e);
        return Err(ExitCode::from(EXIT_ERROR));
    }

    let handle = match WatchScheduler::new(session).spawn(token) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Watch error: {}", e);
            return Err(ExitCode::from(EXIT_ERROR));
        }
    };
    println!("Press Ctrl+C to stop");

    match handle.join() {
        Ok(Ok(scheduler)) => Ok(scheduler.into_session()),
        Ok(Err(e)) => {
            eprintln!("Watch error: {}", e);
            Err(ExitCode::from(EXIT_ERROR))
        }
        Err(_) => {
            eprintln!("Watch error: watch thread panicked");
            Err(ExitCode::from(EXIT_ERROR))
        }
    }
}

fn report(result: &RunResult, format: ReportFormat) {
    match format {
        ReportFormat::Json => {
            for diagnostic in result.diagnostics() {
                match serde_json::to_string(diagnostic) {
                    Ok(line) => println!("{}", line),
                    Err(e) => eprintln!("Error: cannot serialize diagnostic: {}", e),
                }
            }
        }
        ReportFormat::Text => {
            if result.is_success() {
                println!("{}", result.summary());
            } else {
                eprintln!("{}", result.summary());
            }
        }
    }
}
