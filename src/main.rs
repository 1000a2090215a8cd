//! lessbuild - Command-line tool for incremental LESS builds

use std::process::ExitCode;

use lessbuild::cli;

fn main() -> ExitCode {
    cli::run()
}
