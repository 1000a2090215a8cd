use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Environment variable holding the log filter; `RUST_LOG` is used when unset.
pub const LOG_ENV: &str = "LESSBUILD_LOG";

/// Build the filter from the environment, defaulting to `info` (`debug` when verbose).
pub fn env_filter(verbose: bool) -> EnvFilter {
    let default_level = if verbose { "debug" } else { "info" };
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Install the global subscriber, writing to stderr.
///
/// Does nothing if a subscriber is already installed.
pub fn init_logging(verbose: bool) {
    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);
    let _ = tracing_subscriber::registry().with(env_filter(verbose)).with(stderr_layer).try_init();
}
