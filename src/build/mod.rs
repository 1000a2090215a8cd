//! Build orchestration for lessbuild
//!
//! Turns resolved configurations into compiled stylesheets.
//!
//! # Overview
//!
//! A pass consists of:
//! - **Discovery**: Find source files using the include and exclude patterns
//! - **Concatenation**: Optionally merge the discovered files into one source
//! - **Compilation**: Hand every stale candidate to the configured backend
//!
//! # Example
//!
//! ```ignore
//! use lessbuild::build::{BuildContext, BuildSession};
//! use lessbuild::config::{configurations, load_config};
//!
//! let config = load_config(None)?;
//! let session = BuildSession::prepare(configurations(&config, &project_root)?)?;
//!
//! let result = session.run_once(&BuildContext::logging());
//! println!("{}", result.summary());
//! session.close()?;
//! ```

pub mod concat;
pub mod context;
pub mod discovery;
pub mod pipeline;
pub mod result;
pub mod session;

pub use concat::*;
pub use context::*;
pub use discovery::*;
pub use pipeline::*;
pub use result::*;
pub use session::*;
