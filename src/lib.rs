//! lessbuild - Incremental LESS stylesheet builds
//!
//! This library provides functionality to:
//! - Resolve LESS sources and their transitive imports
//! - Decide staleness from modification times across the import tree
//! - Compile through an embedded transform or an external runtime process
//! - Run several configurations once, or keep watching them

pub mod backend;
pub mod build;
pub mod cli;
pub mod config;
pub mod diagnostic;
pub mod error;
pub mod logging;
pub mod source;
pub mod watch;
