//! Configuration module for the build engine
//!
//! Provides types and parsing for `lessbuild.toml` project configuration.

pub mod configuration;
pub mod loader;
pub mod schema;

pub use configuration::*;
pub use loader::*;
pub use schema::*;
