//! Configuration system for gvrender.
//!
//! This crate provides configuration loading, validation and default values
//! for the rendering engines:
//!
//! - Engine priority order used when no explicit engine list is configured
//! - Engine selection timeout
//! - Command-line (`dot`) and remote server settings
//! - Log level

pub mod config;
pub mod error;
mod types;

pub use config::{CommandLineConfig, Config, ServerConfig};
pub use error::ConfigError;
pub use types::{EngineKind, LogLevel};
