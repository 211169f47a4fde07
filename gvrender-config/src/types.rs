//! Small enums shared by the configuration structs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Built-in engine variants, in the names used by config files and the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    /// Local `dot` executable driven as a subprocess.
    #[serde(rename = "cmdline", alias = "command_line")]
    CommandLine,
    /// Remote Kroki-compatible rendering server.
    Server,
    /// In-process renderer compiled into the binary.
    Native,
}

impl EngineKind {
    /// Default priority order: subprocess, remote, embedded.
    pub const DEFAULT_ORDER: [EngineKind; 3] =
        [EngineKind::CommandLine, EngineKind::Server, EngineKind::Native];

    pub fn as_str(self) -> &'static str {
        match self {
            EngineKind::CommandLine => "cmdline",
            EngineKind::Server => "server",
            EngineKind::Native => "native",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cmdline" | "command_line" | "command-line" | "dot" => Ok(EngineKind::CommandLine),
            "server" | "kroki" | "remote" => Ok(EngineKind::Server),
            "native" | "embedded" => Ok(EngineKind::Native),
            other => Err(format!(
                "unknown engine '{other}' (expected cmdline, server or native)"
            )),
        }
    }
}

/// Log level as written in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    #[default]
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Convert to the `log` crate's filter.
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}
