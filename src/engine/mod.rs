//! Rendering engines and the coordinator that selects one of them.
//!
//! An [`Engine`] turns DOT source into one output format. Engines are
//! constructed inert; [`Engine::init`] runs on the coordinator's handshake
//! thread and decides whether the engine is usable on this machine.
//!
//! Built-in engines, in default priority order:
//! - [`CommandLineEngine`]: the local `dot` executable
//! - [`ServerEngine`]: a Kroki-compatible HTTP server
//! - [`NativeEngine`]: in-process rendering (`native-engine` feature)

mod cmdline;
pub mod coordinator;
#[cfg(feature = "native-engine")]
mod native;
mod server;

use crate::error::EngineError;
use crate::format::OutputKind;
use crate::rasterizer::Rasterizer;
use gvrender_config::{Config, EngineKind};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

pub use cmdline::CommandLineEngine;
pub use coordinator::{DEFAULT_INIT_TIMEOUT, EngineCoordinator};
#[cfg(feature = "native-engine")]
pub use native::NativeEngine;
pub use server::ServerEngine;

/// A rendering backend.
///
/// Implementations must be `Send + Sync`: the coordinator initializes them
/// on a background thread and shares the selected one across callers.
pub trait Engine: Send + Sync {
    /// Short identifier used in logs and error messages.
    fn name(&self) -> &str;

    /// Check whether this engine can run. Called once per configuration cycle.
    fn init(&self) -> Result<(), EngineError>;

    /// Render `source` as described by `options`.
    ///
    /// `rasterizer` is a hint: engines that can produce the bitmap
    /// themselves (see [`Rasterizer::built_in_format`]) may do so.
    fn execute(
        &self,
        source: &str,
        options: &Options,
        rasterizer: Option<&dyn Rasterizer>,
    ) -> Result<EngineResult, EngineError>;

    /// Release resources. Called when the engine is replaced or reset.
    fn close(&self) -> Result<(), EngineError> {
        Ok(())
    }
}

/// Graphviz layout algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Layout {
    #[default]
    Dot,
    Neato,
    Fdp,
    Sfdp,
    Twopi,
    Circo,
    Osage,
    Patchwork,
}

impl Layout {
    pub const ALL: [Layout; 8] = [
        Layout::Dot,
        Layout::Neato,
        Layout::Fdp,
        Layout::Sfdp,
        Layout::Twopi,
        Layout::Circo,
        Layout::Osage,
        Layout::Patchwork,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Layout::Dot => "dot",
            Layout::Neato => "neato",
            Layout::Fdp => "fdp",
            Layout::Sfdp => "sfdp",
            Layout::Twopi => "twopi",
            Layout::Circo => "circo",
            Layout::Osage => "osage",
            Layout::Patchwork => "patchwork",
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Layout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Layout::ALL
            .into_iter()
            .find(|layout| layout.as_str() == wanted)
            .ok_or_else(|| format!("unknown layout engine '{s}'"))
    }
}

/// Per-request settings passed to an engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    pub kind: OutputKind,
    pub layout: Layout,
    /// Memory hint in bytes for engines that need one.
    pub total_memory: Option<u64>,
    /// Invert the y coordinate in output (`dot -y`).
    pub y_invert: bool,
    /// Directory relative resources (images, includes) resolve against.
    pub basedir: Option<PathBuf>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            kind: OutputKind::Svg,
            layout: Layout::default(),
            total_memory: None,
            y_invert: false,
            basedir: None,
        }
    }
}

impl Options {
    pub fn with_kind(mut self, kind: OutputKind) -> Self {
        self.kind = kind;
        self
    }
}

/// Raw output of one engine execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineResult {
    Text(String),
    Binary(Vec<u8>),
}

impl EngineResult {
    pub fn is_text(&self) -> bool {
        matches!(self, EngineResult::Text(_))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            EngineResult::Text(text) => Some(text),
            EngineResult::Binary(_) => None,
        }
    }

    /// Apply `f` to a text result. Binary results pass through untouched.
    pub fn map_text<F>(self, f: F) -> EngineResult
    where
        F: FnOnce(&str) -> String,
    {
        match self {
            EngineResult::Text(text) => EngineResult::Text(f(&text)),
            binary => binary,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            EngineResult::Text(text) => text.into_bytes(),
            EngineResult::Binary(bytes) => bytes,
        }
    }
}

/// Build one engine of the given kind from configuration.
///
/// Returns `None` for kinds not compiled into this build.
pub fn build_engine(kind: EngineKind, config: &Config) -> Option<Arc<dyn Engine>> {
    match kind {
        EngineKind::CommandLine => Some(Arc::new(CommandLineEngine::from_config(config))),
        EngineKind::Server => Some(Arc::new(ServerEngine::from_config(config))),
        #[cfg(feature = "native-engine")]
        EngineKind::Native => Some(Arc::new(NativeEngine::new())),
        #[cfg(not(feature = "native-engine"))]
        EngineKind::Native => {
            log::debug!("native engine requested but the `native-engine` feature is disabled");
            None
        }
    }
}

/// Build engines for `kinds`, in order.
pub fn build_engines(kinds: &[EngineKind], config: &Config) -> Vec<Arc<dyn Engine>> {
    kinds
        .iter()
        .filter_map(|&kind| build_engine(kind, config))
        .collect()
}

/// The default candidate list: the configured order, or the built-in order.
pub fn default_engines(config: &Config) -> Vec<Arc<dyn Engine>> {
    let kinds = if config.engines.is_empty() {
        EngineKind::DEFAULT_ORDER.to_vec()
    } else {
        config.engines.clone()
    };
    build_engines(&kinds, config)
}
