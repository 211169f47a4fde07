//! Graphviz rendering with pluggable engines.
//!
//! A [`Graphviz`] request is dispatched to whichever [`Engine`] the
//! [`EngineCoordinator`] selected: the local `dot` executable, a Kroki
//! server, or the embedded `layout-rs` renderer, in that order by default.
//! SVG output is then repaired (pixel sizes, explicit width/height/scale,
//! DPI, font sizes) by `gvrender-svg` before it reaches the caller.

/// Crate version, for the CLI banner.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[macro_use]
pub mod debug;

pub mod cli;
pub mod engine;
pub mod error;
pub mod format;
pub mod graphviz;
pub mod rasterizer;
pub mod renderer;

pub use engine::{Engine, EngineCoordinator, EngineResult, Layout, Options};
pub use error::{EngineError, RenderError};
pub use format::OutputKind;
pub use graphviz::Graphviz;
pub use gvrender_svg::Geometry;
pub use rasterizer::{BuiltInRasterizer, RasterSettings, Rasterizer, default_rasterizer};
#[cfg(feature = "rasterizer")]
pub use rasterizer::ResvgRasterizer;
pub use renderer::Renderer;
