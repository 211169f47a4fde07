//! Render requests and the execution pipeline.

use crate::engine::{EngineCoordinator, EngineResult, Layout, Options};
use crate::error::RenderError;
use crate::format::OutputKind;
use crate::rasterizer::Rasterizer;
use crate::renderer::Renderer;
use gvrender_svg::Geometry;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// An immutable render request.
///
/// Every builder method consumes the request and returns a new one, so a
/// base request can be cloned and specialized freely:
///
/// ```no_run
/// use gvrender::{Graphviz, OutputKind};
///
/// let svg = Graphviz::from_string("digraph { a -> b }")
///     .width(300)
///     .render(OutputKind::Svg)
///     .to_string()?;
/// # Ok::<(), gvrender::RenderError>(())
/// ```
#[derive(Clone)]
pub struct Graphviz {
    src: Arc<str>,
    options: Options,
    width: Option<u32>,
    height: Option<u32>,
    scale: f64,
    font_adjust: f64,
    rasterizer: Option<Arc<dyn Rasterizer>>,
    coordinator: Option<Arc<EngineCoordinator>>,
}

impl fmt::Debug for Graphviz {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graphviz")
            .field("src_len", &self.src.len())
            .field("options", &self.options)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("scale", &self.scale)
            .field("font_adjust", &self.font_adjust)
            .field("rasterizer", &self.rasterizer.as_ref().map(|r| r.name().to_string()))
            .finish()
    }
}

impl Graphviz {
    /// Request for DOT source text. Without [`Graphviz::with_coordinator`] the
    /// process-wide coordinator is looked up when the request executes.
    pub fn from_string(src: impl Into<Arc<str>>) -> Self {
        Self {
            src: src.into(),
            options: Options::default(),
            width: None,
            height: None,
            scale: 1.0,
            font_adjust: 1.0,
            rasterizer: crate::rasterizer::default_rasterizer(),
            coordinator: None,
        }
    }

    /// Request for a DOT file. Relative resources resolve against its directory.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, RenderError> {
        let path = path.as_ref();
        let src = std::fs::read_to_string(path)?;
        let request = Self::from_string(src);
        Ok(match path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(dir) => request.basedir(dir),
            None => request,
        })
    }

    /// Dispatch through `coordinator` instead of the global one.
    pub fn with_coordinator(mut self, coordinator: Arc<EngineCoordinator>) -> Self {
        self.coordinator = Some(coordinator);
        self
    }

    /// Explicit output width in pixels. Zero clears the override.
    pub fn width(mut self, width: u32) -> Self {
        self.width = (width > 0).then_some(width);
        self
    }

    /// Explicit output height in pixels. Zero clears the override.
    pub fn height(mut self, height: u32) -> Self {
        self.height = (height > 0).then_some(height);
        self
    }

    pub fn scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    /// Multiply every `font-size` in SVG output by `factor`.
    pub fn font_adjust(mut self, factor: f64) -> Self {
        self.font_adjust = factor;
        self
    }

    pub fn layout(mut self, layout: Layout) -> Self {
        self.options.layout = layout;
        self
    }

    pub fn total_memory(mut self, bytes: u64) -> Self {
        self.options.total_memory = Some(bytes);
        self
    }

    pub fn y_invert(mut self, y_invert: bool) -> Self {
        self.options.y_invert = y_invert;
        self
    }

    pub fn basedir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.options.basedir = Some(dir.into());
        self
    }

    /// Output kind used by [`execute`](Self::execute).
    pub fn kind(mut self, kind: OutputKind) -> Self {
        self.options.kind = kind;
        self
    }

    pub fn source(&self) -> &str {
        &self.src
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn rasterizer(&self) -> Option<&Arc<dyn Rasterizer>> {
        self.rasterizer.as_ref()
    }

    /// The bound coordinator, or the process-wide one when none was set.
    pub fn coordinator(&self) -> Arc<EngineCoordinator> {
        match &self.coordinator {
            Some(coordinator) => Arc::clone(coordinator),
            None => EngineCoordinator::global(),
        }
    }

    /// Size overrides in the form the post-processor expects.
    pub fn geometry(&self) -> Geometry {
        Geometry {
            width: self.width,
            height: self.height,
            scale: self.scale,
        }
    }

    /// Renderer producing `kind`.
    pub fn render(&self, kind: OutputKind) -> Renderer {
        Renderer::new(self.clone().kind(kind))
    }

    /// Renderer producing a bitmap with `rasterizer`.
    pub fn rasterize(&self, rasterizer: Arc<dyn Rasterizer>) -> Renderer {
        let kind = rasterizer.output_kind();
        let mut request = self.clone().kind(kind);
        request.rasterizer = Some(rasterizer);
        Renderer::new(request)
    }

    /// Run the pipeline for the configured output kind.
    ///
    /// `Dot` echoes the source without touching any engine. Everything else
    /// is pre-processed, dispatched to the active engine and post-processed.
    pub fn execute(&self) -> Result<EngineResult, RenderError> {
        let kind = self.options.kind;
        if kind == OutputKind::Dot {
            return Ok(EngineResult::Text(self.src.to_string()));
        }

        let source = kind.pre_process(&self.src);
        let engine = self.coordinator().active_engine()?;
        crate::debug_info!("ENGINE", "Dispatching {} to '{}'", kind, engine.name());

        let raw = engine
            .execute(&source, &self.options, self.rasterizer.as_deref())
            .map_err(|source| RenderError::Execution {
                engine: engine.name().to_string(),
                source,
            })?;
        Ok(kind.post_process(raw, &self.src, &self.geometry(), self.font_adjust))
    }
}
