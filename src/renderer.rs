//! Turning a render request into strings, bytes, images and files.

use crate::engine::EngineResult;
use crate::error::RenderError;
use crate::format::OutputKind;
use crate::graphviz::Graphviz;
use crate::rasterizer::{GraphicsCallback, RasterSettings, default_rasterizer};
use image::{ImageFormat, RgbaImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Output stage of a [`Graphviz`] request, fixed to one [`OutputKind`].
#[derive(Clone)]
pub struct Renderer {
    graphviz: Graphviz,
    graphics: Option<GraphicsCallback>,
}

impl Renderer {
    pub(crate) fn new(graphviz: Graphviz) -> Self {
        Self {
            graphviz,
            graphics: None,
        }
    }

    pub fn kind(&self) -> OutputKind {
        self.graphviz.options().kind
    }

    /// Adjust rasterization settings (background, anti-aliasing) before drawing.
    pub fn with_graphics<F>(mut self, configure: F) -> Self
    where
        F: Fn(&mut RasterSettings) + Send + Sync + 'static,
    {
        self.graphics = Some(Arc::new(configure));
        self
    }

    /// Text output. For `Png` this is the corrected SVG fed to the rasterizer.
    pub fn to_string(&self) -> Result<String, RenderError> {
        match self.graphviz.execute()? {
            EngineResult::Text(text) => Ok(text),
            EngineResult::Binary(_) => Err(RenderError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("{} output is binary", self.kind()),
            ))),
        }
    }

    /// Raw output bytes; PNG-encoded for bitmap kinds.
    ///
    /// A built-in rasterizer's output is returned as the engine wrote it,
    /// whatever its format.
    pub fn to_bytes(&self) -> Result<Vec<u8>, RenderError> {
        let result = self.graphviz.execute()?;
        if !self.kind().is_image() {
            return Ok(result.into_bytes());
        }
        match result {
            EngineResult::Binary(bytes) => Ok(bytes),
            EngineResult::Text(_) if !self.produces_bitmap() => Err(RenderError::Rasterize(
                format!("engine returned SVG instead of {}", self.file_extension()),
            )),
            text => {
                let image = self.rasterize_result(text)?;
                let mut buf = Vec::new();
                image.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
                Ok(buf)
            }
        }
    }

    /// Bitmap output.
    pub fn to_image(&self) -> Result<RgbaImage, RenderError> {
        let kind = self.kind();
        if !kind.is_svg() {
            return Err(RenderError::Rasterize(format!(
                "{kind} output cannot be turned into an image"
            )));
        }
        if kind.is_image() && !self.produces_bitmap() {
            return Err(RenderError::Rasterize(format!(
                "{} output cannot be turned into an image",
                self.file_extension()
            )));
        }
        let result = self.graphviz.execute()?;
        self.rasterize_result(result)
    }

    /// Write the output to `path` and return the path actually written.
    ///
    /// The output's extension is appended when `path` has none. Missing
    /// parent directories are created.
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<PathBuf, RenderError> {
        let target = with_default_extension(path.as_ref(), self.file_extension());
        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&target, self.to_bytes()?)?;
        crate::debug_info!("RENDER", "Wrote {} output to {}", self.kind(), target.display());
        Ok(target)
    }

    /// Extension of the written output; a rasterizer decides it for bitmap kinds.
    pub fn file_extension(&self) -> &str {
        match self.graphviz.rasterizer() {
            Some(rasterizer) if self.kind().is_image() => rasterizer.file_extension(),
            _ => self.kind().file_extension(),
        }
    }

    fn produces_bitmap(&self) -> bool {
        self.graphviz
            .rasterizer()
            .is_none_or(|rasterizer| rasterizer.produces_bitmap())
    }

    fn rasterize_result(&self, result: EngineResult) -> Result<RgbaImage, RenderError> {
        match result {
            EngineResult::Binary(bytes) => Ok(image::load_from_memory(&bytes)?.to_rgba8()),
            EngineResult::Text(svg) => {
                let rasterizer = self
                    .graphviz
                    .rasterizer()
                    .cloned()
                    .or_else(default_rasterizer)
                    .ok_or(RenderError::MissingRasterizer)?;
                let configure = self
                    .graphics
                    .as_deref()
                    .map(|f| f as &dyn Fn(&mut RasterSettings));
                rasterizer.rasterize(
                    self.graphviz.options(),
                    &self.graphviz.geometry(),
                    configure,
                    &svg,
                )
            }
        }
    }
}

fn with_default_extension(path: &Path, extension: &str) -> PathBuf {
    if path.extension().is_some() {
        path.to_path_buf()
    } else {
        path.with_extension(extension)
    }
}
