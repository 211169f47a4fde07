//! SVG to bitmap conversion.
//!
//! A [`Rasterizer`] receives corrected SVG and produces an RGBA image. A
//! root sized in pixels by the post-processor is drawn at that size; other
//! documents are sized from the `viewBox` with the same rules the
//! post-processor applies.

use crate::engine::Options;
use crate::error::RenderError;
use crate::format::OutputKind;
use gvrender_svg::Geometry;
use image::RgbaImage;
use std::sync::Arc;

/// Largest bitmap edge accepted, in pixels.
pub const MAX_DIMENSION: u32 = 16384;

/// Resampling quality for embedded raster images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageQuality {
    Fast,
    #[default]
    Smooth,
}

/// Drawing settings a caller may adjust through a graphics callback.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterSettings {
    /// Anti-alias shapes.
    pub antialias: bool,
    /// Anti-alias text.
    pub text_antialias: bool,
    pub image_quality: ImageQuality,
    /// Fill color drawn before the graph. `None` leaves the bitmap transparent.
    pub background: Option<[u8; 4]>,
    /// Resolution used to resolve absolute units such as `mm` and `in`.
    pub dpi: f32,
}

impl Default for RasterSettings {
    fn default() -> Self {
        Self {
            antialias: true,
            text_antialias: true,
            image_quality: ImageQuality::default(),
            background: None,
            dpi: 96.0,
        }
    }
}

/// Callback adjusting [`RasterSettings`] before drawing.
pub type GraphicsCallback = Arc<dyn Fn(&mut RasterSettings) + Send + Sync>;

/// Turns SVG text into a bitmap.
pub trait Rasterizer: Send + Sync {
    fn name(&self) -> &str;

    /// Kind produced by this rasterizer.
    fn output_kind(&self) -> OutputKind {
        OutputKind::Png
    }

    /// Engine format token (e.g. `png:cairo`) when the engine itself should
    /// produce the output instead of SVG.
    fn built_in_format(&self) -> Option<String> {
        None
    }

    /// Extension of the files this rasterizer's output is written to.
    fn file_extension(&self) -> &str {
        self.output_kind().file_extension()
    }

    /// Whether the output can be decoded into an image.
    fn produces_bitmap(&self) -> bool {
        true
    }

    fn rasterize(
        &self,
        options: &Options,
        geometry: &Geometry,
        configure: Option<&dyn Fn(&mut RasterSettings)>,
        svg: &str,
    ) -> Result<RgbaImage, RenderError>;
}

/// The best rasterizer compiled into this build, if any.
pub fn default_rasterizer() -> Option<Arc<dyn Rasterizer>> {
    #[cfg(feature = "rasterizer")]
    {
        Some(Arc::new(ResvgRasterizer::new()))
    }
    #[cfg(not(feature = "rasterizer"))]
    {
        None
    }
}

/// Bitmap size for an SVG payload.
///
/// A root already sized in pixels has had the request geometry applied by
/// the post-processor and is used as is. Otherwise the `viewBox` (or the
/// parsed document size) is sized with the request geometry.
fn output_size(svg: &str, document_size: (f64, f64), geometry: &Geometry) -> (u32, u32) {
    if let Some((width, height)) = gvrender_svg::pixel_size(svg) {
        return gvrender_svg::target_size(width, height, &Geometry::default());
    }
    let (width, height) = gvrender_svg::view_box_size(svg).unwrap_or(document_size);
    gvrender_svg::target_size(width, height, geometry)
}

/// Check a bitmap size before allocating it.
fn checked_dimensions(width: u32, height: u32) -> Result<(u32, u32), RenderError> {
    if width == 0 || height == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(RenderError::Rasterize(format!(
            "bitmap dimensions out of range: {width}x{height}"
        )));
    }
    Ok((width, height))
}

#[cfg(feature = "rasterizer")]
pub use resvg_impl::ResvgRasterizer;

#[cfg(feature = "rasterizer")]
mod resvg_impl {
    use super::*;
    use resvg::tiny_skia::{Color, Pixmap, Transform};
    use resvg::usvg;

    /// Lazily-loaded system font database.
    ///
    /// Loading system fonts is expensive, so it happens once and the database
    /// is shared by every rasterization.
    static FONTDB: std::sync::LazyLock<Arc<fontdb::Database>> = std::sync::LazyLock::new(|| {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();
        crate::debug_info!("RASTER", "Loaded {} font faces from system", db.len());
        Arc::new(db)
    });

    /// Pure-Rust rasterizer built on `resvg`.
    #[derive(Debug, Default, Clone)]
    pub struct ResvgRasterizer;

    impl ResvgRasterizer {
        pub fn new() -> Self {
            Self
        }
    }

    fn usvg_options(options: &Options, settings: &RasterSettings) -> usvg::Options<'static> {
        usvg::Options {
            resources_dir: options.basedir.clone(),
            dpi: settings.dpi,
            shape_rendering: if settings.antialias {
                usvg::ShapeRendering::GeometricPrecision
            } else {
                usvg::ShapeRendering::CrispEdges
            },
            text_rendering: if settings.text_antialias {
                usvg::TextRendering::OptimizeLegibility
            } else {
                usvg::TextRendering::OptimizeSpeed
            },
            image_rendering: match settings.image_quality {
                ImageQuality::Smooth => usvg::ImageRendering::OptimizeQuality,
                ImageQuality::Fast => usvg::ImageRendering::OptimizeSpeed,
            },
            fontdb: FONTDB.clone(),
            ..Default::default()
        }
    }

    impl Rasterizer for ResvgRasterizer {
        fn name(&self) -> &str {
            "resvg"
        }

        fn rasterize(
            &self,
            options: &Options,
            geometry: &Geometry,
            configure: Option<&dyn Fn(&mut RasterSettings)>,
            svg: &str,
        ) -> Result<RgbaImage, RenderError> {
            let mut settings = RasterSettings::default();
            if let Some(configure) = configure {
                configure(&mut settings);
            }

            let opts = usvg_options(options, &settings);
            let tree = usvg::Tree::from_str(svg, &opts)
                .map_err(|e| RenderError::Rasterize(format!("SVG parse failed: {e}")))?;

            let size = tree.size();
            let (tree_width, tree_height) = (f64::from(size.width()), f64::from(size.height()));
            let (width, height) = output_size(svg, (tree_width, tree_height), geometry);
            let (width, height) = checked_dimensions(width, height)?;
            crate::debug_log!(
                "RASTER",
                "resvg: {tree_width}x{tree_height} -> {width}x{height}px"
            );

            let mut pixmap = Pixmap::new(width, height).ok_or_else(|| {
                RenderError::Rasterize(format!("cannot allocate {width}x{height} pixmap"))
            })?;
            if let Some([r, g, b, a]) = settings.background {
                pixmap.fill(Color::from_rgba8(r, g, b, a));
            }

            let transform = Transform::from_scale(
                (f64::from(width) / tree_width) as f32,
                (f64::from(height) / tree_height) as f32,
            );
            resvg::render(&tree, transform, &mut pixmap.as_mut());

            let mut data = Vec::with_capacity(pixmap.data().len());
            for pixel in pixmap.pixels() {
                let color = pixel.demultiply();
                data.extend_from_slice(&[color.red(), color.green(), color.blue(), color.alpha()]);
            }
            RgbaImage::from_raw(width, height, data).ok_or_else(|| {
                RenderError::Rasterize("pixel buffer does not match bitmap size".to_string())
            })
        }
    }
}

/// Engine formats that decode into an image.
const BITMAP_FORMATS: &[&str] = &[
    "png", "gif", "jpg", "jpeg", "jpe", "bmp", "tif", "tiff", "webp", "ico",
];

/// Asks the engine for the final output directly (`dot -Tpng:cairo`).
///
/// The format token follows `dot -T`: `format[:renderer[:formatter]]`, and
/// need not be a bitmap (`pdf` works too). Engines that cannot honor the
/// request return SVG as usual; that SVG is then rasterized with
/// [`default_rasterizer`] when one is compiled in.
#[derive(Debug, Clone)]
pub struct BuiltInRasterizer {
    format: String,
}

impl Default for BuiltInRasterizer {
    fn default() -> Self {
        Self::new("png")
    }
}

impl BuiltInRasterizer {
    /// `format` is the engine token, e.g. `png`, `pdf` or `png:cairo`.
    pub fn new(format: impl Into<String>) -> Self {
        Self {
            format: format.into(),
        }
    }

    /// Format plus an explicit renderer, e.g. `("png", "cairo")`.
    pub fn with_renderer(format: &str, renderer: &str) -> Self {
        Self::new(format!("{format}:{renderer}"))
    }

    /// Format, renderer and formatter, e.g. `("png", "cairo", "gd")`.
    pub fn with_formatter(format: &str, renderer: &str, formatter: &str) -> Self {
        Self::new(format!("{format}:{renderer}:{formatter}"))
    }

    /// Output format without renderer and formatter.
    pub fn format(&self) -> &str {
        self.format.split(':').next().unwrap_or_default()
    }
}

impl Rasterizer for BuiltInRasterizer {
    fn name(&self) -> &str {
        "built-in"
    }

    fn built_in_format(&self) -> Option<String> {
        Some(self.format.clone())
    }

    fn file_extension(&self) -> &str {
        self.format()
    }

    fn produces_bitmap(&self) -> bool {
        BITMAP_FORMATS.contains(&self.format().to_ascii_lowercase().as_str())
    }

    fn rasterize(
        &self,
        options: &Options,
        geometry: &Geometry,
        configure: Option<&dyn Fn(&mut RasterSettings)>,
        svg: &str,
    ) -> Result<RgbaImage, RenderError> {
        crate::debug_log!("RASTER", "engine returned SVG for built-in rasterizer, falling back");
        let fallback = default_rasterizer().ok_or(RenderError::MissingRasterizer)?;
        fallback.rasterize(options, geometry, configure, svg)
    }
}
