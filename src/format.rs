//! Output kinds and their pre/post-processing steps.

use crate::engine::EngineResult;
use gvrender_svg::Geometry;
use std::fmt;
use std::str::FromStr;

/// Every output a render request can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputKind {
    /// Bitmap produced by rasterizing corrected SVG.
    Png,
    /// Bare `<svg>` root, prolog and doctype stripped.
    Svg,
    /// Full SVG document including the XML prolog.
    SvgDocument,
    /// The DOT source itself.
    Dot,
    Xdot,
    Plain,
    PlainExt,
    Ps,
    Ps2,
    Json,
    Json0,
}

impl OutputKind {
    pub const ALL: [OutputKind; 11] = [
        OutputKind::Png,
        OutputKind::Svg,
        OutputKind::SvgDocument,
        OutputKind::Dot,
        OutputKind::Xdot,
        OutputKind::Plain,
        OutputKind::PlainExt,
        OutputKind::Ps,
        OutputKind::Ps2,
        OutputKind::Json,
        OutputKind::Json0,
    ];

    /// Name accepted by [`FromStr`] and shown by the CLI.
    pub fn name(self) -> &'static str {
        match self {
            OutputKind::Png => "png",
            OutputKind::Svg => "svg",
            OutputKind::SvgDocument => "svg-document",
            OutputKind::Dot => "dot",
            OutputKind::Xdot => "xdot",
            OutputKind::Plain => "plain",
            OutputKind::PlainExt => "plain-ext",
            OutputKind::Ps => "ps",
            OutputKind::Ps2 => "ps2",
            OutputKind::Json => "json",
            OutputKind::Json0 => "json0",
        }
    }

    /// Format token passed to the engine (`dot -T<token>`).
    pub fn engine_token(self) -> &'static str {
        match self {
            OutputKind::Png | OutputKind::Svg | OutputKind::SvgDocument => "svg",
            other => other.name(),
        }
    }

    /// File extension used by [`crate::Renderer::to_file`].
    pub fn file_extension(self) -> &'static str {
        match self {
            OutputKind::Png => "png",
            OutputKind::Svg | OutputKind::SvgDocument => "svg",
            OutputKind::Plain | OutputKind::PlainExt => "txt",
            OutputKind::Ps | OutputKind::Ps2 => "ps",
            OutputKind::Json | OutputKind::Json0 => "json",
            OutputKind::Dot => "dot",
            OutputKind::Xdot => "xdot",
        }
    }

    /// Whether the final product is a bitmap.
    pub fn is_image(self) -> bool {
        self == OutputKind::Png
    }

    /// Whether the engine is asked for SVG.
    pub fn is_svg(self) -> bool {
        matches!(
            self,
            OutputKind::Png | OutputKind::Svg | OutputKind::SvgDocument
        )
    }

    /// Whether post-processing drops everything before the root `<svg>` tag.
    fn strips_prolog(self) -> bool {
        matches!(self, OutputKind::Png | OutputKind::Svg)
    }

    /// Rewrite the source before it is handed to an engine.
    ///
    /// ASCII control characters other than tab, newline and carriage return
    /// are removed; `dot` rejects them outright.
    pub fn pre_process(self, source: &str) -> String {
        source
            .chars()
            .filter(|c| !c.is_ascii_control() || matches!(c, '\t' | '\n' | '\r'))
            .collect()
    }

    /// Repair an engine result for this kind.
    ///
    /// `source` is the original graph text, read for its `dpi` attribute.
    /// Non-SVG kinds and binary results pass through unchanged.
    pub fn post_process(
        self,
        result: EngineResult,
        source: &str,
        geometry: &Geometry,
        font_adjust: f64,
    ) -> EngineResult {
        if !self.is_svg() {
            return result;
        }
        let dpi = gvrender_svg::source_dpi(source);
        let strip = self.strips_prolog();
        result.map_text(|svg| gvrender_svg::post_process(svg, strip, geometry, dpi, font_adjust))
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OutputKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        match normalized.as_str() {
            "svg-document" | "svg-doc" | "svgdocument" => Ok(OutputKind::SvgDocument),
            "plainext" => Ok(OutputKind::PlainExt),
            "gv" => Ok(OutputKind::Dot),
            "txt" => Ok(OutputKind::Plain),
            other => OutputKind::ALL
                .into_iter()
                .find(|kind| kind.name() == other)
                .ok_or_else(|| {
                    let names: Vec<&str> = OutputKind::ALL.iter().map(|k| k.name()).collect();
                    format!("unknown output kind '{s}' (expected one of: {})", names.join(", "))
                }),
        }
    }
}
