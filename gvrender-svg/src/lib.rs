//! Text-level repair of Graphviz SVG output.
//!
//! Graphviz sizes its SVG in points and leaves font sizes untouched by any
//! caller-side scaling. This crate fixes both without parsing the document:
//!
//! - [`geometry`]: root width/height override, points→pixels conversion and
//!   DPI-aware correction of the inner scale transform
//! - [`font`]: proportional `font-size` adjustment
//!
//! Everything here is best-effort. Output that does not look like Graphviz
//! SVG is returned unchanged.

pub mod font;
pub mod geometry;

pub use font::adjust_font_size;
pub use geometry::{
    DEFAULT_DPI, Geometry, correct_geometry, pixel_scale, pixel_size, source_dpi, target_size,
    view_box_size,
};

/// Drop everything before the root `<svg ` tag (XML prolog, doctype, comments).
///
/// Returns the input unchanged when there is no root tag.
pub fn strip_prolog(svg: &str) -> &str {
    svg.find("<svg ").map_or(svg, |pos| &svg[pos..])
}

/// Run the full post-processing chain on one SVG payload.
///
/// `dpi` is the resolution declared in the graph source (see [`source_dpi`]).
pub fn post_process(
    svg: &str,
    strip: bool,
    geometry: &Geometry,
    dpi: f64,
    font_adjust: f64,
) -> String {
    let body = if strip { strip_prolog(svg) } else { svg };
    let sized = correct_geometry(body, geometry, dpi);
    adjust_font_size(&sized, font_adjust).into_owned()
}
