//! Root-element size and scale-transform correction.
//!
//! The anchor pattern is the contract with the backend's SVG output:
//!
//! ```text
//! <svg width="<W><unit>" height="<H><unit>"<attributes>>
//! <g<attributes> transform="scale(<SX> <SY>)...
//! ```
//!
//! - `unit` is `pt` or `px` (the height unit is assumed equal to the width unit)
//! - `W`, `H` are unsigned decimals, `SX`, `SY` are unsigned decimals
//! - `width` must be the first attribute of the root tag and `height` the second
//! - the root tag ends a line and the next line opens the first `<g` group
//!
//! Graphviz does not version its SVG layout, so this pattern has to be
//! rechecked whenever the backend is upgraded.

use regex::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;

/// Resolution assumed when the graph source does not declare one.
pub const DEFAULT_DPI: f64 = 72.0;

static SVG_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r#"(?s)<svg width="(?P<width>\d+(?:\.\d+)?)(?P<unit>p[tx])" height="(?P<height>\d+(?:\.\d+)?)p[tx]""#,
        r#"(?P<between>.*?>(?:\r\n|\n|\r)<g.*?)transform="scale\((?P<scale_x>[0-9.]+) (?P<scale_y>[0-9.]+)\)"#,
    ))
    .expect("SVG_PATTERN regex is a compile-time constant and must be valid")
});

static DPI_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)"?dpi"?\s*=\s*"?([0-9.]+)"?"#)
        .expect("DPI_PATTERN regex is a compile-time constant and must be valid")
});

static PIXEL_SIZE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<svg width="(?P<width>\d+(?:\.\d+)?)px" height="(?P<height>\d+(?:\.\d+)?)px""#)
        .expect("PIXEL_SIZE_PATTERN regex is a compile-time constant and must be valid")
});

static VIEW_BOX_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"viewBox="\s*-?[0-9.]+[\s,]+-?[0-9.]+[\s,]+(?P<width>[0-9.]+)[\s,]+(?P<height>[0-9.]+)\s*""#)
        .expect("VIEW_BOX_PATTERN regex is a compile-time constant and must be valid")
});

/// Caller-requested output size.
///
/// `None` means "not set". `scale` multiplies whatever size results.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geometry {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub scale: f64,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            width: None,
            height: None,
            scale: 1.0,
        }
    }
}

/// Compute the final pixel size from a declared size and the caller's request.
///
/// Both explicit sides win verbatim; a single explicit side derives the other
/// one from the declared aspect ratio; no explicit side keeps the declared
/// size. The result is multiplied by `geometry.scale` and rounded.
pub fn target_size(declared_width: f64, declared_height: f64, geometry: &Geometry) -> (u32, u32) {
    let (width, height) = match (geometry.width, geometry.height) {
        (Some(w), Some(h)) => (f64::from(w), f64::from(h)),
        (Some(w), None) => {
            let w = f64::from(w);
            (w, proportional(declared_height, w, declared_width))
        }
        (None, Some(h)) => {
            let h = f64::from(h);
            (proportional(declared_width, h, declared_height), h)
        }
        (None, None) => (declared_width, declared_height),
    };
    (to_pixels(width * geometry.scale), to_pixels(height * geometry.scale))
}

fn proportional(value: f64, numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        value * numerator / denominator
    } else {
        value
    }
}

fn to_pixels(value: f64) -> u32 {
    // `as` saturates; NaN maps to 0
    value.round().max(0.0) as u32
}

/// Smallest divisor [`pixel_scale`] will return before giving up on correction.
const MIN_PIXEL_SCALE: f64 = 0.0001;

/// Divisor that turns a point-based scale transform into a pixel-based one.
///
/// `1.0` when the output is already in pixels, otherwise `dpi / 72` rounded
/// to four decimals. A resolution so small that the divisor rounds below
/// `0.0001` also yields `1.0` (no correction).
pub fn pixel_scale(unit_is_pixels: bool, dpi: f64) -> f64 {
    if unit_is_pixels {
        return 1.0;
    }
    let divisor = (10000.0 * dpi / 72.0).round() / 10000.0;
    if divisor.is_finite() && divisor >= MIN_PIXEL_SCALE {
        divisor
    } else {
        1.0
    }
}

/// Resolution declared in a graph source (`dpi=96`, `"dpi" = "96"`, `DPI=96`…).
///
/// Falls back to [`DEFAULT_DPI`] when absent or unparsable.
pub fn source_dpi(source: &str) -> f64 {
    DPI_PATTERN
        .captures(source)
        .and_then(|caps| caps[1].parse::<f64>().ok())
        .filter(|dpi| *dpi > 0.0)
        .unwrap_or(DEFAULT_DPI)
}

/// Root width/height when both are declared in pixels, as after
/// [`correct_geometry`].
pub fn pixel_size(svg: &str) -> Option<(f64, f64)> {
    let caps = PIXEL_SIZE_PATTERN.captures(svg)?;
    let width = caps["width"].parse::<f64>().ok()?;
    let height = caps["height"].parse::<f64>().ok()?;
    Some((width, height))
}

/// Width and height of the root `viewBox`, if the document declares one.
pub fn view_box_size(svg: &str) -> Option<(f64, f64)> {
    let caps = VIEW_BOX_PATTERN.captures(svg)?;
    let width = caps["width"].parse::<f64>().ok()?;
    let height = caps["height"].parse::<f64>().ok()?;
    Some((width, height))
}

/// Rewrite the root size in pixels and correct the inner scale transform.
///
/// Only the matched root-tag/transform region is replaced; the rest of the
/// document is copied through. Input that does not match the anchor pattern
/// is logged and returned unchanged.
pub fn correct_geometry<'a>(svg: &'a str, geometry: &Geometry, dpi: f64) -> Cow<'a, str> {
    let Some(caps) = SVG_PATTERN.captures(svg) else {
        log::warn!("Generated SVG has not the expected format. There might be image size problems.");
        return Cow::Borrowed(svg);
    };
    let Some(whole) = caps.get(0) else {
        return Cow::Borrowed(svg);
    };

    let parsed = (
        caps["width"].parse::<f64>(),
        caps["height"].parse::<f64>(),
        caps["scale_x"].parse::<f64>(),
        caps["scale_y"].parse::<f64>(),
    );
    let (Ok(declared_width), Ok(declared_height), Ok(scale_x), Ok(scale_y)) = parsed else {
        log::warn!("Generated SVG has unparsable size or scale values; leaving it unchanged.");
        return Cow::Borrowed(svg);
    };

    let divisor = pixel_scale(&caps["unit"] == "px", dpi);
    let (width, height) = target_size(declared_width, declared_height, geometry);
    log::debug!(
        "SVG geometry {declared_width}{unit}x{declared_height}{unit} -> {width}x{height}px (divisor {divisor})",
        unit = &caps["unit"]
    );

    let replacement = format!(
        "<svg width=\"{width}px\" height=\"{height}px\"{between}transform=\"scale({sx} {sy})",
        between = &caps["between"],
        sx = scale_x / divisor,
        sy = scale_y / divisor,
    );

    let mut out = String::with_capacity(svg.len() + 16);
    out.push_str(&svg[..whole.start()]);
    out.push_str(&replacement);
    out.push_str(&svg[whole.end()..]);
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graphviz_svg(width: &str, height: &str, scale: &str) -> String {
        format!(
            "<svg width=\"{width}\" height=\"{height}\"\n viewBox=\"0.00 0.00 100.00 50.00\" \
             xmlns=\"http://www.w3.org/2000/svg\">\n\
             <g id=\"graph0\" class=\"graph\" transform=\"scale({scale}) rotate(0) translate(4 46)\">\n\
             <polygon fill=\"white\" points=\"-4,4 -4,-46 96,-46 96,4 -4,4\"/>\n</g>\n</svg>\n"
        )
    }

    fn attr<'a>(svg: &'a str, name: &str) -> &'a str {
        let start = svg.find(&format!("{name}=\"")).expect("attribute present") + name.len() + 2;
        let end = start + svg[start..].find('"').expect("attribute closed");
        &svg[start..end]
    }

    fn transform(svg: &str) -> &str {
        let start = svg.find("transform=\"scale(").expect("transform present") + 17;
        let end = start + svg[start..].find(')').expect("transform closed");
        &svg[start..end]
    }

    #[test]
    fn test_dpi_and_scale_example() {
        let svg = graphviz_svg("100pt", "50pt", "1 1");
        let geometry = Geometry {
            scale: 2.0,
            ..Geometry::default()
        };
        let out = correct_geometry(&svg, &geometry, 96.0);
        assert_eq!(attr(&out, "width"), "200px");
        assert_eq!(attr(&out, "height"), "100px");
        let factor = 1.0 / 1.3333;
        assert_eq!(transform(&out), format!("{factor} {factor}"));
    }

    #[test]
    fn test_pixel_scale_rounding() {
        assert_eq!(pixel_scale(false, 96.0), 1.3333);
        assert_eq!(pixel_scale(false, 72.0), 1.0);
        assert_eq!(pixel_scale(false, 300.0), 4.1667);
        assert_eq!(pixel_scale(true, 300.0), 1.0);
    }

    #[test]
    fn test_width_only_preserves_aspect_ratio() {
        let svg = graphviz_svg("100pt", "50pt", "1.5 1.5");
        let geometry = Geometry {
            width: Some(300),
            ..Geometry::default()
        };
        let out = correct_geometry(&svg, &geometry, 96.0);
        assert_eq!(attr(&out, "width"), "300px");
        assert_eq!(attr(&out, "height"), "150px");
        let factor = 1.5 / 1.3333;
        assert_eq!(transform(&out), format!("{factor} {factor}"));
    }

    #[test]
    fn test_height_only_preserves_aspect_ratio() {
        let svg = graphviz_svg("100pt", "50pt", "1 1");
        let geometry = Geometry {
            height: Some(25),
            scale: 2.0,
            ..Geometry::default()
        };
        let out = correct_geometry(&svg, &geometry, DEFAULT_DPI);
        assert_eq!(attr(&out, "width"), "100px");
        assert_eq!(attr(&out, "height"), "50px");
    }

    #[test]
    fn test_both_sides_used_verbatim() {
        let svg = graphviz_svg("100pt", "50pt", "1 1");
        let geometry = Geometry {
            width: Some(40),
            height: Some(400),
            scale: 1.0,
        };
        let out = correct_geometry(&svg, &geometry, DEFAULT_DPI);
        assert_eq!(attr(&out, "width"), "40px");
        assert_eq!(attr(&out, "height"), "400px");
    }

    #[test]
    fn test_pixel_input_is_idempotent() {
        let svg = graphviz_svg("100pt", "50pt", "1.5 1.5");
        let once = correct_geometry(&svg, &Geometry::default(), 96.0).into_owned();
        let twice = correct_geometry(&once, &Geometry::default(), 96.0).into_owned();
        assert_eq!(once, twice);
        assert_eq!(attr(&twice, "width"), "100px");
    }

    #[test]
    fn test_px_unit_uses_divisor_one() {
        let svg = graphviz_svg("80px", "40px", "0.5 0.25");
        let out = correct_geometry(&svg, &Geometry::default(), 300.0);
        assert_eq!(transform(&out), "0.5 0.25");
    }

    #[test]
    fn test_rest_of_document_untouched() {
        let svg = graphviz_svg("100pt", "50pt", "1 1");
        let out = correct_geometry(&svg, &Geometry::default(), 96.0);
        let tail = "rotate(0) translate(4 46)\">\n<polygon fill=\"white\" points=\"-4,4 -4,-46 96,-46 96,4 -4,4\"/>\n</g>\n</svg>\n";
        assert!(out.ends_with(tail));
        assert!(out.contains("viewBox=\"0.00 0.00 100.00 50.00\""));
    }

    #[test]
    fn test_unexpected_format_returned_unchanged() {
        let svg = "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"10\"><rect/></svg>";
        let out = correct_geometry(svg, &Geometry::default(), 96.0);
        assert!(matches!(out, Cow::Borrowed(_)));
        assert_eq!(out, svg);
    }

    #[test]
    fn test_unparsable_scale_returned_unchanged() {
        let svg = graphviz_svg("100pt", "50pt", "1.2.3 1");
        let out = correct_geometry(&svg, &Geometry::default(), 96.0);
        assert_eq!(out, svg);
    }

    #[test]
    fn test_source_dpi_variants() {
        assert_eq!(source_dpi("digraph { dpi=96; a -> b }"), 96.0);
        assert_eq!(source_dpi("digraph { graph [\"DPI\" = \"150\"] }"), 150.0);
        assert_eq!(source_dpi("digraph { Dpi = 200.5 }"), 200.5);
        assert_eq!(source_dpi("digraph { a -> b }"), DEFAULT_DPI);
        assert_eq!(source_dpi("digraph { dpi=1.2.3 }"), DEFAULT_DPI);
    }

    #[test]
    fn test_target_size_rounds() {
        let geometry = Geometry {
            width: Some(33),
            ..Geometry::default()
        };
        assert_eq!(target_size(100.0, 50.0, &geometry), (33, 17));
        assert_eq!(target_size(62.4, 116.6, &Geometry::default()), (62, 117));
    }

    #[test]
    fn test_target_size_zero_declared() {
        let geometry = Geometry {
            width: Some(50),
            ..Geometry::default()
        };
        assert_eq!(target_size(0.0, 20.0, &geometry), (50, 20));
    }

    #[test]
    fn test_view_box_size() {
        let svg = graphviz_svg("100pt", "50pt", "1 1");
        assert_eq!(view_box_size(&svg), Some((100.0, 50.0)));
        assert_eq!(view_box_size("<svg/>"), None);
    }

    #[test]
    fn test_pixel_size_reads_corrected_root() {
        let svg = graphviz_svg("133pt", "67pt", "1.33333 1.33333");
        assert_eq!(pixel_size(&svg), None);
        let corrected = correct_geometry(&svg, &Geometry::default(), 96.0);
        assert_eq!(pixel_size(&corrected), Some((133.0, 67.0)));
    }

    #[test]
    fn test_tiny_dpi_leaves_scale_finite() {
        assert_eq!(pixel_scale(false, 0.001), 1.0);
        let svg = graphviz_svg("100pt", "50pt", "1 1");
        let out = correct_geometry(&svg, &Geometry::default(), 0.001);
        assert_eq!(transform(&out), "1 1");
        assert!(!out.contains("inf"));
    }
}
