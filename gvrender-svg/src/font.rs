//! Proportional font-size adjustment.

use regex::{Captures, Regex};
use std::borrow::Cow;
use std::sync::LazyLock;

static FONT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"font-size="(.*?)""#)
        .expect("FONT_PATTERN regex is a compile-time constant and must be valid")
});

/// Multiply every `font-size="…"` value in `svg` by `factor`.
///
/// A factor of exactly `1.0` returns the input untouched. Values that do not
/// parse as a number are left as they are.
pub fn adjust_font_size(svg: &str, factor: f64) -> Cow<'_, str> {
    if factor == 1.0 {
        return Cow::Borrowed(svg);
    }
    FONT_PATTERN.replace_all(svg, |caps: &Captures| match caps[1].trim().parse::<f64>() {
        Ok(size) => format!("font-size=\"{}\"", size * factor),
        Err(_) => caps[0].to_string(),
    })
}
