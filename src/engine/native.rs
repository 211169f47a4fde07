//! In-process engine backed by the `layout-rs` crate.

use super::{Engine, EngineResult, Layout, Options};
use crate::error::EngineError;
use crate::rasterizer::Rasterizer;
use layout::backends::svg::SVGWriter;
use layout::gv;
use std::panic::{AssertUnwindSafe, catch_unwind};

const SMOKE_GRAPH: &str = "digraph smoke { a -> b; }";

/// Renders SVG without any external process or network access.
///
/// `layout-rs` implements a subset of DOT with a single hierarchical layout.
#[derive(Debug, Default)]
pub struct NativeEngine;

impl NativeEngine {
    pub fn new() -> Self {
        Self
    }
}

fn render_svg(source: &str) -> Result<String, EngineError> {
    let result = catch_unwind(AssertUnwindSafe(|| {
        let mut parser = gv::DotParser::new(source);
        let graph = parser.process().map_err(EngineError::RenderFailed)?;

        let mut builder = gv::GraphBuilder::new();
        builder.visit_graph(&graph);
        let mut visual = builder.get();

        let mut svg = SVGWriter::new();
        visual.do_it(false, false, false, &mut svg);
        Ok(svg.finalize())
    }));
    result.unwrap_or_else(|_| {
        Err(EngineError::RenderFailed(
            "layout engine panicked while rendering".to_string(),
        ))
    })
}

impl Engine for NativeEngine {
    fn name(&self) -> &str {
        "native"
    }

    fn init(&self) -> Result<(), EngineError> {
        render_svg(SMOKE_GRAPH).map(|_| ())
    }

    fn execute(
        &self,
        source: &str,
        options: &Options,
        _rasterizer: Option<&dyn Rasterizer>,
    ) -> Result<EngineResult, EngineError> {
        if !options.kind.is_svg() {
            return Err(EngineError::Unsupported(format!(
                "native engine only produces SVG, not {}",
                options.kind
            )));
        }
        if options.layout != Layout::Dot {
            crate::debug_log!(
                "ENGINE",
                "native: layout '{}' ignored, using hierarchical layout",
                options.layout
            );
        }
        render_svg(source).map(EngineResult::Text)
    }
}
