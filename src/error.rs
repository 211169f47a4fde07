//! Error types for engines and the rendering pipeline.

use std::time::Duration;

/// Errors reported by a single rendering engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A required external command was not found.
    #[error("command not found: {0}")]
    CommandNotFound(String),
    /// An external command ran but exited unsuccessfully.
    #[error("command failed: {0}")]
    CommandFailed(String),
    /// A network request failed.
    #[error("network error: {0}")]
    NetworkError(String),
    /// The engine failed to produce output.
    #[error("render failed: {0}")]
    RenderFailed(String),
    /// The engine cannot produce the requested output.
    #[error("unsupported by this engine: {0}")]
    Unsupported(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors surfaced to callers of the rendering API.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// No engine became ready within the wait ceiling.
    #[error("no engine became ready within {}s", .0.as_secs_f64())]
    InitTimeout(Duration),
    /// Every candidate engine failed to initialize.
    #[error("none of the provided engines could be initialized")]
    NoEngineAvailable,
    /// The active engine failed while executing a request.
    #[error("engine '{engine}' failed: {source}")]
    Execution {
        engine: String,
        #[source]
        source: EngineError,
    },
    /// Vector output could not be turned into a bitmap.
    #[error("rasterization failed: {0}")]
    Rasterize(String),
    /// A bitmap was requested but no rasterizer is available.
    #[error("no rasterizer available; enable the `rasterizer` feature or set one explicitly")]
    MissingRasterizer,
    /// An engine reported an error while being closed.
    #[error("engine '{engine}' failed to close: {source}")]
    Close {
        engine: String,
        #[source]
        source: EngineError,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Image(#[from] image::ImageError),
}
