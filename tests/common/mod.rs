//! Shared integration test helpers for gvrender.
//!
//! Include with `mod common;` at the top of a test file. The
//! `#[allow(dead_code)]` attribute suppresses warnings when only a subset of
//! helpers is used per file.

#![allow(dead_code)]

use gvrender::{Engine, EngineCoordinator, EngineError, EngineResult, Graphviz, Options, Rasterizer};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// Graphviz-shaped SVG document, 100pt x 50pt.
pub const SAMPLE_SVG: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"no\"?>\n\
<!DOCTYPE svg PUBLIC \"-//W3C//DTD SVG 1.1//EN\"\n \"http://www.w3.org/Graphics/SVG/1.1/DTD/svg11.dtd\">\n\
<svg width=\"100pt\" height=\"50pt\"\n viewBox=\"0.00 0.00 100.00 50.00\" xmlns=\"http://www.w3.org/2000/svg\">\n\
<g id=\"graph0\" class=\"graph\" transform=\"scale(1 1) rotate(0) translate(4 46)\">\n\
<polygon fill=\"white\" stroke=\"none\" points=\"-4,4 -4,-46 96,-46 96,4 -4,4\"/>\n\
<text text-anchor=\"middle\" x=\"27\" y=\"-18.3\" font-family=\"Times,serif\" font-size=\"14.00\">a</text>\n\
</g>\n</svg>\n";

/// Scriptable engine recording how it is used.
pub struct MockEngine {
    name: String,
    init_ok: bool,
    init_delay: Duration,
    close_fails: bool,
    output: String,
    /// Bytes returned when a built-in rasterizer format is requested.
    built_in_output: Option<Vec<u8>>,
    pub init_calls: AtomicUsize,
    pub execute_calls: AtomicUsize,
    pub closed: AtomicBool,
    /// Source text of the last `execute` call.
    pub last_source: Mutex<Option<String>>,
    /// Options of the last `execute` call.
    pub last_options: Mutex<Option<Options>>,
    /// Built-in format token of the last `execute` call.
    pub last_built_in_format: Mutex<Option<String>>,
}

impl MockEngine {
    pub fn working(name: &str) -> Arc<Self> {
        Arc::new(Self::build(name, true))
    }

    pub fn failing(name: &str) -> Arc<Self> {
        Arc::new(Self::build(name, false))
    }

    pub fn slow(name: &str, delay: Duration) -> Arc<Self> {
        let mut engine = Self::build(name, true);
        engine.init_delay = delay;
        Arc::new(engine)
    }

    pub fn with_output(name: &str, output: &str) -> Arc<Self> {
        let mut engine = Self::build(name, true);
        engine.output = output.to_string();
        Arc::new(engine)
    }

    /// Engine that honors built-in rasterizer formats with `bytes`.
    pub fn with_built_in_output(name: &str, bytes: &[u8]) -> Arc<Self> {
        let mut engine = Self::build(name, true);
        engine.built_in_output = Some(bytes.to_vec());
        Arc::new(engine)
    }

    pub fn failing_close(name: &str) -> Arc<Self> {
        let mut engine = Self::build(name, true);
        engine.close_fails = true;
        Arc::new(engine)
    }

    fn build(name: &str, init_ok: bool) -> Self {
        Self {
            name: name.to_string(),
            init_ok,
            init_delay: Duration::ZERO,
            close_fails: false,
            output: SAMPLE_SVG.to_string(),
            built_in_output: None,
            init_calls: AtomicUsize::new(0),
            execute_calls: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            last_source: Mutex::new(None),
            last_options: Mutex::new(None),
            last_built_in_format: Mutex::new(None),
        }
    }

    pub fn inits(&self) -> usize {
        self.init_calls.load(Ordering::SeqCst)
    }

    pub fn executions(&self) -> usize {
        self.execute_calls.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Engine for MockEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&self) -> Result<(), EngineError> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        if !self.init_delay.is_zero() {
            std::thread::sleep(self.init_delay);
        }
        if self.init_ok {
            Ok(())
        } else {
            Err(EngineError::CommandNotFound(format!("{} is not installed", self.name)))
        }
    }

    fn execute(
        &self,
        source: &str,
        options: &Options,
        rasterizer: Option<&dyn Rasterizer>,
    ) -> Result<EngineResult, EngineError> {
        self.execute_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_source.lock() = Some(source.to_string());
        *self.last_options.lock() = Some(options.clone());
        let built_in_format = rasterizer.and_then(|r| r.built_in_format());
        *self.last_built_in_format.lock() = built_in_format.clone();
        if source.contains("syntax error") {
            return Err(EngineError::CommandFailed("syntax error in line 1".to_string()));
        }
        if let (Some(_), Some(bytes)) = (built_in_format, &self.built_in_output) {
            return Ok(EngineResult::Binary(bytes.clone()));
        }
        Ok(EngineResult::Text(self.output.clone()))
    }

    fn close(&self) -> Result<(), EngineError> {
        self.closed.store(true, Ordering::SeqCst);
        if self.close_fails {
            Err(EngineError::RenderFailed(format!("{} refused to close", self.name)))
        } else {
            Ok(())
        }
    }
}

/// Upcast a list of mocks for `configure`.
pub fn engines(mocks: &[&Arc<MockEngine>]) -> Vec<Arc<dyn Engine>> {
    mocks
        .iter()
        .map(|m| Arc::clone(*m) as Arc<dyn Engine>)
        .collect()
}

/// Independent coordinator whose default list is empty.
pub fn coordinator() -> Arc<EngineCoordinator> {
    Arc::new(EngineCoordinator::with_default_engines(Vec::new).with_wait_ceiling(Duration::from_secs(10)))
}

/// Independent coordinator configured with `engine` only.
pub fn coordinator_with(engine: &Arc<MockEngine>) -> Arc<EngineCoordinator> {
    let coordinator = coordinator();
    coordinator.configure(engines(&[engine]));
    coordinator
}

/// Request for `src` bound to `coordinator`.
pub fn request(src: &str, coordinator: &Arc<EngineCoordinator>) -> Graphviz {
    Graphviz::from_string(src).with_coordinator(Arc::clone(coordinator))
}
