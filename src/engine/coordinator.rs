//! Selection and caching of the active engine.
//!
//! [`EngineCoordinator::configure`] starts a handshake on a background
//! thread: candidates are initialized one after another until one succeeds.
//! The winner (or an "exhausted" marker) is published into a single-use
//! [`EngineSlot`]. Callers of [`EngineCoordinator::active_engine`] wait on
//! that slot outside the coordinator lock, bounded by the wait ceiling.
//!
//! A slot is replaced on every `configure`/`reset`. The old slot is
//! abandoned: a late publish into it is rejected and the publishing thread
//! closes the engine it tried to hand off.

use super::{Engine, default_engines};
use crate::error::RenderError;
use gvrender_config::Config;
use parking_lot::{Condvar, Mutex};
use std::sync::{Arc, LazyLock};
use std::thread;
use std::time::{Duration, Instant};

/// Default ceiling on how long callers wait for an engine to become ready.
pub const DEFAULT_INIT_TIMEOUT: Duration = Duration::from_secs(120);

type EngineFactory = Box<dyn Fn() -> Vec<Arc<dyn Engine>> + Send + Sync>;

/// Outcome of one handshake.
#[derive(Clone)]
enum SlotValue {
    Ready(Arc<dyn Engine>),
    /// Every candidate failed to initialize.
    Exhausted,
}

#[derive(Default)]
struct SlotState {
    value: Option<SlotValue>,
    abandoned: bool,
}

/// Single-occupancy rendezvous between the handshake thread and callers.
///
/// At most one value is ever published. The value stays in place after it
/// is read, so every waiter observes the same outcome.
struct EngineSlot {
    state: Mutex<SlotState>,
    changed: Condvar,
}

impl EngineSlot {
    fn new() -> Self {
        Self {
            state: Mutex::new(SlotState::default()),
            changed: Condvar::new(),
        }
    }

    /// Publish the handshake outcome. The value is handed back when the
    /// slot was abandoned or already holds a value.
    fn publish(&self, value: SlotValue) -> Result<(), SlotValue> {
        let mut state = self.state.lock();
        if state.abandoned || state.value.is_some() {
            return Err(value);
        }
        state.value = Some(value);
        self.changed.notify_all();
        Ok(())
    }

    /// Wait until a value is published, the slot is abandoned, or `timeout`
    /// elapses. Returns the published value, if any.
    fn wait(&self, timeout: Duration) -> Option<SlotValue> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while state.value.is_none() && !state.abandoned {
            if self.changed.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }
        state.value.clone()
    }

    /// Mark the slot dead and wake every waiter. Returns the published
    /// engine, which the caller is now responsible for closing.
    fn abandon(&self) -> Option<Arc<dyn Engine>> {
        let mut state = self.state.lock();
        state.abandoned = true;
        self.changed.notify_all();
        match state.value.take() {
            Some(SlotValue::Ready(engine)) => Some(engine),
            _ => None,
        }
    }
}

#[derive(Default)]
struct CoordinatorState {
    /// Slot of the current configuration cycle. `None` until first use.
    slot: Option<Arc<EngineSlot>>,
    /// Engine read from the current slot, cached for fast access.
    engine: Option<Arc<dyn Engine>>,
}

/// Owns the engine selection for one rendering context.
///
/// Most callers use the process-wide [`EngineCoordinator::global`]; tests
/// and embedders can create independent instances.
pub struct EngineCoordinator {
    state: Mutex<CoordinatorState>,
    default_engines: EngineFactory,
    wait_ceiling: Duration,
}

static GLOBAL: LazyLock<Arc<EngineCoordinator>> = LazyLock::new(|| {
    let config = Config::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config, using defaults: {e}");
        Config::default()
    });
    Arc::new(EngineCoordinator::from_config(&config))
});

impl Default for EngineCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineCoordinator {
    /// Coordinator with the built-in engine order and default settings.
    pub fn new() -> Self {
        Self::from_config(&Config::default())
    }

    /// Coordinator whose default engines and wait ceiling come from `config`.
    pub fn from_config(config: &Config) -> Self {
        let config = config.clone();
        let wait_ceiling = config.init_timeout();
        Self {
            state: Mutex::new(CoordinatorState::default()),
            default_engines: Box::new(move || default_engines(&config)),
            wait_ceiling,
        }
    }

    /// Coordinator using `factory` whenever the default engine list is needed.
    pub fn with_default_engines<F>(factory: F) -> Self
    where
        F: Fn() -> Vec<Arc<dyn Engine>> + Send + Sync + 'static,
    {
        Self {
            state: Mutex::new(CoordinatorState::default()),
            default_engines: Box::new(factory),
            wait_ceiling: DEFAULT_INIT_TIMEOUT,
        }
    }

    pub fn with_wait_ceiling(mut self, wait_ceiling: Duration) -> Self {
        self.wait_ceiling = wait_ceiling;
        self
    }

    pub fn wait_ceiling(&self) -> Duration {
        self.wait_ceiling
    }

    /// The process-wide coordinator, configured from the user's config file.
    pub fn global() -> Arc<EngineCoordinator> {
        Arc::clone(&GLOBAL)
    }

    /// Replace the candidate list and start a new handshake.
    ///
    /// The previously selected engine is closed; close failures are logged
    /// and otherwise ignored. An empty list means the default engines.
    pub fn configure(&self, engines: Vec<Arc<dyn Engine>>) {
        let engines = if engines.is_empty() {
            (self.default_engines)()
        } else {
            engines
        };

        let previous = {
            let mut state = self.state.lock();
            let previous = Self::discard(&mut state);
            self.start_handshake(&mut state, engines);
            previous
        };

        if let Some(engine) = previous
            && let Err(e) = engine.close()
        {
            log::warn!("Failed to close engine '{}': {}", engine.name(), e);
        }
    }

    /// The engine to dispatch to, waiting for the handshake if needed.
    ///
    /// Starts a handshake over the default engines when none was ever
    /// started. Once every candidate has failed, this keeps returning
    /// [`RenderError::NoEngineAvailable`] until the next `configure`.
    pub fn active_engine(&self) -> Result<Arc<dyn Engine>, RenderError> {
        let deadline = Instant::now() + self.wait_ceiling;
        loop {
            let slot = {
                let mut state = self.state.lock();
                if let Some(engine) = &state.engine {
                    return Ok(Arc::clone(engine));
                }
                match &state.slot {
                    Some(slot) => Arc::clone(slot),
                    None => {
                        crate::debug_info!("ENGINE", "No engine configured, starting defaults");
                        let engines = (self.default_engines)();
                        self.start_handshake(&mut state, engines)
                    }
                }
            };

            let value = slot.wait(deadline.saturating_duration_since(Instant::now()));

            let mut state = self.state.lock();
            let current = state
                .slot
                .as_ref()
                .is_some_and(|s| Arc::ptr_eq(s, &slot));
            if !current {
                // Reconfigured while waiting; follow the new slot
                drop(state);
                if Instant::now() >= deadline {
                    return Err(RenderError::InitTimeout(self.wait_ceiling));
                }
                continue;
            }

            return match value {
                Some(SlotValue::Ready(engine)) => {
                    state.engine = Some(Arc::clone(&engine));
                    Ok(engine)
                }
                Some(SlotValue::Exhausted) => Err(RenderError::NoEngineAvailable),
                None => Err(RenderError::InitTimeout(self.wait_ceiling)),
            };
        }
    }

    /// Drop the selected engine and the current slot.
    ///
    /// The next [`active_engine`](Self::active_engine) call starts over with
    /// the default engines. A close failure is reported after the state has
    /// already been cleared.
    pub fn reset(&self) -> Result<(), RenderError> {
        let previous = Self::discard(&mut self.state.lock());
        match previous {
            Some(engine) => engine.close().map_err(|source| RenderError::Close {
                engine: engine.name().to_string(),
                source,
            }),
            None => Ok(()),
        }
    }

    /// Clear the cache and abandon the slot. Returns the engine to close.
    fn discard(state: &mut CoordinatorState) -> Option<Arc<dyn Engine>> {
        let cached = state.engine.take();
        let published = state.slot.take().and_then(|slot| slot.abandon());
        cached.or(published)
    }

    fn start_handshake(
        &self,
        state: &mut CoordinatorState,
        engines: Vec<Arc<dyn Engine>>,
    ) -> Arc<EngineSlot> {
        let slot = Arc::new(EngineSlot::new());
        state.slot = Some(Arc::clone(&slot));
        state.engine = None;

        let names: Vec<&str> = engines.iter().map(|e| e.name()).collect();
        crate::debug_info!("ENGINE", "Starting handshake over [{}]", names.join(", "));

        let thread_slot = Arc::clone(&slot);
        let thread_engines = engines.clone();
        let spawned = thread::Builder::new()
            .name("gvrender-engine-init".to_string())
            .spawn(move || handshake(&thread_engines, &thread_slot));
        if let Err(e) = spawned {
            log::warn!("Failed to spawn engine init thread, initializing inline: {e}");
            handshake(&engines, &slot);
        }
        slot
    }
}

impl Drop for EngineCoordinator {
    fn drop(&mut self) {
        if let Some(engine) = Self::discard(self.state.get_mut())
            && let Err(e) = engine.close()
        {
            log::warn!("Failed to close engine '{}': {}", engine.name(), e);
        }
    }
}

/// Initialize candidates in order and publish the first one that succeeds.
fn handshake(engines: &[Arc<dyn Engine>], slot: &EngineSlot) {
    for engine in engines {
        crate::debug_log!("ENGINE", "Initializing '{}'", engine.name());
        match engine.init() {
            Ok(()) => {
                log::info!("Using engine '{}'", engine.name());
                if let Err(SlotValue::Ready(rejected)) =
                    slot.publish(SlotValue::Ready(Arc::clone(engine)))
                {
                    crate::debug_info!(
                        "ENGINE",
                        "Slot abandoned before '{}' was ready, closing it",
                        rejected.name()
                    );
                    if let Err(e) = rejected.close() {
                        log::warn!("Failed to close engine '{}': {}", rejected.name(), e);
                    }
                }
                return;
            }
            Err(e) => {
                log::warn!("Engine '{}' could not be initialized: {}", engine.name(), e);
            }
        }
    }
    crate::debug_error!("ENGINE", "No candidate engine could be initialized");
    let _ = slot.publish(SlotValue::Exhausted);
}
