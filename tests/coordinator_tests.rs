//! Engine selection, fallback, caching and lifecycle.

mod common;

use common::{MockEngine, coordinator, engines};
use gvrender::{Engine, EngineCoordinator, RenderError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn test_first_working_engine_is_selected() {
    let coordinator = coordinator();
    let first = MockEngine::working("first");
    let second = MockEngine::working("second");
    coordinator.configure(engines(&[&first, &second]));

    let engine = coordinator.active_engine().unwrap();
    assert_eq!(engine.name(), "first");
    assert_eq!(second.inits(), 0);
}

#[test]
fn test_falls_back_to_nth_engine() {
    let coordinator = coordinator();
    let a = MockEngine::failing("a");
    let b = MockEngine::failing("b");
    let c = MockEngine::working("c");
    let d = MockEngine::working("d");
    coordinator.configure(engines(&[&a, &b, &c, &d]));

    assert_eq!(coordinator.active_engine().unwrap().name(), "c");
    assert_eq!(a.inits(), 1);
    assert_eq!(b.inits(), 1);
    assert_eq!(c.inits(), 1);
    assert_eq!(d.inits(), 0, "candidates after the winner are never initialized");
}

#[test]
fn test_all_failing_reports_no_engine() {
    let coordinator = coordinator();
    let a = MockEngine::failing("a");
    let b = MockEngine::failing("b");
    coordinator.configure(engines(&[&a, &b]));

    let err = match coordinator.active_engine() {
        Err(e) => e,
        Ok(engine) => panic!("unexpected engine {}", engine.name()),
    };
    assert!(matches!(err, RenderError::NoEngineAvailable));
    assert_eq!(
        err.to_string(),
        "none of the provided engines could be initialized"
    );

    // Fails fast afterwards without re-running the handshake
    let start = Instant::now();
    assert!(coordinator.active_engine().is_err());
    assert!(start.elapsed() < Duration::from_secs(1));
    assert_eq!(a.inits(), 1);
    assert_eq!(b.inits(), 1);
}

#[test]
fn test_reconfigure_after_exhaustion_recovers() {
    let coordinator = coordinator();
    coordinator.configure(engines(&[&MockEngine::failing("a")]));
    assert!(coordinator.active_engine().is_err());

    coordinator.configure(engines(&[&MockEngine::working("b")]));
    assert_eq!(coordinator.active_engine().unwrap().name(), "b");
}

#[test]
fn test_empty_configure_uses_default_engines() {
    let default = MockEngine::working("default");
    let factory_engine = Arc::clone(&default);
    let coordinator = EngineCoordinator::with_default_engines(move || {
        vec![Arc::clone(&factory_engine) as Arc<dyn Engine>]
    });

    coordinator.configure(Vec::new());
    assert_eq!(coordinator.active_engine().unwrap().name(), "default");
}

#[test]
fn test_active_engine_starts_defaults_implicitly() {
    let default = MockEngine::working("default");
    let factory_engine = Arc::clone(&default);
    let coordinator = EngineCoordinator::with_default_engines(move || {
        vec![Arc::clone(&factory_engine) as Arc<dyn Engine>]
    });

    assert_eq!(coordinator.active_engine().unwrap().name(), "default");
    assert_eq!(default.inits(), 1);
}

#[test]
fn test_selection_is_cached() {
    let engine = MockEngine::working("cached");
    let coordinator = common::coordinator_with(&engine);

    for _ in 0..5 {
        assert_eq!(coordinator.active_engine().unwrap().name(), "cached");
    }
    assert_eq!(engine.inits(), 1);
}

#[test]
fn test_wait_ceiling_times_out() {
    let coordinator = Arc::new(
        EngineCoordinator::with_default_engines(Vec::new)
            .with_wait_ceiling(Duration::from_millis(50)),
    );
    let slow = MockEngine::slow("slow", Duration::from_millis(500));
    coordinator.configure(engines(&[&slow]));

    let start = Instant::now();
    match coordinator.active_engine() {
        Err(RenderError::InitTimeout(ceiling)) => assert_eq!(ceiling, Duration::from_millis(50)),
        Err(e) => panic!("unexpected error: {e}"),
        Ok(engine) => panic!("unexpected engine {}", engine.name()),
    }
    assert!(start.elapsed() < Duration::from_millis(450));
}

#[test]
fn test_reconfigure_closes_previous_engine() {
    let coordinator = coordinator();
    let old = MockEngine::working("old");
    coordinator.configure(engines(&[&old]));
    assert_eq!(coordinator.active_engine().unwrap().name(), "old");

    let new = MockEngine::working("new");
    coordinator.configure(engines(&[&new]));
    assert!(old.is_closed());
    assert_eq!(coordinator.active_engine().unwrap().name(), "new");
    assert!(!new.is_closed());
}

#[test]
fn test_reconfigure_during_handshake_closes_late_engine() {
    let coordinator = coordinator();
    let slow = MockEngine::slow("slow", Duration::from_millis(100));
    coordinator.configure(engines(&[&slow]));

    let fast = MockEngine::working("fast");
    coordinator.configure(engines(&[&fast]));
    assert_eq!(coordinator.active_engine().unwrap().name(), "fast");

    // The abandoned handshake finishes later and must close what it initialized
    let deadline = Instant::now() + Duration::from_secs(5);
    while !slow.is_closed() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }
    assert!(slow.is_closed());
    assert!(!fast.is_closed());
}

#[test]
fn test_reset_closes_and_reinitializes() {
    let default = MockEngine::working("default");
    let factory_engine = Arc::clone(&default);
    let coordinator = EngineCoordinator::with_default_engines(move || {
        vec![Arc::clone(&factory_engine) as Arc<dyn Engine>]
    });

    assert!(coordinator.active_engine().is_ok());
    coordinator.reset().unwrap();
    assert!(default.is_closed());

    assert!(coordinator.active_engine().is_ok());
    assert_eq!(default.inits(), 2);
}

#[test]
fn test_reset_without_selection() {
    assert!(coordinator().reset().is_ok());
}

#[test]
fn test_reset_reports_close_failure_after_clearing() {
    let coordinator = coordinator();
    let stubborn = MockEngine::failing_close("stubborn");
    coordinator.configure(engines(&[&stubborn]));
    assert!(coordinator.active_engine().is_ok());

    match coordinator.reset() {
        Err(RenderError::Close { engine, .. }) => assert_eq!(engine, "stubborn"),
        other => panic!("expected close error, got {other:?}"),
    }
    // State is already cleared: a second reset has nothing to close
    assert!(coordinator.reset().is_ok());
}

#[test]
fn test_concurrent_callers_share_one_engine() {
    let coordinator = coordinator();
    let slow = MockEngine::slow("shared", Duration::from_millis(50));
    coordinator.configure(engines(&[&slow]));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let coordinator = Arc::clone(&coordinator);
            thread::spawn(move || coordinator.active_engine().map(|e| e.name().to_string()))
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap().unwrap(), "shared");
    }
    assert_eq!(slow.inits(), 1);
}

#[test]
fn test_dropping_coordinator_closes_engine() {
    let engine = MockEngine::working("dropped");
    {
        let coordinator = common::coordinator_with(&engine);
        assert!(coordinator.active_engine().is_ok());
    }
    assert!(engine.is_closed());
}
