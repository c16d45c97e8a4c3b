//! The process-wide handle, resolved lazily from the environment.
//!
//! Each integration test file is its own process, so this file owns the
//! global handle.

use meshmetrics_core::{install, resolved, xp, Backend, BackendError, BackendResolver, EngineKind};

#[test]
fn test_xp_is_stable_and_rejects_rebinding() {
    let first = xp().unwrap();
    let second = xp().unwrap();
    assert!(Backend::ptr_eq(first, second));

    let peeked = resolved().unwrap();
    assert!(Backend::ptr_eq(first, peeked));

    #[cfg(not(feature = "cuda"))]
    assert_eq!(first.kind(), EngineKind::Cpu);

    let err = install(&BackendResolver::default()).unwrap_err();
    assert_eq!(err, BackendError::AlreadyResolved { kind: first.kind() });

    let ops = first.ops::<f64>();
    let x = ops.from_slice(&[1.0, -2.0, 3.0]);
    assert_eq!(ops.sum(&x).unwrap(), 2.0);
}

#[test]
fn test_xp_from_other_threads() {
    let here = xp().unwrap();
    let kinds: Vec<EngineKind> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| xp().map(Backend::kind)))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap())
            .collect()
    });

    assert!(kinds.iter().all(|&kind| kind == here.kind()));
}
