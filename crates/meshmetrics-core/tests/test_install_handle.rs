//! Racing explicit installs of the process-wide handle.

mod common;

use common::{resolver_with_gpu, ScriptedProvider};
use meshmetrics_core::{install, resolved, xp, Backend, BackendError, EngineKind, ProbeOutcome, ResolverConfig};
use std::sync::Barrier;

#[test]
fn test_exactly_one_install_wins() {
    let gpu = ScriptedProvider::gpu(ProbeOutcome::Available);
    let resolver = resolver_with_gpu(ResolverConfig::default(), gpu.clone());
    let barrier = Barrier::new(8);

    let results: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                scope.spawn(|| {
                    barrier.wait();
                    install(&resolver)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    for result in &results {
        if let Err(err) = result {
            assert_eq!(*err, BackendError::AlreadyResolved { kind: EngineKind::Gpu });
        }
    }
    assert_eq!(gpu.probes(), 1);

    // The installed binding is what xp() returns
    let bound = xp().unwrap();
    assert_eq!(bound.name(), "fake-cuda");
    assert!(Backend::ptr_eq(bound, resolved().unwrap()));
}
