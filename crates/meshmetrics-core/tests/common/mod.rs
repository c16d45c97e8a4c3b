//! Scripted providers and engines shared by the integration tests.

#![allow(dead_code)]

use meshmetrics_core::{
    ArrayEngine, BackendError, BackendResolver, DeviceInfo, Engine, EngineKind, EngineProvider,
    ProbeOutcome, ResolverConfig, Result,
};
use meshmetrics_core::types::Scalar;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Stand-in for a GPU engine; every operation uses the portable defaults.
#[derive(Debug)]
pub struct FakeGpuEngine;

impl<T: Scalar> ArrayEngine<T> for FakeGpuEngine {
    fn can_transfer(&self) -> bool {
        true
    }
}

impl Engine for FakeGpuEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Gpu
    }

    fn name(&self) -> &str {
        "fake-cuda"
    }

    fn device_info(&self) -> Option<DeviceInfo> {
        Some(DeviceInfo {
            name: "Fake Device".to_string(),
            ordinal: 0,
            total_memory: 1 << 30,
            free_memory: 1 << 29,
        })
    }

    fn f32_ops(&self) -> &dyn ArrayEngine<f32> {
        self
    }

    fn f64_ops(&self) -> &dyn ArrayEngine<f64> {
        self
    }
}

/// Provider with a fixed probe outcome that counts probes and loads.
#[derive(Debug)]
pub struct ScriptedProvider {
    kind: EngineKind,
    outcome: ProbeOutcome,
    fail_load: bool,
    probes: AtomicUsize,
    loads: AtomicUsize,
}

impl ScriptedProvider {
    pub fn gpu(outcome: ProbeOutcome) -> Arc<Self> {
        Arc::new(Self {
            kind: EngineKind::Gpu,
            outcome,
            fail_load: false,
            probes: AtomicUsize::new(0),
            loads: AtomicUsize::new(0),
        })
    }

    /// A CPU provider whose engine is missing.
    pub fn missing_cpu() -> Arc<Self> {
        Arc::new(Self {
            kind: EngineKind::Cpu,
            outcome: ProbeOutcome::absent("cpu engine not installed"),
            fail_load: true,
            probes: AtomicUsize::new(0),
            loads: AtomicUsize::new(0),
        })
    }

    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl EngineProvider for ScriptedProvider {
    fn kind(&self) -> EngineKind {
        self.kind
    }

    fn name(&self) -> &str {
        match self.kind {
            EngineKind::Gpu => "fake-cuda",
            EngineKind::Cpu => "fake-cpu",
        }
    }

    fn probe(&self) -> ProbeOutcome {
        self.probes.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }

    fn load(&self) -> Result<Arc<dyn Engine>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.fail_load {
            return Err(BackendError::missing_dependency(self.kind, "load failed"));
        }
        match self.kind {
            EngineKind::Gpu => Ok(Arc::new(FakeGpuEngine)),
            EngineKind::Cpu => Ok(Arc::new(meshmetrics_core::CpuEngine::new())),
        }
    }
}

/// Resolver over `config` whose GPU provider is `gpu`.
pub fn resolver_with_gpu(config: ResolverConfig, gpu: Arc<ScriptedProvider>) -> BackendResolver {
    BackendResolver::new(config).with_gpu_provider(gpu)
}
