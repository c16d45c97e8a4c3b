//! Engine providers and capability probes.
//!
//! A provider is the probe-and-load front of one candidate engine. The
//! resolver asks each provider whether its engine is usable here, then loads
//! the one it picks.

use crate::cpu::CpuEngine;
use crate::engine::{Engine, EngineKind};
use crate::error::Result;
use std::fmt;
use std::sync::Arc;

/// Outcome of asking whether an engine is usable in this environment.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "status", rename_all = "lowercase"))]
pub enum ProbeOutcome {
    /// The engine can be loaded.
    Available,
    /// The engine is not installed or there is no device.
    Absent {
        /// Why the engine is absent
        reason: String,
    },
    /// The engine is present but the capability query itself failed.
    Broken {
        /// Description of the failure
        reason: String,
    },
}

impl ProbeOutcome {
    /// Create an Absent outcome.
    pub fn absent<S: Into<String>>(reason: S) -> Self {
        Self::Absent {
            reason: reason.into(),
        }
    }

    /// Create a Broken outcome.
    pub fn broken<S: Into<String>>(reason: S) -> Self {
        Self::Broken {
            reason: reason.into(),
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available)
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent { .. })
    }

    pub fn is_broken(&self) -> bool {
        matches!(self, Self::Broken { .. })
    }

    /// The reason attached to a non-available outcome.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Available => None,
            Self::Absent { reason } | Self::Broken { reason } => Some(reason),
        }
    }
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Available => write!(f, "available"),
            Self::Absent { reason } => write!(f, "absent ({reason})"),
            Self::Broken { reason } => write!(f, "broken ({reason})"),
        }
    }
}

/// Probe-and-load front of one candidate engine.
pub trait EngineProvider: fmt::Debug + Send + Sync {
    /// Kind of engine this provider loads.
    fn kind(&self) -> EngineKind;

    /// Provider name, used in logs and diagnostics.
    fn name(&self) -> &str;

    /// Checks whether the engine is usable. Must not panic.
    fn probe(&self) -> ProbeOutcome;

    /// Loads the engine. Only called after a successful probe.
    fn load(&self) -> Result<Arc<dyn Engine>>;
}

/// Provider for the host engine. Always available.
#[derive(Debug, Clone, Default)]
pub struct CpuProvider {
    engine: CpuEngine,
}

impl CpuProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider handing out a CPU engine with custom thresholds.
    pub fn with_engine(engine: CpuEngine) -> Self {
        Self { engine }
    }
}

impl EngineProvider for CpuProvider {
    fn kind(&self) -> EngineKind {
        EngineKind::Cpu
    }

    fn name(&self) -> &str {
        "cpu"
    }

    fn probe(&self) -> ProbeOutcome {
        ProbeOutcome::Available
    }

    fn load(&self) -> Result<Arc<dyn Engine>> {
        Ok(Arc::new(self.engine))
    }
}

/// Provider for the CUDA engine on one device ordinal.
///
/// Without the `cuda` feature the probe always reports the engine as absent.
#[derive(Debug, Clone, Default)]
pub struct CudaProvider {
    ordinal: usize,
}

impl CudaProvider {
    /// Provider for the device at `ordinal`.
    pub fn new(ordinal: usize) -> Self {
        Self { ordinal }
    }

    pub fn ordinal(&self) -> usize {
        self.ordinal
    }
}

impl EngineProvider for CudaProvider {
    fn kind(&self) -> EngineKind {
        EngineKind::Gpu
    }

    fn name(&self) -> &str {
        "cuda"
    }

    #[cfg(feature = "cuda")]
    fn probe(&self) -> ProbeOutcome {
        crate::gpu::probe_device(self.ordinal)
    }

    #[cfg(not(feature = "cuda"))]
    fn probe(&self) -> ProbeOutcome {
        ProbeOutcome::absent("built without the `cuda` feature")
    }

    #[cfg(feature = "cuda")]
    fn load(&self) -> Result<Arc<dyn Engine>> {
        let engine = crate::gpu::GpuEngine::open(self.ordinal)?;
        Ok(Arc::new(engine))
    }

    #[cfg(not(feature = "cuda"))]
    fn load(&self) -> Result<Arc<dyn Engine>> {
        Err(crate::error::BackendError::gpu_unavailable(
            "built without the `cuda` feature",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_helpers() {
        assert!(ProbeOutcome::Available.is_available());
        assert_eq!(ProbeOutcome::Available.reason(), None);

        let absent = ProbeOutcome::absent("no device");
        assert!(absent.is_absent());
        assert_eq!(absent.reason(), Some("no device"));
        assert_eq!(absent.to_string(), "absent (no device)");

        let broken = ProbeOutcome::broken("driver mismatch");
        assert!(broken.is_broken());
        assert!(!broken.is_available());
        assert_eq!(broken.to_string(), "broken (driver mismatch)");
    }

    #[test]
    fn test_cpu_provider() {
        let provider = CpuProvider::new();
        assert_eq!(provider.kind(), EngineKind::Cpu);
        assert!(provider.probe().is_available());

        let engine = provider.load().unwrap();
        assert_eq!(engine.kind(), EngineKind::Cpu);
        assert_eq!(engine.name(), "cpu");
    }

    #[cfg(not(feature = "cuda"))]
    #[test]
    fn test_cuda_provider_without_feature() {
        use crate::error::BackendError;

        let provider = CudaProvider::new(0);
        assert_eq!(provider.kind(), EngineKind::Gpu);
        assert!(provider.probe().is_absent());
        assert!(matches!(
            provider.load(),
            Err(BackendError::GpuUnavailable { .. })
        ));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_outcome_serialization() {
        let json = serde_json::to_string(&ProbeOutcome::absent("no device")).unwrap();
        assert_eq!(json, r#"{"status":"absent","reason":"no device"}"#);

        let back: ProbeOutcome = serde_json::from_str(r#"{"status":"available"}"#).unwrap();
        assert_eq!(back, ProbeOutcome::Available);
    }
}
