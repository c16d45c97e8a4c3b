//! Backend resolution.
//!
//! [`BackendResolver`] decides once which engine the rest of the library
//! uses. It probes the GPU provider (unless the CPU was requested), applies
//! the configured preference and broken-GPU policy, and loads the chosen
//! engine into a [`Backend`].
//!
//! # Example
//!
//! ```
//! use meshmetrics_core::{BackendPreference, BackendResolver, EngineKind, ResolverConfig};
//!
//! let config = ResolverConfig::builder()
//!     .preference(BackendPreference::Cpu)
//!     .build();
//! let backend = BackendResolver::new(config).resolve().unwrap();
//!
//! assert_eq!(backend.kind(), EngineKind::Cpu);
//! let x = backend.ops::<f64>().linspace(0.0, 4.0, 5);
//! assert_eq!(backend.ops::<f64>().sum(&x).unwrap(), 10.0);
//! ```

use crate::config::{BackendPreference, BrokenGpuPolicy, ResolverConfig};
use crate::engine::{ArrayEngine, DeviceInfo, Engine, EngineKind};
use crate::error::{BackendError, Result};
use crate::probe::{CpuProvider, CudaProvider, EngineProvider, ProbeOutcome};
use crate::types::Scalar;
use std::fmt;
use std::sync::Arc;

/// Why the resolver bound the engine it did.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "reason", rename_all = "snake_case"))]
pub enum ResolutionReason {
    /// The GPU engine was usable
    GpuAvailable,
    /// The GPU engine is not installed or has no device
    GpuAbsent {
        /// Probe detail
        detail: String,
    },
    /// The GPU engine is present but broken; the CPU fallback was taken
    GpuBroken {
        /// Probe or load failure
        detail: String,
    },
    /// The configuration asked for the CPU engine
    CpuRequested,
    /// The configuration asked for the GPU engine
    GpuRequested,
}

impl fmt::Display for ResolutionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GpuAvailable => write!(f, "GPU engine available"),
            Self::GpuAbsent { detail } => write!(f, "GPU engine absent: {detail}"),
            Self::GpuBroken { detail } => write!(f, "GPU engine broken, fell back to CPU: {detail}"),
            Self::CpuRequested => write!(f, "CPU engine requested"),
            Self::GpuRequested => write!(f, "GPU engine requested"),
        }
    }
}

/// Which engine was bound, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Resolution {
    /// Bound engine
    pub kind: EngineKind,
    /// Why it was chosen
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub reason: ResolutionReason,
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.kind, self.reason)
    }
}

/// The engine the resolver would pick, before anything is loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Selected resolution
    pub resolution: Resolution,
    /// GPU probe outcome, if the GPU was probed
    pub gpu_probe: Option<ProbeOutcome>,
}

/// A resolved backend: one bound engine plus the record of its resolution.
///
/// Cloning is cheap and every clone shares the same engine.
#[derive(Clone)]
pub struct Backend {
    engine: Arc<dyn Engine>,
    resolution: Resolution,
}

impl Backend {
    /// Wraps an already loaded engine.
    pub fn new(engine: Arc<dyn Engine>, resolution: Resolution) -> Self {
        Self { engine, resolution }
    }

    pub fn kind(&self) -> EngineKind {
        self.engine.kind()
    }

    pub fn is_gpu(&self) -> bool {
        self.kind() == EngineKind::Gpu
    }

    /// Engine name (`"cpu"`, `"cuda"`, ...).
    pub fn name(&self) -> &str {
        self.engine.name()
    }

    /// The bound engine.
    pub fn engine(&self) -> &dyn Engine {
        self.engine.as_ref()
    }

    /// Operation surface for the precision `T`.
    pub fn ops<T: Scalar>(&self) -> &dyn ArrayEngine<T> {
        self.engine().ops::<T>()
    }

    pub fn resolution(&self) -> &Resolution {
        &self.resolution
    }

    pub fn device_info(&self) -> Option<DeviceInfo> {
        self.engine.device_info()
    }

    /// Whether both handles share the same engine instance.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&a.engine), Arc::as_ptr(&b.engine))
    }
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backend")
            .field("engine", &self.engine)
            .field("resolution", &self.resolution)
            .finish()
    }
}

/// Resolves the array backend from a configuration and two providers.
#[derive(Debug, Clone)]
pub struct BackendResolver {
    config: ResolverConfig,
    gpu: Arc<dyn EngineProvider>,
    cpu: Arc<dyn EngineProvider>,
}

impl BackendResolver {
    /// Resolver with the default providers for `config`.
    pub fn new(config: ResolverConfig) -> Self {
        let gpu = Arc::new(CudaProvider::new(config.gpu_ordinal));
        Self {
            config,
            gpu,
            cpu: Arc::new(CpuProvider::new()),
        }
    }

    /// Resolver configured from the `MESHMETRICS_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(ResolverConfig::from_env()?))
    }

    /// Replaces the GPU provider.
    pub fn with_gpu_provider(mut self, provider: Arc<dyn EngineProvider>) -> Self {
        self.gpu = provider;
        self
    }

    /// Replaces the CPU provider.
    pub fn with_cpu_provider(mut self, provider: Arc<dyn EngineProvider>) -> Self {
        self.cpu = provider;
        self
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn gpu_provider(&self) -> &dyn EngineProvider {
        self.gpu.as_ref()
    }

    pub fn cpu_provider(&self) -> &dyn EngineProvider {
        self.cpu.as_ref()
    }

    /// Decides which engine would be bound, without loading it.
    ///
    /// Probes the GPU provider at most once.
    pub fn select(&self) -> Result<Selection> {
        self.select_with(|| self.gpu.probe())
    }

    pub(crate) fn select_with<F>(&self, probe_gpu: F) -> Result<Selection>
    where
        F: FnOnce() -> ProbeOutcome,
    {
        let (reason, gpu_probe) = match self.config.preference {
            BackendPreference::Cpu => (ResolutionReason::CpuRequested, None),
            BackendPreference::Gpu => {
                let outcome = probe_gpu();
                tracing::debug!(provider = self.gpu.name(), outcome = %outcome, "probed GPU engine");
                if !outcome.is_available() {
                    return Err(BackendError::gpu_unavailable(outcome.to_string()));
                }
                (ResolutionReason::GpuRequested, Some(outcome))
            }
            BackendPreference::Auto => {
                let outcome = probe_gpu();
                tracing::debug!(provider = self.gpu.name(), outcome = %outcome, "probed GPU engine");
                let reason = match &outcome {
                    ProbeOutcome::Available => ResolutionReason::GpuAvailable,
                    ProbeOutcome::Absent { reason } => ResolutionReason::GpuAbsent {
                        detail: reason.clone(),
                    },
                    ProbeOutcome::Broken { reason } => self.on_broken(reason)?,
                };
                (reason, Some(outcome))
            }
        };

        let kind = match reason {
            ResolutionReason::GpuAvailable | ResolutionReason::GpuRequested => EngineKind::Gpu,
            _ => EngineKind::Cpu,
        };

        Ok(Selection {
            resolution: Resolution { kind, reason },
            gpu_probe,
        })
    }

    /// Probes, selects and loads the engine.
    ///
    /// Each call probes again and loads a fresh engine; the process-wide
    /// handle in [`crate::handle`] is what makes resolution happen once.
    pub fn resolve(&self) -> Result<Backend> {
        let selection = self.select()?;
        let resolution = selection.resolution;

        let backend = match resolution.kind {
            EngineKind::Gpu => match self.gpu.load() {
                Ok(engine) => Backend::new(engine, resolution),
                Err(err) if self.config.preference == BackendPreference::Gpu => {
                    return Err(BackendError::gpu_unavailable(err.to_string()));
                }
                Err(err) => {
                    let reason = self.on_broken(&err.to_string())?;
                    self.load_cpu(reason)?
                }
            },
            EngineKind::Cpu => self.load_cpu(resolution.reason)?,
        };

        tracing::info!(
            engine = backend.name(),
            resolution = %backend.resolution(),
            "array backend resolved"
        );
        Ok(backend)
    }

    fn on_broken(&self, detail: &str) -> Result<ResolutionReason> {
        match self.config.on_broken_gpu {
            BrokenGpuPolicy::FallBack => {
                tracing::warn!(
                    provider = self.gpu.name(),
                    reason = detail,
                    "GPU engine is present but unusable, falling back to the CPU engine"
                );
                Ok(ResolutionReason::GpuBroken {
                    detail: detail.to_string(),
                })
            }
            BrokenGpuPolicy::Fail => Err(BackendError::probe_failed(detail)),
        }
    }

    /// Fails with `MissingDependency` unless the CPU provider probes available.
    pub(crate) fn check_cpu(&self) -> Result<()> {
        match self.cpu.probe().reason() {
            Some(detail) => Err(BackendError::missing_dependency(EngineKind::Cpu, detail)),
            None => Ok(()),
        }
    }

    fn load_cpu(&self, reason: ResolutionReason) -> Result<Backend> {
        self.check_cpu()?;
        let engine = self
            .cpu
            .load()
            .map_err(|err| BackendError::missing_dependency(EngineKind::Cpu, err.to_string()))?;

        Ok(Backend::new(
            engine,
            Resolution {
                kind: EngineKind::Cpu,
                reason,
            },
        ))
    }
}

impl Default for BackendResolver {
    fn default() -> Self {
        Self::new(ResolverConfig::default())
    }
}
