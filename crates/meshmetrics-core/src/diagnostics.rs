//! Environment diagnosis.
//!
//! [`diagnose`] runs the same probe as the resolver and reports which engine
//! would be selected, without loading an engine or touching the process-wide
//! handle.

use crate::config::ResolverConfig;
use crate::engine::EngineKind;
use crate::probe::ProbeOutcome;
use crate::resolver::{BackendResolver, Resolution};
use once_cell::sync::Lazy;
use std::fmt;

/// SIMD features of the host CPU, detected at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CpuFeatures {
    /// AVX2 support (256-bit SIMD)
    pub avx2: bool,
    /// AVX-512 support (512-bit SIMD)
    pub avx512f: bool,
    /// FMA (Fused Multiply-Add) support
    pub fma: bool,
    /// SSE4.2 support
    pub sse42: bool,
    /// NEON support (ARM)
    pub neon: bool,
}

impl CpuFeatures {
    /// Detect CPU features at runtime.
    pub fn detect() -> Self {
        #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
        {
            Self {
                avx2: is_x86_feature_detected!("avx2"),
                avx512f: is_x86_feature_detected!("avx512f"),
                fma: is_x86_feature_detected!("fma"),
                sse42: is_x86_feature_detected!("sse4.2"),
                neon: false,
            }
        }

        #[cfg(target_arch = "aarch64")]
        {
            Self {
                avx2: false,
                avx512f: false,
                fma: false,
                sse42: false,
                neon: std::arch::is_aarch64_feature_detected!("neon"),
            }
        }

        #[cfg(not(any(target_arch = "x86", target_arch = "x86_64", target_arch = "aarch64")))]
        {
            Self {
                avx2: false,
                avx512f: false,
                fma: false,
                sse42: false,
                neon: false,
            }
        }
    }

    /// Widest SIMD register in bits, 64 when there is none.
    pub fn max_vector_width(&self) -> usize {
        if self.avx512f {
            512
        } else if self.avx2 {
            256
        } else if self.sse42 || self.neon {
            128
        } else {
            64
        }
    }
}

static CPU_FEATURES: Lazy<CpuFeatures> = Lazy::new(CpuFeatures::detect);

/// The host CPU features, detected once per process.
pub fn cpu_features() -> &'static CpuFeatures {
    &CPU_FEATURES
}

/// What [`diagnose`] found.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Diagnosis {
    /// Name of the engine that would be bound, if resolution would succeed
    pub engine: Option<String>,
    /// Selection record, if resolution would succeed
    pub resolution: Option<Resolution>,
    /// Why resolution would fail
    pub error: Option<String>,
    /// GPU probe outcome
    pub gpu_probe: ProbeOutcome,
    /// Configuration the diagnosis ran with
    pub config: ResolverConfig,
    /// Whether CUDA support was compiled in
    pub cuda_compiled: bool,
    /// Size of the rayon pool used by the CPU engine
    pub cpu_threads: usize,
    /// Host SIMD features
    pub cpu_features: CpuFeatures,
}

impl Diagnosis {
    /// Kind of the engine that would be bound.
    pub fn kind(&self) -> Option<EngineKind> {
        self.resolution.as_ref().map(|r| r.kind)
    }
}

impl fmt::Display for Diagnosis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.engine, &self.error) {
            (Some(engine), _) => writeln!(f, "{engine}")?,
            (None, Some(error)) => writeln!(f, "error: {error}")?,
            (None, None) => writeln!(f, "unresolved")?,
        }
        writeln!(
            f,
            "preference: {} (on broken GPU: {}, ordinal {})",
            self.config.preference, self.config.on_broken_gpu, self.config.gpu_ordinal
        )?;
        writeln!(f, "gpu probe: {}", self.gpu_probe)?;
        if let Some(resolution) = &self.resolution {
            writeln!(f, "resolution: {resolution}")?;
        }
        writeln!(f, "cuda support compiled: {}", if self.cuda_compiled { "yes" } else { "no" })?;
        write!(
            f,
            "cpu: {} threads, {}-bit SIMD",
            self.cpu_threads,
            self.cpu_features.max_vector_width()
        )
    }
}

/// Reports which engine `resolver` would bind, without binding it.
///
/// The GPU is always probed, even when the configuration requests the CPU,
/// so the report shows what the environment offers. When the CPU engine is
/// selected its provider is probed too, and a missing CPU engine is reported
/// as the error resolution would return.
pub fn diagnose(resolver: &BackendResolver) -> Diagnosis {
    let gpu_probe = resolver.gpu_provider().probe();
    let selection = resolver
        .select_with(|| gpu_probe.clone())
        .and_then(|selection| match selection.resolution.kind {
            EngineKind::Cpu => resolver.check_cpu().map(|()| selection),
            EngineKind::Gpu => Ok(selection),
        });

    let (engine, resolution, error) = match selection {
        Ok(selection) => {
            let name = match selection.resolution.kind {
                EngineKind::Gpu => resolver.gpu_provider().name(),
                EngineKind::Cpu => resolver.cpu_provider().name(),
            };
            (Some(name.to_string()), Some(selection.resolution), None)
        }
        Err(err) => (None, None, Some(err.to_string())),
    };

    Diagnosis {
        engine,
        resolution,
        error,
        gpu_probe,
        config: resolver.config().clone(),
        cuda_compiled: cfg!(feature = "cuda"),
        cpu_threads: rayon::current_num_threads(),
        cpu_features: *cpu_features(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BackendPreference, BrokenGpuPolicy};
    use crate::engine::Engine;
    use crate::error::Result;
    use crate::probe::EngineProvider;
    use std::sync::Arc;

    #[derive(Debug)]
    struct Broken;

    impl EngineProvider for Broken {
        fn kind(&self) -> EngineKind {
            EngineKind::Gpu
        }

        fn name(&self) -> &str {
            "cuda"
        }

        fn probe(&self) -> ProbeOutcome {
            ProbeOutcome::broken("driver version mismatch")
        }

        fn load(&self) -> Result<Arc<dyn Engine>> {
            unreachable!("a broken provider is never loaded")
        }
    }

    #[test]
    fn test_cpu_feature_detection() {
        let features = CpuFeatures::detect();
        assert_eq!(features, *cpu_features());
        assert!(features.max_vector_width() >= 64);
    }

    #[test]
    fn test_broken_gpu_reports_cpu() {
        let resolver = BackendResolver::default().with_gpu_provider(Arc::new(Broken));
        let diagnosis = diagnose(&resolver);

        assert_eq!(diagnosis.kind(), Some(EngineKind::Cpu));
        assert!(diagnosis.gpu_probe.is_broken());
        assert!(diagnosis.to_string().starts_with("cpu\n"));
    }

    #[test]
    fn test_failing_selection_is_reported() {
        let config = ResolverConfig::builder()
            .preference(BackendPreference::Auto)
            .on_broken_gpu(BrokenGpuPolicy::Fail)
            .build();
        let resolver = BackendResolver::new(config).with_gpu_provider(Arc::new(Broken));
        let diagnosis = diagnose(&resolver);

        assert_eq!(diagnosis.engine, None);
        assert!(diagnosis.error.as_deref().is_some_and(|e| e.contains("driver version mismatch")));
        assert!(diagnosis.to_string().starts_with("error: "));
    }

    #[derive(Debug)]
    struct MissingCpu;

    impl EngineProvider for MissingCpu {
        fn kind(&self) -> EngineKind {
            EngineKind::Cpu
        }

        fn name(&self) -> &str {
            "cpu"
        }

        fn probe(&self) -> ProbeOutcome {
            ProbeOutcome::absent("cpu engine not installed")
        }

        fn load(&self) -> Result<Arc<dyn Engine>> {
            unreachable!("an absent provider is never loaded")
        }
    }

    #[test]
    fn test_missing_cpu_engine_is_reported() {
        for preference in [BackendPreference::Auto, BackendPreference::Cpu] {
            let resolver = BackendResolver::new(ResolverConfig::builder().preference(preference).build())
                .with_gpu_provider(Arc::new(Broken))
                .with_cpu_provider(Arc::new(MissingCpu));

            let resolved = resolver.resolve().unwrap_err();
            let diagnosis = diagnose(&resolver);

            assert_eq!(diagnosis.engine, None);
            assert_eq!(diagnosis.resolution, None);
            assert_eq!(diagnosis.error, Some(resolved.to_string()));
            assert!(diagnosis.to_string().starts_with("error: Missing dependency"));
        }
    }

    #[test]
    fn test_cpu_preference_still_probes_gpu() {
        let resolver = BackendResolver::new(
            ResolverConfig::builder().preference(BackendPreference::Cpu).build(),
        )
        .with_gpu_provider(Arc::new(Broken));
        let diagnosis = diagnose(&resolver);

        assert_eq!(diagnosis.engine.as_deref(), Some("cpu"));
        assert!(diagnosis.gpu_probe.is_broken());
    }
}
