//! Resolver configuration.
//!
//! The defaults pick the GPU engine when it is usable and fall back to the
//! CPU engine otherwise. Everything can be overridden in code through
//! [`ResolverConfigBuilder`] or from the environment:
//!
//! | variable                    | values                       | default    |
//! |-----------------------------|------------------------------|------------|
//! | `MESHMETRICS_BACKEND`       | `auto`, `cpu`, `gpu`/`cuda`  | `auto`     |
//! | `MESHMETRICS_ON_BROKEN_GPU` | `fallback`, `fail`           | `fallback` |
//! | `MESHMETRICS_GPU_ORDINAL`   | device index                 | `0`        |
//!
//! Values are case-insensitive and an empty variable counts as unset.

use crate::error::{BackendError, Result};
use std::fmt;
use std::str::FromStr;

/// Environment variable selecting the engine preference.
pub const ENV_BACKEND: &str = "MESHMETRICS_BACKEND";

/// Environment variable selecting the broken-GPU policy.
pub const ENV_ON_BROKEN_GPU: &str = "MESHMETRICS_ON_BROKEN_GPU";

/// Environment variable selecting the GPU device ordinal.
pub const ENV_GPU_ORDINAL: &str = "MESHMETRICS_GPU_ORDINAL";

/// Which engine the resolver should bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum BackendPreference {
    /// GPU when usable, CPU otherwise
    #[default]
    Auto,
    /// Always the CPU engine; the GPU is never probed
    Cpu,
    /// The GPU engine or an error
    Gpu,
}

impl fmt::Display for BackendPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Cpu => write!(f, "cpu"),
            Self::Gpu => write!(f, "gpu"),
        }
    }
}

impl FromStr for BackendPreference {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            "gpu" | "cuda" => Ok(Self::Gpu),
            _ => Err(BackendError::invalid_configuration(
                "expected one of auto, cpu, gpu",
                ENV_BACKEND,
                s,
            )),
        }
    }
}

/// What to do when the GPU engine is present but its probe fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum BrokenGpuPolicy {
    /// Log a warning and bind the CPU engine
    #[default]
    FallBack,
    /// Fail resolution with [`BackendError::ProbeFailed`]
    Fail,
}

impl fmt::Display for BrokenGpuPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FallBack => write!(f, "fallback"),
            Self::Fail => write!(f, "fail"),
        }
    }
}

impl FromStr for BrokenGpuPolicy {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fallback" | "fall-back" | "fall_back" => Ok(Self::FallBack),
            "fail" => Ok(Self::Fail),
            _ => Err(BackendError::invalid_configuration(
                "expected one of fallback, fail",
                ENV_ON_BROKEN_GPU,
                s,
            )),
        }
    }
}

/// Configuration for backend resolution.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ResolverConfig {
    /// Engine preference
    pub preference: BackendPreference,
    /// Policy for a present but broken GPU engine
    pub on_broken_gpu: BrokenGpuPolicy,
    /// CUDA device ordinal to open
    pub gpu_ordinal: usize,
}

impl ResolverConfig {
    /// Start a builder from the defaults.
    pub fn builder() -> ResolverConfigBuilder {
        ResolverConfigBuilder::new()
    }

    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, which maps a variable name
    /// to its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let mut config = Self::default();

        if let Some(value) = get(ENV_BACKEND) {
            config.preference = value.parse()?;
        }
        if let Some(value) = get(ENV_ON_BROKEN_GPU) {
            config.on_broken_gpu = value.parse()?;
        }
        if let Some(value) = get(ENV_GPU_ORDINAL) {
            config.gpu_ordinal = value.trim().parse().map_err(|_| {
                BackendError::invalid_configuration(
                    "expected a non-negative device index",
                    ENV_GPU_ORDINAL,
                    value.as_str(),
                )
            })?;
        }

        Ok(config)
    }
}

/// Builder for [`ResolverConfig`].
#[derive(Debug, Clone, Default)]
pub struct ResolverConfigBuilder {
    config: ResolverConfig,
}

impl ResolverConfigBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn preference(mut self, preference: BackendPreference) -> Self {
        self.config.preference = preference;
        self
    }

    pub fn on_broken_gpu(mut self, policy: BrokenGpuPolicy) -> Self {
        self.config.on_broken_gpu = policy;
        self
    }

    pub fn gpu_ordinal(mut self, ordinal: usize) -> Self {
        self.config.gpu_ordinal = ordinal;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> ResolverConfig {
        self.config
    }
}
