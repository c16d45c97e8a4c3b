//! Array engine selection for mesh metric routines.
//!
//! This crate decides, once per process, whether the library's array
//! operations run on a CUDA device or on the CPU, and exposes the chosen
//! engine through one stable handle, [`xp`]. Call sites are written against
//! the [`ArrayEngine`] capability interface and behave the same on both
//! engines.
//!
//! # Key Concepts
//!
//! - **Engine**: an implementation of the shared operation surface
//!   ([`CpuEngine`], or `GpuEngine` with the `cuda` feature)
//! - **Provider**: the probe-and-load front of one candidate engine
//! - **Resolution**: the one-time choice of which engine to bind
//! - **Handle**: the process-wide [`Backend`] returned by [`xp`]
//!
//! # Modules
//!
//! - [`config`]: Resolver configuration and environment variables
//! - [`cpu`]: Host engine on nalgebra and rayon
//! - [`diagnostics`]: Reports which engine would be selected
//! - [`engine`]: Capability traits shared by all engines
//! - [`error`]: Error types for resolution and array operations
//! - [`gpu`]: CUDA engine (feature `cuda`)
//! - [`handle`]: The process-wide handle
//! - [`probe`]: Engine providers and probe outcomes
//! - [`resolver`]: Engine selection and loading
//! - [`types`]: Scalar trait and array aliases

pub mod config;
pub mod cpu;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod gpu;
pub mod handle;
pub mod probe;
pub mod resolver;
pub mod types;

// Re-export commonly used items at the crate root
pub use config::{BackendPreference, BrokenGpuPolicy, ResolverConfig, ResolverConfigBuilder};
pub use cpu::CpuEngine;
pub use diagnostics::{diagnose, Diagnosis};
pub use engine::{ArrayEngine, DeviceInfo, Engine, EngineKind};
pub use error::{ArrayError, ArrayResult, BackendError, Result};
#[cfg(feature = "cuda")]
pub use gpu::GpuEngine;
pub use handle::{install, resolved, xp, BackendCell};
pub use probe::{CpuProvider, CudaProvider, EngineProvider, ProbeOutcome};
pub use resolver::{Backend, BackendResolver, Resolution, ResolutionReason, Selection};

/// Prelude module for convenient imports.
///
/// # Example
/// ```
/// use meshmetrics_core::prelude::*;
///
/// let backend = xp().unwrap();
/// let v: DVector<f64> = backend.ops::<f64>().from_slice(&[3.0, 4.0]);
/// assert_eq!(backend.ops::<f64>().norm(&v).unwrap(), 5.0);
/// ```
pub mod prelude {
    pub use crate::config::{BackendPreference, BrokenGpuPolicy, ResolverConfig};
    pub use crate::engine::{ArrayEngine, Engine, EngineKind};
    pub use crate::error::{ArrayError, ArrayResult, BackendError, Result};
    pub use crate::handle::xp;
    pub use crate::resolver::{Backend, BackendResolver};
    pub use crate::types::{DMatrix, DVector, Scalar};
}
