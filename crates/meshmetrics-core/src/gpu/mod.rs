//! GPU engine support.
//!
//! The CUDA engine is compiled only with the `cuda` feature and uses cudarc.
//! Without the feature the GPU provider reports the engine as absent and the
//! resolver binds the CPU engine.
//!
//! # Requirements
//!
//! - NVIDIA driver with a CUDA-capable device
//! - Enable the `cuda` feature flag
//! - Keep `panic = "unwind"` in the consuming profile. A missing driver
//!   library is detected before cudarc is touched, but a driver that panics
//!   while probing is only reported as broken when the panic can be caught.

#[cfg(feature = "cuda")]
mod cuda;

#[cfg(feature = "cuda")]
pub use cuda::{DeviceScalar, GpuEngine};

#[cfg(feature = "cuda")]
pub(crate) use cuda::probe_device;

/// Scalars that can be copied to and computed on the device.
///
/// Without the `cuda` feature every type qualifies.
#[cfg(not(feature = "cuda"))]
pub trait DeviceScalar {}

#[cfg(not(feature = "cuda"))]
impl<T> DeviceScalar for T {}
