//! Backend-transparent array operations for mesh metrics.
//!
//! The library's metric routines are written against one array handle,
//! [`xp`], which is bound on first use to the CUDA engine when a usable GPU
//! is present and to the CPU engine otherwise.
//!
//! # Example
//!
//! ```
//! use meshmetrics::prelude::*;
//!
//! let backend = xp().unwrap();
//! let ops = backend.ops::<f64>();
//! let a = ops.from_slice(&[1.0, 2.0, 3.0]);
//! let b = ops.from_slice(&[4.0, 5.0, 6.0]);
//! assert_eq!(ops.dot(&a, &b).unwrap(), 32.0);
//! ```
//!
//! To pin the engine explicitly, either set `MESHMETRICS_BACKEND` before the
//! first call or resolve a [`Backend`] yourself and pass it along:
//!
//! ```
//! use meshmetrics::{BackendPreference, BackendResolver, EngineKind, ResolverConfig};
//!
//! let backend = BackendResolver::new(
//!     ResolverConfig::builder()
//!         .preference(BackendPreference::Cpu)
//!         .build(),
//! )
//! .resolve()
//! .unwrap();
//! assert_eq!(backend.kind(), EngineKind::Cpu);
//! ```

pub use meshmetrics_core::*;

pub use nalgebra;
