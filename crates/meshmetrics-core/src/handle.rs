//! The process-wide backend handle.
//!
//! [`xp`] is the one stable name through which the library reaches its array
//! engine. The first call resolves the backend; every later call, from any
//! thread, returns the same [`Backend`] without probing again. Concurrent
//! first callers block until the single resolution finishes. A failed
//! resolution is cached as well, so every consumer sees the same error.
//!
//! Code that wants to choose the backend itself can either resolve a
//! [`Backend`] with [`BackendResolver::resolve`] and pass it around, or bind
//! the global handle up front with [`install`].

use crate::error::{BackendError, Result};
use crate::resolver::{Backend, BackendResolver};
use once_cell::sync::OnceCell;

/// A write-once slot holding the outcome of one resolution.
#[derive(Debug, Default)]
pub struct BackendCell {
    cell: OnceCell<Result<Backend>>,
}

impl BackendCell {
    /// Creates an unresolved cell.
    pub const fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    /// Returns the bound backend, resolving it with `resolver` on first use.
    pub fn get_or_resolve(&self, resolver: &BackendResolver) -> Result<&Backend> {
        self.get_or_resolve_with(|| resolver.resolve())
    }

    /// Returns the bound backend, running `resolve` on first use.
    ///
    /// `resolve` runs at most once per cell, even under concurrent first
    /// access.
    pub fn get_or_resolve_with<F>(&self, resolve: F) -> Result<&Backend>
    where
        F: FnOnce() -> Result<Backend>,
    {
        self.cell.get_or_init(resolve).as_ref().map_err(Clone::clone)
    }

    /// Binds the cell with `resolver`.
    ///
    /// Fails with [`BackendError::AlreadyResolved`] if the cell was bound
    /// first, or with the cached error if an earlier resolution failed.
    pub fn install(&self, resolver: &BackendResolver) -> Result<&Backend> {
        let mut resolved_here = false;
        let outcome = self.cell.get_or_init(|| {
            resolved_here = true;
            resolver.resolve()
        });

        match outcome {
            Ok(backend) if !resolved_here => Err(BackendError::AlreadyResolved {
                kind: backend.kind(),
            }),
            Ok(backend) => Ok(backend),
            Err(err) => Err(err.clone()),
        }
    }

    /// The bound backend, if resolution already happened and succeeded.
    pub fn get(&self) -> Option<&Backend> {
        self.cell.get().and_then(|outcome| outcome.as_ref().ok())
    }

    /// Whether a resolution (successful or not) has completed.
    pub fn is_resolved(&self) -> bool {
        self.cell.get().is_some()
    }
}

static GLOBAL: BackendCell = BackendCell::new();

/// The process-wide array backend.
///
/// Resolved on first use from the `MESHMETRICS_*` environment variables.
///
/// ```
/// let backend = meshmetrics_core::xp().unwrap();
/// let ones = backend.ops::<f64>().full(3, 1.0);
/// assert_eq!(backend.ops::<f64>().sum(&ones).unwrap(), 3.0);
/// ```
pub fn xp() -> Result<&'static Backend> {
    GLOBAL.get_or_resolve_with(|| BackendResolver::from_env()?.resolve())
}

/// Binds the process-wide backend with an explicit resolver.
///
/// Must run before the first [`xp`] call; afterwards the binding cannot
/// change and this returns [`BackendError::AlreadyResolved`].
pub fn install(resolver: &BackendResolver) -> Result<&'static Backend> {
    GLOBAL.install(resolver)
}

/// The process-wide backend if it has already been resolved.
pub fn resolved() -> Option<&'static Backend> {
    GLOBAL.get()
}
