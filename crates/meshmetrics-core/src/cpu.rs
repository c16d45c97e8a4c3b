//! Host engine built on nalgebra, with rayon for large inputs.

use crate::engine::{binary_into, ArrayEngine, Engine, EngineKind};
use crate::error::{ArrayError, ArrayResult};
use crate::types::{DVector, Scalar};
use rayon::prelude::*;

/// Vector length from which reductions and element-wise kernels go parallel.
pub const DEFAULT_VECTOR_THRESHOLD: usize = 10_000;

/// Batch size from which batch operations go parallel.
pub const DEFAULT_BATCH_THRESHOLD: usize = 4;

/// CPU engine implementation.
///
/// Always available. Results match the portable semantics of
/// [`ArrayEngine`]; parallel reductions may differ from the sequential
/// ones in the last bits because of summation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuEngine {
    vector_threshold: usize,
    batch_threshold: usize,
}

impl CpuEngine {
    /// Creates a CPU engine with the default parallel thresholds.
    pub fn new() -> Self {
        Self {
            vector_threshold: DEFAULT_VECTOR_THRESHOLD,
            batch_threshold: DEFAULT_BATCH_THRESHOLD,
        }
    }

    /// Overrides the parallel thresholds. Zero is treated as one.
    pub fn with_thresholds(vector_threshold: usize, batch_threshold: usize) -> Self {
        Self {
            vector_threshold: vector_threshold.max(1),
            batch_threshold: batch_threshold.max(1),
        }
    }

    /// Vector length from which this engine parallelizes.
    pub fn vector_threshold(&self) -> usize {
        self.vector_threshold
    }

    /// Batch size from which this engine parallelizes.
    pub fn batch_threshold(&self) -> usize {
        self.batch_threshold
    }

    fn is_large(&self, len: usize) -> bool {
        len >= self.vector_threshold
    }

    fn par_binary_into<T, F>(&self, a: &DVector<T>, b: &DVector<T>, result: &mut DVector<T>, op: F) -> ArrayResult<()>
    where
        T: Scalar,
        F: Fn(T, T) -> T + Send + Sync,
    {
        if !self.is_large(a.len()) {
            return binary_into(a, b, result, op);
        }
        if a.len() != b.len() {
            return Err(ArrayError::dimension_mismatch(a.len(), b.len()));
        }
        if a.len() != result.len() {
            return Err(ArrayError::dimension_mismatch(a.len(), result.len()));
        }
        result
            .as_mut_slice()
            .par_iter_mut()
            .zip(a.as_slice().par_iter().zip(b.as_slice().par_iter()))
            .for_each(|(r, (&x, &y))| *r = op(x, y));
        Ok(())
    }
}

impl Default for CpuEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Scalar> ArrayEngine<T> for CpuEngine {
    fn element_wise_add(&self, a: &DVector<T>, b: &DVector<T>, result: &mut DVector<T>) -> ArrayResult<()> {
        self.par_binary_into(a, b, result, |x, y| x + y)
    }

    fn element_wise_sub(&self, a: &DVector<T>, b: &DVector<T>, result: &mut DVector<T>) -> ArrayResult<()> {
        self.par_binary_into(a, b, result, |x, y| x - y)
    }

    fn element_wise_mul(&self, a: &DVector<T>, b: &DVector<T>, result: &mut DVector<T>) -> ArrayResult<()> {
        self.par_binary_into(a, b, result, |x, y| x * y)
    }

    fn element_wise_div(&self, a: &DVector<T>, b: &DVector<T>, result: &mut DVector<T>) -> ArrayResult<()> {
        self.par_binary_into(a, b, result, |x, y| x / y)
    }

    fn dot(&self, a: &DVector<T>, b: &DVector<T>) -> ArrayResult<T> {
        if a.len() != b.len() {
            return Err(ArrayError::dimension_mismatch(a.len(), b.len()));
        }
        if !self.is_large(a.len()) {
            return Ok(a.dot(b));
        }
        Ok(a
            .as_slice()
            .par_iter()
            .zip(b.as_slice().par_iter())
            .map(|(&x, &y)| x * y)
            .reduce(T::zero, |p, q| p + q))
    }

    fn norm(&self, x: &DVector<T>) -> ArrayResult<T> {
        if !self.is_large(x.len()) {
            return Ok(x.norm());
        }
        let squared = x
            .as_slice()
            .par_iter()
            .map(|&v| v * v)
            .reduce(T::zero, |p, q| p + q);
        Ok(squared.sqrt())
    }

    fn sum(&self, x: &DVector<T>) -> ArrayResult<T> {
        if !self.is_large(x.len()) {
            return Ok(x.iter().fold(T::zero(), |acc, &v| acc + v));
        }
        Ok(x.as_slice().par_iter().copied().reduce(T::zero, |p, q| p + q))
    }

    fn batch_dot(&self, pairs: &[(DVector<T>, DVector<T>)]) -> ArrayResult<Vec<T>> {
        // For small batches, sequential is fine
        if pairs.len() < self.batch_threshold {
            pairs.iter().map(|(a, b)| ArrayEngine::<T>::dot(self, a, b)).collect()
        } else {
            pairs
                .par_iter()
                .map(|(a, b)| ArrayEngine::<T>::dot(self, a, b))
                .collect()
        }
    }

    fn batch_normalize(&self, vectors: &mut [DVector<T>]) -> ArrayResult<()> {
        if vectors.len() < self.batch_threshold {
            for v in vectors {
                ArrayEngine::<T>::normalize(self, v)?;
            }
            Ok(())
        } else {
            vectors
                .par_iter_mut()
                .try_for_each(|v| ArrayEngine::<T>::normalize(self, v))
        }
    }

    fn prefers_batched_operations(&self) -> bool {
        true // CPU benefits from batching for cache efficiency
    }

    fn optimal_batch_size(&self) -> usize {
        64
    }
}

impl Engine for CpuEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Cpu
    }

    fn name(&self) -> &str {
        "cpu"
    }

    fn f32_ops(&self) -> &dyn ArrayEngine<f32> {
        self
    }

    fn f64_ops(&self) -> &dyn ArrayEngine<f64> {
        self
    }
}
