//! Array engine capability interface.
//!
//! [`ArrayEngine`] is the operation surface every engine provides for one
//! scalar precision. Each method carries a portable default over nalgebra
//! storage, and those defaults define the semantics all engines share:
//! an engine may override a method to run it faster or on a device, but
//! shapes, error cases and NaN handling stay identical.
//!
//! [`Engine`] is the type-erased, precision-independent face of an engine.
//! It is what the resolver binds and what the process-wide handle exposes.

use crate::error::{ArrayError, ArrayResult};
use crate::types::{DMatrix, DVector, Scalar};
use std::fmt::{self, Debug};

/// Identity of an engine implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum EngineKind {
    /// Host-only engine, always compiled in
    Cpu,
    /// GPU-accelerated engine
    Gpu,
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => write!(f, "cpu"),
            Self::Gpu => write!(f, "gpu"),
        }
    }
}

/// Information about the device behind a GPU engine.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceInfo {
    /// Device name as reported by the driver
    pub name: String,
    /// Device ordinal
    pub ordinal: usize,
    /// Total memory in bytes
    pub total_memory: usize,
    /// Free memory in bytes at query time
    pub free_memory: usize,
}

/// Array operations for one scalar precision.
pub trait ArrayEngine<T: Scalar>: Debug + Send + Sync {
    /// Vector of `n` zeros.
    fn zeros(&self, n: usize) -> DVector<T> {
        DVector::zeros(n)
    }

    /// Vector of `n` copies of `value`.
    fn full(&self, n: usize, value: T) -> DVector<T> {
        DVector::from_element(n, value)
    }

    /// Vector copied from a slice.
    fn from_slice(&self, data: &[T]) -> DVector<T> {
        DVector::from_column_slice(data)
    }

    /// `n` evenly spaced values over `[start, stop]`, endpoint included.
    fn linspace(&self, start: T, stop: T, n: usize) -> DVector<T> {
        match n {
            0 => DVector::zeros(0),
            1 => DVector::from_element(1, start),
            _ => {
                let step = (stop - start) / T::from_count(n - 1);
                DVector::from_fn(n, |i, _| {
                    if i == n - 1 {
                        stop
                    } else {
                        start + step * T::from_count(i)
                    }
                })
            }
        }
    }

    /// `rows x cols` matrix of zeros.
    fn zeros_matrix(&self, rows: usize, cols: usize) -> DMatrix<T> {
        DMatrix::zeros(rows, cols)
    }

    /// `n x n` identity matrix.
    fn identity(&self, n: usize) -> DMatrix<T> {
        DMatrix::identity(n, n)
    }

    /// Matrix filled from row-major data.
    fn matrix_from_row_slice(&self, rows: usize, cols: usize, data: &[T]) -> ArrayResult<DMatrix<T>> {
        let len = rows.checked_mul(cols).ok_or_else(|| {
            ArrayError::invalid_argument(format!("matrix shape {rows}x{cols} overflows usize"))
        })?;
        if data.len() != len {
            return Err(ArrayError::dimension_mismatch(len, data.len()));
        }
        Ok(DMatrix::from_row_slice(rows, cols, data))
    }

    /// Element-wise operations
    fn element_wise_add(&self, a: &DVector<T>, b: &DVector<T>, result: &mut DVector<T>) -> ArrayResult<()> {
        binary_into(a, b, result, |x, y| x + y)
    }

    fn element_wise_sub(&self, a: &DVector<T>, b: &DVector<T>, result: &mut DVector<T>) -> ArrayResult<()> {
        binary_into(a, b, result, |x, y| x - y)
    }

    fn element_wise_mul(&self, a: &DVector<T>, b: &DVector<T>, result: &mut DVector<T>) -> ArrayResult<()> {
        binary_into(a, b, result, |x, y| x * y)
    }

    /// Division follows IEEE rules: `x / 0` is infinite or NaN.
    fn element_wise_div(&self, a: &DVector<T>, b: &DVector<T>, result: &mut DVector<T>) -> ArrayResult<()> {
        binary_into(a, b, result, |x, y| x / y)
    }

    /// Element-wise maximum; NaN in either operand propagates.
    fn element_wise_max(&self, a: &DVector<T>, b: &DVector<T>, result: &mut DVector<T>) -> ArrayResult<()> {
        binary_into(a, b, result, |x, y| {
            if x.is_nan_value() || y.is_nan_value() {
                x + y
            } else if x >= y {
                x
            } else {
                y
            }
        })
    }

    /// Element-wise minimum; NaN in either operand propagates.
    fn element_wise_min(&self, a: &DVector<T>, b: &DVector<T>, result: &mut DVector<T>) -> ArrayResult<()> {
        binary_into(a, b, result, |x, y| {
            if x.is_nan_value() || y.is_nan_value() {
                x + y
            } else if x <= y {
                x
            } else {
                y
            }
        })
    }

    fn element_wise_abs(&self, x: &DVector<T>, result: &mut DVector<T>) -> ArrayResult<()> {
        unary_into(x, result, |v| v.abs())
    }

    /// Square root; negative inputs give NaN.
    fn element_wise_sqrt(&self, x: &DVector<T>, result: &mut DVector<T>) -> ArrayResult<()> {
        unary_into(x, result, |v| v.sqrt())
    }

    /// `y += alpha * x`
    fn axpy(&self, alpha: T, x: &DVector<T>, y: &mut DVector<T>) -> ArrayResult<()> {
        if x.len() != y.len() {
            return Err(ArrayError::dimension_mismatch(x.len(), y.len()));
        }
        y.axpy(alpha, x, T::one());
        Ok(())
    }

    /// `x *= alpha`
    fn scal(&self, alpha: T, x: &mut DVector<T>) -> ArrayResult<()> {
        *x *= alpha;
        Ok(())
    }

    /// Clamps every element into `[lower, upper]`. NaN elements are kept,
    /// NaN bounds are rejected.
    fn clip(&self, x: &mut DVector<T>, lower: T, upper: T) -> ArrayResult<()> {
        if lower.is_nan_value() || upper.is_nan_value() {
            return Err(ArrayError::invalid_argument(format!(
                "clip bounds must not be NaN, got [{lower}, {upper}]"
            )));
        }
        if lower > upper {
            return Err(ArrayError::invalid_argument(format!(
                "clip lower bound {lower} exceeds upper bound {upper}"
            )));
        }
        for v in x.iter_mut() {
            if *v < lower {
                *v = lower;
            } else if *v > upper {
                *v = upper;
            }
        }
        Ok(())
    }

    /// Reductions
    fn dot(&self, a: &DVector<T>, b: &DVector<T>) -> ArrayResult<T> {
        if a.len() != b.len() {
            return Err(ArrayError::dimension_mismatch(a.len(), b.len()));
        }
        Ok(a.dot(b))
    }

    fn norm(&self, x: &DVector<T>) -> ArrayResult<T> {
        Ok(x.norm())
    }

    /// Scales `x` to unit norm. A zero vector is left unchanged.
    fn normalize(&self, x: &mut DVector<T>) -> ArrayResult<()> {
        let norm = self.norm(x)?;
        if norm > T::zero() {
            self.scal(T::one() / norm, x)?;
        }
        Ok(())
    }

    /// Sum of all elements; zero for an empty vector.
    fn sum(&self, x: &DVector<T>) -> ArrayResult<T> {
        Ok(x.iter().fold(T::zero(), |acc, &v| acc + v))
    }

    fn mean(&self, x: &DVector<T>) -> ArrayResult<T> {
        if x.is_empty() {
            return Err(ArrayError::empty_array("mean"));
        }
        Ok(self.sum(x)? / T::from_count(x.len()))
    }

    /// Smallest element; NaN if any element is NaN.
    fn min(&self, x: &DVector<T>) -> ArrayResult<T> {
        let index = self.argmin(x)?;
        Ok(x[index])
    }

    /// Largest element; NaN if any element is NaN.
    fn max(&self, x: &DVector<T>) -> ArrayResult<T> {
        let index = self.argmax(x)?;
        Ok(x[index])
    }

    /// Index of the smallest element (first one on ties, first NaN if any).
    fn argmin(&self, x: &DVector<T>) -> ArrayResult<usize> {
        arg_extreme(x, "argmin", |candidate, best| candidate < best)
    }

    /// Index of the largest element (first one on ties, first NaN if any).
    fn argmax(&self, x: &DVector<T>) -> ArrayResult<usize> {
        arg_extreme(x, "argmax", |candidate, best| candidate > best)
    }

    /// Number of elements different from zero. NaN counts as nonzero.
    fn count_nonzero(&self, x: &DVector<T>) -> ArrayResult<usize> {
        Ok(x.iter().filter(|&&v| v != T::zero()).count())
    }

    fn frobenius_norm(&self, a: &DMatrix<T>) -> ArrayResult<T> {
        Ok(a.norm())
    }

    /// Matrix-vector product: `y = alpha * A * x + beta * y`
    fn gemv(&self, alpha: T, a: &DMatrix<T>, x: &DVector<T>, beta: T, y: &mut DVector<T>) -> ArrayResult<()> {
        if a.ncols() != x.len() {
            return Err(ArrayError::dimension_mismatch(a.ncols(), x.len()));
        }
        if a.nrows() != y.len() {
            return Err(ArrayError::dimension_mismatch(a.nrows(), y.len()));
        }
        y.gemv(alpha, a, x, beta);
        Ok(())
    }

    /// Matrix-matrix product: `C = alpha * A * B + beta * C`
    fn gemm(&self, alpha: T, a: &DMatrix<T>, b: &DMatrix<T>, beta: T, c: &mut DMatrix<T>) -> ArrayResult<()> {
        check_gemm_shapes(a, b, c)?;
        c.gemm(alpha, a, b, beta);
        Ok(())
    }

    /// Batch operations
    fn batch_dot(&self, pairs: &[(DVector<T>, DVector<T>)]) -> ArrayResult<Vec<T>> {
        pairs.iter().map(|(a, b)| self.dot(a, b)).collect()
    }

    fn batch_normalize(&self, vectors: &mut [DVector<T>]) -> ArrayResult<()> {
        for v in vectors {
            self.normalize(v)?;
        }
        Ok(())
    }

    /// Whether operands are copied to a separate device memory.
    fn can_transfer(&self) -> bool {
        false
    }

    /// Performance hints
    fn prefers_batched_operations(&self) -> bool {
        false
    }

    fn optimal_batch_size(&self) -> usize {
        1
    }

    /// Blocks until all queued device work has finished.
    fn synchronize(&self) -> ArrayResult<()> {
        Ok(())
    }
}

/// A bindable engine: identity plus both precision surfaces.
pub trait Engine: Debug + Send + Sync {
    /// Which kind of engine this is.
    fn kind(&self) -> EngineKind;

    /// Short name for identification (`"cpu"`, `"cuda"`, ...).
    fn name(&self) -> &str;

    /// Device details, for engines backed by a device.
    fn device_info(&self) -> Option<DeviceInfo> {
        None
    }

    /// Single-precision operation surface.
    fn f32_ops(&self) -> &dyn ArrayEngine<f32>;

    /// Double-precision operation surface.
    fn f64_ops(&self) -> &dyn ArrayEngine<f64>;
}

impl<'a> dyn Engine + 'a {
    /// Operation surface for the precision `T`.
    ///
    /// ```
    /// use meshmetrics_core::{CpuEngine, Engine};
    ///
    /// let engine: &dyn Engine = &CpuEngine::new();
    /// let x = engine.ops::<f64>().linspace(0.0, 1.0, 5);
    /// assert_eq!(x.len(), 5);
    /// ```
    pub fn ops<T: Scalar>(&self) -> &dyn ArrayEngine<T> {
        T::engine_ops(self)
    }
}

pub(crate) fn check_gemm_shapes<T: Scalar>(a: &DMatrix<T>, b: &DMatrix<T>, c: &DMatrix<T>) -> ArrayResult<()> {
    if a.ncols() != b.nrows() {
        return Err(ArrayError::dimension_mismatch(a.ncols(), b.nrows()));
    }
    if a.nrows() != c.nrows() || b.ncols() != c.ncols() {
        return Err(ArrayError::dimension_mismatch(
            format!("{}x{}", a.nrows(), b.ncols()),
            format!("{}x{}", c.nrows(), c.ncols()),
        ));
    }
    Ok(())
}

pub(crate) fn binary_into<T, F>(a: &DVector<T>, b: &DVector<T>, result: &mut DVector<T>, op: F) -> ArrayResult<()>
where
    T: Scalar,
    F: Fn(T, T) -> T,
{
    if a.len() != b.len() {
        return Err(ArrayError::dimension_mismatch(a.len(), b.len()));
    }
    if a.len() != result.len() {
        return Err(ArrayError::dimension_mismatch(a.len(), result.len()));
    }
    for ((r, &x), &y) in result.iter_mut().zip(a.iter()).zip(b.iter()) {
        *r = op(x, y);
    }
    Ok(())
}

fn unary_into<T, F>(x: &DVector<T>, result: &mut DVector<T>, op: F) -> ArrayResult<()>
where
    T: Scalar,
    F: Fn(T) -> T,
{
    if x.len() != result.len() {
        return Err(ArrayError::dimension_mismatch(x.len(), result.len()));
    }
    for (r, &v) in result.iter_mut().zip(x.iter()) {
        *r = op(v);
    }
    Ok(())
}

fn arg_extreme<T, F>(x: &DVector<T>, operation: &str, better: F) -> ArrayResult<usize>
where
    T: Scalar,
    F: Fn(T, T) -> bool,
{
    if x.is_empty() {
        return Err(ArrayError::empty_array(operation));
    }
    let mut best = 0;
    for (i, &v) in x.iter().enumerate() {
        if v.is_nan_value() {
            return Ok(i);
        }
        if better(v, x[best]) {
            best = i;
        }
    }
    Ok(best)
}
