//! Scalar trait and array type aliases shared by every engine.

use crate::engine::{ArrayEngine, Engine};
use crate::gpu::DeviceScalar;
use nalgebra::{Dyn, OMatrix, OVector, RealField, Scalar as NalgebraScalar};
use num_traits::{FromPrimitive, ToPrimitive};
use std::fmt::{Debug, Display};

/// Element types an array engine can operate on (`f32` or `f64`).
///
/// Besides the numeric bounds, a scalar knows how to pick its own
/// precision-specific operation surface out of a type-erased [`Engine`].
pub trait Scalar:
    NalgebraScalar
    + RealField
    + FromPrimitive
    + ToPrimitive
    + DeviceScalar
    + Display
    + Debug
    + Default
    + Copy
    + Send
    + Sync
    + 'static
{
    /// Machine epsilon for this scalar type.
    const EPSILON: Self;

    /// Default tolerance when comparing results across engines.
    const DEFAULT_TOLERANCE: Self;

    /// Selects the operation surface of `engine` for this precision.
    fn engine_ops(engine: &dyn Engine) -> &dyn ArrayEngine<Self>;

    /// Converts a length or count into this scalar type.
    fn from_count(n: usize) -> Self;

    /// Whether the value is NaN.
    fn is_nan_value(self) -> bool {
        self.partial_cmp(&self).is_none()
    }
}

impl Scalar for f32 {
    const EPSILON: Self = f32::EPSILON;
    const DEFAULT_TOLERANCE: Self = 1e-4;

    fn engine_ops(engine: &dyn Engine) -> &dyn ArrayEngine<Self> {
        engine.f32_ops()
    }

    #[allow(clippy::cast_precision_loss)]
    fn from_count(n: usize) -> Self {
        n as f32
    }
}

impl Scalar for f64 {
    const EPSILON: Self = f64::EPSILON;
    const DEFAULT_TOLERANCE: Self = 1e-10;

    fn engine_ops(engine: &dyn Engine) -> &dyn ArrayEngine<Self> {
        engine.f64_ops()
    }

    #[allow(clippy::cast_precision_loss)]
    fn from_count(n: usize) -> Self {
        n as f64
    }
}

/// Type alias for a dynamically-sized matrix.
pub type DMatrix<T> = OMatrix<T, Dyn, Dyn>;

/// Type alias for a dynamically-sized vector.
pub type DVector<T> = OVector<T, Dyn>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_constants() {
        assert_eq!(<f32 as Scalar>::EPSILON, f32::EPSILON);
        assert_eq!(<f64 as Scalar>::EPSILON, f64::EPSILON);
        assert!(<f32 as Scalar>::DEFAULT_TOLERANCE > <f32 as Scalar>::EPSILON);
        assert!(<f64 as Scalar>::DEFAULT_TOLERANCE > <f64 as Scalar>::EPSILON);
    }

    #[test]
    fn test_from_count() {
        assert_eq!(f64::from_count(7), 7.0);
        assert_eq!(f32::from_count(0), 0.0);
    }

    #[test]
    fn test_nan_detection() {
        assert!(f64::NAN.is_nan_value());
        assert!(!1.5_f64.is_nan_value());
        assert!(f32::NAN.is_nan_value());
    }
}
