//! Error types for backend resolution and array operations.
//!
//! Resolution failures ([`BackendError`]) are fatal for the owning library:
//! they are cached by the process-wide handle and handed to every consumer.
//! Array failures ([`ArrayError`]) are ordinary per-call errors.

use crate::engine::EngineKind;
use thiserror::Error;

/// Errors that can occur while resolving the array backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// No usable engine could be bound.
    ///
    /// Raised when the CPU engine, which every correctly provisioned
    /// environment provides, cannot be loaded.
    #[error("Missing dependency: the {engine} array engine is unavailable: {reason}")]
    MissingDependency {
        /// Engine that was required
        engine: EngineKind,
        /// Why it could not be used
        reason: String,
    },

    /// The GPU capability query failed for a reason other than absence.
    ///
    /// Only surfaced when the broken-GPU policy is set to fail.
    #[error("GPU engine probe failed: {reason}")]
    ProbeFailed {
        /// Description of the failure
        reason: String,
    },

    /// The GPU engine was explicitly requested but cannot be used.
    #[error("GPU engine requested but unavailable: {reason}")]
    GpuUnavailable {
        /// Description of why the GPU cannot be used
        reason: String,
    },

    /// Invalid resolver configuration.
    #[error("Invalid backend configuration: {reason} ({parameter} = {value:?})")]
    InvalidConfiguration {
        /// Description of the configuration error
        reason: String,
        /// Name of the invalid parameter
        parameter: String,
        /// Value that was invalid
        value: String,
    },

    /// The process-wide handle was bound before this request.
    #[error("Array backend already resolved to the {kind} engine")]
    AlreadyResolved {
        /// Engine bound by the earlier resolution
        kind: EngineKind,
    },
}

impl BackendError {
    /// Create a MissingDependency error.
    pub fn missing_dependency<S: Into<String>>(engine: EngineKind, reason: S) -> Self {
        Self::MissingDependency {
            engine,
            reason: reason.into(),
        }
    }

    /// Create a ProbeFailed error.
    pub fn probe_failed<S: Into<String>>(reason: S) -> Self {
        Self::ProbeFailed {
            reason: reason.into(),
        }
    }

    /// Create a GpuUnavailable error.
    pub fn gpu_unavailable<S: Into<String>>(reason: S) -> Self {
        Self::GpuUnavailable {
            reason: reason.into(),
        }
    }

    /// Create an InvalidConfiguration error.
    pub fn invalid_configuration<S1, S2, S3>(reason: S1, parameter: S2, value: S3) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        Self::InvalidConfiguration {
            reason: reason.into(),
            parameter: parameter.into(),
            value: value.into(),
        }
    }
}

/// Errors that can occur during array operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArrayError {
    /// Operand shapes are incompatible.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimensions
        expected: String,
        /// Actual dimensions
        actual: String,
    },

    /// A reduction without an identity element was applied to an empty array.
    #[error("Operation {operation} is undefined on an empty array")]
    EmptyArray {
        /// Name of the operation
        operation: String,
    },

    /// An argument is outside the operation's domain.
    #[error("Invalid argument: {reason}")]
    InvalidArgument {
        /// Description of the problem
        reason: String,
    },

    /// Device allocation, transfer or library call failed.
    #[error("Device error: {reason}")]
    Device {
        /// Description of the device failure
        reason: String,
    },
}

impl ArrayError {
    /// Create a DimensionMismatch error.
    pub fn dimension_mismatch<S1, S2>(expected: S1, actual: S2) -> Self
    where
        S1: std::fmt::Display,
        S2: std::fmt::Display,
    {
        Self::DimensionMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Create an EmptyArray error.
    pub fn empty_array<S: Into<String>>(operation: S) -> Self {
        Self::EmptyArray {
            operation: operation.into(),
        }
    }

    /// Create an InvalidArgument error.
    pub fn invalid_argument<S: Into<String>>(reason: S) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Create a Device error.
    pub fn device<S: Into<String>>(reason: S) -> Self {
        Self::Device {
            reason: reason.into(),
        }
    }
}

/// Result type alias for backend resolution.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Result type alias for array operations.
pub type ArrayResult<T> = std::result::Result<T, ArrayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_display() {
        let err = BackendError::missing_dependency(EngineKind::Cpu, "not compiled in");
        assert!(matches!(err, BackendError::MissingDependency { .. }));
        assert_eq!(
            err.to_string(),
            "Missing dependency: the cpu array engine is unavailable: not compiled in"
        );

        let err = BackendError::AlreadyResolved {
            kind: EngineKind::Gpu,
        };
        assert_eq!(err.to_string(), "Array backend already resolved to the gpu engine");
    }

    #[test]
    fn test_configuration_error_context() {
        let err = BackendError::invalid_configuration("unknown backend", "MESHMETRICS_BACKEND", "tpu");

        if let BackendError::InvalidConfiguration {
            reason,
            parameter,
            value,
        } = &err
        {
            assert_eq!(reason, "unknown backend");
            assert_eq!(parameter, "MESHMETRICS_BACKEND");
            assert_eq!(value, "tpu");
        } else {
            panic!("Expected InvalidConfiguration variant");
        }
        assert!(err.to_string().contains("\"tpu\""));
    }

    #[test]
    fn test_array_error_display() {
        let errors = vec![
            ArrayError::dimension_mismatch(3, 4),
            ArrayError::empty_array("argmin"),
            ArrayError::invalid_argument("lower bound above upper bound"),
            ArrayError::device("cuBLAS gemm failed"),
        ];

        for err in errors {
            assert!(!err.to_string().is_empty());
        }

        assert_eq!(
            ArrayError::dimension_mismatch(3, 4).to_string(),
            "Dimension mismatch: expected 3, got 4"
        );
    }
}
