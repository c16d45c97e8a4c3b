//! CUDA engine implementation.
//!
//! Matrix products run on the device through cuBLAS, with host-to-device
//! copies on the way in and a device-to-host copy of the result. The other
//! operations act on the host-resident nalgebra arrays with the shared
//! [`ArrayEngine`] semantics.

#![allow(unsafe_code)]

use crate::engine::{check_gemm_shapes, ArrayEngine, DeviceInfo, Engine, EngineKind};
use crate::error::{ArrayError, ArrayResult, BackendError};
use crate::probe::ProbeOutcome;
use crate::types::{DMatrix, DVector, Scalar};
use cudarc::cublas::result::CublasError;
use cudarc::cublas::sys::cublasOperation_t;
use cudarc::cublas::{CudaBlas, Gemm, GemmConfig, Gemv, GemvConfig};
use cudarc::driver::sys::CUresult;
use cudarc::driver::{CudaDevice, CudaSlice, DeviceRepr, DriverError, ValidAsZeroBits};
use std::fmt;
use std::sync::Arc;

/// Scalars with cuBLAS entry points.
pub trait DeviceScalar: DeviceRepr + ValidAsZeroBits + Unpin + Sized {
    #[doc(hidden)]
    unsafe fn cublas_gemm(
        blas: &CudaBlas,
        cfg: GemmConfig<Self>,
        a: &CudaSlice<Self>,
        b: &CudaSlice<Self>,
        c: &mut CudaSlice<Self>,
    ) -> Result<(), CublasError>;

    #[doc(hidden)]
    unsafe fn cublas_gemv(
        blas: &CudaBlas,
        cfg: GemvConfig<Self>,
        a: &CudaSlice<Self>,
        x: &CudaSlice<Self>,
        y: &mut CudaSlice<Self>,
    ) -> Result<(), CublasError>;
}

macro_rules! impl_device_scalar {
    ($($t:ty),*) => {
        $(
            impl DeviceScalar for $t {
                unsafe fn cublas_gemm(
                    blas: &CudaBlas,
                    cfg: GemmConfig<Self>,
                    a: &CudaSlice<Self>,
                    b: &CudaSlice<Self>,
                    c: &mut CudaSlice<Self>,
                ) -> Result<(), CublasError> {
                    blas.gemm(cfg, a, b, c)
                }

                unsafe fn cublas_gemv(
                    blas: &CudaBlas,
                    cfg: GemvConfig<Self>,
                    a: &CudaSlice<Self>,
                    x: &CudaSlice<Self>,
                    y: &mut CudaSlice<Self>,
                ) -> Result<(), CublasError> {
                    blas.gemv(cfg, a, x, y)
                }
            }
        )*
    };
}

impl_device_scalar!(f32, f64);

#[cfg(windows)]
const DRIVER_LIBRARIES: &[&str] = &["nvcuda.dll"];

#[cfg(not(windows))]
const DRIVER_LIBRARIES: &[&str] = &["libcuda.so", "libcuda.so.1", "libcuda.dylib"];

/// Whether the CUDA driver library can be opened.
///
/// cudarc panics when its loader finds no library, so the presence check
/// runs first without going through cudarc.
pub(crate) fn driver_library_present() -> bool {
    DRIVER_LIBRARIES
        .iter()
        .any(|name| unsafe { libloading::Library::new(name) }.is_ok())
}

/// Probes the CUDA driver for the device at `ordinal`.
///
/// A missing driver library or a machine without devices is `Absent`; any
/// other driver failure is `Broken`, including a panic inside cudarc.
pub(crate) fn probe_device(ordinal: usize) -> ProbeOutcome {
    if !driver_library_present() {
        return ProbeOutcome::absent(format!(
            "CUDA driver library not found (tried {})",
            DRIVER_LIBRARIES.join(", ")
        ));
    }

    let counted = std::panic::catch_unwind(|| -> Result<i32, DriverError> {
        cudarc::driver::result::init()?;
        CudaDevice::count()
    });

    match counted {
        Ok(Ok(count)) => {
            if usize::try_from(count).is_ok_and(|count| ordinal < count) {
                ProbeOutcome::Available
            } else {
                ProbeOutcome::absent(format!(
                    "CUDA driver reports {count} device(s), ordinal {ordinal} requested"
                ))
            }
        }
        Ok(Err(DriverError(CUresult::CUDA_ERROR_NO_DEVICE))) => {
            ProbeOutcome::absent("no CUDA-capable device detected")
        }
        Ok(Err(err)) => ProbeOutcome::broken(format!("CUDA driver query failed: {err}")),
        Err(payload) => {
            let message = payload
                .downcast_ref::<String>()
                .map(String::as_str)
                .or_else(|| payload.downcast_ref::<&str>().copied())
                .unwrap_or("unknown panic");
            ProbeOutcome::broken(format!("CUDA driver panicked while probing: {message}"))
        }
    }
}

/// GPU engine backed by one CUDA device.
pub struct GpuEngine {
    device: Arc<CudaDevice>,
    blas: CudaBlas,
    info: DeviceInfo,
}

impl GpuEngine {
    /// Opens the device at `ordinal` and creates its cuBLAS handle.
    pub fn open(ordinal: usize) -> Result<Self, BackendError> {
        let device = CudaDevice::new(ordinal).map_err(|e| {
            BackendError::probe_failed(format!("failed to open CUDA device {ordinal}: {e}"))
        })?;
        let blas = CudaBlas::new(device.clone())
            .map_err(|e| BackendError::probe_failed(format!("failed to create cuBLAS handle: {e}")))?;

        let name = device
            .name()
            .unwrap_or_else(|_| format!("CUDA device {ordinal}"));
        let (free_memory, total_memory) = cudarc::driver::result::mem_get_info().unwrap_or((0, 0));

        Ok(Self {
            device,
            blas,
            info: DeviceInfo {
                name,
                ordinal,
                total_memory,
                free_memory,
            },
        })
    }

    fn upload<T: Scalar>(&self, data: &[T]) -> ArrayResult<CudaSlice<T>> {
        self.device
            .htod_sync_copy(data)
            .map_err(|e| ArrayError::device(format!("host to device copy failed: {e}")))
    }

    fn download<T: Scalar>(&self, buffer: &CudaSlice<T>, out: &mut [T]) -> ArrayResult<()> {
        let host = self
            .device
            .dtoh_sync_copy(buffer)
            .map_err(|e| ArrayError::device(format!("device to host copy failed: {e}")))?;
        out.copy_from_slice(&host);
        Ok(())
    }
}

fn blas_dim(n: usize) -> ArrayResult<i32> {
    i32::try_from(n).map_err(|_| ArrayError::invalid_argument(format!("dimension {n} exceeds cuBLAS limits")))
}

impl fmt::Debug for GpuEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GpuEngine").field("info", &self.info).finish_non_exhaustive()
    }
}

impl<T: Scalar> ArrayEngine<T> for GpuEngine {
    fn gemv(&self, alpha: T, a: &DMatrix<T>, x: &DVector<T>, beta: T, y: &mut DVector<T>) -> ArrayResult<()> {
        if a.ncols() != x.len() {
            return Err(ArrayError::dimension_mismatch(a.ncols(), x.len()));
        }
        if a.nrows() != y.len() {
            return Err(ArrayError::dimension_mismatch(a.nrows(), y.len()));
        }
        if a.is_empty() {
            y.gemv(alpha, a, x, beta);
            return Ok(());
        }

        let a_dev = self.upload(a.as_slice())?;
        let x_dev = self.upload(x.as_slice())?;
        let mut y_dev = self.upload(y.as_slice())?;
        // nalgebra storage is column-major, as cuBLAS expects
        let cfg = GemvConfig {
            trans: cublasOperation_t::CUBLAS_OP_N,
            m: blas_dim(a.nrows())?,
            n: blas_dim(a.ncols())?,
            alpha,
            lda: blas_dim(a.nrows())?,
            incx: 1,
            beta,
            incy: 1,
        };
        unsafe { T::cublas_gemv(&self.blas, cfg, &a_dev, &x_dev, &mut y_dev) }
            .map_err(|e| ArrayError::device(format!("cuBLAS gemv failed: {e}")))?;
        self.download(&y_dev, y.as_mut_slice())
    }

    fn gemm(&self, alpha: T, a: &DMatrix<T>, b: &DMatrix<T>, beta: T, c: &mut DMatrix<T>) -> ArrayResult<()> {
        check_gemm_shapes(a, b, c)?;
        if a.is_empty() || b.is_empty() {
            c.gemm(alpha, a, b, beta);
            return Ok(());
        }

        let (m, k, n) = (a.nrows(), a.ncols(), b.ncols());
        let a_dev = self.upload(a.as_slice())?;
        let b_dev = self.upload(b.as_slice())?;
        let mut c_dev = self.upload(c.as_slice())?;
        let cfg = GemmConfig {
            transa: cublasOperation_t::CUBLAS_OP_N,
            transb: cublasOperation_t::CUBLAS_OP_N,
            m: blas_dim(m)?,
            n: blas_dim(n)?,
            k: blas_dim(k)?,
            alpha,
            lda: blas_dim(m)?,
            ldb: blas_dim(k)?,
            beta,
            ldc: blas_dim(m)?,
        };
        unsafe { T::cublas_gemm(&self.blas, cfg, &a_dev, &b_dev, &mut c_dev) }
            .map_err(|e| ArrayError::device(format!("cuBLAS gemm failed: {e}")))?;
        self.download(&c_dev, c.as_mut_slice())
    }

    fn can_transfer(&self) -> bool {
        true
    }

    fn prefers_batched_operations(&self) -> bool {
        true
    }

    fn optimal_batch_size(&self) -> usize {
        256
    }

    fn synchronize(&self) -> ArrayResult<()> {
        self.device
            .synchronize()
            .map_err(|e| ArrayError::device(format!("synchronization failed: {e}")))
    }
}

impl Engine for GpuEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Gpu
    }

    fn name(&self) -> &str {
        "cuda"
    }

    fn device_info(&self) -> Option<DeviceInfo> {
        Some(self.info.clone())
    }

    fn f32_ops(&self) -> &dyn ArrayEngine<f32> {
        self
    }

    fn f64_ops(&self) -> &dyn ArrayEngine<f64> {
        self
    }
}
