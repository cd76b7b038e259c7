//! Pure-Rust reference provider.
//!
//! [`PackedProvider`] validates parameters the way the native library does
//! and packs them into `#[repr(C)]` records, so that descriptor blobs have
//! the same fixed-size, plain-old-data form a native provider produces.
//!
//! Workspace sizes follow the documented minimums:
//!
//! | Kernel | Workspace |
//! |--------|-----------|
//! | batched hipBLAS kernels | one device pointer per batch element (bytes) |
//! | `potrf` | pointer array when batched, otherwise one panel (bytes) |
//! | `getrf`, `geqrf`, `orgqr` | one blocked panel (elements) |
//! | `syevd` | LAPACK `?syevd` / `?heevd` `lwork` (elements) |
//! | `gesvd` | LAPACK `?gesvd` `lwork` (elements) |

use crate::{
    Descriptor, KernelProvider, KernelTarget, OpaqueBlob, ProviderError, ProviderResult,
    SvdJob, TrsmFlags,
};
use bytemuck::{Pod, Zeroable};
use lapax_ir::DType;

/// Size of a device pointer in bytes.
pub const DEVICE_POINTER_BYTES: usize = 8;

/// Column width of a blocked panel.
pub const PANEL_WIDTH: usize = 64;

// hipBLAS / hipSOLVER enum values.
const OP_N: i32 = 111;
const OP_T: i32 = 112;
const OP_C: i32 = 113;
const FILL_UPPER: i32 = 121;
const FILL_LOWER: i32 = 122;
const DIAG_NON_UNIT: i32 = 131;
const DIAG_UNIT: i32 = 132;
const SIDE_LEFT: i32 = 141;
const SIDE_RIGHT: i32 = 142;

/// Solver element type codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(i32)]
pub enum SolverType {
    /// Single-precision real.
    F32 = 0,
    /// Double-precision real.
    F64 = 1,
    /// Single-precision complex.
    C64 = 2,
    /// Double-precision complex.
    C128 = 3,
}

impl SolverType {
    /// Maps an IR element type to a solver type.
    #[must_use]
    pub const fn from_dtype(dtype: DType) -> Option<Self> {
        match dtype {
            DType::Float32 => Some(Self::F32),
            DType::Float64 => Some(Self::F64),
            DType::Complex64 => Some(Self::C64),
            DType::Complex128 => Some(Self::C128),
            _ => None,
        }
    }

    const fn is_complex(self) -> bool {
        matches!(self, Self::C64 | Self::C128)
    }
}

#[derive(Clone, Copy, Debug, Pod, Zeroable)]
#[repr(C)]
struct TrsmBatchedRecord {
    dtype: i32,
    batch: i32,
    m: i32,
    n: i32,
    side: i32,
    uplo: i32,
    trans: i32,
    diag: i32,
}

#[derive(Clone, Copy, Debug, Pod, Zeroable)]
#[repr(C)]
struct PotrfRecord {
    dtype: i32,
    uplo: i32,
    batch: i32,
    n: i32,
    lwork: i32,
}

#[derive(Clone, Copy, Debug, Pod, Zeroable)]
#[repr(C)]
struct GetrfBatchedRecord {
    dtype: i32,
    batch: i32,
    n: i32,
}

#[derive(Clone, Copy, Debug, Pod, Zeroable)]
#[repr(C)]
struct GeneralRecord {
    dtype: i32,
    batch: i32,
    m: i32,
    n: i32,
    k: i32,
    lwork: i32,
}

#[derive(Clone, Copy, Debug, Pod, Zeroable)]
#[repr(C)]
struct SyevdRecord {
    dtype: i32,
    uplo: i32,
    batch: i32,
    n: i32,
    lwork: i32,
}

#[derive(Clone, Copy, Debug, Pod, Zeroable)]
#[repr(C)]
struct GesvdRecord {
    dtype: i32,
    batch: i32,
    m: i32,
    n: i32,
    lwork: i32,
    jobu: i32,
    jobvt: i32,
}

fn pack<T: Pod>(record: &T) -> OpaqueBlob {
    OpaqueBlob::new(bytemuck::bytes_of(record).to_vec())
}

const fn fill_mode(lower: bool) -> i32 {
    if lower {
        FILL_LOWER
    } else {
        FILL_UPPER
    }
}

/// Parameter validation shared by all entry points.
struct Checker {
    kernel: KernelTarget,
}

impl Checker {
    fn solver_type(&self, dtype: DType) -> ProviderResult<SolverType> {
        SolverType::from_dtype(dtype).ok_or(ProviderError::UnsupportedDType {
            kernel: self.kernel,
            dtype,
        })
    }

    fn int(&self, name: &'static str, value: usize) -> ProviderResult<i32> {
        i32::try_from(value).map_err(|_| ProviderError::DimensionOverflow {
            kernel: self.kernel,
            name,
            value,
        })
    }

    fn product(&self, name: &'static str, factors: &[usize]) -> ProviderResult<usize> {
        let mut total = 1usize;
        for &f in factors {
            total = total.checked_mul(f).ok_or(ProviderError::DimensionOverflow {
                kernel: self.kernel,
                name,
                value: usize::MAX,
            })?;
        }
        Ok(total)
    }

    fn sum(&self, name: &'static str, terms: &[usize]) -> ProviderResult<usize> {
        terms.iter().try_fold(0usize, |acc, &t| {
            acc.checked_add(t).ok_or(ProviderError::DimensionOverflow {
                kernel: self.kernel,
                name,
                value: usize::MAX,
            })
        })
    }

    fn invalid(&self, reason: String) -> ProviderError {
        ProviderError::InvalidArgument {
            kernel: self.kernel,
            reason,
        }
    }
}

/// Pure-Rust reference provider.
#[derive(Debug, Default, Clone, Copy)]
pub struct PackedProvider;

impl PackedProvider {
    /// Create a new packed provider.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn pointer_array(check: &Checker, batch: usize) -> ProviderResult<usize> {
        check.product("lwork", &[batch, DEVICE_POINTER_BYTES])
    }
}

impl KernelProvider for PackedProvider {
    fn name(&self) -> &'static str {
        "Packed (Pure Rust)"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn trsm_batched(
        &self,
        dtype: DType,
        batch: usize,
        m: usize,
        n: usize,
        flags: TrsmFlags,
    ) -> ProviderResult<Descriptor> {
        let check = Checker {
            kernel: KernelTarget::TrsmBatched,
        };
        let ty = check.solver_type(dtype)?;
        if flags.conj_a && !flags.trans_a {
            return Err(check.invalid("conjugation requires transposition".to_string()));
        }
        let trans = match (flags.trans_a, flags.conj_a) {
            (false, _) => OP_N,
            (true, false) => OP_T,
            (true, true) => OP_C,
        };
        let lwork = Self::pointer_array(&check, batch)?;
        let record = TrsmBatchedRecord {
            dtype: ty as i32,
            batch: check.int("batch", batch)?,
            m: check.int("m", m)?,
            n: check.int("n", n)?,
            side: if flags.left_side { SIDE_LEFT } else { SIDE_RIGHT },
            uplo: fill_mode(flags.lower),
            trans,
            diag: if flags.unit_diagonal {
                DIAG_UNIT
            } else {
                DIAG_NON_UNIT
            },
        };
        Ok(Descriptor {
            workspace: lwork,
            opaque: pack(&record),
        })
    }

    fn potrf(
        &self,
        dtype: DType,
        lower: bool,
        batch: usize,
        n: usize,
    ) -> ProviderResult<Descriptor> {
        let check = Checker {
            kernel: KernelTarget::Potrf,
        };
        let ty = check.solver_type(dtype)?;
        let lwork = if batch > 1 {
            Self::pointer_array(&check, batch)?
        } else {
            check.product("lwork", &[n, n.min(PANEL_WIDTH), dtype.size_bytes()])?
        };
        let record = PotrfRecord {
            dtype: ty as i32,
            uplo: fill_mode(lower),
            batch: check.int("batch", batch)?,
            n: check.int("n", n)?,
            lwork: check.int("lwork", lwork)?,
        };
        Ok(Descriptor {
            workspace: lwork,
            opaque: pack(&record),
        })
    }

    fn getrf_batched(&self, dtype: DType, batch: usize, n: usize) -> ProviderResult<Descriptor> {
        let check = Checker {
            kernel: KernelTarget::GetrfBatched,
        };
        let ty = check.solver_type(dtype)?;
        let lwork = Self::pointer_array(&check, batch)?;
        let record = GetrfBatchedRecord {
            dtype: ty as i32,
            batch: check.int("batch", batch)?,
            n: check.int("n", n)?,
        };
        Ok(Descriptor {
            workspace: lwork,
            opaque: pack(&record),
        })
    }

    fn getrf(&self, dtype: DType, batch: usize, m: usize, n: usize) -> ProviderResult<Descriptor> {
        let check = Checker {
            kernel: KernelTarget::Getrf,
        };
        let ty = check.solver_type(dtype)?;
        let lwork = check.product("lwork", &[m.max(1), n.min(PANEL_WIDTH).max(1)])?;
        let record = GeneralRecord {
            dtype: ty as i32,
            batch: check.int("batch", batch)?,
            m: check.int("m", m)?,
            n: check.int("n", n)?,
            k: 0,
            lwork: check.int("lwork", lwork)?,
        };
        Ok(Descriptor {
            workspace: lwork,
            opaque: pack(&record),
        })
    }

    fn geqrf(&self, dtype: DType, batch: usize, m: usize, n: usize) -> ProviderResult<Descriptor> {
        let check = Checker {
            kernel: KernelTarget::Geqrf,
        };
        let ty = check.solver_type(dtype)?;
        let lwork = check.product("lwork", &[n.max(1), PANEL_WIDTH])?;
        let record = GeneralRecord {
            dtype: ty as i32,
            batch: check.int("batch", batch)?,
            m: check.int("m", m)?,
            n: check.int("n", n)?,
            k: 0,
            lwork: check.int("lwork", lwork)?,
        };
        Ok(Descriptor {
            workspace: lwork,
            opaque: pack(&record),
        })
    }

    fn orgqr(
        &self,
        dtype: DType,
        batch: usize,
        m: usize,
        n: usize,
        k: usize,
    ) -> ProviderResult<Descriptor> {
        let check = Checker {
            kernel: KernelTarget::Orgqr,
        };
        let ty = check.solver_type(dtype)?;
        if n > m || k > n {
            return Err(check.invalid(format!("requires m >= n >= k, got m={m}, n={n}, k={k}")));
        }
        let lwork = check.product("lwork", &[n.max(1), PANEL_WIDTH])?;
        let record = GeneralRecord {
            dtype: ty as i32,
            batch: check.int("batch", batch)?,
            m: check.int("m", m)?,
            n: check.int("n", n)?,
            k: check.int("k", k)?,
            lwork: check.int("lwork", lwork)?,
        };
        Ok(Descriptor {
            workspace: lwork,
            opaque: pack(&record),
        })
    }

    fn syevd(
        &self,
        dtype: DType,
        lower: bool,
        batch: usize,
        n: usize,
    ) -> ProviderResult<Descriptor> {
        let check = Checker {
            kernel: KernelTarget::Syevd,
        };
        let ty = check.solver_type(dtype)?;
        let n_sq = check.product("lwork", &[n, n])?;
        let lwork = if ty.is_complex() {
            // ?heevd, jobz = 'V': n^2 + 2n
            check.sum("lwork", &[n_sq, n, n])?
        } else {
            // ?syevd, jobz = 'V': 1 + 6n + 2n^2
            let six_n = check.product("lwork", &[n, 6])?;
            check.sum("lwork", &[1, six_n, n_sq, n_sq])?
        };
        let record = SyevdRecord {
            dtype: ty as i32,
            uplo: fill_mode(lower),
            batch: check.int("batch", batch)?,
            n: check.int("n", n)?,
            lwork: check.int("lwork", lwork)?,
        };
        Ok(Descriptor {
            workspace: lwork,
            opaque: pack(&record),
        })
    }

    fn gesvd(
        &self,
        dtype: DType,
        batch: usize,
        m: usize,
        n: usize,
        job: SvdJob,
    ) -> ProviderResult<Descriptor> {
        let check = Checker {
            kernel: KernelTarget::Gesvd,
        };
        let ty = check.solver_type(dtype)?;
        if m < n {
            return Err(check.invalid(format!("requires m >= n, got m={m}, n={n}")));
        }
        let (lo, hi) = (n, m);
        let lwork = if ty.is_complex() {
            // ?gesvd (complex): 2*min + max
            check.sum("lwork", &[lo, lo, hi])?
        } else {
            // ?gesvd (real): max(3*min + max, 5*min)
            let five_min = check.product("lwork", &[lo, 5])?;
            check.sum("lwork", &[lo, lo, lo, hi])?.max(five_min)
        }
        .max(1);
        let job_char = i32::from(job.job_char());
        let record = GesvdRecord {
            dtype: ty as i32,
            batch: check.int("batch", batch)?,
            m: check.int("m", m)?,
            n: check.int("n", n)?,
            lwork: check.int("lwork", lwork)?,
            jobu: job_char,
            jobvt: job_char,
        };
        Ok(Descriptor {
            workspace: lwork,
            opaque: pack(&record),
        })
    }
}
