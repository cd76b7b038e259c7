//! # Lapax Kernel Provider Interface
//!
//! This crate defines the boundary between the dispatch layer and the
//! native solver library that actually owns the factorization kernels.
//!
//! ## Overview
//!
//! For every kernel the provider exposes two things:
//!
//! - **A symbolic kernel name** ([`KernelTarget`]) that the host runtime
//!   resolves to a callable. The dispatch layer only ever references it.
//! - **A descriptor-building entry point** that, given the element type and
//!   the resolved problem dimensions, returns the scratch workspace size and
//!   an opaque, kernel-specific parameter blob ([`Descriptor`]).
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   KernelProvider Trait                      │
//! └─────────────────────────────────────────────────────────────┘
//!            ▲                                   ▲
//!            │                                   │
//! ┌──────────┴───────────┐            ┌──────────┴───────────┐
//! │   PackedProvider     │            │  native hipSOLVER /  │
//! │   (pure Rust)        │            │  hipBLAS bindings    │
//! └──────────────────────┘            └──────────────────────┘
//! ```
//!
//! The blob is never interpreted by the dispatch layer. It is forwarded
//! verbatim to the kernel through the custom call.
//!
//! ## Thread Safety
//!
//! Providers must be `Send + Sync`: the dispatch layer may build
//! descriptors from several compiler threads at once.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod packed;

use lapax_ir::DType;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

pub use packed::PackedProvider;

/// Platform name under which the kernels are registered with the runtime.
pub const PLATFORM: &str = "ROCM";

/// Errors raised while building a kernel descriptor.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// The kernel has no implementation for this element type.
    #[error("{kernel} does not support element type {dtype}")]
    UnsupportedDType {
        /// The kernel being configured.
        kernel: KernelTarget,
        /// The rejected element type.
        dtype: DType,
    },

    /// A dimension does not fit the provider's integer ABI.
    #[error("{kernel}: {name}={value} exceeds the provider's 32-bit dimension limit")]
    DimensionOverflow {
        /// The kernel being configured.
        kernel: KernelTarget,
        /// Parameter name.
        name: &'static str,
        /// Offending value.
        value: usize,
    },

    /// The parameter combination is invalid for the kernel.
    #[error("{kernel}: invalid arguments: {reason}")]
    InvalidArgument {
        /// The kernel being configured.
        kernel: KernelTarget,
        /// What was wrong.
        reason: String,
    },

    /// The provider library is not available in this process.
    #[error("kernel provider not available: {0}")]
    NotAvailable(String),
}

/// Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Callable kernel symbols referenced by the dispatch layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KernelTarget {
    /// Batched triangular solve (hipBLAS).
    TrsmBatched,
    /// Cholesky factorization (hipSOLVER).
    Potrf,
    /// Batched LU for many small matrices (hipBLAS).
    GetrfBatched,
    /// General LU with partial pivoting (hipSOLVER).
    Getrf,
    /// Householder QR (hipSOLVER).
    Geqrf,
    /// Q reconstruction from Householder reflectors (hipSOLVER).
    Orgqr,
    /// Symmetric/Hermitian eigendecomposition, divide and conquer (hipSOLVER).
    Syevd,
    /// Singular value decomposition (hipSOLVER).
    Gesvd,
}

impl KernelTarget {
    /// Returns the registered symbol name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TrsmBatched => "hipblas_trsm_batched",
            Self::Potrf => "hipsolver_potrf",
            Self::GetrfBatched => "hipblas_getrf_batched",
            Self::Getrf => "hipsolver_getrf",
            Self::Geqrf => "hipsolver_geqrf",
            Self::Orgqr => "hipsolver_orgqr",
            Self::Syevd => "hipsolver_syevd",
            Self::Gesvd => "hipsolver_gesvd",
        }
    }

    /// Every kernel the dispatch layer may reference.
    #[must_use]
    pub const fn all() -> [Self; 8] {
        [
            Self::TrsmBatched,
            Self::Potrf,
            Self::GetrfBatched,
            Self::Getrf,
            Self::Geqrf,
            Self::Orgqr,
            Self::Syevd,
            Self::Gesvd,
        ]
    }

    /// Looks up a kernel by its registered symbol name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::all().into_iter().find(|k| k.as_str() == name)
    }
}

impl fmt::Display for KernelTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable, provider-owned parameter bytes.
///
/// Cloning is cheap. The contents are deliberately not exposed in any
/// structured form.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct OpaqueBlob(Arc<[u8]>);

impl OpaqueBlob {
    /// Wraps bytes produced by a provider.
    #[must_use]
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self(bytes.into())
    }

    /// Returns the raw bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the blob is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for OpaqueBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OpaqueBlob({} bytes)", self.0.len())
    }
}

/// Output of a descriptor-building entry point.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Descriptor {
    /// Scratch workspace size in elements of the workspace buffer's dtype.
    pub workspace: usize,
    /// Kernel parameters, forwarded untouched.
    pub opaque: OpaqueBlob,
}

/// Flags of a triangular solve.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct TrsmFlags {
    /// Solve `op(A) X = B` (left) rather than `X op(A) = B` (right).
    pub left_side: bool,
    /// `A` is lower triangular.
    pub lower: bool,
    /// Use `A^T`.
    pub trans_a: bool,
    /// Conjugate `A` (only together with `trans_a`).
    pub conj_a: bool,
    /// Assume a unit diagonal.
    pub unit_diagonal: bool,
}

/// Singular-vector computation mode of an SVD.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SvdJob {
    /// Compute singular vectors at all.
    pub compute_uv: bool,
    /// Compute full square vector matrices rather than the economy form.
    pub full_matrices: bool,
}

impl SvdJob {
    /// LAPACK job character for both vector matrices.
    #[must_use]
    pub const fn job_char(self) -> u8 {
        match (self.compute_uv, self.full_matrices) {
            (false, _) => b'N',
            (true, true) => b'A',
            (true, false) => b'S',
        }
    }
}

/// Descriptor-building interface of a native solver library.
///
/// All dimensions are the *resolved* problem dimensions: after any
/// transposition chosen by the dispatch layer, and for batched kernels the
/// batch count rather than the batch shape.
pub trait KernelProvider: Send + Sync {
    /// Get the name of this provider.
    fn name(&self) -> &'static str;

    /// Check if this provider is available.
    fn is_available(&self) -> bool;

    /// Batched triangular solve with `B` of shape `m x n`.
    fn trsm_batched(
        &self,
        dtype: DType,
        batch: usize,
        m: usize,
        n: usize,
        flags: TrsmFlags,
    ) -> ProviderResult<Descriptor>;

    /// Cholesky factorization of `n x n` matrices.
    fn potrf(&self, dtype: DType, lower: bool, batch: usize, n: usize)
        -> ProviderResult<Descriptor>;

    /// Batched LU of many small `n x n` matrices.
    fn getrf_batched(&self, dtype: DType, batch: usize, n: usize) -> ProviderResult<Descriptor>;

    /// General LU of `m x n` matrices.
    fn getrf(&self, dtype: DType, batch: usize, m: usize, n: usize)
        -> ProviderResult<Descriptor>;

    /// Householder QR of `m x n` matrices.
    fn geqrf(&self, dtype: DType, batch: usize, m: usize, n: usize)
        -> ProviderResult<Descriptor>;

    /// Q reconstruction from `k` reflectors of an `m x n` matrix.
    fn orgqr(
        &self,
        dtype: DType,
        batch: usize,
        m: usize,
        n: usize,
        k: usize,
    ) -> ProviderResult<Descriptor>;

    /// Symmetric/Hermitian eigendecomposition of `n x n` matrices.
    fn syevd(&self, dtype: DType, lower: bool, batch: usize, n: usize)
        -> ProviderResult<Descriptor>;

    /// SVD of `m x n` matrices, with `m >= n` expected by the kernel.
    fn gesvd(
        &self,
        dtype: DType,
        batch: usize,
        m: usize,
        n: usize,
        job: SvdJob,
    ) -> ProviderResult<Descriptor>;
}

/// Get the default kernel provider.
///
/// Returns the pure-Rust [`PackedProvider`]. Native bindings plug in by
/// implementing [`KernelProvider`] themselves.
#[must_use]
pub fn default_provider() -> Box<dyn KernelProvider> {
    Box::new(PackedProvider::new())
}
