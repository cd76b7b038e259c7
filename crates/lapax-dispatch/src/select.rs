//! Kernel selection.
//!
//! Selection is a pure function of the resolved dimensions and the
//! [`DispatchConfig`]. Only LU has a real choice between kernels; SVD
//! chooses an orientation.

use crate::assemble::OutputRole;
use crate::config::DispatchConfig;
use crate::layout::Trailing;
use lapax_provider::KernelTarget;
use tracing::debug;

/// LU factorization kernel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LuKernel {
    /// Batched kernel specialized for many small square matrices.
    Batched,
    /// General pivoted LU.
    General,
}

impl LuKernel {
    /// Chooses the LU kernel for `batch` problems of size `m x n`.
    ///
    /// The batched kernel is used iff there is more than one problem, the
    /// matrices are square, and `m / batch` does not exceed the configured
    /// threshold. The ratio uses integer division.
    #[must_use]
    pub fn select(batch: usize, m: usize, n: usize, config: &DispatchConfig) -> Self {
        let kernel = if config.enable_batched_getrf
            && batch > 1
            && m == n
            && m / batch <= config.getrf_batched_threshold
        {
            Self::Batched
        } else {
            Self::General
        };
        debug!(batch, m, n, ?kernel, "selected LU kernel");
        kernel
    }

    /// The kernel symbol.
    #[must_use]
    pub const fn target(self) -> KernelTarget {
        match self {
            Self::Batched => KernelTarget::GetrfBatched,
            Self::General => KernelTarget::Getrf,
        }
    }
}

/// Orientation of an SVD call.
///
/// The kernel requires `m >= n`. For wide inputs the operand is handed over
/// through the transposed layout and the roles of the two vector outputs
/// swap. There is no alternative (e.g. Jacobi) SVD path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SvdPath {
    /// `m >= n`: the kernel sees the operand as is.
    Direct,
    /// `m < n`: the kernel factors the `n x m` transpose.
    Transposed,
}

impl SvdPath {
    /// Chooses the orientation for an `m x n` operand.
    #[must_use]
    pub fn select(m: usize, n: usize) -> Self {
        let path = if m < n { Self::Transposed } else { Self::Direct };
        debug!(m, n, ?path, "selected SVD orientation");
        path
    }

    /// Dimensions as seen by the kernel.
    #[must_use]
    pub const fn kernel_dims(self, m: usize, n: usize) -> (usize, usize) {
        match self {
            Self::Direct => (m, n),
            Self::Transposed => (n, m),
        }
    }

    /// Per-problem shape of the `m x n` input and overwritten output.
    #[must_use]
    pub const fn matrix(self, m: usize, n: usize) -> Trailing {
        match self {
            Self::Direct => Trailing::Matrix(m, n),
            Self::Transposed => Trailing::TransposedMatrix(m, n),
        }
    }

    /// Roles of the two vector-matrix outputs, in kernel tuple order.
    ///
    /// The kernel always writes its own left vectors first. On the
    /// transposed path those are the caller's right vectors.
    #[must_use]
    pub const fn vector_roles(self) -> [OutputRole; 2] {
        match self {
            Self::Direct => [OutputRole::LeftVectors, OutputRole::RightVectors],
            Self::Transposed => [OutputRole::RightVectors, OutputRole::LeftVectors],
        }
    }
}
