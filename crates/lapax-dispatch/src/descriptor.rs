//! Descriptor building.
//!
//! Thin adapter over a [`KernelProvider`]: forwards the resolved dimensions
//! and pairs the provider's answer with the kernel symbol and the element
//! type of its scratch buffer.

use crate::error::DispatchResult;
use crate::select::{LuKernel, SvdPath};
use lapax_ir::DType;
use lapax_provider::{Descriptor, KernelProvider, KernelTarget, OpaqueBlob, SvdJob, TrsmFlags};
use tracing::debug;

/// Size and element type of a kernel's scratch buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WorkspaceRequirement {
    /// Number of elements.
    pub elements: usize,
    /// Element type.
    pub dtype: DType,
}

/// Everything the assembler needs to emit one kernel call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KernelPlan {
    /// The kernel to invoke.
    pub target: KernelTarget,
    /// Its scratch buffer.
    pub workspace: WorkspaceRequirement,
    /// Provider parameters, passed through untouched.
    pub opaque: OpaqueBlob,
}

impl KernelPlan {
    fn new(target: KernelTarget, descriptor: Descriptor, workspace_dtype: DType) -> Self {
        debug!(
            kernel = %target,
            workspace = descriptor.workspace,
            workspace_dtype = %workspace_dtype,
            opaque_len = descriptor.opaque.len(),
            "built kernel descriptor"
        );
        Self {
            target,
            workspace: WorkspaceRequirement {
                elements: descriptor.workspace,
                dtype: workspace_dtype,
            },
            opaque: descriptor.opaque,
        }
    }
}

/// Builds [`KernelPlan`]s from a provider.
#[derive(Clone, Copy)]
pub struct DescriptorBuilder<'p> {
    provider: &'p dyn KernelProvider,
}

impl<'p> DescriptorBuilder<'p> {
    /// Creates a builder over `provider`.
    #[must_use]
    pub fn new(provider: &'p dyn KernelProvider) -> Self {
        Self { provider }
    }

    /// Triangular solve with right-hand sides of shape `m x n`.
    ///
    /// # Errors
    ///
    /// Propagates provider rejections.
    pub fn trsm(
        &self,
        dtype: DType,
        batch: usize,
        m: usize,
        n: usize,
        flags: TrsmFlags,
    ) -> DispatchResult<KernelPlan> {
        let descriptor = self.provider.trsm_batched(dtype, batch, m, n, flags)?;
        Ok(KernelPlan::new(KernelTarget::TrsmBatched, descriptor, DType::Int8))
    }

    /// Cholesky factorization.
    ///
    /// # Errors
    ///
    /// Propagates provider rejections.
    pub fn potrf(
        &self,
        dtype: DType,
        lower: bool,
        batch: usize,
        n: usize,
    ) -> DispatchResult<KernelPlan> {
        let descriptor = self.provider.potrf(dtype, lower, batch, n)?;
        Ok(KernelPlan::new(KernelTarget::Potrf, descriptor, DType::Int8))
    }

    /// LU factorization with the selected kernel.
    ///
    /// The batched kernel takes a byte workspace; the general kernel
    /// a workspace of the operand's element type.
    ///
    /// # Errors
    ///
    /// Propagates provider rejections.
    pub fn getrf(
        &self,
        kernel: LuKernel,
        dtype: DType,
        batch: usize,
        m: usize,
        n: usize,
    ) -> DispatchResult<KernelPlan> {
        let (descriptor, workspace_dtype) = match kernel {
            LuKernel::Batched => (self.provider.getrf_batched(dtype, batch, m)?, DType::Int8),
            LuKernel::General => (self.provider.getrf(dtype, batch, m, n)?, dtype),
        };
        Ok(KernelPlan::new(kernel.target(), descriptor, workspace_dtype))
    }

    /// Householder QR.
    ///
    /// # Errors
    ///
    /// Propagates provider rejections.
    pub fn geqrf(&self, dtype: DType, batch: usize, m: usize, n: usize) -> DispatchResult<KernelPlan> {
        let descriptor = self.provider.geqrf(dtype, batch, m, n)?;
        Ok(KernelPlan::new(KernelTarget::Geqrf, descriptor, dtype))
    }

    /// Q reconstruction from `k` reflectors.
    ///
    /// # Errors
    ///
    /// Propagates provider rejections.
    pub fn orgqr(
        &self,
        dtype: DType,
        batch: usize,
        m: usize,
        n: usize,
        k: usize,
    ) -> DispatchResult<KernelPlan> {
        let descriptor = self.provider.orgqr(dtype, batch, m, n, k)?;
        Ok(KernelPlan::new(KernelTarget::Orgqr, descriptor, dtype))
    }

    /// Symmetric/Hermitian eigendecomposition.
    ///
    /// # Errors
    ///
    /// Propagates provider rejections.
    pub fn syevd(
        &self,
        dtype: DType,
        lower: bool,
        batch: usize,
        n: usize,
    ) -> DispatchResult<KernelPlan> {
        let descriptor = self.provider.syevd(dtype, lower, batch, n)?;
        Ok(KernelPlan::new(KernelTarget::Syevd, descriptor, dtype))
    }

    /// SVD of an `m x n` operand in the chosen orientation.
    ///
    /// `m` and `n` are the caller's dimensions; the provider sees them
    /// swapped on the transposed path.
    ///
    /// # Errors
    ///
    /// Propagates provider rejections.
    pub fn gesvd(
        &self,
        path: SvdPath,
        dtype: DType,
        batch: usize,
        m: usize,
        n: usize,
        job: SvdJob,
    ) -> DispatchResult<KernelPlan> {
        let (km, kn) = path.kernel_dims(m, n);
        let descriptor = self.provider.gesvd(dtype, batch, km, kn, job)?;
        Ok(KernelPlan::new(KernelTarget::Gesvd, descriptor, dtype))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lapax_provider::{PackedProvider, ProviderError};

    #[test]
    fn test_workspace_dtypes() {
        let provider = PackedProvider::new();
        let builder = DescriptorBuilder::new(&provider);

        let trsm = builder
            .trsm(DType::Float32, 2, 3, 3, TrsmFlags::default())
            .unwrap();
        assert_eq!(trsm.workspace.dtype, DType::Int8);

        let batched = builder
            .getrf(LuKernel::Batched, DType::Float64, 4, 8, 8)
            .unwrap();
        assert_eq!(batched.target, KernelTarget::GetrfBatched);
        assert_eq!(batched.workspace.dtype, DType::Int8);

        let general = builder
            .getrf(LuKernel::General, DType::Float64, 1, 8, 8)
            .unwrap();
        assert_eq!(general.target, KernelTarget::Getrf);
        assert_eq!(general.workspace.dtype, DType::Float64);

        let syevd = builder.syevd(DType::Complex64, true, 1, 4).unwrap();
        assert_eq!(syevd.workspace.dtype, DType::Complex64);
    }

    #[test]
    fn test_gesvd_transposed_dims_reach_provider() {
        let provider = PackedProvider::new();
        let builder = DescriptorBuilder::new(&provider);
        let job = SvdJob {
            compute_uv: true,
            full_matrices: true,
        };
        let via_path = builder
            .gesvd(SvdPath::Transposed, DType::Float32, 1, 3, 5, job)
            .unwrap();
        let direct = provider.gesvd(DType::Float32, 1, 5, 3, job).unwrap();
        assert_eq!(via_path.opaque, direct.opaque);
        assert_eq!(via_path.workspace.elements, direct.workspace);
    }

    #[test]
    fn test_provider_errors_propagate() {
        let provider = PackedProvider::new();
        let builder = DescriptorBuilder::new(&provider);
        let err = builder.potrf(DType::Int32, true, 1, 4).unwrap_err();
        assert!(matches!(
            err,
            crate::DispatchError::Descriptor(ProviderError::UnsupportedDType { .. })
        ));
    }
}
