//! Symmetric/Hermitian eigendecomposition.

use crate::assemble::{self, OutputRole, ResultLayout};
use crate::error::DispatchResult;
use crate::layout::{self, Trailing};
use crate::shape::MatrixOperand;
use crate::Dispatcher;
use lapax_ir::{Builder, DType, Op};
use tracing::instrument;

/// Result of [`Dispatcher::syevd`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SyevdOutput {
    /// Eigenvectors, one per column.
    pub vectors: Op,
    /// Eigenvalues in ascending order, of the real type.
    pub values: Op,
    /// Per-problem status.
    pub info: Op,
}

impl Dispatcher<'_> {
    /// Eigendecomposes a batch of symmetric or Hermitian matrices using
    /// divide and conquer. Only the `lower` (or upper) triangle is read.
    ///
    /// # Errors
    ///
    /// Non-square operands, and provider rejections.
    #[instrument(skip(self, builder), fields(kernel = "syevd"))]
    pub fn syevd<B: Builder + ?Sized>(
        &self,
        builder: &mut B,
        a: Op,
        lower: bool,
    ) -> DispatchResult<SyevdOutput> {
        let mat = MatrixOperand::resolve("syevd", &builder.array_shape(a)?)?;
        let n = mat.require_square("syevd")?;
        let plan = self
            .descriptors()
            .syevd(mat.dtype, lower, mat.batch_size(), n)?;

        let matrix = layout::buffer(mat.dtype, &mat.batch_dims, Trailing::Matrix(n, n));
        let results = ResultLayout::new()
            .with(OutputRole::Primary, matrix.clone())
            .with(
                OutputRole::Eigenvalues,
                layout::buffer(mat.dtype.real_type(), &mat.batch_dims, Trailing::Vector(n)),
            )
            .with(
                OutputRole::Status,
                layout::buffer(DType::Int32, &mat.batch_dims, Trailing::Scalar),
            )
            .with(OutputRole::Workspace, layout::workspace(plan.workspace));

        let call = assemble::emit(builder, &plan, vec![(a, matrix)], results)?;
        Ok(SyevdOutput {
            vectors: call.extract(builder, OutputRole::Primary)?,
            values: call.extract(builder, OutputRole::Eigenvalues)?,
            info: call.extract(builder, OutputRole::Status)?,
        })
    }
}
