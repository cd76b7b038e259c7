//! LU factorization with partial pivoting.

use crate::assemble::{self, OutputRole, ResultLayout};
use crate::error::DispatchResult;
use crate::layout::{self, Trailing};
use crate::select::LuKernel;
use crate::shape::MatrixOperand;
use crate::Dispatcher;
use lapax_ir::{Builder, DType, Op};
use tracing::instrument;

/// Result of [`Dispatcher::getrf`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GetrfOutput {
    /// Packed `L` and `U` factors.
    pub lu: Op,
    /// Pivot indices, `batch ++ (min(m, n),)`.
    pub pivots: Op,
    /// Per-problem status; nonzero where `U` is exactly singular.
    pub info: Op,
    /// The kernel that was selected.
    pub kernel: LuKernel,
}

impl Dispatcher<'_> {
    /// LU-factors a batch of `m x n` matrices.
    ///
    /// Many small square matrices go to the batched kernel; everything else
    /// to the general one. See [`LuKernel::select`].
    ///
    /// # Errors
    ///
    /// Operands of rank below 2, and provider rejections.
    #[instrument(skip(self, builder), fields(kernel = "getrf"))]
    pub fn getrf<B: Builder + ?Sized>(
        &self,
        builder: &mut B,
        a: Op,
    ) -> DispatchResult<GetrfOutput> {
        let mat = MatrixOperand::resolve("getrf", &builder.array_shape(a)?)?;
        let (m, n) = (mat.rows, mat.cols);
        let batch = mat.batch_size();

        let kernel = LuKernel::select(batch, m, n, &self.config);
        let plan = self.descriptors().getrf(kernel, mat.dtype, batch, m, n)?;

        let matrix = layout::buffer(mat.dtype, &mat.batch_dims, Trailing::Matrix(m, n));
        let results = ResultLayout::new()
            .with(OutputRole::Primary, matrix.clone())
            .with(
                OutputRole::Pivots,
                layout::buffer(DType::Int32, &mat.batch_dims, Trailing::Vector(mat.min_dim())),
            )
            .with(
                OutputRole::Status,
                layout::buffer(DType::Int32, &mat.batch_dims, Trailing::Scalar),
            )
            .with(OutputRole::Workspace, layout::workspace(plan.workspace));

        let call = assemble::emit(builder, &plan, vec![(a, matrix)], results)?;
        Ok(GetrfOutput {
            lu: call.extract(builder, OutputRole::Primary)?,
            pivots: call.extract(builder, OutputRole::Pivots)?,
            info: call.extract(builder, OutputRole::Status)?,
            kernel,
        })
    }
}
