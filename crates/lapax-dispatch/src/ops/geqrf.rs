//! Householder QR factorization.

use crate::assemble::{self, OutputRole, ResultLayout};
use crate::error::DispatchResult;
use crate::layout::{self, Trailing};
use crate::shape::MatrixOperand;
use crate::Dispatcher;
use lapax_ir::{Builder, DType, Op};
use tracing::instrument;

/// Result of [`Dispatcher::geqrf`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GeqrfOutput {
    /// `R` above the diagonal, reflectors below.
    pub reflectors: Op,
    /// Householder scalars, `batch ++ (min(m, n),)`.
    pub tau: Op,
    /// Per-problem status.
    pub info: Op,
}

impl Dispatcher<'_> {
    /// QR-factors a batch of `m x n` matrices.
    ///
    /// # Errors
    ///
    /// Operands of rank below 2, and provider rejections.
    #[instrument(skip(self, builder), fields(kernel = "geqrf"))]
    pub fn geqrf<B: Builder + ?Sized>(
        &self,
        builder: &mut B,
        a: Op,
    ) -> DispatchResult<GeqrfOutput> {
        let mat = MatrixOperand::resolve("geqrf", &builder.array_shape(a)?)?;
        let (m, n) = (mat.rows, mat.cols);
        let plan = self
            .descriptors()
            .geqrf(mat.dtype, mat.batch_size(), m, n)?;

        let matrix = layout::buffer(mat.dtype, &mat.batch_dims, Trailing::Matrix(m, n));
        let results = ResultLayout::new()
            .with(OutputRole::Primary, matrix.clone())
            .with(
                OutputRole::Tau,
                layout::buffer(mat.dtype, &mat.batch_dims, Trailing::Vector(mat.min_dim())),
            )
            .with(
                OutputRole::Status,
                layout::buffer(DType::Int32, &mat.batch_dims, Trailing::Scalar),
            )
            .with(OutputRole::Workspace, layout::workspace(plan.workspace));

        let call = assemble::emit(builder, &plan, vec![(a, matrix)], results)?;
        Ok(GeqrfOutput {
            reflectors: call.extract(builder, OutputRole::Primary)?,
            tau: call.extract(builder, OutputRole::Tau)?,
            info: call.extract(builder, OutputRole::Status)?,
        })
    }
}
