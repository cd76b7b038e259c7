//! Q reconstruction from Householder reflectors.

use crate::assemble::{self, OutputRole, ResultLayout};
use crate::error::DispatchResult;
use crate::layout::{self, Trailing};
use crate::shape::{self, MatrixOperand};
use crate::Dispatcher;
use lapax_ir::{Builder, DType, Op};
use tracing::instrument;

/// Result of [`Dispatcher::orgqr`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrgqrOutput {
    /// The explicit `Q` factor.
    pub q: Op,
    /// Per-problem status.
    pub info: Op,
}

impl Dispatcher<'_> {
    /// Forms `Q` from the output of [`Dispatcher::geqrf`].
    ///
    /// `tau` is `batch ++ (k,)` with `a`'s batch prefix and `k` no larger
    /// than `min(m, n)`.
    ///
    /// # Errors
    ///
    /// Inconsistent `tau`, and provider rejections.
    #[instrument(skip(self, builder), fields(kernel = "orgqr"))]
    pub fn orgqr<B: Builder + ?Sized>(
        &self,
        builder: &mut B,
        a: Op,
        tau: Op,
    ) -> DispatchResult<OrgqrOutput> {
        let mat = MatrixOperand::resolve("orgqr", &builder.array_shape(a)?)?;
        let k = shape::resolve_reflectors(&mat, &builder.array_shape(tau)?)?;
        let (m, n) = (mat.rows, mat.cols);
        let plan = self
            .descriptors()
            .orgqr(mat.dtype, mat.batch_size(), m, n, k)?;

        let matrix = layout::buffer(mat.dtype, &mat.batch_dims, Trailing::Matrix(m, n));
        let tau_buffer = layout::buffer(mat.dtype, &mat.batch_dims, Trailing::Vector(k));
        let results = ResultLayout::new()
            .with(OutputRole::Primary, matrix.clone())
            .with(
                OutputRole::Status,
                layout::buffer(DType::Int32, &mat.batch_dims, Trailing::Scalar),
            )
            .with(OutputRole::Workspace, layout::workspace(plan.workspace));

        let call = assemble::emit(builder, &plan, vec![(a, matrix), (tau, tau_buffer)], results)?;
        Ok(OrgqrOutput {
            q: call.extract(builder, OutputRole::Primary)?,
            info: call.extract(builder, OutputRole::Status)?,
        })
    }
}
