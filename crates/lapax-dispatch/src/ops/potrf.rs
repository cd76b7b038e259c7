//! Cholesky factorization.

use crate::assemble::{self, OutputRole, ResultLayout};
use crate::error::DispatchResult;
use crate::layout::{self, Trailing};
use crate::shape::MatrixOperand;
use crate::Dispatcher;
use lapax_ir::{Builder, DType, Op};
use tracing::instrument;

/// Result of [`Dispatcher::potrf`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PotrfOutput {
    /// The factor, in the requested triangle.
    pub factor: Op,
    /// Per-problem status; nonzero where the matrix is not positive definite.
    pub info: Op,
}

impl Dispatcher<'_> {
    /// Cholesky-factors a batch of Hermitian positive-definite matrices.
    ///
    /// # Errors
    ///
    /// Non-square or rank-deficient operands, and provider rejections.
    #[instrument(skip(self, builder), fields(kernel = "potrf"))]
    pub fn potrf<B: Builder + ?Sized>(
        &self,
        builder: &mut B,
        a: Op,
        lower: bool,
    ) -> DispatchResult<PotrfOutput> {
        let mat = MatrixOperand::resolve("potrf", &builder.array_shape(a)?)?;
        let n = mat.require_square("potrf")?;
        let plan = self
            .descriptors()
            .potrf(mat.dtype, lower, mat.batch_size(), n)?;

        let matrix = layout::buffer(mat.dtype, &mat.batch_dims, Trailing::Matrix(n, n));
        let results = ResultLayout::new()
            .with(OutputRole::Primary, matrix.clone())
            .with(
                OutputRole::Status,
                layout::buffer(DType::Int32, &mat.batch_dims, Trailing::Scalar),
            )
            .with(OutputRole::Workspace, layout::workspace(plan.workspace));

        let call = assemble::emit(builder, &plan, vec![(a, matrix)], results)?;
        Ok(PotrfOutput {
            factor: call.extract(builder, OutputRole::Primary)?,
            info: call.extract(builder, OutputRole::Status)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::test_util::graph_with;
    use lapax_provider::PackedProvider;

    #[test]
    fn test_unbatched() {
        let provider = PackedProvider::new();
        let dispatcher = Dispatcher::new(&provider);
        let (mut graph, a) = graph_with(DType::Float64, &[5, 5]);

        let out = dispatcher.potrf(&mut graph, a, false).unwrap();
        assert_eq!(
            graph.array_shape(out.factor).unwrap().to_string(),
            "f64[5,5]{0,1}"
        );
        let info = graph.array_shape(out.info).unwrap();
        assert_eq!(info.dtype, DType::Int32);
        assert!(info.dims.is_empty());
    }

    #[test]
    fn test_rejects_rectangular() {
        let provider = PackedProvider::new();
        let dispatcher = Dispatcher::new(&provider);
        let (mut graph, a) = graph_with(DType::Float32, &[2, 4, 3]);
        assert!(dispatcher.potrf(&mut graph, a, true).is_err());
        assert_eq!(graph.custom_calls().count(), 0);
    }
}
