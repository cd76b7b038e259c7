//! Singular value decomposition.

use crate::assemble::{self, OutputRole, ResultLayout};
use crate::error::DispatchResult;
use crate::layout::{self, Trailing};
use crate::select::SvdPath;
use crate::shape::MatrixOperand;
use crate::Dispatcher;
use lapax_ir::{Builder, DType, Op};
use lapax_provider::SvdJob;
use tracing::instrument;

/// Options of an SVD.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SvdOptions {
    /// Return square `u` and `vt` rather than the economy form.
    pub full_matrices: bool,
    /// Ask the kernel to compute singular vectors.
    pub compute_uv: bool,
}

impl Default for SvdOptions {
    fn default() -> Self {
        Self {
            full_matrices: true,
            compute_uv: true,
        }
    }
}

impl From<SvdOptions> for SvdJob {
    fn from(options: SvdOptions) -> Self {
        Self {
            compute_uv: options.compute_uv,
            full_matrices: options.full_matrices,
        }
    }
}

/// Result of [`Dispatcher::gesvd`].
///
/// Shapes are always in the caller's orientation, whichever path the
/// kernel took.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GesvdOutput {
    /// Singular values, `batch ++ (min(m, n),)`, of the real type.
    pub s: Op,
    /// Left singular vectors, `batch ++ (m, m)` or `batch ++ (m, min)`.
    pub u: Op,
    /// Right singular vectors transposed, `batch ++ (n, n)` or `batch ++ (min, n)`.
    pub vt: Op,
    /// Per-problem status.
    pub info: Op,
    /// Orientation the kernel was invoked in.
    pub path: SvdPath,
}

impl Dispatcher<'_> {
    /// Computes the SVD `a = u diag(s) vt` of a batch of `m x n` matrices.
    ///
    /// Wide inputs (`m < n`) are factored as their transpose through the
    /// transposed layout, with the vector outputs swapped back. Without
    /// `full_matrices`, `u` and `vt` are cut to their leading
    /// `min(m, n)` columns and rows. `compute_uv = false` is forwarded to
    /// the kernel; the vector outputs are still declared and returned, and
    /// their contents are then unspecified.
    ///
    /// # Errors
    ///
    /// Operands of rank below 2, and provider rejections.
    #[instrument(skip(self, builder), fields(kernel = "gesvd"))]
    pub fn gesvd<B: Builder + ?Sized>(
        &self,
        builder: &mut B,
        a: Op,
        options: SvdOptions,
    ) -> DispatchResult<GesvdOutput> {
        let mat = MatrixOperand::resolve("gesvd", &builder.array_shape(a)?)?;
        let (m, n, min) = (mat.rows, mat.cols, mat.min_dim());
        let batch_dims = &mat.batch_dims;

        let path = SvdPath::select(m, n);
        let plan = self.descriptors().gesvd(
            path,
            mat.dtype,
            mat.batch_size(),
            m,
            n,
            options.into(),
        )?;

        let matrix = layout::buffer(mat.dtype, batch_dims, path.matrix(m, n));
        let vectors = |role: OutputRole| {
            let side = if role == OutputRole::LeftVectors { m } else { n };
            layout::buffer(mat.dtype, batch_dims, path.matrix(side, side))
        };
        let [first, second] = path.vector_roles();
        let results = ResultLayout::new()
            .with(OutputRole::Primary, matrix.clone())
            .with(
                OutputRole::SingularValues,
                layout::buffer(mat.dtype.real_type(), batch_dims, Trailing::Vector(min)),
            )
            .with(first, vectors(first))
            .with(second, vectors(second))
            .with(
                OutputRole::Status,
                layout::buffer(DType::Int32, batch_dims, Trailing::Scalar),
            )
            .with(OutputRole::Workspace, layout::workspace(plan.workspace));

        let call = assemble::emit(builder, &plan, vec![(a, matrix)], results)?;
        let s = call.extract(builder, OutputRole::SingularValues)?;
        let mut u = call.extract(builder, OutputRole::LeftVectors)?;
        let mut vt = call.extract(builder, OutputRole::RightVectors)?;
        let info = call.extract(builder, OutputRole::Status)?;

        if !options.full_matrices {
            u = assemble::leading_block(builder, u, batch_dims, m, min)?;
            vt = assemble::leading_block(builder, vt, batch_dims, min, n)?;
        }

        Ok(GesvdOutput {
            s,
            u,
            vt,
            info,
            path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::test_util::graph_with;
    use lapax_ir::Node;
    use lapax_provider::PackedProvider;

    #[test]
    fn test_tall_full() {
        let provider = PackedProvider::new();
        let dispatcher = Dispatcher::new(&provider);
        let (mut graph, a) = graph_with(DType::Float32, &[5, 3]);

        let out = dispatcher.gesvd(&mut graph, a, SvdOptions::default()).unwrap();
        assert_eq!(out.path, SvdPath::Direct);
        assert_eq!(graph.array_shape(out.u).unwrap().to_string(), "f32[5,5]{0,1}");
        assert_eq!(graph.array_shape(out.vt).unwrap().to_string(), "f32[3,3]{0,1}");
        assert_eq!(graph.array_shape(out.s).unwrap().to_string(), "f32[3]{0}");
        assert!(matches!(
            graph.node(out.u),
            Some(Node::GetTupleElement { index: 2, .. })
        ));
    }

    #[test]
    fn test_complex_singular_values_are_real() {
        let provider = PackedProvider::new();
        let dispatcher = Dispatcher::new(&provider);
        let (mut graph, a) = graph_with(DType::Complex64, &[2, 4, 4]);

        let out = dispatcher.gesvd(&mut graph, a, SvdOptions::default()).unwrap();
        assert_eq!(graph.array_shape(out.s).unwrap().dtype, DType::Float32);
        assert_eq!(graph.array_shape(out.u).unwrap().dtype, DType::Complex64);
    }

    #[test]
    fn test_no_vectors_still_declares_outputs() {
        let provider = PackedProvider::new();
        let dispatcher = Dispatcher::new(&provider);
        let (mut graph, a) = graph_with(DType::Float64, &[6, 4]);

        let options = SvdOptions {
            compute_uv: false,
            ..SvdOptions::default()
        };
        let out = dispatcher.gesvd(&mut graph, a, options).unwrap();
        assert_eq!(graph.custom_calls().next().unwrap().result.arity(), 6);
        assert_eq!(graph.array_shape(out.u).unwrap().dims.as_slice(), &[6, 6]);
    }
}
