//! Batched triangular solve.

use crate::assemble::{self, OutputRole, ResultLayout};
use crate::error::{DispatchError, DispatchResult};
use crate::layout::{self, Trailing};
use crate::shape;
use crate::Dispatcher;
use lapax_ir::{Builder, Op};
use lapax_provider::TrsmFlags;
use tracing::instrument;

/// Options of a triangular solve. All default to `false`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct TrsmOptions {
    /// Solve `op(A) X = B` rather than `X op(A) = B`.
    pub left_side: bool,
    /// `A` is lower triangular.
    pub lower: bool,
    /// Use the transpose of `A`.
    pub transpose_a: bool,
    /// Conjugate `A`. Requires `transpose_a`.
    pub conjugate_a: bool,
    /// Assume `A` has a unit diagonal.
    pub unit_diagonal: bool,
}

impl From<TrsmOptions> for TrsmFlags {
    fn from(options: TrsmOptions) -> Self {
        Self {
            left_side: options.left_side,
            lower: options.lower,
            trans_a: options.transpose_a,
            conj_a: options.conjugate_a,
            unit_diagonal: options.unit_diagonal,
        }
    }
}

/// Result of [`Dispatcher::trsm`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrsmOutput {
    /// The solution `X`, shaped like `B`.
    pub solution: Op,
}

impl Dispatcher<'_> {
    /// Solves a batch of triangular systems.
    ///
    /// `b` is `batch ++ (m, n)`; `a` must be `batch ++ (k, k)` with
    /// `k = m` for a left-side solve and `k = n` otherwise. The batched
    /// kernel is always used: unbatched solves are handled natively by the
    /// execution engine, and a single problem is simply a batch of one.
    ///
    /// # Errors
    ///
    /// Shape or dtype mismatches between `a` and `b`, conjugation without
    /// transposition, and provider rejections.
    #[instrument(skip(self, builder), fields(kernel = "trsm"))]
    pub fn trsm<B: Builder + ?Sized>(
        &self,
        builder: &mut B,
        a: Op,
        b: Op,
        options: TrsmOptions,
    ) -> DispatchResult<TrsmOutput> {
        let a_shape = builder.array_shape(a)?;
        let b_shape = builder.array_shape(b)?;
        let problem = shape::resolve_trsm(&a_shape, &b_shape, options.left_side)?;
        if options.conjugate_a && !options.transpose_a {
            return Err(DispatchError::Unsupported {
                op: "trsm",
                reason: "conjugation without transposition",
            });
        }

        let rhs = &problem.rhs;
        let plan = self.descriptors().trsm(
            rhs.dtype,
            rhs.batch_size(),
            rhs.rows,
            rhs.cols,
            options.into(),
        )?;

        let b_buffer = layout::buffer(
            rhs.dtype,
            &rhs.batch_dims,
            Trailing::Matrix(rhs.rows, rhs.cols),
        );
        let a_buffer = layout::buffer(
            rhs.dtype,
            &rhs.batch_dims,
            Trailing::Matrix(problem.k, problem.k),
        );
        let results = ResultLayout::new()
            .with(OutputRole::Primary, b_buffer.clone())
            .with(OutputRole::Workspace, layout::workspace(plan.workspace))
            .with(OutputRole::Workspace, layout::workspace(plan.workspace));

        let call = assemble::emit(builder, &plan, vec![(a, a_buffer), (b, b_buffer)], results)?;
        Ok(TrsmOutput {
            solution: call.extract(builder, OutputRole::Primary)?,
        })
    }
}
