//! Output assembly.
//!
//! Declares a kernel's result tuple, emits the call, and hands back the
//! caller-visible elements by role. Workspace buffers are declared (the
//! runtime must allocate them) but never handed back.

use crate::descriptor::KernelPlan;
use crate::error::{DispatchError, DispatchResult};
use lapax_ir::{ApiVersion, ArrayShape, Builder, CustomCall, Op, TupleShape};
use lapax_provider::KernelTarget;
use smallvec::{smallvec, SmallVec};
use std::fmt;
use tracing::trace;

/// Meaning of one element of a kernel's result tuple.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OutputRole {
    /// The overwritten input: solution, factor, or reflectors.
    Primary,
    /// LU pivot indices.
    Pivots,
    /// Householder scalars.
    Tau,
    /// Eigenvalues.
    Eigenvalues,
    /// Singular values.
    SingularValues,
    /// Left singular vectors.
    LeftVectors,
    /// Right singular vectors, transposed.
    RightVectors,
    /// Per-problem status codes.
    Status,
    /// Kernel scratch space.
    Workspace,
}

impl OutputRole {
    /// Returns true unless this is scratch space.
    #[must_use]
    pub const fn is_caller_visible(self) -> bool {
        !matches!(self, Self::Workspace)
    }

    const fn name(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Pivots => "pivots",
            Self::Tau => "tau",
            Self::Eigenvalues => "eigenvalues",
            Self::SingularValues => "singular values",
            Self::LeftVectors => "left vectors",
            Self::RightVectors => "right vectors",
            Self::Status => "status",
            Self::Workspace => "workspace",
        }
    }
}

impl fmt::Display for OutputRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Ordered, role-tagged result buffers of a kernel.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResultLayout {
    entries: SmallVec<[(OutputRole, ArrayShape); 6]>,
}

impl ResultLayout {
    /// Creates an empty layout.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a result buffer.
    #[must_use]
    pub fn with(mut self, role: OutputRole, shape: ArrayShape) -> Self {
        self.entries.push((role, shape));
        self
    }

    /// Tuple index of the first buffer with `role`.
    #[must_use]
    pub fn position(&self, role: OutputRole) -> Option<usize> {
        self.entries.iter().position(|(r, _)| *r == role)
    }

    /// Shape of the first buffer with `role`.
    #[must_use]
    pub fn shape(&self, role: OutputRole) -> Option<&ArrayShape> {
        self.entries
            .iter()
            .find(|(r, _)| *r == role)
            .map(|(_, shape)| shape)
    }

    /// Roles in tuple order.
    pub fn roles(&self) -> impl Iterator<Item = OutputRole> + '_ {
        self.entries.iter().map(|(role, _)| *role)
    }

    /// The declared tuple shape.
    #[must_use]
    pub fn tuple_shape(&self) -> TupleShape {
        TupleShape::new(self.entries.iter().map(|(_, shape)| shape.clone()))
    }
}

/// An emitted kernel call.
#[derive(Clone, Debug)]
pub struct AssembledCall {
    kernel: KernelTarget,
    tuple: Op,
    results: ResultLayout,
}

impl AssembledCall {
    /// The tuple-valued call result.
    #[must_use]
    pub fn tuple(&self) -> Op {
        self.tuple
    }

    /// The invoked kernel.
    #[must_use]
    pub fn kernel(&self) -> KernelTarget {
        self.kernel
    }

    /// Declared shape of the output with `role`.
    #[must_use]
    pub fn shape(&self, role: OutputRole) -> Option<&ArrayShape> {
        self.results.shape(role)
    }

    /// Extracts the caller-visible output with `role`.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::MissingOutput`] if the kernel declares no
    /// such output or `role` is scratch space.
    pub fn extract<B: Builder + ?Sized>(
        &self,
        builder: &mut B,
        role: OutputRole,
    ) -> DispatchResult<Op> {
        let index = self
            .results
            .position(role)
            .filter(|_| role.is_caller_visible())
            .ok_or(DispatchError::MissingOutput {
                kernel: self.kernel,
                role,
            })?;
        Ok(builder.get_tuple_element(self.tuple, index)?)
    }
}

/// Emits the custom call described by `plan`.
///
/// `operands` pairs each value with the shape and layout the kernel expects
/// it in.
///
/// # Errors
///
/// Propagates rejections from the execution engine.
pub fn emit<B: Builder + ?Sized>(
    builder: &mut B,
    plan: &KernelPlan,
    operands: Vec<(Op, ArrayShape)>,
    results: ResultLayout,
) -> DispatchResult<AssembledCall> {
    let (operands, operand_shapes): (Vec<_>, Vec<_>) = operands.into_iter().unzip();
    let call = CustomCall {
        target: plan.target.as_str().to_string(),
        operands,
        operand_shapes,
        result: results.tuple_shape(),
        opaque: plan.opaque.as_bytes().to_vec(),
        api_version: ApiVersion::StatusReturning,
    };
    trace!(
        kernel = %plan.target,
        operands = ?call.operand_shapes,
        results = ?call.result,
        "emitting custom call"
    );
    let tuple = builder.custom_call(call)?;
    Ok(AssembledCall {
        kernel: plan.target,
        tuple,
        results,
    })
}

/// Slices the leading `rows x cols` block of every matrix in `op`.
///
/// # Errors
///
/// Propagates rejections from the execution engine.
pub fn leading_block<B: Builder + ?Sized>(
    builder: &mut B,
    op: Op,
    batch_dims: &[usize],
    rows: usize,
    cols: usize,
) -> DispatchResult<Op> {
    let rank = batch_dims.len() + 2;
    let start: SmallVec<[usize; 6]> = smallvec![0; rank];
    let strides: SmallVec<[usize; 6]> = smallvec![1; rank];
    let limit: SmallVec<[usize; 6]> = batch_dims.iter().copied().chain([rows, cols]).collect();
    Ok(builder.slice(op, &start, &limit, &strides)?)
}
