//! Layout planning.
//!
//! Layouts are minor-to-major permutations. The native kernels expect batch
//! dimensions outermost and, within each matrix, rows varying fastest: the
//! row dimension `num_bd` comes first in minor-to-major order, followed by
//! the column dimension `num_bd+1`. For a tensor with `num_bd` batch
//! dimensions:
//!
//! | Buffer             | Minor-to-major                        |
//! |--------------------|---------------------------------------|
//! | matrix             | `(num_bd, num_bd+1, num_bd-1, .., 0)` |
//! | transposed matrix  | `(num_bd+1, num_bd, num_bd-1, .., 0)` |
//! | vector             | `(num_bd, num_bd-1, .., 0)`           |
//! | scalar per problem | `(num_bd-1, .., 0)`                   |
//! | workspace          | `(0,)`                                |
//!
//! The transposed matrix layout hands an `m x n` operand to a kernel that
//! reads it as `n x m` without copying.

use crate::descriptor::WorkspaceRequirement;
use lapax_ir::{ArrayShape, DType, Dims, Layout};

/// Kind of per-problem buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TensorKind {
    /// A matrix whose rows vary fastest.
    Matrix,
    /// A matrix read by the kernel as its transpose.
    TransposedMatrix,
    /// One vector per problem.
    Vector,
    /// One value per problem.
    Scalar,
}

impl TensorKind {
    /// Dimensions following the batch prefix.
    #[must_use]
    pub const fn trailing_rank(self) -> usize {
        match self {
            Self::Matrix | Self::TransposedMatrix => 2,
            Self::Vector => 1,
            Self::Scalar => 0,
        }
    }
}

/// Computes the layout of a buffer of `kind` with `num_bd` batch dimensions.
#[must_use]
pub fn plan(num_bd: usize, kind: TensorKind) -> Layout {
    let batch = (0..num_bd).rev();
    match kind {
        TensorKind::Matrix => Layout::new([num_bd, num_bd + 1].into_iter().chain(batch)),
        TensorKind::TransposedMatrix => {
            Layout::new([num_bd + 1, num_bd].into_iter().chain(batch))
        }
        TensorKind::Vector => Layout::new(std::iter::once(num_bd).chain(batch)),
        TensorKind::Scalar => Layout::new(batch),
    }
}

/// Per-problem shape of a buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Trailing {
    /// `rows x cols`, column-major.
    Matrix(usize, usize),
    /// `rows x cols`, read by the kernel as `cols x rows`.
    TransposedMatrix(usize, usize),
    /// A vector of the given length.
    Vector(usize),
    /// A single value.
    Scalar,
}

impl Trailing {
    /// The buffer kind.
    #[must_use]
    pub const fn kind(self) -> TensorKind {
        match self {
            Self::Matrix(..) => TensorKind::Matrix,
            Self::TransposedMatrix(..) => TensorKind::TransposedMatrix,
            Self::Vector(_) => TensorKind::Vector,
            Self::Scalar => TensorKind::Scalar,
        }
    }

    fn dims(self) -> impl Iterator<Item = usize> {
        let (dims, len): ([usize; 2], usize) = match self {
            Self::Matrix(r, c) | Self::TransposedMatrix(r, c) => ([r, c], 2),
            Self::Vector(n) => ([n, 0], 1),
            Self::Scalar => ([0, 0], 0),
        };
        dims.into_iter().take(len)
    }
}

/// Builds the shape of a batched buffer with its planned layout.
#[must_use]
pub fn buffer(dtype: DType, batch_dims: &[usize], trailing: Trailing) -> ArrayShape {
    let dims: Dims = batch_dims.iter().copied().chain(trailing.dims()).collect();
    ArrayShape {
        dtype,
        dims,
        layout: Some(plan(batch_dims.len(), trailing.kind())),
    }
}

/// Builds the flat scratch buffer of a kernel.
#[must_use]
pub fn workspace(requirement: WorkspaceRequirement) -> ArrayShape {
    ArrayShape {
        dtype: requirement.dtype,
        dims: Dims::from_slice(&[requirement.elements]),
        layout: Some(Layout::row_major(1)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_matrix() {
        assert_eq!(plan(0, TensorKind::Matrix).as_slice(), &[0, 1]);
        assert_eq!(plan(2, TensorKind::Matrix).as_slice(), &[2, 3, 1, 0]);
    }

    #[test]
    fn test_plan_transposed() {
        assert_eq!(plan(0, TensorKind::TransposedMatrix).as_slice(), &[1, 0]);
        assert_eq!(plan(1, TensorKind::TransposedMatrix).as_slice(), &[2, 1, 0]);
    }

    #[test]
    fn test_plan_vector_and_scalar() {
        assert_eq!(plan(2, TensorKind::Vector).as_slice(), &[2, 1, 0]);
        assert_eq!(plan(2, TensorKind::Scalar).as_slice(), &[1, 0]);
        assert!(plan(0, TensorKind::Scalar).as_slice().is_empty());
    }

    #[test]
    fn test_planned_layouts_are_permutations() {
        for num_bd in 0..5 {
            for kind in [
                TensorKind::Matrix,
                TensorKind::TransposedMatrix,
                TensorKind::Vector,
                TensorKind::Scalar,
            ] {
                let layout = plan(num_bd, kind);
                assert_eq!(layout.rank(), num_bd + kind.trailing_rank());
                assert!(layout.is_permutation());
            }
        }
    }

    #[test]
    fn test_buffer() {
        let shape = buffer(DType::Float32, &[10], Trailing::Matrix(4, 3));
        assert_eq!(shape.to_string(), "f32[10,4,3]{1,2,0}");

        let info = buffer(DType::Int32, &[10], Trailing::Scalar);
        assert_eq!(info.to_string(), "s32[10]{0}");

        let unbatched = buffer(DType::Float64, &[], Trailing::Vector(5));
        assert_eq!(unbatched.dims.as_slice(), &[5]);
    }

    #[test]
    fn test_workspace() {
        let shape = workspace(WorkspaceRequirement {
            elements: 96,
            dtype: DType::Int8,
        });
        assert_eq!(shape.to_string(), "s8[96]{0}");
    }
}
