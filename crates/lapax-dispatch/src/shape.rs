//! Shape resolution.
//!
//! Every operand is read as `batch_dims ++ (rows, cols)`. The batch prefix
//! may be empty; the resolved problem is then a single matrix.

use crate::error::{DispatchError, DispatchResult};
use lapax_ir::{ArrayShape, DType, Dims};
use smallvec::SmallVec;

/// Number of trailing dimensions of a matrix operand.
pub const MATRIX_RANK: usize = 2;

/// Product of a batch prefix. The empty prefix is one problem.
///
/// Any zero extent makes the batch empty, however large the other extents
/// are. A non-empty product that overflows saturates at `usize::MAX`, which
/// every provider rejects as exceeding its dimension limit.
#[must_use]
pub fn batch_size(batch_dims: &[usize]) -> usize {
    if batch_dims.contains(&0) {
        return 0;
    }
    batch_dims
        .iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .unwrap_or(usize::MAX)
}

/// A matrix operand split into its batch prefix and problem dimensions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatrixOperand {
    /// Element type.
    pub dtype: DType,
    /// Leading batch dimensions.
    pub batch_dims: Dims,
    /// Rows of each matrix.
    pub rows: usize,
    /// Columns of each matrix.
    pub cols: usize,
}

impl MatrixOperand {
    /// Splits `shape` into batch prefix and trailing `(rows, cols)`.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::RankTooSmall`] for operands of rank below 2.
    pub fn resolve(op: &'static str, shape: &ArrayShape) -> DispatchResult<Self> {
        let batch = shape
            .batch_dims(MATRIX_RANK)
            .ok_or(DispatchError::RankTooSmall {
                op,
                rank: shape.rank(),
                required: MATRIX_RANK,
            })?;
        let split = batch.len();
        Ok(Self {
            dtype: shape.dtype,
            batch_dims: SmallVec::from_slice(batch),
            rows: shape.dims[split],
            cols: shape.dims[split + 1],
        })
    }

    /// Number of batch dimensions.
    #[must_use]
    pub fn num_bd(&self) -> usize {
        self.batch_dims.len()
    }

    /// Number of independent problems.
    #[must_use]
    pub fn batch_size(&self) -> usize {
        batch_size(&self.batch_dims)
    }

    /// `min(rows, cols)`.
    #[must_use]
    pub fn min_dim(&self) -> usize {
        self.rows.min(self.cols)
    }

    /// Returns the side length of a square operand.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::NotSquare`] otherwise.
    pub fn require_square(&self, op: &'static str) -> DispatchResult<usize> {
        if self.rows == self.cols {
            Ok(self.rows)
        } else {
            Err(DispatchError::NotSquare {
                op,
                rows: self.rows,
                cols: self.cols,
            })
        }
    }
}

/// Checks that two operands share an element type.
///
/// # Errors
///
/// Returns [`DispatchError::DTypeMismatch`] otherwise.
pub fn require_same_dtype(op: &'static str, expected: DType, got: DType) -> DispatchResult<()> {
    if expected == got {
        Ok(())
    } else {
        Err(DispatchError::DTypeMismatch { op, expected, got })
    }
}

/// Resolved dimensions of a triangular solve.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrsmProblem {
    /// The right-hand side `B`, which is also the shape of the solution.
    pub rhs: MatrixOperand,
    /// Side length of the triangular matrix.
    pub k: usize,
}

/// Resolves `op(A) X = B` (left) or `X op(A) = B` (right).
///
/// `a` must be `batch ++ (k, k)` where `k` is `B`'s row count on the left
/// and its column count on the right, with `B`'s batch prefix and dtype.
///
/// # Errors
///
/// Returns [`DispatchError::ShapeMismatch`] naming both shapes when the
/// triangular operand does not fit the right-hand side, and
/// [`DispatchError::DTypeMismatch`] when the element types differ.
pub fn resolve_trsm(
    a: &ArrayShape,
    b: &ArrayShape,
    left_side: bool,
) -> DispatchResult<TrsmProblem> {
    let rhs = MatrixOperand::resolve("trsm", b)?;
    let k = if left_side { rhs.rows } else { rhs.cols };

    let expected_dims = rhs.batch_dims.iter().copied().chain([k, k]);
    if !a.dims.iter().copied().eq(expected_dims) {
        return Err(DispatchError::ShapeMismatch {
            op: "trsm",
            details: format!("got {a} and {b}"),
        });
    }
    require_same_dtype("trsm", b.dtype, a.dtype)?;

    Ok(TrsmProblem { rhs, k })
}

/// Resolves the reflector count of an orgqr call.
///
/// `tau` must be `batch ++ (k,)` with `a`'s batch prefix and dtype and
/// `k <= min(rows, cols)`.
///
/// # Errors
///
/// Returns a shape or dtype error describing the inconsistency.
pub fn resolve_reflectors(a: &MatrixOperand, tau: &ArrayShape) -> DispatchResult<usize> {
    let mismatch = |why: &str| DispatchError::ShapeMismatch {
        op: "orgqr",
        details: format!("{why}: tau is {tau}"),
    };

    let tau_batch = tau.batch_dims(1).ok_or(DispatchError::RankTooSmall {
        op: "orgqr",
        rank: tau.rank(),
        required: 1,
    })?;
    if tau_batch != a.batch_dims.as_slice() {
        return Err(mismatch(&format!(
            "expected batch dimensions {:?}",
            a.batch_dims.as_slice()
        )));
    }
    let k = tau.dims[tau_batch.len()];
    if k > a.min_dim() {
        return Err(mismatch(&format!(
            "{k} reflectors exceed min({}, {})",
            a.rows, a.cols
        )));
    }
    require_same_dtype("orgqr", a.dtype, tau.dtype)?;

    Ok(k)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn f32(dims: &[usize]) -> ArrayShape {
        ArrayShape::new(DType::Float32, dims.iter().copied())
    }

    #[test]
    fn test_resolve_batched() {
        let m = MatrixOperand::resolve("geqrf", &f32(&[2, 3, 5, 4])).unwrap();
        assert_eq!(m.batch_dims.as_slice(), &[2, 3]);
        assert_eq!((m.rows, m.cols), (5, 4));
        assert_eq!(m.batch_size(), 6);
        assert_eq!(m.min_dim(), 4);
        assert_eq!(m.num_bd(), 2);
    }

    #[test]
    fn test_resolve_unbatched() {
        let m = MatrixOperand::resolve("potrf", &f32(&[4, 4])).unwrap();
        assert!(m.batch_dims.is_empty());
        assert_eq!(m.batch_size(), 1);
        assert_eq!(m.require_square("potrf").unwrap(), 4);
    }

    #[test]
    fn test_resolve_rank_too_small() {
        let err = MatrixOperand::resolve("getrf", &f32(&[7])).unwrap_err();
        assert!(matches!(
            err,
            DispatchError::RankTooSmall {
                rank: 1,
                required: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_empty_batch_member() {
        assert_eq!(batch_size(&[3, 0, 2]), 0);
        assert_eq!(batch_size(&[]), 1);
    }

    #[test]
    fn test_zero_extent_after_huge_prefix() {
        assert_eq!(batch_size(&[1 << 33, 1 << 33, 0]), 0);
        assert_eq!(batch_size(&[0, usize::MAX, usize::MAX]), 0);

        let m = MatrixOperand::resolve("getrf", &f32(&[1 << 33, 1 << 33, 0, 4, 4])).unwrap();
        assert_eq!(m.batch_size(), 0);
    }

    #[test]
    fn test_overflowing_batch_saturates() {
        assert_eq!(batch_size(&[1 << 33, 1 << 33]), usize::MAX);
    }

    #[test]
    fn test_not_square() {
        let m = MatrixOperand::resolve("syevd", &f32(&[3, 4])).unwrap();
        assert_eq!(m.require_square("syevd").unwrap_err().kind(), ErrorKind::Shape);
    }

    #[test]
    fn test_trsm_left_and_right() {
        let b = f32(&[2, 3, 4]);
        let left = resolve_trsm(&f32(&[2, 3, 3]), &b, true).unwrap();
        assert_eq!(left.k, 3);
        let right = resolve_trsm(&f32(&[2, 4, 4]), &b, false).unwrap();
        assert_eq!(right.k, 4);
        assert!(resolve_trsm(&f32(&[2, 4, 4]), &b, true).is_err());
    }

    #[test]
    fn test_trsm_batch_mismatch_message() {
        let err = resolve_trsm(&f32(&[2, 3, 5, 5]), &f32(&[2, 4, 5, 5]), true).unwrap_err();
        assert_eq!(
            err.to_string(),
            "argument mismatch for trsm: got f32[2,3,5,5] and f32[2,4,5,5]"
        );
    }

    #[test]
    fn test_trsm_dtype_mismatch() {
        let a = ArrayShape::new(DType::Float64, [3, 3]);
        let err = resolve_trsm(&a, &f32(&[3, 2]), true).unwrap_err();
        assert!(matches!(
            err,
            DispatchError::DTypeMismatch {
                expected: DType::Float32,
                got: DType::Float64,
                ..
            }
        ));
    }

    #[test]
    fn test_reflectors() {
        let a = MatrixOperand::resolve("orgqr", &f32(&[5, 6, 4])).unwrap();
        assert_eq!(resolve_reflectors(&a, &f32(&[5, 4])).unwrap(), 4);
        assert_eq!(resolve_reflectors(&a, &f32(&[5, 2])).unwrap(), 2);
        assert!(resolve_reflectors(&a, &f32(&[5, 5])).is_err());
        assert!(resolve_reflectors(&a, &f32(&[4, 4])).is_err());
        assert!(resolve_reflectors(&a, &ArrayShape::new(DType::Float64, [5, 4])).is_err());
    }
}
