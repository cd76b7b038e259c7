//! # Lapax IR
//!
//! This crate defines the value model shared between the solver dispatch
//! layer and the host execution engine that ultimately runs the kernels.
//!
//! ## Overview
//!
//! Dispatching a factorization never touches device memory. It only
//! describes a call:
//!
//! - **Array shapes**: element type, dimensions, and physical layout
//! - **Tuple shapes**: the ordered result buffers of a kernel call
//! - **Custom calls**: a symbolic kernel name, operands, declared results,
//!   and an opaque descriptor blob
//!
//! The [`Builder`] trait is the boundary to the execution engine. A compiler
//! front-end implements it over its own graph; [`Graph`] is the in-tree
//! recording implementation.
//!
//! ## Layouts
//!
//! Layouts are stored minor-to-major: `layout[0]` is the logical dimension
//! that varies fastest in memory.
//!
//! ```text
//! dims    = (B, M, N)        logical order
//! layout  = (1, 2, 0)        M fastest, then N, then B
//! ```
//!
//! ## Main Types
//!
//! - [`DType`]: Element types
//! - [`Layout`]: Minor-to-major dimension order
//! - [`ArrayShape`] / [`TupleShape`]: Buffer shapes
//! - [`CustomCall`]: A kernel invocation request
//! - [`Builder`]: Execution-engine boundary

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod graph;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

pub use graph::{Graph, Node};

/// Tensor element types (data types).
///
/// These mirror the element types the compiler front-end can hand to the
/// dispatch layer. Only the floating-point and complex types are solver
/// types; the integer types appear in status, pivot, and workspace buffers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DType {
    /// Boolean (1 byte).
    Bool,
    /// 8-bit signed integer.
    Int8,
    /// 16-bit signed integer.
    Int16,
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
    /// 8-bit unsigned integer.
    UInt8,
    /// 32-bit unsigned integer.
    UInt32,
    /// 16-bit floating point (half precision).
    Float16,
    /// Brain floating point (bfloat16).
    BFloat16,
    /// 32-bit floating point (single precision).
    Float32,
    /// 64-bit floating point (double precision).
    Float64,
    /// Complex number (single precision).
    Complex64,
    /// Complex number (double precision).
    Complex128,
}

impl DType {
    /// Returns the size in bytes of this dtype.
    #[must_use]
    pub const fn size_bytes(self) -> usize {
        match self {
            Self::Bool | Self::Int8 | Self::UInt8 => 1,
            Self::Int16 | Self::Float16 | Self::BFloat16 => 2,
            Self::Int32 | Self::UInt32 | Self::Float32 => 4,
            Self::Int64 | Self::Float64 | Self::Complex64 => 8,
            Self::Complex128 => 16,
        }
    }

    /// Returns true if this is a real floating-point type.
    #[must_use]
    pub const fn is_float(self) -> bool {
        matches!(
            self,
            Self::Float16 | Self::BFloat16 | Self::Float32 | Self::Float64
        )
    }

    /// Returns true if this is a complex type.
    #[must_use]
    pub const fn is_complex(self) -> bool {
        matches!(self, Self::Complex64 | Self::Complex128)
    }

    /// Returns the real type of matching precision.
    ///
    /// Eigenvalues of a Hermitian matrix and singular values are always
    /// real, so their buffers use this type. Non-complex types map to
    /// themselves.
    #[must_use]
    pub const fn real_type(self) -> Self {
        match self {
            Self::Complex64 => Self::Float32,
            Self::Complex128 => Self::Float64,
            other => other,
        }
    }

    /// Short lowercase name, as used in diagnostics.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bool => "pred",
            Self::Int8 => "s8",
            Self::Int16 => "s16",
            Self::Int32 => "s32",
            Self::Int64 => "s64",
            Self::UInt8 => "u8",
            Self::UInt32 => "u32",
            Self::Float16 => "f16",
            Self::BFloat16 => "bf16",
            Self::Float32 => "f32",
            Self::Float64 => "f64",
            Self::Complex64 => "c64",
            Self::Complex128 => "c128",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Physical dimension order, most-minor first.
///
/// A layout is a permutation of `0..rank`. Entry `i` names the logical
/// dimension stored at physical position `i`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Layout(SmallVec<[usize; 6]>);

impl Layout {
    /// Creates a layout from a minor-to-major dimension list.
    #[must_use]
    pub fn new(minor_to_major: impl IntoIterator<Item = usize>) -> Self {
        Self(minor_to_major.into_iter().collect())
    }

    /// The row-major layout for `rank` dimensions: `(rank-1, ..., 0)`.
    #[must_use]
    pub fn row_major(rank: usize) -> Self {
        Self((0..rank).rev().collect())
    }

    /// Returns the layout as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    /// Returns the number of dimensions this layout orders.
    #[must_use]
    pub fn rank(&self) -> usize {
        self.0.len()
    }

    /// Returns true if this layout is a permutation of `0..rank`.
    #[must_use]
    pub fn is_permutation(&self) -> bool {
        let mut seen: SmallVec<[bool; 6]> = SmallVec::from_elem(false, self.0.len());
        for &dim in &self.0 {
            match seen.get_mut(dim) {
                Some(slot) if !*slot => *slot = true,
                _ => return false,
            }
        }
        true
    }

    /// Returns the inverse permutation.
    ///
    /// Entry `d` of the result is the physical position of logical
    /// dimension `d`. Inverting twice yields the original layout.
    ///
    /// # Errors
    ///
    /// Returns [`IrError::InvalidLayout`] if this layout is not a permutation.
    pub fn inverse(&self) -> IrResult<Self> {
        if !self.is_permutation() {
            return Err(IrError::InvalidLayout {
                layout: self.0.to_vec(),
            });
        }
        let mut inv: SmallVec<[usize; 6]> = SmallVec::from_elem(0, self.0.len());
        for (position, &dim) in self.0.iter().enumerate() {
            inv[dim] = position;
        }
        Ok(Self(inv))
    }

    /// Reorders logical `dims` into physical order, most-minor first.
    ///
    /// # Errors
    ///
    /// Returns [`IrError::LayoutRankMismatch`] if the ranks differ.
    pub fn physical_dims(&self, dims: &[usize]) -> IrResult<SmallVec<[usize; 6]>> {
        if dims.len() != self.0.len() {
            return Err(IrError::LayoutRankMismatch {
                layout_rank: self.0.len(),
                shape_rank: dims.len(),
            });
        }
        Ok(self.0.iter().map(|&d| dims[d]).collect())
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, d) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{d}")?;
        }
        write!(f, "}}")
    }
}

/// Dimensions of an array, in logical order.
pub type Dims = SmallVec<[usize; 6]>;

/// Shape of a single array buffer.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArrayShape {
    /// Element type.
    pub dtype: DType,
    /// Logical dimensions.
    pub dims: Dims,
    /// Physical layout, if pinned.
    pub layout: Option<Layout>,
}

impl ArrayShape {
    /// Creates an array shape without a pinned layout.
    #[must_use]
    pub fn new(dtype: DType, dims: impl IntoIterator<Item = usize>) -> Self {
        Self {
            dtype,
            dims: dims.into_iter().collect(),
            layout: None,
        }
    }

    /// Creates an array shape with an explicit layout.
    ///
    /// # Errors
    ///
    /// Returns an error if the layout rank differs from the shape rank or
    /// the layout is not a permutation.
    pub fn with_layout(
        dtype: DType,
        dims: impl IntoIterator<Item = usize>,
        layout: Layout,
    ) -> IrResult<Self> {
        let dims: Dims = dims.into_iter().collect();
        if layout.rank() != dims.len() {
            return Err(IrError::LayoutRankMismatch {
                layout_rank: layout.rank(),
                shape_rank: dims.len(),
            });
        }
        if !layout.is_permutation() {
            return Err(IrError::InvalidLayout {
                layout: layout.as_slice().to_vec(),
            });
        }
        Ok(Self {
            dtype,
            dims,
            layout: Some(layout),
        })
    }

    /// Returns the rank (number of dimensions).
    #[must_use]
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Returns the total number of elements, or `None` if it overflows.
    ///
    /// A zero extent anywhere gives zero elements.
    #[must_use]
    pub fn num_elements(&self) -> Option<usize> {
        if self.dims.contains(&0) {
            return Some(0);
        }
        self.dims.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
    }

    /// Splits off the leading dimensions, leaving `trailing` dimensions.
    ///
    /// Returns `None` if the rank is below `trailing`.
    #[must_use]
    pub fn batch_dims(&self, trailing: usize) -> Option<&[usize]> {
        self.dims
            .len()
            .checked_sub(trailing)
            .map(|split| &self.dims[..split])
    }
}

impl fmt::Display for ArrayShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[", self.dtype)?;
        for (i, d) in self.dims.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{d}")?;
        }
        write!(f, "]")?;
        if let Some(layout) = &self.layout {
            write!(f, "{layout}")?;
        }
        Ok(())
    }
}

/// Ordered result buffers of a kernel call.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TupleShape(pub Vec<ArrayShape>);

impl TupleShape {
    /// Creates a tuple shape from its element shapes.
    #[must_use]
    pub fn new(elements: impl IntoIterator<Item = ArrayShape>) -> Self {
        Self(elements.into_iter().collect())
    }

    /// Returns the number of elements.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.0.len()
    }

    /// Returns the element at `index`.
    #[must_use]
    pub fn element(&self, index: usize) -> Option<&ArrayShape> {
        self.0.get(index)
    }
}

/// Handle to a value in the execution engine's graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Op(u32);

impl Op {
    /// Creates a handle from a raw index.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// Calling convention of a custom call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApiVersion {
    /// The kernel reports failure through a status value returned to the
    /// runtime, in addition to writing its outputs.
    #[default]
    StatusReturning,
}

/// A request to invoke an external kernel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomCall {
    /// Symbolic kernel name, resolved by the runtime.
    pub target: String,
    /// Operand values, in kernel argument order.
    pub operands: Vec<Op>,
    /// Shapes (with layouts) the kernel expects for each operand.
    pub operand_shapes: Vec<ArrayShape>,
    /// Declared result buffers.
    pub result: TupleShape,
    /// Kernel-specific descriptor blob, passed through untouched.
    pub opaque: Vec<u8>,
    /// Calling convention.
    pub api_version: ApiVersion,
}

/// The execution-engine boundary.
///
/// The dispatch layer only constructs calls through this trait; it never
/// executes anything itself.
pub trait Builder {
    /// Returns the array shape of `op`.
    ///
    /// # Errors
    ///
    /// Fails if `op` is unknown or does not produce an array.
    fn array_shape(&self, op: Op) -> IrResult<ArrayShape>;

    /// Emits a custom call and returns its tuple-valued result.
    ///
    /// # Errors
    ///
    /// Fails if the operand count does not match the declared operand shapes.
    fn custom_call(&mut self, call: CustomCall) -> IrResult<Op>;

    /// Extracts element `index` of a tuple-valued op.
    ///
    /// # Errors
    ///
    /// Fails if `tuple` is not a tuple or `index` is out of range.
    fn get_tuple_element(&mut self, tuple: Op, index: usize) -> IrResult<Op>;

    /// Slices `op` to `[start, limit)` with the given strides per dimension.
    ///
    /// # Errors
    ///
    /// Fails if the bounds are inconsistent with the operand shape.
    fn slice(&mut self, op: Op, start: &[usize], limit: &[usize], strides: &[usize])
        -> IrResult<Op>;
}

/// Errors in IR construction.
#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum IrError {
    /// Op handle does not exist.
    #[error("unknown op {0}")]
    UnknownOp(Op),

    /// An array was expected.
    #[error("op {0} produces a tuple, expected an array")]
    NotAnArray(Op),

    /// A tuple was expected.
    #[error("op {0} produces an array, expected a tuple")]
    NotATuple(Op),

    /// Tuple index out of range.
    #[error("tuple index {index} out of range for arity {arity}")]
    TupleIndexOutOfRange {
        /// The requested index.
        index: usize,
        /// The tuple arity.
        arity: usize,
    },

    /// Layout is not a permutation.
    #[error("layout {layout:?} is not a permutation")]
    InvalidLayout {
        /// The offending layout.
        layout: Vec<usize>,
    },

    /// Layout rank differs from shape rank.
    #[error("layout of rank {layout_rank} applied to shape of rank {shape_rank}")]
    LayoutRankMismatch {
        /// Rank of the layout.
        layout_rank: usize,
        /// Rank of the shape.
        shape_rank: usize,
    },

    /// Operand count differs from declared operand shapes.
    #[error("custom call {target} has {operands} operands but {shapes} operand shapes")]
    OperandCountMismatch {
        /// Kernel name.
        target: String,
        /// Number of operands.
        operands: usize,
        /// Number of declared shapes.
        shapes: usize,
    },

    /// Slice bounds are inconsistent.
    #[error("invalid slice of {shape}: {reason}")]
    InvalidSlice {
        /// Shape being sliced.
        shape: ArrayShape,
        /// Why the slice was rejected.
        reason: String,
    },
}

/// Result type for IR operations.
pub type IrResult<T> = Result<T, IrError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_num_elements() {
        assert_eq!(ArrayShape::new(DType::Float32, [2, 3, 4]).num_elements(), Some(24));
        assert_eq!(ArrayShape::new(DType::Float32, Vec::new()).num_elements(), Some(1));
        assert_eq!(
            ArrayShape::new(DType::Float32, [1 << 33, 1 << 33, 0, 4]).num_elements(),
            Some(0)
        );
        assert_eq!(ArrayShape::new(DType::Float32, [1 << 33, 1 << 33]).num_elements(), None);
    }

    #[test]
    fn test_dtype_sizes() {
        assert_eq!(DType::Int8.size_bytes(), 1);
        assert_eq!(DType::Float32.size_bytes(), 4);
        assert_eq!(DType::Complex128.size_bytes(), 16);
    }

    #[test]
    fn test_real_type() {
        assert_eq!(DType::Complex64.real_type(), DType::Float32);
        assert_eq!(DType::Complex128.real_type(), DType::Float64);
        assert_eq!(DType::Float64.real_type(), DType::Float64);
        assert!(DType::Complex64.is_complex());
        assert!(!DType::Complex64.is_float());
    }

    #[test]
    fn test_layout_inverse() {
        let layout = Layout::new([1, 2, 0]);
        let inv = layout.inverse().unwrap();
        assert_eq!(inv.as_slice(), &[2, 0, 1]);
        assert_eq!(inv.inverse().unwrap(), layout);
    }

    #[test]
    fn test_layout_rejects_non_permutation() {
        assert!(!Layout::new([0, 0]).is_permutation());
        assert!(!Layout::new([0, 2]).is_permutation());
        assert!(Layout::new([0, 2]).inverse().is_err());
    }

    #[test]
    fn test_physical_dims() {
        let layout = Layout::new([1, 2, 0]);
        let phys = layout.physical_dims(&[7, 3, 5]).unwrap();
        assert_eq!(phys.as_slice(), &[3, 5, 7]);
    }

    #[test]
    fn test_array_shape_layout_rank_checked() {
        let err = ArrayShape::with_layout(DType::Float32, [2, 3], Layout::new([0])).unwrap_err();
        assert!(matches!(err, IrError::LayoutRankMismatch { .. }));
    }

    #[test]
    fn test_batch_dims() {
        let shape = ArrayShape::new(DType::Float32, [2, 3, 4, 5]);
        assert_eq!(shape.batch_dims(2), Some(&[2, 3][..]));
        assert_eq!(shape.batch_dims(4), Some(&[][..]));
        assert_eq!(shape.batch_dims(5), None);
    }

    #[test]
    fn test_display() {
        let shape =
            ArrayShape::with_layout(DType::Float32, [10, 4, 4], Layout::new([1, 2, 0])).unwrap();
        assert_eq!(shape.to_string(), "f32[10,4,4]{1,2,0}");
    }
}
