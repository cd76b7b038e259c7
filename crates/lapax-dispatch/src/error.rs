//! Error types for dispatch.

use crate::assemble::OutputRole;
use lapax_ir::{DType, IrError};
use lapax_provider::{KernelTarget, ProviderError};
use thiserror::Error;

/// Errors raised while planning a kernel call.
///
/// All of these are reported synchronously, before or instead of emitting
/// the call. Per-batch numerical failures are not errors of this layer;
/// they come back to the caller in the status buffer.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Operand shapes are structurally inconsistent.
    #[error("argument mismatch for {op}: {details}")]
    ShapeMismatch {
        /// The operation being planned.
        op: &'static str,
        /// The conflicting shapes.
        details: String,
    },

    /// Operands that must share an element type do not.
    #[error("element type mismatch for {op}: expected {expected}, got {got}")]
    DTypeMismatch {
        /// The operation being planned.
        op: &'static str,
        /// Element type of the primary operand.
        expected: DType,
        /// Element type of the offending operand.
        got: DType,
    },

    /// An operand has too few dimensions.
    #[error("{op} requires an operand of rank >= {required}, got rank {rank}")]
    RankTooSmall {
        /// The operation being planned.
        op: &'static str,
        /// Rank of the operand.
        rank: usize,
        /// Minimum rank.
        required: usize,
    },

    /// A square matrix was required.
    #[error("{op} requires square matrices, got {rows}x{cols}")]
    NotSquare {
        /// The operation being planned.
        op: &'static str,
        /// Row count.
        rows: usize,
        /// Column count.
        cols: usize,
    },

    /// The requested feature combination is not implemented.
    #[error("{op}: {reason} is not supported")]
    Unsupported {
        /// The operation being planned.
        op: &'static str,
        /// The unsupported combination.
        reason: &'static str,
    },

    /// A caller-visible output is not part of the kernel's result tuple.
    #[error("{kernel} declares no {role} output")]
    MissingOutput {
        /// The kernel whose result was inspected.
        kernel: KernelTarget,
        /// The requested output.
        role: OutputRole,
    },

    /// The kernel provider cannot service this configuration.
    #[error("descriptor build failed: {0}")]
    Descriptor(#[from] ProviderError),

    /// The execution engine rejected the call request.
    #[error("graph construction failed: {0}")]
    Graph(#[from] IrError),
}

/// Coarse classification of a [`DispatchError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller-supplied shapes or element types are inconsistent.
    Shape,
    /// The caller asked for an unsupported feature combination.
    Unsupported,
    /// The provider rejected the configuration.
    Descriptor,
    /// Call construction failed in the execution engine.
    Graph,
}

impl DispatchError {
    /// Returns the coarse error kind.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ShapeMismatch { .. }
            | Self::DTypeMismatch { .. }
            | Self::RankTooSmall { .. }
            | Self::NotSquare { .. } => ErrorKind::Shape,
            Self::Unsupported { .. } => ErrorKind::Unsupported,
            Self::Descriptor(_) => ErrorKind::Descriptor,
            Self::Graph(_) | Self::MissingOutput { .. } => ErrorKind::Graph,
        }
    }
}

/// Result type for dispatch operations.
pub type DispatchResult<T> = Result<T, DispatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let shape = DispatchError::NotSquare {
            op: "potrf",
            rows: 3,
            cols: 4,
        };
        assert_eq!(shape.kind(), ErrorKind::Shape);
        assert_eq!(shape.to_string(), "potrf requires square matrices, got 3x4");

        let provider: DispatchError = ProviderError::NotAvailable("no device".into()).into();
        assert_eq!(provider.kind(), ErrorKind::Descriptor);

        let graph: DispatchError = IrError::NotAnArray(lapax_ir::Op::from_raw(0)).into();
        assert_eq!(graph.kind(), ErrorKind::Graph);
    }
}
