//! In-tree recording [`Builder`].
//!
//! [`Graph`] keeps every emitted node in insertion order and infers the
//! shape of tuple extractions and slices. It is what the dispatch tests
//! run against, and a reasonable starting point for front-ends that do
//! not already own a graph representation.
//!
//! ```rust,ignore
//! let mut graph = Graph::new();
//! let a = graph.parameter(ArrayShape::new(DType::Float32, [10, 4, 4]));
//! let out = dispatcher.potrf(&mut graph, a, true)?;
//! assert_eq!(graph.array_shape(out.factor)?.dims.as_slice(), &[10, 4, 4]);
//! ```

use crate::{ArrayShape, Builder, CustomCall, IrError, IrResult, Op, TupleShape};

/// Shape produced by a node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeShape {
    /// A single array.
    Array(ArrayShape),
    /// A tuple of arrays.
    Tuple(TupleShape),
}

/// A recorded graph node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    /// A graph input.
    Parameter(ArrayShape),
    /// A kernel invocation.
    CustomCall(CustomCall),
    /// Element extraction from a tuple.
    GetTupleElement {
        /// The tuple-valued op.
        tuple: Op,
        /// Element index.
        index: usize,
        /// Shape of the extracted element.
        shape: ArrayShape,
    },
    /// Strided slice.
    Slice {
        /// The sliced op.
        operand: Op,
        /// Start indices (inclusive).
        start: Vec<usize>,
        /// Limit indices (exclusive).
        limit: Vec<usize>,
        /// Strides.
        strides: Vec<usize>,
        /// Result shape.
        shape: ArrayShape,
    },
}

impl Node {
    /// Returns the shape this node produces.
    #[must_use]
    pub fn shape(&self) -> NodeShape {
        match self {
            Self::Parameter(shape)
            | Self::GetTupleElement { shape, .. }
            | Self::Slice { shape, .. } => NodeShape::Array(shape.clone()),
            Self::CustomCall(call) => NodeShape::Tuple(call.result.clone()),
        }
    }
}

/// A recording builder.
#[derive(Clone, Debug, Default)]
pub struct Graph {
    nodes: Vec<Node>,
}

impl Graph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a graph input with the given shape.
    pub fn parameter(&mut self, shape: ArrayShape) -> Op {
        self.push(Node::Parameter(shape))
    }

    /// Returns the node behind `op`.
    #[must_use]
    pub fn node(&self, op: Op) -> Option<&Node> {
        self.nodes.get(op.index())
    }

    /// Returns all nodes in insertion order.
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Returns every recorded custom call.
    pub fn custom_calls(&self) -> impl Iterator<Item = &CustomCall> {
        self.nodes.iter().filter_map(|node| match node {
            Node::CustomCall(call) => Some(call),
            _ => None,
        })
    }

    fn push(&mut self, node: Node) -> Op {
        #[allow(clippy::cast_possible_truncation)]
        let op = Op::from_raw(self.nodes.len() as u32);
        self.nodes.push(node);
        op
    }

    fn lookup(&self, op: Op) -> IrResult<&Node> {
        self.node(op).ok_or(IrError::UnknownOp(op))
    }
}

impl Builder for Graph {
    fn array_shape(&self, op: Op) -> IrResult<ArrayShape> {
        match self.lookup(op)?.shape() {
            NodeShape::Array(shape) => Ok(shape),
            NodeShape::Tuple(_) => Err(IrError::NotAnArray(op)),
        }
    }

    fn custom_call(&mut self, call: CustomCall) -> IrResult<Op> {
        if call.operands.len() != call.operand_shapes.len() {
            return Err(IrError::OperandCountMismatch {
                target: call.target,
                operands: call.operands.len(),
                shapes: call.operand_shapes.len(),
            });
        }
        for &operand in &call.operands {
            self.array_shape(operand)?;
        }
        Ok(self.push(Node::CustomCall(call)))
    }

    fn get_tuple_element(&mut self, tuple: Op, index: usize) -> IrResult<Op> {
        let shape = match self.lookup(tuple)?.shape() {
            NodeShape::Tuple(elements) => {
                let arity = elements.arity();
                elements
                    .element(index)
                    .cloned()
                    .ok_or(IrError::TupleIndexOutOfRange { index, arity })?
            }
            NodeShape::Array(_) => return Err(IrError::NotATuple(tuple)),
        };
        Ok(self.push(Node::GetTupleElement { tuple, index, shape }))
    }

    fn slice(
        &mut self,
        operand: Op,
        start: &[usize],
        limit: &[usize],
        strides: &[usize],
    ) -> IrResult<Op> {
        let input = self.array_shape(operand)?;
        let rank = input.rank();
        let invalid = |reason: String| IrError::InvalidSlice {
            shape: input.clone(),
            reason,
        };

        if start.len() != rank || limit.len() != rank || strides.len() != rank {
            return Err(invalid(format!(
                "expected {rank} bounds, got start={}, limit={}, strides={}",
                start.len(),
                limit.len(),
                strides.len()
            )));
        }

        let mut dims = Vec::with_capacity(rank);
        for axis in 0..rank {
            let (lo, hi, step) = (start[axis], limit[axis], strides[axis]);
            if step == 0 {
                return Err(invalid(format!("zero stride on axis {axis}")));
            }
            if lo > hi || hi > input.dims[axis] {
                return Err(invalid(format!(
                    "bounds [{lo}, {hi}) exceed extent {} on axis {axis}",
                    input.dims[axis]
                )));
            }
            dims.push((hi - lo).div_ceil(step));
        }

        let shape = ArrayShape {
            dtype: input.dtype,
            dims: dims.into_iter().collect(),
            layout: input.layout.clone(),
        };
        Ok(self.push(Node::Slice {
            operand,
            start: start.to_vec(),
            limit: limit.to_vec(),
            strides: strides.to_vec(),
            shape,
        }))
    }
}
