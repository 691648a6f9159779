//! The closed opcode enumeration.
//!
//! Each variant carries exactly the attributes its lowering rule needs; operands live on the
//! [`Node`](crate::Node).

use smallvec::SmallVec;

use crate::{BinaryOp, CmpPredicate, ComputationId, ConstValue, DType, UnaryOp};

/// Elementwise operation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementwiseOp {
    Unary(UnaryOp),
    Binary(BinaryOp),
    Compare(CmpPredicate),
    /// `select(pred, on_true, on_false)`.
    Select,
    /// Conversion to the node's element type.
    Convert,
}

impl ElementwiseOp {
    pub fn arity(&self) -> usize {
        match self {
            Self::Unary(_) | Self::Convert => 1,
            Self::Binary(_) | Self::Compare(_) => 2,
            Self::Select => 3,
        }
    }
}

/// Padding of one dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PadDim {
    pub low: i64,
    pub high: i64,
    pub interior: i64,
}

/// Attributes of a dot (contraction).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct DotSpec {
    pub lhs_contracting: SmallVec<[usize; 2]>,
    pub rhs_contracting: SmallVec<[usize; 2]>,
    pub lhs_batch: SmallVec<[usize; 2]>,
    pub rhs_batch: SmallVec<[usize; 2]>,
    /// Number of operands carrying sparsity metadata.
    pub sparse_operands: usize,
    /// Accumulation type; the node's element type when absent.
    pub accumulator: Option<DType>,
}

impl DotSpec {
    /// Plain matrix multiply: `lhs[.., k] x rhs[k, ..]`.
    pub fn matmul(lhs_contracting: usize, rhs_contracting: usize) -> Self {
        Self {
            lhs_contracting: smallvec::smallvec![lhs_contracting],
            rhs_contracting: smallvec::smallvec![rhs_contracting],
            ..Default::default()
        }
    }

    pub fn with_accumulator(mut self, dtype: DType) -> Self {
        self.accumulator = Some(dtype);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
#[derive(strum::IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum Opcode {
    /// Fusion parameter; in a nested computation it stands for the caller's operand `number`.
    Parameter { number: usize },

    Constant { value: ConstValue },

    Elementwise(ElementwiseOp),

    /// `dimensions[i]` is the output dimension that input dimension `i` maps to.
    Broadcast { dimensions: SmallVec<[usize; 4]> },

    Iota { dimension: usize },

    /// Operands: input, init (neutral element).
    Reduce { dimensions: SmallVec<[usize; 4]>, reducer: ComputationId },

    Reshape,

    /// Output dimension `i` is input dimension `permutation[i]`.
    Transpose { permutation: SmallVec<[usize; 4]> },

    /// Reinterpretation of the same bytes under a different shape and layout.
    Bitcast,

    /// Operands: input, padding value.
    Pad { config: SmallVec<[PadDim; 4]> },

    Concatenate { dimension: usize },

    Slice { starts: SmallVec<[i64; 4]>, limits: SmallVec<[i64; 4]>, strides: SmallVec<[i64; 4]> },

    /// Operands: input, then one scalar start index per dimension.
    DynamicSlice { sizes: SmallVec<[i64; 4]> },

    Dot(DotSpec),

    /// Nested fused computation; its parameters are this node's operands.
    Fusion { computation: ComputationId },
}

impl Opcode {
    pub fn name(&self) -> &'static str {
        self.into()
    }

    pub fn is_parameter(&self) -> bool {
        matches!(self, Self::Parameter { .. })
    }

    pub fn is_fusion(&self) -> bool {
        matches!(self, Self::Fusion { .. })
    }

    /// Called computation, for fusion nodes and reductions.
    pub fn called_computation(&self) -> Option<ComputationId> {
        match self {
            Self::Fusion { computation } => Some(*computation),
            Self::Reduce { reducer, .. } => Some(*reducer),
            _ => None,
        }
    }
}
