//! Tile IR operations.

use smallvec::SmallVec;
use tilegen_dtype::{BinaryOp, CmpPredicate, ConstValue, DType, UnaryOp};

use crate::types::{Dims, OpId, RegionId, Type, Value};

/// Operation kinds with their attributes.
///
/// Operand conventions:
/// - `Extract`: `[source, offsets.., strides..]`, one offset and stride per source dimension.
/// - `Insert`: `[tile, dest, offsets.., strides..]`; the result is the updated `dest`.
/// - `TensorInsert`: `[scalar, dest]`.
/// - `For`: `[lower, upper, step, inits..]`; the body block takes `[iv, carried..]`.
/// - `If`: `[condition]`; both regions end in `Yield`.
/// - `Dot`: `[lhs, rhs, acc]`, computing `acc + lhs x rhs`.
#[derive(Debug, Clone, PartialEq)]
pub enum OpKind {
    GetProgramId { axis: u8 },
    Constant { value: ConstValue, ty: Type },
    MakeRange { start: i32, end: i32 },
    Splat { shape: Dims },
    Broadcast { shape: Dims },
    ExpandDims { axis: usize },
    Reshape { shape: Dims, allow_reorder: bool },
    /// Output dimension `i` is input dimension `order[i]`.
    Trans { order: SmallVec<[usize; 4]> },
    Reduce { axis: usize },
    ReduceReturn,
    For,
    If { results: SmallVec<[Type; 1]> },
    Yield,
    Extract { tile: Dims, layout: SmallVec<[usize; 4]> },
    Insert { layout: SmallVec<[usize; 4]> },
    TensorExtract,
    TensorInsert,
    Unary(UnaryOp),
    Binary(BinaryOp),
    Cmp(CmpPredicate),
    Select,
    Cast { to: DType },
    Dot,
    Return,
}

impl OpKind {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Self::GetProgramId { .. } => "tt.get_program_id",
            Self::Constant { .. } => "arith.constant",
            Self::MakeRange { .. } => "tt.make_range",
            Self::Splat { .. } => "tt.splat",
            Self::Broadcast { .. } => "tt.broadcast",
            Self::ExpandDims { .. } => "tt.expand_dims",
            Self::Reshape { .. } => "tt.reshape",
            Self::Trans { .. } => "tt.trans",
            Self::Reduce { .. } => "tt.reduce",
            Self::ReduceReturn => "tt.reduce.return",
            Self::For => "scf.for",
            Self::If { .. } => "scf.if",
            Self::Yield => "scf.yield",
            Self::Extract { .. } => "xtile.extract",
            Self::Insert { .. } => "xtile.insert",
            Self::TensorExtract => "tensor.extract",
            Self::TensorInsert => "tensor.insert",
            Self::Unary(op) => match op {
                UnaryOp::Neg => "arith.neg",
                UnaryOp::Abs => "math.abs",
                UnaryOp::Exp => "math.exp",
                UnaryOp::Log => "math.log",
                UnaryOp::Sqrt => "math.sqrt",
                UnaryOp::Rsqrt => "math.rsqrt",
                UnaryOp::Tanh => "math.tanh",
                UnaryOp::Floor => "math.floor",
                UnaryOp::Ceil => "math.ceil",
                UnaryOp::Not => "arith.not",
            },
            Self::Binary(op) => match op {
                BinaryOp::Add => "arith.add",
                BinaryOp::Sub => "arith.sub",
                BinaryOp::Mul => "arith.mul",
                BinaryOp::Div => "arith.div",
                BinaryOp::Rem => "arith.rem",
                BinaryOp::Max => "arith.max",
                BinaryOp::Min => "arith.min",
                BinaryOp::Pow => "math.pow",
                BinaryOp::And => "arith.and",
                BinaryOp::Or => "arith.or",
                BinaryOp::Xor => "arith.xor",
            },
            Self::Cmp(_) => "arith.cmp",
            Self::Select => "arith.select",
            Self::Cast { .. } => "arith.cast",
            Self::Dot => "tt.dot",
            Self::Return => "func.return",
        }
    }

    pub fn is_terminator(&self) -> bool {
        matches!(self, Self::Yield | Self::ReduceReturn | Self::Return)
    }

    /// Number of regions the operation owns.
    pub fn num_regions(&self) -> usize {
        match self {
            Self::Reduce { .. } | Self::For => 1,
            Self::If { .. } => 2,
            _ => 0,
        }
    }
}

/// An operation instance.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub kind: OpKind,
    pub operands: SmallVec<[Value; 4]>,
    pub results: SmallVec<[Value; 1]>,
    pub regions: SmallVec<[RegionId; 2]>,
    /// Region whose block holds this operation.
    pub parent: RegionId,
}

/// A region's single block.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Block {
    pub args: SmallVec<[Value; 4]>,
    pub ops: Vec<OpId>,
    /// Operation owning the region; `None` for the function body.
    pub owner: Option<OpId>,
}
