use snafu::Snafu;

use crate::{ComputationId, NodeId};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Offset function still refers to a symbol that was never bound to a dimension.
    #[snafu(display("offset function has unresolved symbolic dimension s{symbol}"))]
    UnresolvedSymbol { symbol: usize },

    /// Number of runtime values differs from the number declared by the offset function.
    #[snafu(display("offset function expects {expected} runtime values, got {actual}"))]
    RuntimeValueCount { expected: usize, actual: usize },

    /// Offset function has a different rank than the node it tiles.
    #[snafu(display("offset function of {node} has {actual} results, expected rank {expected}"))]
    OffsetRankMismatch { node: String, expected: usize, actual: usize },

    #[snafu(display("{what} must be positive, got {value}"))]
    NonPositive { what: &'static str, value: i64 },

    #[snafu(display("{node} has tile size {size}, above the limit of {limit}"))]
    TileTooLarge { node: String, size: i64, limit: i64 },

    #[snafu(display("unknown computation {id:?}"))]
    UnknownComputation { id: ComputationId },

    #[snafu(display("computation {computation} has no nodes"))]
    EmptyComputation { computation: String },

    #[snafu(display("computation {computation} declares no roots"))]
    NoRoots { computation: String },

    /// Operands must precede their users.
    #[snafu(display("{node} in {computation} uses operand {operand:?} that does not precede it"))]
    OperandOrder { computation: String, node: String, operand: NodeId },

    #[snafu(display("nested computation {computation} is called by {callers} fusion nodes"))]
    CallerCount { computation: String, callers: usize },

    #[snafu(display("parameter {number} of {computation} has no matching operand"))]
    ParameterOutOfRange { computation: String, number: usize },

    #[snafu(display("{node} declares {declared} runtime variables but its offset function has {expected}"))]
    RuntimeVariableMismatch { node: String, declared: usize, expected: usize },

    #[snafu(display("{node}: {reason}"))]
    InvalidNode { node: String, reason: String },
}
