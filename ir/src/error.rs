use snafu::Snafu;

use crate::types::{Type, Value};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Operand types violate the operation's typing rule.
    #[snafu(display("{op}: {reason}"))]
    InvalidOperands { op: &'static str, reason: String },

    #[snafu(display("{op} expects {expected} operands, got {actual}"))]
    OperandCount { op: &'static str, expected: usize, actual: usize },

    /// Recorded result types differ from the inferred ones.
    #[snafu(display("{op} result types {actual:?} differ from inferred {expected:?}"))]
    ResultTypeMismatch { op: &'static str, expected: Vec<Type>, actual: Vec<Type> },

    /// A value is used where its definition is not visible.
    #[snafu(display("{value} used by {op} is not defined before use"))]
    UndefinedValue { value: Value, op: &'static str },

    #[snafu(display("region of {owner} does not end with {expected}"))]
    MissingTerminator { owner: &'static str, expected: &'static str },

    #[snafu(display("{op} terminator in the middle of a block"))]
    MisplacedTerminator { op: &'static str },

    #[snafu(display("{terminator} yields {actual:?}, expected {expected:?}"))]
    TerminatorTypeMismatch { terminator: &'static str, expected: Vec<Type>, actual: Vec<Type> },

    #[snafu(display("{op} owns {actual} regions, expected {expected}"))]
    RegionCount { op: &'static str, expected: usize, actual: usize },

    /// Interpreter: the program cannot be evaluated with the given inputs.
    #[snafu(display("evaluation failed: {reason}"))]
    Evaluation { reason: String },
}
