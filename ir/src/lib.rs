//! Tile-level IR.
//!
//! A [`Program`] is one function of structured, SSA-form operations over scalars and statically
//! shaped tensors: program-id queries, tile loads and stores against tensor arguments, shape
//! manipulation, elementwise arithmetic, reductions with combiner regions, matrix products, and
//! `scf.for` / `scf.if` control flow. It is what the emitter produces and what a downstream compiler
//! would consume.
//!
//! # Module Organization
//!
//! - [`types`] - Value types and arena handles
//! - [`op`] - Operation kinds and their attributes
//! - [`infer`] - Result type inference, shared by the builder and the verifier
//! - [`builder`] - Append-only construction with scoped insertion points
//! - [`verify`] - Structural verification
//! - [`print`] - Deterministic textual form
//! - [`interp`] - Reference interpreter on `ndarray`

pub mod builder;
pub mod error;
pub mod infer;
pub mod interp;
pub mod op;
pub mod print;
pub mod program;
pub mod types;
pub mod verify;


pub use builder::{Builder, ForLoop, IfElse, InsertionGuard, Reduction};
pub use error::{Error, Result};
pub use interp::{Interpreter, Tensor};
pub use op::{Block, OpKind, Operation};
pub use program::{Program, Signature};
pub use types::{Dims, OpId, RegionId, Type, Value, ValueDef};
pub use verify::verify;

pub use tilegen_dtype::{BinaryOp, CmpPredicate, ConstValue, DType, UnaryOp};
