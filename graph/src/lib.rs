//! Tiled tensor compute graphs.
//!
//! A [`FusionGraph`] is the immutable input of the emitter: a set of computations whose nodes are
//! already annotated with tiling metadata (tile sizes, strides, and an affine offset function of the
//! program id and runtime variables). The graph is produced by an external tiling analysis and is
//! never mutated by lowering.
//!
//! # Module Organization
//!
//! - [`shape`] - Logical shapes with minor-to-major layouts
//! - [`offset`] - Affine offset functions (`pid`, runtime variables, symbols)
//! - [`op`] - The closed opcode enumeration
//! - [`node`] - Nodes and their per-node tiling
//! - [`computation`] - Computations, nested fusions, and the whole fusion graph
//! - [`builder`] - Incremental graph construction with validation

pub mod builder;
pub mod computation;
pub mod error;
pub mod node;
pub mod offset;
pub mod op;
pub mod shape;


pub use builder::GraphBuilder;
pub use computation::{Computation, ComputationId, FusionGraph, NodeRef};
pub use error::{Error, Result};
pub use node::{MAX_TILE_SIZE, Node, NodeId, TileSpec};
pub use offset::{AffineExpr, OffsetMap, RtVarBounds};
pub use op::{DotSpec, ElementwiseOp, Opcode, PadDim};
pub use shape::Shape;

pub use tilegen_dtype::{BinaryOp, CmpPredicate, ConstValue, DType, UnaryOp};
