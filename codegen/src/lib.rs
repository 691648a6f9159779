//! Fusion emitter: lowers a tiled tensor compute graph into a tile-level program.
//!
//! Every node of a [`FusionGraph`](tilegen_graph::FusionGraph) carries a tiling: tile sizes,
//! strides and an offset function of the program index. The emitter walks the graph in
//! producer-before-consumer order and lowers each node into operations on power-of-two padded
//! tiles, masking the lanes that fall outside the true shapes wherever padding could leak into a
//! result. The outcome is a single verified program that one grid of program instances runs to
//! compute the whole fusion.
//!
//! # Module Organization
//!
//! - [`driver`]: signature, program index, root stores, verification
//! - `lower`: the graph walker and one rule per opcode
//! - [`tile_info`]: offset arithmetic and padded tile shapes
//! - [`bitcast`]: transpose/reshape/transpose decomposition of bitcasts
//! - [`kernel_args`]: binding buffer slices to kernel arguments
//! - [`resources`]: shared memory estimate
//! - [`config`]: emitter limits and buffer alignment
//!
//! # Usage
//!
//! ```ignore
//! use tilegen_codegen::{EmitterConfig, emit_fusion};
//!
//! let kernel = emit_fusion(&graph, &EmitterConfig::from_env())?;
//! println!("{}", kernel.text);
//! ```

pub mod bitcast;
pub mod cache;
pub mod config;
pub mod driver;
pub mod error;
pub mod kernel_args;
mod lower;
pub mod resources;
pub mod tile_info;
pub mod types;

#[cfg(test)]
pub mod test;

pub use config::{BufferAlignment, EmitterConfig};
pub use driver::{EmitterState, FusionEmitter, emit_fusion};
pub use error::*;
pub use kernel_args::{Allocation, AllocationKind, BufferArg, KernelArgument, KernelArguments, Slice};
pub use types::*;
