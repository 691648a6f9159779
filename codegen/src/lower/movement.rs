//! Data movement: broadcast, iota, transpose and bitcast.

use snafu::{OptionExt, ResultExt, ensure};
use tilegen_dtype::DType;
use tilegen_graph::Node;
use tilegen_ir::{Builder, Value};
use tracing::trace;

use super::helpers::{broadcast_in_dims, emit_tiled_reshape, lane_range};
use crate::bitcast::{BitcastDecomposition, permute};
use crate::error::*;
use crate::tile_info::{emit_offsets, padded_tile_sizes};

pub(super) fn emit_broadcast(
    b: &mut Builder,
    node: &Node,
    input_tile_sizes: &[i64],
    dimensions: &[usize],
    input: Value,
) -> Result<Value> {
    if input_tile_sizes.is_empty() && node.tile.tile_sizes.is_empty() {
        return Ok(input);
    }
    ensure!(
        dimensions.is_sorted(),
        UnsupportedSnafu { what: format!("broadcast {} with unsorted dimensions {dimensions:?}", node.name) }
    );
    broadcast_in_dims(b, input, &padded_tile_sizes(&node.tile.tile_sizes), dimensions)
}

/// `offset + stride * range(padded)` along `dimension`, broadcast over the other dimensions.
pub(super) fn emit_iota(
    b: &mut Builder,
    pid: Value,
    runtime_values: &[Value],
    node: &Node,
    dimension: usize,
) -> Result<Value> {
    let padded = padded_tile_sizes(&node.tile.tile_sizes);
    let size = *padded.get(dimension).with_context(|| PreconditionSnafu {
        reason: format!("iota {} dimension {dimension} exceeds its rank", node.name),
    })?;
    let offsets = emit_offsets(b, pid, runtime_values, node)?;

    let range = lane_range(b, size)?;
    let stride = b.i32_const(node.tile.tile_strides[dimension]);
    let stride = b.splat(stride, &[size]).context(IrSnafu)?;
    let offset = b.cast(offsets[dimension], DType::Int32);
    let offset = b.splat(offset, &[size]).context(IrSnafu)?;
    let scaled = b.mul(range, stride).context(IrSnafu)?;
    let iota = b.add(scaled, offset).context(IrSnafu)?;
    let iota = b.cast(iota, node.dtype);

    broadcast_in_dims(b, iota, &padded, &[dimension])
}

pub(super) fn emit_transpose(b: &mut Builder, permutation: &[usize], input: Value) -> Result<Value> {
    if b.ty(input).is_scalar() {
        return Ok(input);
    }
    Ok(b.trans(input, permutation).context(IrSnafu)?)
}

/// Lower a bitcast as transpose, reshape, transpose between the physical orders of both shapes.
pub(super) fn emit_bitcast(b: &mut Builder, node: &Node, input_node: &Node, input: Value) -> Result<Value> {
    let decomposition = BitcastDecomposition::new(&input_node.shape, &node.shape)?;
    trace!(
        bitcast = %node.name,
        transpose1 = ?decomposition.transpose1,
        reshape = ?decomposition.reshape_shape,
        transpose2 = ?decomposition.transpose2,
        "decomposed bitcast"
    );

    let mut value = input;
    if !decomposition.is_transpose1_identity() {
        value = emit_transpose(b, &decomposition.transpose1, value)?;
    }
    if decomposition.needs_reshape() {
        let output_major_to_minor: Vec<usize> = node.shape.major_to_minor().collect();
        let tile_sizes = permute(&node.tile.tile_sizes, &output_major_to_minor);
        value = emit_tiled_reshape(b, &tile_sizes, value)?;
    }
    if !decomposition.is_transpose2_identity() {
        value = emit_transpose(b, &decomposition.transpose2, value)?;
    }
    Ok(value)
}
