//! High-edge padding.

use snafu::{ResultExt, ensure};
use tilegen_dtype::{BinaryOp, CmpPredicate, DType};
use tilegen_graph::{Node, PadDim};
use tilegen_ir::{Builder, Value};

use super::helpers::{broadcast_in_dims, lane_range};
use crate::error::*;
use crate::tile_info::{emit_offsets, padded_tile_sizes};

/// Replace every lane whose global index along a padded dimension falls past the input's extent
/// with the padding value. Only high padding is supported.
#[allow(clippy::too_many_arguments)]
pub(super) fn emit(
    b: &mut Builder,
    pid: Value,
    runtime_values: &[Value],
    node: &Node,
    input_node: &Node,
    config: &[PadDim],
    input: Value,
    pad_value: Value,
) -> Result<Value> {
    ensure!(
        config.len() == node.shape.rank(),
        InternalSnafu { reason: format!("pad {} configures {} of {} dimensions", node.name, config.len(), node.shape.rank()) }
    );
    for dim in config {
        ensure!(
            dim.low == 0 && dim.interior == 0,
            PreconditionSnafu { reason: format!("pad {} has low or interior padding {dim:?}", node.name) }
        );
    }

    let padded = padded_tile_sizes(&node.tile.tile_sizes);
    let offsets = emit_offsets(b, pid, runtime_values, node)?;

    let mut mask: Option<Value> = None;
    for (d, dim) in config.iter().enumerate() {
        if dim.high == 0 {
            continue;
        }
        let size = padded[d];
        let range = lane_range(b, size)?;
        let stride = b.i32_const(node.tile.tile_strides[d]);
        let stride = b.splat(stride, &[size]).context(IrSnafu)?;
        let offset = b.cast(offsets[d], DType::Int32);
        let offset = b.splat(offset, &[size]).context(IrSnafu)?;
        let scaled = b.mul(range, stride).context(IrSnafu)?;
        let index = b.add(scaled, offset).context(IrSnafu)?;
        let limit = b.i32_const(input_node.shape.dim(d));
        let limit = b.splat(limit, &[size]).context(IrSnafu)?;
        let in_bounds = b.cmp(CmpPredicate::Lt, index, limit).context(IrSnafu)?;
        let in_bounds = broadcast_in_dims(b, in_bounds, &padded, &[d])?;
        mask = Some(match mask {
            Some(m) => b.binary(BinaryOp::And, m, in_bounds).context(IrSnafu)?,
            None => in_bounds,
        });
    }

    let Some(mask) = mask else {
        return Ok(input);
    };
    let fill = b.splat(pad_value, &padded).context(IrSnafu)?;
    Ok(b.select(mask, input, fill).context(IrSnafu)?)
}
