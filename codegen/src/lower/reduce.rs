//! Single-dimension reductions with a masked tail.

use snafu::{ResultExt, ensure};
use tilegen_dtype::CmpPredicate;
use tilegen_graph::{ComputationId, Node};
use tilegen_ir::{Builder, Value};
use tracing::trace;

use super::helpers::{broadcast_in_dims, lane_range};
use super::{Emitter, Scope};
use crate::error::*;
use crate::tile_info::padded_tile_sizes;

impl Emitter<'_> {
    /// Reduce the input tile along its single reduction dimension.
    ///
    /// The tile covers the whole reduction dimension, padded to a power of two. Padding lanes are
    /// replaced by the neutral element before reducing, whatever the load put there.
    #[allow(clippy::too_many_arguments)]
    pub(super) fn emit_reduce(
        &self,
        b: &mut Builder,
        scope: Scope<'_>,
        node: &Node,
        input_node: &Node,
        dimensions: &[usize],
        reducer: ComputationId,
        input: Value,
        init: Value,
    ) -> Result<Value> {
        let &[axis] = dimensions else {
            return UnsupportedSnafu {
                what: format!("reduce {} over {} dimensions", node.name, dimensions.len()),
            }
            .fail();
        };
        let padded = padded_tile_sizes(&input_node.tile.tile_sizes);
        ensure!(
            axis < padded.len(),
            PreconditionSnafu { reason: format!("reduce {} dimension {axis} exceeds its input rank", node.name) }
        );
        let size = input_node.shape.dim(axis);
        ensure!(
            input_node.tile.tile_sizes[axis] >= size,
            PreconditionSnafu {
                reason: format!(
                    "reduce {} tiles its reduction dimension by {} but it has size {size}",
                    node.name, input_node.tile.tile_sizes[axis]
                )
            }
        );

        let mut source = input;
        if size < padded[axis] {
            trace!(reduce = %node.name, size, padded = padded[axis], "masking reduction tail");
            let range = lane_range(b, padded[axis])?;
            let limit = b.i32_const(size);
            let limit = b.splat(limit, &[padded[axis]]).context(IrSnafu)?;
            let mask = b.cmp(CmpPredicate::Lt, range, limit).context(IrSnafu)?;
            let mask = broadcast_in_dims(b, mask, &padded, &[axis])?;
            let neutral = b.splat(init, &padded).context(IrSnafu)?;
            source = b.select(mask, source, neutral).context(IrSnafu)?;
        }

        let reduction = b.reduce(source, axis).context(IrSnafu)?;
        {
            let mut body = b.enter(reduction.body);
            let aliases = [reduction.lhs, reduction.rhs];
            let combiner = Scope { computation: reducer, pid: scope.pid, aliases: Some(&aliases[..]) };
            let combined = self.emit_single_root(&mut body, combiner)?;
            body.reduce_return(combined).context(IrSnafu)?;
        }
        Ok(reduction.result)
    }
}
