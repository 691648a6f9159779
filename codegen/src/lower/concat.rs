//! Concatenation of nested fusions by branching on the tile offset.

use snafu::{OptionExt, ResultExt, ensure};
use tilegen_dtype::CmpPredicate;
use tilegen_graph::{Computation, ComputationId, Node, Opcode};
use tilegen_ir::{Builder, Type, Value};
use tracing::debug;

use super::{Emitter, Scope};
use crate::error::*;
use crate::tile_info::{emit_offsets, padded_tile_sizes};

impl Emitter<'_> {
    /// Each output tile lies entirely inside one operand, so the operand is picked by comparing
    /// the tile offset along `dimension` against the cumulative operand extents. Only the picked
    /// operand's computation runs.
    pub(super) fn emit_concatenate(
        &self,
        b: &mut Builder,
        scope: Scope<'_>,
        computation: &Computation,
        runtime_values: &[Value],
        node: &Node,
        dimension: usize,
    ) -> Result<Value> {
        let padded = padded_tile_sizes(&node.tile.tile_sizes);
        let tile = *padded.get(dimension).with_context(|| PreconditionSnafu {
            reason: format!("concatenate {} dimension {dimension} exceeds its rank", node.name),
        })?;

        let mut callees: Vec<ComputationId> = Vec::with_capacity(node.operands.len());
        let mut limits: Vec<i64> = Vec::with_capacity(node.operands.len());
        let mut limit = 0;
        for &operand in &node.operands {
            let operand = computation.node(operand);
            let Opcode::Fusion { computation: callee } = operand.opcode else {
                return PreconditionSnafu {
                    reason: format!("concatenate {} operand {} is not a nested fusion", node.name, operand.name),
                }
                .fail();
            };
            let size = operand.shape.dim(dimension);
            ensure!(
                size % tile == 0,
                PreconditionSnafu {
                    reason: format!(
                        "concatenate {} operand {} has size {size} along dimension {dimension}, not a multiple of tile {tile}",
                        node.name, operand.name
                    )
                }
            );
            limit += size;
            callees.push(callee);
            limits.push(limit);
        }
        ensure!(
            !callees.is_empty(),
            PreconditionSnafu { reason: format!("concatenate {} has no operands", node.name) }
        );
        debug!(concatenate = %node.name, limits = ?limits, "lowering concatenation");

        let offsets = emit_offsets(b, scope.pid, runtime_values, node)?;
        let result_type = Type::tile(&padded, node.dtype);
        self.emit_concat_cascade(b, scope, offsets[dimension], &callees, &limits, &result_type)
    }

    fn emit_concat_cascade(
        &self,
        b: &mut Builder,
        scope: Scope<'_>,
        offset: Value,
        callees: &[ComputationId],
        limits: &[i64],
        result_type: &Type,
    ) -> Result<Value> {
        let nested = |computation| Scope { computation, pid: scope.pid, aliases: None };
        let [first, rest @ ..] = callees else {
            return InternalSnafu { reason: "empty concatenation cascade".to_string() }.fail();
        };
        if rest.is_empty() {
            return self.emit_single_root(b, nested(*first));
        }

        let limit = b.index_const(limits[0]);
        let in_first = b.cmp(CmpPredicate::Lt, offset, limit).context(IrSnafu)?;
        let branch = b.if_else(in_first, std::slice::from_ref(result_type)).context(IrSnafu)?;
        {
            let mut then = b.enter(branch.then_region);
            let value = self.emit_single_root(&mut then, nested(*first))?;
            then.yield_(&[value]).context(IrSnafu)?;
        }
        {
            let mut otherwise = b.enter(branch.else_region);
            let value = self.emit_concat_cascade(&mut otherwise, scope, offset, rest, &limits[1..], result_type)?;
            otherwise.yield_(&[value]).context(IrSnafu)?;
        }
        Ok(branch.results[0])
    }
}
