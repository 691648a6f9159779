//! Loading parameter tiles from function arguments.

use snafu::{OptionExt, ResultExt, ensure};
use tilegen_graph::{Computation, ComputationId, Node, Opcode};
use tilegen_ir::{Builder, Value};
use tracing::trace;

use super::{Emitter, Scope, runtime_values};
use crate::cache::ValueCache;
use crate::error::*;
use crate::tile_info::TileInfo;

impl Emitter<'_> {
    pub(super) fn emit_parameter(
        &self,
        b: &mut Builder,
        scope: Scope<'_>,
        computation: &Computation,
        cache: &ValueCache,
        node: &Node,
        number: usize,
    ) -> Result<Value> {
        let argument = self.outermost_argument(scope.computation, number)?;
        let rt = runtime_values(computation, cache, node)?;
        let tile = TileInfo::construct(b, scope.pid, &rt, node)?;

        let loaded = if tile.padded_tile_sizes.is_empty() {
            b.tensor_extract(argument).context(IrSnafu)?
        } else {
            b.extract(argument, &tile.offsets, &tile.strides, &tile.padded_tile_sizes, &tile.minor_to_major).context(IrSnafu)?
        };

        let loaded_type = b.ty(loaded).element();
        if loaded_type == node.dtype {
            return Ok(loaded);
        }
        ensure!(
            loaded_type == tile.storage_type,
            InternalSnafu {
                reason: format!("{} loaded as {loaded_type}, expected {} in storage", node.name, tile.storage_type)
            }
        );
        Ok(b.cast(loaded, node.dtype))
    }

    /// Function argument backing parameter `number` of `computation`.
    ///
    /// Nested parameters resolve through their caller's operand, which must itself be a
    /// parameter, until the entry computation is reached.
    pub(crate) fn outermost_argument(&self, computation: ComputationId, number: usize) -> Result<Value> {
        let (mut computation, mut number) = (computation, number);
        while computation != self.graph.entry_id() {
            let current = self.graph.try_computation(computation).context(GraphSnafu)?;
            let caller = current.caller().with_context(|| InternalSnafu {
                reason: format!("computation {} has no caller", current.name),
            })?;
            let fusion = self.graph.node(caller);
            let operand = *fusion.operands.get(number).with_context(|| InternalSnafu {
                reason: format!("{} has no operand {number}", fusion.name),
            })?;
            let operand = self.graph.computation(caller.computation).node(operand);
            let Opcode::Parameter { number: outer } = operand.opcode else {
                return PreconditionSnafu {
                    reason: format!("operand {number} of {} is {}, not a parameter", fusion.name, operand.name),
                }
                .fail();
            };
            trace!(fusion = %fusion.name, inner = number, outer, "resolved nested parameter");
            (computation, number) = (caller.computation, outer);
        }
        self.params.get(number).copied().with_context(|| InternalSnafu {
            reason: format!("entry parameter {number} has no function argument"),
        })
    }
}
