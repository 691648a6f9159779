//! Graph walker and per-opcode lowering rules.
//!
//! [`Emitter::emit_computation`] walks a computation in producer-before-consumer order and
//! dispatches every node to the rule for its opcode. Each rule appends operations at the builder's
//! current insertion point and returns the node's tile value: a tensor of the padded tile shape,
//! or a scalar when the tile is empty.
//!
//! Nested computations are lowered by recursion with a fresh [`ValueCache`] per invocation:
//! - operands of dots and concatenations are lowered by those rules, once per loop iteration or
//!   branch, at a program index derived from the caller's;
//! - any other fusion node is flattened in place, its parameters aliased to the fusion's operand
//!   values;
//! - reducer bodies are flattened the same way, with parameters aliased to the combiner's block
//!   arguments.

mod concat;
pub(crate) mod dot;
mod elementwise;
mod helpers;
mod movement;
mod pad;
mod parameter;
mod reduce;

use smallvec::SmallVec;
use snafu::{OptionExt, ResultExt, ensure};
use tilegen_graph::{Computation, ComputationId, FusionGraph, Node, NodeId, Opcode};
use tilegen_ir::{Builder, Value};
use tracing::{debug, trace};

use crate::cache::ValueCache;
use crate::error::*;
use crate::tile_info::padded_tile_sizes;

/// Shared, read-only state of one fusion's lowering.
pub(crate) struct Emitter<'g> {
    pub graph: &'g FusionGraph,
    /// Function arguments holding the entry computation's parameters, by parameter number.
    pub params: Vec<Value>,
}

/// Where and how a computation is lowered.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Scope<'a> {
    pub computation: ComputationId,
    /// Program index, as an `index` value.
    pub pid: Value,
    /// Values standing in for the computation's parameters; `None` loads them from memory.
    pub aliases: Option<&'a [Value]>,
}

/// Results of lowering one computation.
#[derive(Debug)]
pub(crate) struct Lowered {
    pub roots: Vec<Value>,
    pub cache: ValueCache,
}

impl<'g> Emitter<'g> {
    pub fn new(graph: &'g FusionGraph, params: Vec<Value>) -> Self {
        Self { graph, params }
    }

    pub fn emit_computation(&self, b: &mut Builder, scope: Scope<'_>) -> Result<Lowered> {
        let computation = self.graph.try_computation(scope.computation).context(GraphSnafu)?;
        debug!(computation = %computation.name, nodes = computation.len(), "lowering computation");

        let mut cache = ValueCache::new();
        for (id, node) in computation.nodes() {
            if is_lowered_by_consumer(computation, id, node) {
                trace!(node = %node.name, "skipping nested fusion lowered by its consumer");
                continue;
            }
            let value = self.emit_node(b, scope, computation, &cache, node)?;
            cache.insert(id, node, value)?;
            trace!(node = %node.name, opcode = node.opcode.name(), value = %value, "emitted");
        }

        let roots = computation
            .roots()
            .iter()
            .map(|&root| cache.get(root, computation.node(root)))
            .collect::<Result<_>>()?;
        Ok(Lowered { roots, cache })
    }

    /// Lower a computation that must have exactly one root and return that root's value.
    pub fn emit_single_root(&self, b: &mut Builder, scope: Scope<'_>) -> Result<Value> {
        let lowered = self.emit_computation(b, scope)?;
        match lowered.roots.as_slice() {
            [root] => Ok(*root),
            roots => UnsupportedSnafu {
                what: format!(
                    "nested computation {} with {} roots",
                    self.graph.computation(scope.computation).name,
                    roots.len()
                ),
            }
            .fail(),
        }
    }

    fn emit_node(
        &self,
        b: &mut Builder,
        scope: Scope<'_>,
        computation: &Computation,
        cache: &ValueCache,
        node: &Node,
    ) -> Result<Value> {
        let operand = |i: usize| {
            let id = node.operand(i);
            cache.get(id, computation.node(id))
        };
        let input = |i: usize| computation.node(node.operand(i));

        match &node.opcode {
            Opcode::Parameter { number } => match scope.aliases {
                Some(aliases) => aliases.get(*number).copied().with_context(|| InternalSnafu {
                    reason: format!("parameter {number} of {} has no aliased value", computation.name),
                }),
                None => self.emit_parameter(b, scope, computation, cache, node, *number),
            },
            Opcode::Constant { value } => {
                ensure!(
                    node.shape.is_effective_scalar(),
                    UnsupportedSnafu { what: format!("non-scalar constant {node}") }
                );
                let constant = b.constant(*value, node.dtype);
                Ok(b.splat(constant, &padded_tile_sizes(&node.tile.tile_sizes)).context(IrSnafu)?)
            }
            Opcode::Elementwise(op) => {
                let operands = (0..node.operands.len()).map(operand).collect::<Result<SmallVec<[Value; 3]>>>()?;
                elementwise::emit(b, node, *op, &operands)
            }
            Opcode::Broadcast { dimensions } => {
                movement::emit_broadcast(b, node, &input(0).tile.tile_sizes, dimensions, operand(0)?)
            }
            Opcode::Iota { dimension } => {
                let rt = runtime_values(computation, cache, node)?;
                movement::emit_iota(b, scope.pid, &rt, node, *dimension)
            }
            Opcode::Reduce { dimensions, reducer } => {
                self.emit_reduce(b, scope, node, input(0), dimensions, *reducer, operand(0)?, operand(1)?)
            }
            Opcode::Reshape => helpers::emit_tiled_reshape(b, &node.tile.tile_sizes, operand(0)?),
            Opcode::Transpose { permutation } => movement::emit_transpose(b, permutation, operand(0)?),
            Opcode::Bitcast => movement::emit_bitcast(b, node, input(0), operand(0)?),
            Opcode::Pad { config } => {
                let rt = runtime_values(computation, cache, node)?;
                pad::emit(b, scope.pid, &rt, node, input(0), config, operand(0)?, operand(1)?)
            }
            Opcode::Concatenate { dimension } => {
                let rt = runtime_values(computation, cache, node)?;
                self.emit_concatenate(b, scope, computation, &rt, node, *dimension)
            }
            // Slices are folded into the producing parameter's offsets.
            Opcode::Slice { .. } | Opcode::DynamicSlice { .. } => operand(0),
            Opcode::Dot(spec) => self.emit_dot(b, scope, computation, node, spec),
            Opcode::Fusion { computation: callee } => {
                let operands = (0..node.operands.len()).map(operand).collect::<Result<Vec<_>>>()?;
                debug!(fusion = %node.name, "flattening nested fusion");
                let nested = Scope { computation: *callee, pid: scope.pid, aliases: Some(operands.as_slice()) };
                self.emit_single_root(b, nested)
            }
        }
    }
}

/// Fusion nodes consumed only by dots and concatenations are lowered by those consumers.
fn is_lowered_by_consumer(computation: &Computation, id: NodeId, node: &Node) -> bool {
    if !node.opcode.is_fusion() {
        return false;
    }
    let mut users = computation.users(id).peekable();
    users.peek().is_some()
        && users.all(|u| {
            matches!(computation.node(u).opcode, Opcode::Dot(_) | Opcode::Concatenate { .. })
        })
}

/// Emitted values of the node's runtime variables, in declaration order.
pub(crate) fn runtime_values(computation: &Computation, cache: &ValueCache, node: &Node) -> Result<SmallVec<[Value; 2]>> {
    node.tile.runtime_variables.iter().map(|&rt| cache.get(rt, computation.node(rt))).collect()
}
