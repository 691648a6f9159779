//! Matrix multiplication as a loop over contracting-dimension tiles.
//!
//! Both operands are nested fusions. Every iteration lowers them again at the program index
//! `pid * iterations + k`, masks lanes past the true contracting extent, brings them into
//! `[M, K] x [K, N]` form and accumulates into the loop-carried tile.

use smallvec::SmallVec;
use snafu::{ResultExt, ensure};
use tilegen_dtype::{BinaryOp, CmpPredicate, ConstValue, DType};
use tilegen_graph::{Computation, ComputationId, DotSpec, Node, Opcode};
use tilegen_ir::{Builder, Value};
use tracing::debug;

use super::helpers::{broadcast_in_dims, lane_range};
use super::{Emitter, Scope};
use crate::error::*;
use crate::tile_info::padded_tile_sizes;

/// Accumulator used when the dot carries no explicit one: half-precision floats accumulate in
/// `f32` and narrow integers in 32 bits.
pub(crate) fn default_accumulator(output: DType) -> DType {
    match output {
        DType::Float16 | DType::BFloat16 => DType::Float32,
        DType::Int4 | DType::Int8 | DType::Int16 => DType::Int32,
        DType::UInt8 | DType::UInt16 => DType::UInt32,
        other => other,
    }
}

/// Which side of the contraction an operand is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Lhs,
    Rhs,
}

/// Static facts about one operand, gathered before the loop is emitted.
#[derive(Debug)]
struct DotOperand<'g> {
    side: Side,
    node: &'g Node,
    computation: ComputationId,
    contracting: usize,
    /// Unpadded tile size along the contracting dimension.
    tile_k: i64,
}

impl Emitter<'_> {
    pub(super) fn emit_dot(
        &self,
        b: &mut Builder,
        scope: Scope<'_>,
        computation: &Computation,
        node: &Node,
        spec: &DotSpec,
    ) -> Result<Value> {
        ensure!(
            spec.sparse_operands == 0,
            UnsupportedSnafu { what: format!("dot {} with sparse operands", node.name) }
        );
        let (&[lhs_k], &[rhs_k]) = (spec.lhs_contracting.as_slice(), spec.rhs_contracting.as_slice()) else {
            return UnsupportedSnafu {
                what: format!(
                    "dot {} with {} and {} contracting dimensions",
                    node.name,
                    spec.lhs_contracting.len(),
                    spec.rhs_contracting.len()
                ),
            }
            .fail();
        };
        ensure!(
            node.operands.len() == 2,
            PreconditionSnafu { reason: format!("dot {} has {} operands", node.name, node.operands.len()) }
        );
        let lhs = self.dot_operand(computation, node, Side::Lhs, lhs_k)?;
        let rhs = self.dot_operand(computation, node, Side::Rhs, rhs_k)?;
        ensure!(
            lhs.tile_k == rhs.tile_k,
            PreconditionSnafu {
                reason: format!("dot {} contracting tiles differ: {} vs {}", node.name, lhs.tile_k, rhs.tile_k)
            }
        );

        let output = padded_tile_sizes(&node.tile.tile_sizes);
        let rank = output.len();
        ensure!(
            rank >= 2 && output[..rank - 2].iter().all(|&s| s == 1),
            PreconditionSnafu {
                reason: format!("dot {} output tile {output:?} is not a unit-padded matrix", node.name)
            }
        );
        let matrix = [output[rank - 2], output[rank - 1]];

        let k = lhs.node.shape.dim(lhs.contracting);
        let iterations = (k + lhs.tile_k - 1) / lhs.tile_k;
        let accumulator_type = spec.accumulator.unwrap_or_else(|| default_accumulator(node.dtype));
        debug!(dot = %node.name, k, tile_k = lhs.tile_k, iterations, accumulator = %accumulator_type, "lowering dot");

        let zero = b.constant_tile(ConstValue::zero(accumulator_type), accumulator_type, &matrix);
        let (lower, upper, step) = (b.i64_const(0), b.i64_const(iterations), b.i64_const(1));
        let lp = b.for_loop(lower, upper, step, &[zero]).context(IrSnafu)?;
        {
            let mut body = b.enter(lp.body);
            let count = body.index_const(iterations);
            let base = body.mul(scope.pid, count).context(IrSnafu)?;
            let k_index = body.cast(lp.induction_var, DType::Index);
            let pid = body.add(base, k_index).context(IrSnafu)?;

            let lhs_tile = self.emit_dot_operand(&mut body, pid, lp.induction_var, k, &lhs)?;
            let rhs_tile = self.emit_dot_operand(&mut body, pid, lp.induction_var, k, &rhs)?;
            let accumulated = body.dot(lhs_tile, rhs_tile, lp.carried[0]).context(IrSnafu)?;
            body.yield_(&[accumulated]).context(IrSnafu)?;
        }

        let result = b.cast(lp.results[0], node.dtype);
        if rank == 2 {
            return Ok(result);
        }
        Ok(b.reshape(result, &output, false).context(IrSnafu)?)
    }

    fn dot_operand<'g>(
        &self,
        computation: &'g Computation,
        dot: &Node,
        side: Side,
        contracting: usize,
    ) -> Result<DotOperand<'g>> {
        let index = match side {
            Side::Lhs => 0,
            Side::Rhs => 1,
        };
        let node = computation.node(dot.operand(index));
        let Opcode::Fusion { computation: callee } = node.opcode else {
            return PreconditionSnafu {
                reason: format!("dot {} operand {} is not a nested fusion", dot.name, node.name),
            }
            .fail();
        };
        ensure!(
            contracting < node.shape.rank(),
            PreconditionSnafu { reason: format!("dot {} contracts dimension {contracting} of {}", dot.name, node.name) }
        );

        let nested = self.graph.try_computation(callee).context(GraphSnafu)?;
        let &[root] = nested.roots() else {
            return UnsupportedSnafu {
                what: format!("nested computation {} with {} roots", nested.name, nested.roots().len()),
            }
            .fail();
        };
        let tile_k = nested.node(root).tile.tile_sizes.get(contracting).copied();
        let Some(tile_k) = tile_k.filter(|&t| t > 0) else {
            return PreconditionSnafu {
                reason: format!("root of {} has no positive tile along dimension {contracting}", nested.name),
            }
            .fail();
        };

        Ok(DotOperand { side, node, computation: callee, contracting, tile_k })
    }

    /// Lower one operand for the current iteration: mask, collapse unit dimensions, transpose.
    fn emit_dot_operand(
        &self,
        b: &mut Builder,
        pid: Value,
        induction_var: Value,
        k: i64,
        operand: &DotOperand<'_>,
    ) -> Result<Value> {
        let nested = Scope { computation: operand.computation, pid, aliases: None };
        let tile = self.emit_single_root(b, nested)?;
        let masked = emit_contracting_mask(b, tile, induction_var, k, operand)?;
        canonicalize(b, masked, operand)
    }
}

/// Zero the lanes of `tile` whose global contracting index `k_iter * tile_k + lane` is past `k`,
/// and the padding lanes of a non-power-of-two tile. Applied on every iteration.
fn emit_contracting_mask(
    b: &mut Builder,
    tile: Value,
    induction_var: Value,
    k: i64,
    operand: &DotOperand<'_>,
) -> Result<Value> {
    let ty = b.ty(tile).clone();
    if ty.is_scalar() {
        return Ok(tile);
    }
    let padded_k = ty.shape()[operand.contracting];
    let has_tail = k % operand.tile_k != 0;
    let has_padding = padded_k != operand.tile_k;
    if !has_tail && !has_padding {
        return Ok(tile);
    }

    let range = lane_range(b, padded_k)?;
    let mut conditions: SmallVec<[Value; 2]> = SmallVec::new();
    if has_tail {
        let iteration = b.cast(induction_var, DType::Int32);
        let tile_k = b.i32_const(operand.tile_k);
        let start = b.mul(iteration, tile_k).context(IrSnafu)?;
        let start = b.splat(start, &[padded_k]).context(IrSnafu)?;
        let index = b.add(start, range).context(IrSnafu)?;
        let limit = b.i32_const(k);
        let limit = b.splat(limit, &[padded_k]).context(IrSnafu)?;
        conditions.push(b.cmp(CmpPredicate::Lt, index, limit).context(IrSnafu)?);
    }
    if has_padding {
        let limit = b.i32_const(operand.tile_k);
        let limit = b.splat(limit, &[padded_k]).context(IrSnafu)?;
        conditions.push(b.cmp(CmpPredicate::Lt, range, limit).context(IrSnafu)?);
    }
    let mut mask = conditions[0];
    for &condition in &conditions[1..] {
        mask = b.binary(BinaryOp::And, mask, condition).context(IrSnafu)?;
    }

    let mask = broadcast_in_dims(b, mask, ty.shape(), &[operand.contracting])?;
    let zero = b.constant(ConstValue::zero(ty.element()), ty.element());
    let zero = b.splat(zero, ty.shape()).context(IrSnafu)?;
    Ok(b.select(mask, tile, zero).context(IrSnafu)?)
}

/// Bring an operand tile into `[M, K]` (lhs) or `[K, N]` (rhs) form.
///
/// Unit dimensions are collapsed first; at most one non-unit free dimension may remain.
fn canonicalize(b: &mut Builder, tile: Value, operand: &DotOperand<'_>) -> Result<Value> {
    let ty = b.ty(tile).clone();
    let shape = ty.shape();
    let contracting = operand.contracting;
    ensure!(
        contracting < shape.len(),
        InternalSnafu { reason: format!("operand tile {ty} has no contracting dimension {contracting}") }
    );
    let k = shape[contracting];

    let free: SmallVec<[usize; 2]> = (0..shape.len()).filter(|&d| d != contracting && shape[d] != 1).collect();
    let (physical, transpose) = match (free.as_slice(), operand.side) {
        ([], Side::Lhs) => ([1, k], false),
        ([], Side::Rhs) => ([k, 1], false),
        (&[f], side) if f < contracting => ([shape[f], k], side == Side::Rhs),
        (&[f], side) => ([k, shape[f]], side == Side::Lhs),
        _ => {
            return PreconditionSnafu {
                reason: format!("dot operand {} tile {ty} has more than one free dimension", operand.node.name),
            }
            .fail();
        }
    };

    let mut value = tile;
    if shape != physical.as_slice() {
        value = b.reshape(value, &physical, false).context(IrSnafu)?;
    }
    if transpose {
        value = b.trans(value, &[1, 0]).context(IrSnafu)?;
    }
    Ok(value)
}
