//! Tile descriptors.
//!
//! A [`TileInfo`] is the concrete view of one node's tile inside a program instance: offset
//! values computed from the node's offset map, stride constants, the padded tile shape, the
//! layout, and the storage element type. Offsets are emitted as index arithmetic on the program
//! id, so the same program serves every instance.

use smallvec::SmallVec;
use snafu::{ResultExt, ensure};
use tilegen_dtype::{BinaryOp, CmpPredicate, ConstValue, DType};
use tilegen_graph::{AffineExpr, Node, RtVarBounds};
use tilegen_ir::{Builder, Dims, Value};

use crate::error::*;

/// Round up to the next power of two. Tile dimensions are always positive.
pub fn pad_to_pow2(n: i64) -> i64 {
    (n.max(1) as u64).next_power_of_two() as i64
}

pub fn padded_tile_sizes(tile_sizes: &[i64]) -> Dims {
    tile_sizes.iter().map(|&t| pad_to_pow2(t)).collect()
}

#[derive(Debug, Clone)]
pub struct TileInfo {
    /// One index value per output dimension.
    pub offsets: SmallVec<[Value; 4]>,
    /// One index constant per output dimension.
    pub strides: SmallVec<[Value; 4]>,
    pub original_shape: Dims,
    pub padded_tile_sizes: Dims,
    pub minor_to_major: SmallVec<[usize; 4]>,
    pub storage_type: DType,
}

impl TileInfo {
    pub fn construct(b: &mut Builder, pid: Value, runtime_values: &[Value], node: &Node) -> Result<Self> {
        let offsets = emit_offsets(b, pid, runtime_values, node)?;
        let strides = node.tile.tile_strides.iter().map(|&s| b.index_const(s)).collect();

        Ok(Self {
            offsets,
            strides,
            original_shape: node.shape.dims().iter().copied().collect(),
            padded_tile_sizes: padded_tile_sizes(&node.tile.tile_sizes),
            minor_to_major: node.shape.minor_to_major().iter().copied().collect(),
            storage_type: node.dtype.storage_type(),
        })
    }
}

/// Emit the node's tile offsets for program index `pid` (an index value).
///
/// Runtime values are clamped into their declared bounds and converted to `index` before they
/// enter the offset expressions.
pub fn emit_offsets(b: &mut Builder, pid: Value, runtime_values: &[Value], node: &Node) -> Result<SmallVec<[Value; 4]>> {
    let map = &node.tile.offsets;
    map.check_resolved().context(GraphSnafu)?;
    ensure!(
        runtime_values.len() == map.rt_vars().len(),
        InternalSnafu {
            reason: format!(
                "{} has {} runtime variables but {} runtime values were provided",
                node.name,
                map.rt_vars().len(),
                runtime_values.len()
            )
        }
    );

    let rt = runtime_values
        .iter()
        .zip(map.rt_vars())
        .map(|(&v, bounds)| emit_clamped_index(b, v, bounds))
        .collect::<Result<SmallVec<[Value; 2]>>>()?;

    map.exprs().iter().map(|e| emit_affine(b, e, pid, &rt)).collect()
}

fn emit_clamped_index(b: &mut Builder, value: Value, bounds: &RtVarBounds) -> Result<Value> {
    let ty = b.ty(value).clone();
    ensure!(
        ty.is_scalar() && ty.element().is_int(),
        PreconditionSnafu { reason: format!("runtime variable must be an integer scalar, got {ty}") }
    );
    let dtype = ty.element();
    let lower = b.constant(ConstValue::Int(bounds.lower), dtype);
    let upper = b.constant(ConstValue::Int(bounds.upper), dtype);
    let clamped = b.binary(BinaryOp::Max, value, lower).context(IrSnafu)?;
    let clamped = b.binary(BinaryOp::Min, clamped, upper).context(IrSnafu)?;
    Ok(b.cast(clamped, DType::Index))
}

fn emit_affine(b: &mut Builder, expr: &AffineExpr, pid: Value, rt: &[Value]) -> Result<Value> {
    Ok(match expr {
        AffineExpr::Const(c) => b.index_const(*c),
        AffineExpr::Pid => pid,
        AffineExpr::RtVar(i) => match rt.get(*i) {
            Some(&v) => v,
            None => return InternalSnafu { reason: format!("runtime variable rt{i} out of range") }.fail(),
        },
        AffineExpr::Symbol(s) => {
            return Err(Error::Graph { source: tilegen_graph::Error::UnresolvedSymbol { symbol: *s } });
        }
        AffineExpr::Add(l, r) => {
            let l = emit_affine(b, l, pid, rt)?;
            let r = emit_affine(b, r, pid, rt)?;
            b.add(l, r).context(IrSnafu)?
        }
        AffineExpr::Mul(e, c) => {
            let e = emit_affine(b, e, pid, rt)?;
            let c = b.index_const(*c);
            b.mul(e, c).context(IrSnafu)?
        }
        AffineExpr::FloorDiv(e, c) => {
            // Truncating division rounded toward negative infinity.
            let e = emit_affine(b, e, pid, rt)?;
            let c = b.index_const(*c);
            let q = b.binary(BinaryOp::Div, e, c).context(IrSnafu)?;
            let r = b.binary(BinaryOp::Rem, e, c).context(IrSnafu)?;
            let (zero, one) = (b.index_const(0), b.index_const(1));
            let negative = b.cmp(CmpPredicate::Lt, r, zero).context(IrSnafu)?;
            let q_minus_one = b.sub(q, one).context(IrSnafu)?;
            b.select(negative, q_minus_one, q).context(IrSnafu)?
        }
        AffineExpr::Mod(e, c) => {
            let e = emit_affine(b, e, pid, rt)?;
            let c = b.index_const(*c);
            let r = b.binary(BinaryOp::Rem, e, c).context(IrSnafu)?;
            let zero = b.index_const(0);
            let negative = b.cmp(CmpPredicate::Lt, r, zero).context(IrSnafu)?;
            let wrapped = b.add(r, c).context(IrSnafu)?;
            b.select(negative, wrapped, r).context(IrSnafu)?
        }
    })
}
