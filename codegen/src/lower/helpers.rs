//! Shape helpers shared by several rules.

use snafu::{OptionExt, ResultExt, ensure};
use tilegen_dtype::BinaryOp;
use tilegen_ir::{Builder, Value};

use crate::error::*;
use crate::tile_info::padded_tile_sizes;

/// Broadcast `value` to `shape`, mapping input dimension `i` to output dimension `dims[i]`.
///
/// Scalars are splatted. Tensors get a unit dimension inserted at every output position not in
/// `dims` before the final broadcast. `dims` must be sorted.
pub(crate) fn broadcast_in_dims(b: &mut Builder, value: Value, shape: &[i64], dims: &[usize]) -> Result<Value> {
    let ty = b.ty(value).clone();
    if ty.is_scalar() {
        return Ok(b.splat(value, shape).context(IrSnafu)?);
    }
    ensure!(
        ty.rank() == dims.len(),
        InternalSnafu { reason: format!("broadcast of {ty} lists {} dimensions", dims.len()) }
    );

    let mut expanded = value;
    let mut mapped = dims.iter().zip(ty.shape()).peekable();
    for (axis, &size) in shape.iter().enumerate() {
        match mapped.peek() {
            Some(&(&d, &input)) if d == axis => {
                ensure!(
                    input == size || input == 1,
                    InternalSnafu {
                        reason: format!("broadcast maps size {input} to output dimension {axis} of size {size}")
                    }
                );
                mapped.next();
            }
            _ => expanded = b.expand_dims(expanded, axis).context(IrSnafu)?,
        }
    }
    ensure!(
        mapped.next().is_none(),
        InternalSnafu { reason: format!("broadcast dimensions {dims:?} exceed output rank {}", shape.len()) }
    );
    Ok(b.broadcast(expanded, shape).context(IrSnafu)?)
}

/// Reshape a tile to the padded form of `tile_sizes`.
///
/// Scalars are splatted to the target tile. An empty target reduces the (single element) input
/// tile to a scalar.
pub(crate) fn emit_tiled_reshape(b: &mut Builder, tile_sizes: &[i64], input: Value) -> Result<Value> {
    let ty = b.ty(input).clone();
    let target = padded_tile_sizes(tile_sizes);

    if ty.is_scalar() {
        return Ok(b.splat(input, &target).context(IrSnafu)?);
    }

    if target.is_empty() {
        ensure!(
            ty.num_elements() == 1,
            PreconditionSnafu { reason: format!("cannot reshape tile {ty} to a scalar") }
        );
        let flat = if ty.rank() > 1 { b.reshape(input, &[1], true).context(IrSnafu)? } else { input };
        let reduction = b.reduce(flat, 0).context(IrSnafu)?;
        {
            let mut body = b.enter(reduction.body);
            let sum = body.binary(BinaryOp::Add, reduction.lhs, reduction.rhs).context(IrSnafu)?;
            body.reduce_return(sum).context(IrSnafu)?;
        }
        return Ok(reduction.result);
    }

    if ty.shape() == target.as_slice() {
        return Ok(input);
    }
    let target_elements: i64 = target.iter().product();
    ensure!(
        ty.num_elements() == target_elements,
        PreconditionSnafu { reason: format!("padded tile {ty} cannot be reshaped to {target:?}") }
    );
    Ok(b.reshape(input, &target, false).context(IrSnafu)?)
}

/// `make_range(0, size)` for one padded tile dimension.
pub(super) fn lane_range(b: &mut Builder, size: i64) -> Result<Value> {
    let end = i32::try_from(size)
        .ok()
        .with_context(|| PreconditionSnafu { reason: format!("tile dimension {size} does not fit in i32 lanes") })?;
    b.make_range(0, end).context(IrSnafu)
}
