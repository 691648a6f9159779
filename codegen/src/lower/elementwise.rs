use snafu::{ResultExt, ensure};
use tilegen_dtype::DType;
use tilegen_graph::{ElementwiseOp, Node};
use tilegen_ir::{Builder, Type, Value};

use crate::error::*;

pub(super) fn emit(b: &mut Builder, node: &Node, op: ElementwiseOp, operands: &[Value]) -> Result<Value> {
    ensure!(
        operands.len() == op.arity(),
        InternalSnafu { reason: format!("{node} has {} operands, expected {}", operands.len(), op.arity()) }
    );
    check_operands(b, node, op, operands)?;
    Ok(match op {
        ElementwiseOp::Unary(u) => b.unary(u, operands[0]).context(IrSnafu)?,
        ElementwiseOp::Binary(bin) => b.binary(bin, operands[0], operands[1]).context(IrSnafu)?,
        ElementwiseOp::Compare(pred) => b.cmp(pred, operands[0], operands[1]).context(IrSnafu)?,
        ElementwiseOp::Select => b.select(operands[0], operands[1], operands[2]).context(IrSnafu)?,
        ElementwiseOp::Convert => b.cast(operands[0], node.dtype),
    })
}

/// Operand type checks against the graph's own types, before the builder sees them.
fn check_operands(b: &Builder, node: &Node, op: ElementwiseOp, operands: &[Value]) -> Result<()> {
    let types: Vec<&Type> = operands.iter().map(|&v| b.ty(v)).collect();
    let same = |a: &Type, c: &Type| -> Result<()> {
        ensure!(
            a == c,
            PreconditionSnafu { reason: format!("{} {} has mismatched operands {a} and {c}", op_name(op), node.name) }
        );
        Ok(())
    };
    match op {
        ElementwiseOp::Unary(u) => {
            let dtype = types[0].element();
            ensure!(u.is_valid_for(dtype), UnsupportedSnafu { what: format!("{u:?} on {dtype} in {}", node.name) });
        }
        ElementwiseOp::Binary(bin) => {
            same(types[0], types[1])?;
            let dtype = types[0].element();
            ensure!(bin.is_valid_for(dtype), UnsupportedSnafu { what: format!("{bin:?} on {dtype} in {}", node.name) });
        }
        ElementwiseOp::Compare(_) => same(types[0], types[1])?,
        ElementwiseOp::Select => {
            let cond = types[0];
            ensure!(
                cond.element() == DType::Bool && cond.shape() == types[1].shape(),
                PreconditionSnafu { reason: format!("select {} has condition {cond} for {}", node.name, types[1]) }
            );
            same(types[1], types[2])?;
        }
        ElementwiseOp::Convert => {}
    }
    Ok(())
}

fn op_name(op: ElementwiseOp) -> &'static str {
    match op {
        ElementwiseOp::Unary(_) => "unary",
        ElementwiseOp::Binary(_) => "binary",
        ElementwiseOp::Compare(_) => "compare",
        ElementwiseOp::Select => "select",
        ElementwiseOp::Convert => "convert",
    }
}
