//! Result type inference.
//!
//! The builder infers result types through [`infer_result_types`] when an operation is created, and
//! the verifier re-runs it over the finished program, so both agree on every typing rule.

use smallvec::{SmallVec, smallvec};
use snafu::ensure;
use tilegen_dtype::DType;

use crate::error::*;
use crate::op::OpKind;
use crate::types::{Dims, Type};

pub type Types = SmallVec<[Type; 1]>;

fn expect_count(op: &'static str, operands: &[Type], expected: usize) -> Result<()> {
    ensure!(operands.len() == expected, OperandCountSnafu { op, expected, actual: operands.len() });
    Ok(())
}

fn invalid<T>(op: &'static str, reason: impl Into<String>) -> Result<T> {
    InvalidOperandsSnafu { op, reason: reason.into() }.fail()
}

fn is_permutation(order: &[usize], rank: usize) -> bool {
    let mut seen: SmallVec<[bool; 4]> = smallvec![false; rank];
    order.len() == rank && order.iter().all(|&d| d < rank && !std::mem::replace(&mut seen[d], true))
}

fn expect_tensor<'t>(op: &'static str, ty: &'t Type) -> Result<&'t [i64]> {
    match ty {
        Type::Tensor { shape, .. } if !shape.is_empty() => Ok(shape),
        other => invalid(op, format!("expected a non 0-D tensor, got {other}")),
    }
}

fn expect_index(op: &'static str, types: &[Type]) -> Result<()> {
    for ty in types {
        if *ty != Type::Scalar(DType::Index) {
            return invalid(op, format!("expected index scalar, got {ty}"));
        }
    }
    Ok(())
}

/// Result types of `kind` applied to operands of the given types.
pub fn infer_result_types(kind: &OpKind, operands: &[Type]) -> Result<Types> {
    let op = kind.mnemonic();
    Ok(match kind {
        OpKind::GetProgramId { .. } => {
            expect_count(op, operands, 0)?;
            smallvec![Type::Scalar(DType::Int32)]
        }
        OpKind::Constant { ty, .. } => {
            expect_count(op, operands, 0)?;
            smallvec![ty.clone()]
        }
        OpKind::MakeRange { start, end } => {
            expect_count(op, operands, 0)?;
            ensure!(end > start, InvalidOperandsSnafu { op, reason: format!("empty range [{start}, {end})") });
            smallvec![Type::tensor([(*end - *start) as i64], DType::Int32)]
        }
        OpKind::Splat { shape } => {
            expect_count(op, operands, 1)?;
            if !operands[0].is_scalar() || shape.is_empty() {
                return invalid(op, format!("cannot splat {} to {shape:?}", operands[0]));
            }
            smallvec![Type::tensor(shape.iter().copied(), operands[0].element())]
        }
        OpKind::Broadcast { shape } => {
            expect_count(op, operands, 1)?;
            let input = expect_tensor(op, &operands[0])?;
            let compatible = input.len() == shape.len() && input.iter().zip(shape).all(|(&i, &o)| i == o || i == 1);
            if !compatible {
                return invalid(op, format!("cannot broadcast {input:?} to {shape:?}"));
            }
            smallvec![Type::tensor(shape.iter().copied(), operands[0].element())]
        }
        OpKind::ExpandDims { axis } => {
            expect_count(op, operands, 1)?;
            let input = expect_tensor(op, &operands[0])?;
            ensure!(*axis <= input.len(), InvalidOperandsSnafu { op, reason: format!("axis {axis} out of range") });
            let mut shape: Dims = input.iter().copied().collect();
            shape.insert(*axis, 1);
            smallvec![Type::tensor(shape, operands[0].element())]
        }
        OpKind::Reshape { shape, .. } => {
            expect_count(op, operands, 1)?;
            let input = expect_tensor(op, &operands[0])?;
            let (from, to): (i64, i64) = (input.iter().product(), shape.iter().product());
            if shape.is_empty() || from != to {
                return invalid(op, format!("cannot reshape {input:?} to {shape:?}"));
            }
            smallvec![Type::tensor(shape.iter().copied(), operands[0].element())]
        }
        OpKind::Trans { order } => {
            expect_count(op, operands, 1)?;
            let input = expect_tensor(op, &operands[0])?;
            if !is_permutation(order, input.len()) {
                return invalid(op, format!("{order:?} is not a permutation of rank {}", input.len()));
            }
            smallvec![Type::tensor(order.iter().map(|&d| input[d]), operands[0].element())]
        }
        OpKind::Reduce { axis } => {
            expect_count(op, operands, 1)?;
            let input = expect_tensor(op, &operands[0])?;
            ensure!(*axis < input.len(), InvalidOperandsSnafu { op, reason: format!("axis {axis} out of range") });
            let shape: Dims = input.iter().enumerate().filter(|&(d, _)| d != *axis).map(|(_, &s)| s).collect();
            smallvec![Type::tile(&shape, operands[0].element())]
        }
        OpKind::For => {
            ensure!(operands.len() >= 3, OperandCountSnafu { op, expected: 3usize, actual: operands.len() });
            for bound in &operands[..3] {
                if *bound != Type::Scalar(DType::Int64) {
                    return invalid(op, format!("loop bounds must be i64, got {bound}"));
                }
            }
            operands[3..].iter().cloned().collect()
        }
        OpKind::If { results } => {
            expect_count(op, operands, 1)?;
            if operands[0] != Type::Scalar(DType::Bool) {
                return invalid(op, format!("condition must be i1, got {}", operands[0]));
            }
            results.clone()
        }
        OpKind::Yield | OpKind::ReduceReturn | OpKind::Return => SmallVec::new(),
        OpKind::Extract { tile, layout } => {
            let Some(source) = operands.first() else {
                return OperandCountSnafu { op, expected: 1usize, actual: 0usize }.fail();
            };
            let rank = source.rank();
            ensure!(source.is_tensor() && rank > 0, InvalidOperandsSnafu { op, reason: format!("bad source {source}") });
            expect_count(op, operands, 1 + 2 * rank)?;
            expect_index(op, &operands[1..])?;
            if tile.len() != rank || !is_permutation(layout, rank) {
                return invalid(op, format!("tile {tile:?} / layout {layout:?} do not match rank {rank}"));
            }
            smallvec![Type::tensor(tile.iter().copied(), source.element())]
        }
        OpKind::Insert { layout } => {
            ensure!(operands.len() >= 2, OperandCountSnafu { op, expected: 2usize, actual: operands.len() });
            let (tile, dest) = (&operands[0], &operands[1]);
            let rank = dest.rank();
            expect_tensor(op, tile)?;
            expect_count(op, operands, 2 + 2 * rank)?;
            expect_index(op, &operands[2..])?;
            if tile.rank() != rank || tile.element() != dest.element() || !is_permutation(layout, rank) {
                return invalid(op, format!("cannot insert {tile} into {dest}"));
            }
            smallvec![dest.clone()]
        }
        OpKind::TensorExtract => {
            expect_count(op, operands, 1)?;
            if !operands[0].is_tensor() || operands[0].rank() != 0 {
                return invalid(op, format!("expected a 0-D tensor, got {}", operands[0]));
            }
            smallvec![Type::Scalar(operands[0].element())]
        }
        OpKind::TensorInsert => {
            expect_count(op, operands, 2)?;
            let (value, dest) = (&operands[0], &operands[1]);
            if !value.is_scalar() || !dest.is_tensor() || dest.rank() != 0 || value.element() != dest.element() {
                return invalid(op, format!("cannot insert {value} into {dest}"));
            }
            smallvec![dest.clone()]
        }
        OpKind::Unary(u) => {
            expect_count(op, operands, 1)?;
            ensure!(
                u.is_valid_for(operands[0].element()),
                InvalidOperandsSnafu { op, reason: format!("{u:?} on {}", operands[0]) }
            );
            smallvec![operands[0].clone()]
        }
        OpKind::Binary(b) => {
            expect_count(op, operands, 2)?;
            if operands[0] != operands[1] || !b.is_valid_for(operands[0].element()) {
                return invalid(op, format!("{b:?} on {} and {}", operands[0], operands[1]));
            }
            smallvec![operands[0].clone()]
        }
        OpKind::Cmp(_) => {
            expect_count(op, operands, 2)?;
            if operands[0] != operands[1] {
                return invalid(op, format!("cannot compare {} and {}", operands[0], operands[1]));
            }
            smallvec![operands[0].with_element(DType::Bool)]
        }
        OpKind::Select => {
            expect_count(op, operands, 3)?;
            let (cond, t, f) = (&operands[0], &operands[1], &operands[2]);
            if cond.element() != DType::Bool || cond.shape() != t.shape() || t != f {
                return invalid(op, format!("select({cond}, {t}, {f})"));
            }
            smallvec![t.clone()]
        }
        OpKind::Cast { to } => {
            expect_count(op, operands, 1)?;
            smallvec![operands[0].with_element(*to)]
        }
        OpKind::Dot => {
            expect_count(op, operands, 3)?;
            let (lhs, rhs, acc) = (&operands[0], &operands[1], &operands[2]);
            let ok = lhs.rank() == 2
                && rhs.rank() == 2
                && acc.rank() == 2
                && lhs.is_tensor()
                && lhs.shape()[1] == rhs.shape()[0]
                && acc.shape() == [lhs.shape()[0], rhs.shape()[1]]
                && lhs.element() == rhs.element();
            if !ok {
                return invalid(op, format!("dot({lhs}, {rhs}, {acc})"));
            }
            smallvec![acc.clone()]
        }
    })
}
