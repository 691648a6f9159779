//! Structural verification of a finished [`Program`].
//!
//! Checks, in one pass over the region tree:
//! - every operand is defined before use, in the same block or an enclosing one;
//! - recorded result types match [`infer_result_types`];
//! - each operation owns the number of regions its kind requires;
//! - region arguments and terminators agree with the owning operation;
//! - the function body returns the signature's result types.

use std::collections::HashSet;

use snafu::ensure;
use tilegen_dtype::DType;
use tracing::trace;

use crate::error::*;
use crate::infer::infer_result_types;
use crate::op::OpKind;
use crate::program::Program;
use crate::types::{RegionId, Type, Value};

pub fn verify(program: &Program) -> Result<()> {
    let mut visible = HashSet::new();
    let body = program.body();
    let arg_types: Vec<Type> = program.args().iter().map(|&v| program.ty(v).clone()).collect();
    ensure!(
        arg_types == program.signature.args,
        ResultTypeMismatchSnafu { op: "func.func", expected: program.signature.args.clone(), actual: arg_types }
    );
    verify_region(program, body, &mut visible)?;
    expect_terminator(program, body, "func.func", "func.return", &program.signature.results)?;
    trace!(program = %program.name, "verified");
    Ok(())
}

fn verify_region(program: &Program, region: RegionId, visible: &mut HashSet<Value>) -> Result<()> {
    let block = program.block(region);
    let saved = visible.clone();
    visible.extend(block.args.iter().copied());

    let last = block.ops.len().saturating_sub(1);
    for (position, &id) in block.ops.iter().enumerate() {
        let op = program.op(id);
        let name = op.kind.mnemonic();

        if let Some(&value) = op.operands.iter().find(|v| !visible.contains(v)) {
            return UndefinedValueSnafu { value, op: name }.fail();
        }
        ensure!(!op.kind.is_terminator() || position == last, MisplacedTerminatorSnafu { op: name });

        let operand_types: Vec<Type> = op.operands.iter().map(|&v| program.ty(v).clone()).collect();
        let expected: Vec<Type> = infer_result_types(&op.kind, &operand_types)?.into_vec();
        let actual: Vec<Type> = op.results.iter().map(|&v| program.ty(v).clone()).collect();
        ensure!(expected == actual, ResultTypeMismatchSnafu { op: name, expected, actual });

        let regions = op.kind.num_regions();
        ensure!(
            op.regions.len() == regions,
            RegionCountSnafu { op: name, expected: regions, actual: op.regions.len() }
        );

        match &op.kind {
            OpKind::For => {
                let carried = &operand_types[3..];
                let mut args = vec![Type::Scalar(DType::Int64)];
                args.extend(carried.iter().cloned());
                expect_args(program, op.regions[0], name, &args)?;
                verify_region(program, op.regions[0], visible)?;
                expect_terminator(program, op.regions[0], name, "scf.yield", carried)?;
            }
            OpKind::If { results } => {
                for &r in &op.regions {
                    expect_args(program, r, name, &[])?;
                    verify_region(program, r, visible)?;
                    expect_terminator(program, r, name, "scf.yield", results)?;
                }
            }
            OpKind::Reduce { .. } => {
                let element = Type::Scalar(operand_types[0].element());
                expect_args(program, op.regions[0], name, &[element.clone(), element.clone()])?;
                verify_region(program, op.regions[0], visible)?;
                expect_terminator(program, op.regions[0], name, "tt.reduce.return", &[element])?;
            }
            _ => {}
        }

        visible.extend(op.results.iter().copied());
    }

    *visible = saved;
    Ok(())
}

fn expect_args(program: &Program, region: RegionId, owner: &'static str, expected: &[Type]) -> Result<()> {
    let actual: Vec<Type> = program.block(region).args.iter().map(|&v| program.ty(v).clone()).collect();
    ensure!(
        actual == expected,
        ResultTypeMismatchSnafu { op: owner, expected: expected.to_vec(), actual }
    );
    Ok(())
}

fn expect_terminator(
    program: &Program,
    region: RegionId,
    owner: &'static str,
    expected_op: &'static str,
    expected: &[Type],
) -> Result<()> {
    let block = program.block(region);
    let Some(&last) = block.ops.last() else {
        return MissingTerminatorSnafu { owner, expected: expected_op }.fail();
    };
    let term = program.op(last);
    ensure!(term.kind.mnemonic() == expected_op, MissingTerminatorSnafu { owner, expected: expected_op });
    let actual: Vec<Type> = term.operands.iter().map(|&v| program.ty(v).clone()).collect();
    ensure!(
        actual == expected,
        TerminatorTypeMismatchSnafu { terminator: expected_op, expected: expected.to_vec(), actual }
    );
    Ok(())
}
