//! Textual form of a [`Program`].
//!
//! The output depends only on the program's structure, so it is stable across runs and can be
//! compared directly in tests. Every operation prints as
//!
//! ```text
//! %r = mnemonic %a, %b {attr = v} : (operand types) -> result types
//! ```
//!
//! followed by its regions, each opened with a `^bb(...)` line naming the block arguments.

use std::fmt::{self, Write};

use itertools::Itertools;

use crate::op::{OpKind, Operation};
use crate::program::Program;
use crate::types::RegionId;

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args = self.args().iter().map(|&v| format!("{v}: {}", self.ty(v))).join(", ");
        let results = self.signature.results.iter().join(", ");
        writeln!(f, "func.func @{}({args}) -> ({results}) {{", self.name)?;
        print_block(self, self.body(), 1, f)?;
        writeln!(f, "}}")
    }
}

fn print_block(program: &Program, region: RegionId, depth: usize, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for &id in &program.block(region).ops {
        print_op(program, program.op(id), depth, f)?;
    }
    Ok(())
}

fn print_op(program: &Program, op: &Operation, depth: usize, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let indent = "  ".repeat(depth);
    f.write_str(&indent)?;
    if !op.results.is_empty() {
        write!(f, "{} = ", op.results.iter().join(", "))?;
    }
    f.write_str(op.kind.mnemonic())?;
    if !op.operands.is_empty() {
        write!(f, " {}", op.operands.iter().join(", "))?;
    }
    let attrs = attributes(&op.kind);
    if !attrs.is_empty() {
        write!(f, " {{{attrs}}}")?;
    }
    if !op.operands.is_empty() || !op.results.is_empty() {
        let operand_types = op.operands.iter().map(|&v| program.ty(v)).join(", ");
        write!(f, " : ({operand_types})")?;
        if !op.results.is_empty() {
            write!(f, " -> {}", op.results.iter().map(|&v| program.ty(v)).join(", "))?;
        }
    }

    for &region in &op.regions {
        f.write_str(" {\n")?;
        let args = &program.block(region).args;
        if !args.is_empty() {
            let args = args.iter().map(|&v| format!("{v}: {}", program.ty(v))).join(", ");
            writeln!(f, "{indent}^bb({args}):")?;
        }
        print_block(program, region, depth + 1, f)?;
        write!(f, "{indent}}}")?;
    }
    f.write_char('\n')
}

fn attributes(kind: &OpKind) -> String {
    match kind {
        OpKind::GetProgramId { axis } => format!("axis = {axis}"),
        OpKind::Constant { value, .. } => format!("value = {value}"),
        OpKind::MakeRange { start, end } => format!("start = {start}, end = {end}"),
        OpKind::ExpandDims { axis } | OpKind::Reduce { axis } => format!("axis = {axis}"),
        OpKind::Reshape { allow_reorder: true, .. } => "allow_reorder".to_string(),
        OpKind::Trans { order } => format!("order = [{}]", order.iter().join(", ")),
        OpKind::Extract { layout, .. } | OpKind::Insert { layout } => {
            format!("layout = [{}]", layout.iter().join(", "))
        }
        OpKind::Cmp(pred) => format!("predicate = {}", <&'static str>::from(*pred)),
        _ => String::new(),
    }
}
