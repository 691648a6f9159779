//! Static resource estimates for emitted programs.

use tilegen_ir::{OpKind, Program};

/// Shared memory needed by the program's dot operations.
///
/// Each dot stages its two operand tiles in shared memory once per pipeline stage; dots do not
/// overlap, so the largest one decides.
pub fn estimate_shared_memory(program: &Program, num_stages: usize) -> usize {
    let mut largest = 0;
    program.walk(program.body(), &mut |_, op| {
        if matches!(op.kind, OpKind::Dot) {
            let operands: usize = op.operands[..2].iter().map(|&v| program.ty(v).bytes()).sum();
            largest = largest.max(operands);
        }
    });
    largest * num_stages.max(1)
}
