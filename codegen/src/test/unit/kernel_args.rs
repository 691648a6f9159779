//! Kernel argument binding.

use tilegen_dtype::DType;

use crate::kernel_args::*;
use crate::test::helpers::*;
use crate::{BufferAlignment, ErrorKind};

fn buffer(slice: Slice) -> BufferArg {
    BufferArg { shape: vec![slice.size as i64 / 4], dtype: DType::Float32, slice }
}

fn allocations() -> Vec<Allocation> {
    vec![
        Allocation { index: 0, size: 256, kind: AllocationKind::EntryParameter },
        Allocation { index: 1, size: 64, kind: AllocationKind::Constant },
        Allocation { index: 2, size: 512, kind: AllocationKind::Temporary },
    ]
}

#[test]
fn test_alignment_follows_allocation_kind() {
    let operands = [buffer(Slice::new(0, 0, 64)), buffer(Slice::new(1, 0, 64))];
    let outputs = [buffer(Slice::new(2, 0, 64))];
    let args = KernelArguments::build(&allocations(), &operands, &outputs, BufferAlignment::default(), false)
        .expect("valid slices");

    let alignments: Vec<_> = args.args().iter().map(|a| a.alignment).collect();
    assert_eq!(alignments, vec![16, 128, 128]);
    let written: Vec<_> = args.args().iter().map(|a| a.written).collect();
    assert_eq!(written, vec![false, false, true]);
    assert!(args.args().iter().all(|a| !a.aliased));
}

#[test]
fn test_dedup_shares_argument_index() {
    let shared = Slice::new(2, 0, 64);
    let operands = [buffer(Slice::new(0, 0, 64)), buffer(shared)];
    let outputs = [buffer(shared)];

    let args = KernelArguments::build(&allocations(), &operands, &outputs, BufferAlignment::default(), true)
        .expect("valid slices");
    let indices: Vec<_> = args.args().iter().map(|a| a.arg_index).collect();
    assert_eq!(indices, vec![0, 1, 1]);
    assert_eq!(args.args()[2].first_with_same_slice, Some(1));
    assert_eq!(args.num_function_args(), 2);
    // The operand shares the output's slice, so it is written too.
    assert!(args.args()[1].written);

    let args = KernelArguments::build(&allocations(), &operands, &outputs, BufferAlignment::default(), false)
        .expect("valid slices");
    let indices: Vec<_> = args.args().iter().map(|a| a.arg_index).collect();
    assert_eq!(indices, vec![0, 1, 2]);
    assert_eq!(args.num_function_args(), 3);
}

#[test]
fn test_partial_overlap_with_written_slice_is_aliased() {
    let operands = [buffer(Slice::new(2, 32, 64))];
    let outputs = [buffer(Slice::new(2, 0, 64))];
    let args = KernelArguments::build(&allocations(), &operands, &outputs, BufferAlignment::default(), true)
        .expect("valid slices");

    assert!(!args.args()[0].aliased, "Read-only operands are never aliased");
    assert!(args.args()[1].aliased);
}

#[test]
fn test_disjoint_slices_do_not_alias() {
    let a = Slice::new(2, 0, 64);
    let b = Slice::new(2, 64, 64);
    assert!(!a.overlaps(&b));
    assert!(a.overlaps(&Slice::new(2, 63, 1)));
    assert!(!a.overlaps(&Slice::new(0, 0, 64)));
}

#[test]
fn test_slice_outside_allocation_is_rejected() {
    let outputs = [buffer(Slice::new(1, 32, 64))];
    let err = KernelArguments::build(&allocations(), &[], &outputs, BufferAlignment::default(), false)
        .expect_err("slice past the end");
    assert_eq!(err.kind(), ErrorKind::Precondition);
}

#[test]
fn test_arguments_of_emitted_kernel() {
    let mut g = tilegen_graph::GraphBuilder::new("neg");
    let c = g.computation("neg");
    let p0 = g.push(c, param("p0", 0, DType::Float32, &[8]));
    let neg = g.push(c, unary("neg", tilegen_dtype::UnaryOp::Neg, DType::Float32, &[8], p0));
    g.set_roots(c, [neg]);
    let kernel = emit(&g.finish(c).expect("valid graph")).expect("emission failed");

    let args = KernelArguments::for_kernel(&kernel, BufferAlignment::default()).expect("bound");
    assert_eq!(args.args().len(), 2);
    assert_eq!(args.args()[0].alignment, 16);
    assert_eq!(args.args()[1].alignment, 128);
    assert_eq!(args.args()[1].slice.size, 32);
    assert!(args.args()[1].written && !args.args()[0].written);
}
