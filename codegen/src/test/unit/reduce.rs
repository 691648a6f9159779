//! Reductions and their tail masks.

use smallvec::smallvec;
use tilegen_dtype::{BinaryOp, ConstValue, DType};
use tilegen_graph::{ComputationId, GraphBuilder, Node, Opcode, Shape};

use crate::ErrorKind;
use crate::test::helpers::*;

fn reducer(g: &mut GraphBuilder, op: BinaryOp) -> ComputationId {
    let r = g.computation("reducer");
    let lhs = g.push(r, param("lhs", 0, DType::Float32, &[]));
    let rhs = g.push(r, param("rhs", 1, DType::Float32, &[]));
    let combined = g.push(r, binary("combined", op, DType::Float32, &[], lhs, rhs));
    g.set_roots(r, [combined]);
    r
}

fn row_reduce(cols: i64, op: BinaryOp, init: f64) -> tilegen_graph::FusionGraph {
    let mut g = GraphBuilder::new("row_reduce");
    let r = reducer(&mut g, op);
    let c = g.computation("entry");
    let p0 = g.push(c, param("p0", 0, DType::Float32, &[2, cols]));
    let init = g.push(c, scalar_const("init", ConstValue::Float(init), DType::Float32));
    let reduce = Node::new(
        "reduce",
        Opcode::Reduce { dimensions: smallvec![1], reducer: r },
        DType::Float32,
        Shape::new([2]),
        [p0, init],
    );
    let reduce = g.push(c, reduce);
    g.set_roots(c, [reduce]);
    g.finish(c).expect("valid graph")
}

/// Five columns are padded to eight; the three padding lanes must not reach the sum even though
/// the load fills them with garbage.
#[test]
fn test_reduce_masks_padded_tail() {
    let kernel = emit(&row_reduce(5, BinaryOp::Add, 0.0)).expect("emission failed");

    assert!(kernel.text.contains("arith.select"), "Missing tail mask:\n{}", kernel.text);
    assert!(kernel.text.contains("tt.make_range {start = 0, end = 8}"), "Unexpected padding:\n{}", kernel.text);

    let input = iota_tensor(&[2, 5]);
    let out = run_kernel(&kernel, 1, &[input], 1000.0);
    assert_eq!(out[0], tensor(&[2], vec![10.0, 35.0]));
}

#[test]
fn test_power_of_two_reduce_has_no_mask() {
    let kernel = emit(&row_reduce(8, BinaryOp::Max, f64::NEG_INFINITY)).expect("emission failed");

    assert!(!kernel.text.contains("arith.select"), "Unexpected mask:\n{}", kernel.text);
    let out = run_kernel(&kernel, 1, &[iota_tensor(&[2, 8])], 0.0);
    assert_eq!(out[0], tensor(&[2], vec![7.0, 15.0]));
}

#[test]
fn test_masked_max_ignores_fill() {
    let kernel = emit(&row_reduce(3, BinaryOp::Max, f64::NEG_INFINITY)).expect("emission failed");

    let input = tensor(&[2, 3], vec![-5.0, -2.0, -9.0, -1.0, -8.0, -3.0]);
    let out = run_kernel(&kernel, 1, &[input], 50.0);
    assert_eq!(out[0], tensor(&[2], vec![-2.0, -1.0]));
}

#[test]
fn test_multi_dimension_reduce_is_unsupported() {
    let mut g = GraphBuilder::new("full");
    let r = reducer(&mut g, BinaryOp::Add);
    let c = g.computation("entry");
    let p0 = g.push(c, param("p0", 0, DType::Float32, &[2, 4]));
    let init = g.push(c, scalar_const("init", ConstValue::Float(0.0), DType::Float32));
    let reduce = Node::new(
        "reduce",
        Opcode::Reduce { dimensions: smallvec![0, 1], reducer: r },
        DType::Float32,
        Shape::scalar(),
        [p0, init],
    );
    let reduce = g.push(c, reduce);
    g.set_roots(c, [reduce]);

    let err = emit(&g.finish(c).expect("valid graph")).expect_err("two reduction dimensions");
    assert_eq!(err.kind(), ErrorKind::Unsupported);
}

#[test]
fn test_partial_reduction_tile_is_rejected() {
    let mut g = GraphBuilder::new("partial");
    let r = reducer(&mut g, BinaryOp::Add);
    let c = g.computation("entry");
    let p0 = g.push(c, grid(param("p0", 0, DType::Float32, &[2, 16]), &[2, 8]));
    let init = g.push(c, scalar_const("init", ConstValue::Float(0.0), DType::Float32));
    let reduce = Node::new(
        "reduce",
        Opcode::Reduce { dimensions: smallvec![1], reducer: r },
        DType::Float32,
        Shape::new([2]),
        [p0, init],
    );
    let reduce = g.push(c, reduce);
    g.set_roots(c, [reduce]);

    let err = emit(&g.finish(c).expect("valid graph")).expect_err("reduction dimension is split");
    assert_eq!(err.kind(), ErrorKind::Precondition);
}
