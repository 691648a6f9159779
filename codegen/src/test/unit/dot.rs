//! Matrix multiplication loops.

use ndarray::Ix2;
use test_case::test_case;
use tilegen_dtype::DType;
use tilegen_graph::{AffineExpr, DotSpec, FusionGraph, GraphBuilder, Node, OffsetMap, Opcode, Shape, TileSpec};

use crate::lower::dot::default_accumulator;
use crate::test::helpers::*;
use crate::{EmitterConfig, ErrorKind, emit_fusion};

/// `[m, k] x [k, n]` with a single output tile and contracting tiles of `tile_k`.
fn matmul(m: i64, k: i64, n: i64, tile_k: i64, spec: DotSpec) -> FusionGraph {
    typed_matmul(m, k, n, tile_k, spec, DType::Float32)
}

fn typed_matmul(m: i64, k: i64, n: i64, tile_k: i64, spec: DotSpec, dtype: DType) -> FusionGraph {
    let mut g = GraphBuilder::new("matmul");

    let lhs = g.computation("lhs");
    let lhs_offsets = OffsetMap::new([AffineExpr::Const(0), AffineExpr::pid() * tile_k]);
    let lhs_root = g.push(lhs, param("lhs_p", 0, dtype, &[m, k]).tiled(TileSpec::new([m, tile_k], lhs_offsets)));
    g.set_roots(lhs, [lhs_root]);

    let rhs = g.computation("rhs");
    let rhs_offsets = OffsetMap::new([AffineExpr::pid() * tile_k, AffineExpr::Const(0)]);
    let rhs_root = g.push(rhs, param("rhs_p", 0, dtype, &[k, n]).tiled(TileSpec::new([tile_k, n], rhs_offsets)));
    g.set_roots(rhs, [rhs_root]);

    let entry = g.computation("entry");
    let p0 = g.push(entry, param("p0", 0, dtype, &[m, k]));
    let p1 = g.push(entry, param("p1", 1, dtype, &[k, n]));
    let a = g.push(entry, Node::new("a", Opcode::Fusion { computation: lhs }, dtype, Shape::new([m, k]), [p0]));
    let b = g.push(entry, Node::new("b", Opcode::Fusion { computation: rhs }, dtype, Shape::new([k, n]), [p1]));
    let dot = g.push(entry, Node::new("dot", Opcode::Dot(spec), dtype, Shape::new([m, n]), [a, b]));
    g.set_roots(entry, [dot]);
    g.finish(entry).expect("valid graph")
}

fn small_ints(shape: &[usize], modulus: usize) -> tilegen_ir::Tensor {
    let n = shape.iter().product::<usize>();
    tensor(shape, (0..n).map(|i| ((i * 7 + 3) % modulus) as f64 - 2.0).collect())
}

fn reference(lhs: &tilegen_ir::Tensor, rhs: &tilegen_ir::Tensor) -> tilegen_ir::Tensor {
    let lhs = lhs.clone().into_dimensionality::<Ix2>().expect("matrix");
    let rhs = rhs.clone().into_dimensionality::<Ix2>().expect("matrix");
    lhs.dot(&rhs).into_dyn()
}

/// K = 130 in tiles of 32: five iterations, the last one masking 30 lanes of each operand.
#[test]
fn test_dot_loop_count_and_tail_mask() {
    let kernel = emit(&matmul(16, 130, 16, 32, DotSpec::matmul(1, 0))).expect("emission failed");

    assert!(kernel.text.contains("scf.for"), "Missing loop:\n{}", kernel.text);
    assert!(kernel.text.contains("{value = 5} : () -> i64"), "Wrong trip count:\n{}", kernel.text);
    assert!(kernel.text.contains("tt.dot"), "Missing dot:\n{}", kernel.text);

    let lhs = small_ints(&[16, 130], 5);
    let rhs = small_ints(&[130, 16], 3);
    let out = run_kernel(&kernel, 1, &[lhs.clone(), rhs.clone()], 1.0e6);
    assert_eq!(out[0], reference(&lhs, &rhs));
}

#[test]
fn test_even_contracting_dimension_is_not_masked() {
    let kernel = emit(&matmul(16, 64, 16, 32, DotSpec::matmul(1, 0))).expect("emission failed");

    assert!(kernel.text.contains("{value = 2} : () -> i64"), "Wrong trip count:\n{}", kernel.text);
    assert!(!kernel.text.contains("arith.select"), "Unexpected mask:\n{}", kernel.text);

    let lhs = small_ints(&[16, 64], 4);
    let rhs = small_ints(&[64, 16], 5);
    let out = run_kernel(&kernel, 1, &[lhs.clone(), rhs.clone()], 0.0);
    assert_eq!(out[0], reference(&lhs, &rhs));
}

#[test]
fn test_non_power_of_two_contracting_tile_masks_padding() {
    let kernel = emit(&matmul(8, 48, 8, 24, DotSpec::matmul(1, 0))).expect("emission failed");

    let lhs = small_ints(&[8, 48], 5);
    let rhs = small_ints(&[48, 8], 3);
    let out = run_kernel(&kernel, 1, &[lhs.clone(), rhs.clone()], 0.0);
    assert_eq!(out[0], reference(&lhs, &rhs));
}

#[test]
fn test_accumulator_type_is_independent_of_output() {
    let spec = DotSpec::matmul(1, 0).with_accumulator(DType::Float64);
    let kernel = emit(&matmul(16, 32, 16, 32, spec)).expect("emission failed");

    assert!(kernel.text.contains("tensor<16x16xf64>"), "Missing f64 accumulator:\n{}", kernel.text);
    assert!(kernel.text.contains("arith.cast"), "Missing result cast:\n{}", kernel.text);
}

#[test_case(DType::BFloat16, DType::Float32, "bf16")]
#[test_case(DType::Float16, DType::Float32, "f16")]
#[test_case(DType::Int8, DType::Int32, "i8")]
#[test_case(DType::Float32, DType::Float32, "f32")]
fn test_default_accumulator_widens_narrow_outputs(output: DType, accumulator: DType, mnemonic: &str) {
    assert_eq!(default_accumulator(output), accumulator);

    let kernel = emit(&typed_matmul(16, 64, 16, 32, DotSpec::matmul(1, 0), output)).expect("emission failed");
    let carried = format!("tensor<16x16x{accumulator}>");
    assert!(kernel.text.contains(&carried), "Missing {carried} accumulator:\n{}", kernel.text);
    if output != accumulator {
        let narrowed = format!("-> tensor<16x16x{mnemonic}>");
        assert!(
            kernel.text.lines().any(|l| l.contains("arith.cast") && l.contains(&format!("({carried})")) && l.ends_with(&narrowed)),
            "Missing cast to {mnemonic}:\n{}",
            kernel.text
        );
    }
}

#[test]
fn test_dot_counts_against_shared_memory() {
    let graph = matmul(16, 128, 16, 32, DotSpec::matmul(1, 0));
    let kernel = emit(&graph).expect("emission failed");
    // Two 16x32 f32 operand tiles.
    assert_eq!(kernel.shared_memory_bytes, 2 * 16 * 32 * 4);

    let config = EmitterConfig::builder().shared_memory_bytes(4096).num_stages(2).build();
    let err = emit_fusion(&graph, &config).expect_err("8 KiB does not fit in 4 KiB");
    assert_eq!(err.kind(), ErrorKind::ResourceExhausted);
    assert!(err.to_string().contains("8192"), "Unexpected message: {err}");
}

#[test]
fn test_sparse_dot_is_unsupported() {
    let spec = DotSpec { sparse_operands: 1, ..DotSpec::matmul(1, 0) };
    let err = emit(&matmul(16, 32, 16, 32, spec)).expect_err("sparse dot");
    assert_eq!(err.kind(), ErrorKind::Unsupported);
}

#[test]
fn test_two_contracting_dimensions_are_unsupported() {
    let spec = DotSpec {
        lhs_contracting: smallvec::smallvec![0, 1],
        rhs_contracting: smallvec::smallvec![0, 1],
        ..Default::default()
    };
    let err = emit(&matmul(16, 32, 16, 32, spec)).expect_err("two contracting dimensions");
    assert_eq!(err.kind(), ErrorKind::Unsupported);
}

#[test]
fn test_dot_operands_must_be_fusions() {
    let mut g = GraphBuilder::new("plain");
    let c = g.computation("entry");
    let p0 = g.push(c, param("p0", 0, DType::Float32, &[16, 16]));
    let p1 = g.push(c, param("p1", 1, DType::Float32, &[16, 16]));
    let dot = Node::new("dot", Opcode::Dot(DotSpec::matmul(1, 0)), DType::Float32, Shape::new([16, 16]), [p0, p1]);
    let dot = g.push(c, dot);
    g.set_roots(c, [dot]);

    let err = emit(&g.finish(c).expect("valid graph")).expect_err("parameters as dot operands");
    assert_eq!(err.kind(), ErrorKind::Precondition);
}
