//! End-to-end emission of simple fusions.

use tilegen_dtype::{BinaryOp, CmpPredicate, DType, UnaryOp};
use tilegen_graph::{ElementwiseOp, GraphBuilder, Node, Opcode, Shape};

use crate::test::helpers::*;
use crate::{EmitterConfig, EmitterState, ErrorKind, FusionEmitter};

fn add_graph(n: i64, tile: i64) -> tilegen_graph::FusionGraph {
    let mut g = GraphBuilder::new("add");
    let c = g.computation("fused_add");
    let p0 = g.push(c, grid(param("p0", 0, DType::Float32, &[n]), &[tile]));
    let p1 = g.push(c, grid(param("p1", 1, DType::Float32, &[n]), &[tile]));
    let add = g.push(c, grid(binary("add", BinaryOp::Add, DType::Float32, &[n], p0, p1), &[tile]));
    g.set_roots(c, [add]);
    g.finish(c).expect("valid graph")
}

#[test]
fn test_elementwise_add_over_grid() {
    let kernel = emit(&add_graph(40, 16)).expect("emission failed");

    let a = iota_tensor(&[40]);
    let b = a.mapv(|x| 100.0 - x);
    let out = run_kernel(&kernel, 3, &[a.clone(), b.clone()], -1.0);

    assert_eq!(out[0], &a + &b);
    assert!(kernel.text.contains("xtile.extract"), "Missing tile load:\n{}", kernel.text);
    assert!(kernel.text.contains("xtile.insert"), "Missing tile store:\n{}", kernel.text);
}

#[test]
fn test_emission_is_deterministic() {
    let first = emit(&add_graph(40, 16)).expect("emission failed");
    let second = emit(&add_graph(40, 16)).expect("emission failed");

    assert_eq!(first.text, second.text);
    assert_eq!(first.program, second.program);
}

#[test]
fn test_signature_lists_parameters_then_outputs() {
    let kernel = emit(&add_graph(40, 16)).expect("emission failed");

    let names: Vec<_> = kernel.args.iter().map(|a| (a.name.as_str(), a.is_output)).collect();
    assert_eq!(names, vec![("p0", false), ("p1", false), ("add", true)]);
    assert_eq!(kernel.inputs().count(), 2);
    assert_eq!(kernel.outputs().next().map(|a| a.shape.clone()), Some(vec![40]));
    assert!(kernel.text.starts_with("func.func @add("), "Unexpected header:\n{}", kernel.text);
}

#[test]
fn test_boolean_results_are_stored_as_bytes() {
    let mut g = GraphBuilder::new("less");
    let c = g.computation("less");
    let p0 = g.push(c, param("p0", 0, DType::Float32, &[8]));
    let p1 = g.push(c, param("p1", 1, DType::Float32, &[8]));
    let cmp = Node::new(
        "lt",
        Opcode::Elementwise(ElementwiseOp::Compare(CmpPredicate::Lt)),
        DType::Bool,
        Shape::new([8]),
        [p0, p1],
    );
    let lt = g.push(c, cmp);
    g.set_roots(c, [lt]);
    let kernel = emit(&g.finish(c).expect("valid graph")).expect("emission failed");

    assert_eq!(kernel.outputs().next().map(|a| a.dtype), Some(DType::Int8));

    let a = iota_tensor(&[8]);
    let b = tensor(&[8], vec![4.0; 8]);
    let out = run_kernel(&kernel, 1, &[a, b], 0.0);
    assert_eq!(out[0], tensor(&[8], vec![1.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0]));
}

#[test]
fn test_boolean_parameters_are_loaded_from_bytes() {
    let mut g = GraphBuilder::new("not");
    let c = g.computation("not");
    let p0 = g.push(c, param("p0", 0, DType::Bool, &[4]));
    let not = g.push(c, unary("not", UnaryOp::Not, DType::Bool, &[4], p0));
    g.set_roots(c, [not]);
    let kernel = emit(&g.finish(c).expect("valid graph")).expect("emission failed");

    assert_eq!(kernel.inputs().next().map(|a| a.dtype), Some(DType::Int8));
    assert!(kernel.text.contains("arith.cast"), "Missing storage conversion:\n{}", kernel.text);
}

#[test]
fn test_scalar_root_uses_tensor_insert() {
    let mut g = GraphBuilder::new("neg");
    let c = g.computation("neg");
    let p0 = g.push(c, param("p0", 0, DType::Float32, &[]));
    let neg = g.push(c, unary("neg", UnaryOp::Neg, DType::Float32, &[], p0));
    g.set_roots(c, [neg]);
    let kernel = emit(&g.finish(c).expect("valid graph")).expect("emission failed");

    assert!(kernel.text.contains("tensor.extract"), "Missing scalar load:\n{}", kernel.text);
    assert!(kernel.text.contains("tensor.insert"), "Missing scalar store:\n{}", kernel.text);
    let out = run_kernel(&kernel, 1, &[tensor(&[], vec![2.5])], 0.0);
    assert_eq!(out[0], tensor(&[], vec![-2.5]));
}

#[test]
fn test_multiple_roots_get_one_output_each() {
    let mut g = GraphBuilder::new("two");
    let c = g.computation("two");
    let p0 = g.push(c, param("p0", 0, DType::Float32, &[4]));
    let neg = g.push(c, unary("neg", UnaryOp::Neg, DType::Float32, &[4], p0));
    let abs = g.push(c, unary("abs", UnaryOp::Abs, DType::Float32, &[4], neg));
    g.set_roots(c, [neg, abs]);
    let kernel = emit(&g.finish(c).expect("valid graph")).expect("emission failed");

    let input = tensor(&[4], vec![1.0, -2.0, 3.0, -4.0]);
    let out = run_kernel(&kernel, 1, &[input.clone()], 0.0);
    assert_eq!(out[0], input.mapv(|x| -x));
    assert_eq!(out[1], input.mapv(f64::abs));
}

#[test]
fn test_kernel_name_override() {
    let config = EmitterConfig::builder().kernel_name("triton_add".to_string()).build();
    let kernel = crate::emit_fusion(&add_graph(16, 16), &config).expect("emission failed");

    assert_eq!(kernel.name, "triton_add");
    assert!(kernel.text.starts_with("func.func @triton_add("));
}

#[test]
fn test_state_advances_to_verified() {
    let graph = add_graph(32, 16);
    let mut emitter = FusionEmitter::new(&graph, EmitterConfig::default());
    assert_eq!(emitter.state(), EmitterState::Uninitialized);

    emitter.emit().expect("emission failed");
    assert_eq!(emitter.state(), EmitterState::Verified);

    let again = emitter.emit().expect_err("second emission must fail");
    assert_eq!(again.kind(), ErrorKind::Internal);
}

#[test]
fn test_entry_parameters_must_be_contiguous() {
    let mut g = GraphBuilder::new("gap");
    let c = g.computation("gap");
    let p0 = g.push(c, param("p0", 0, DType::Float32, &[4]));
    let p2 = g.push(c, param("p2", 2, DType::Float32, &[4]));
    let add = g.push(c, binary("add", BinaryOp::Add, DType::Float32, &[4], p0, p2));
    g.set_roots(c, [add]);

    let err = emit(&g.finish(c).expect("valid graph")).expect_err("gap in parameter numbers");
    assert_eq!(err.kind(), ErrorKind::Precondition);
}
