use crate::{
    ComputationId, DType, DotSpec, ElementwiseOp, Error, GraphBuilder, Node, OffsetMap, Opcode, Shape, TileSpec,
};
use crate::{AffineExpr, BinaryOp, NodeId, UnaryOp};

fn param(name: &str, number: usize, dims: &[i64]) -> Node {
    Node::new(name, Opcode::Parameter { number }, DType::Float32, Shape::new(dims.iter().copied()), [])
}

#[test]
fn valid_elementwise_graph() {
    let mut g = GraphBuilder::new("add");
    let c = g.computation("fused_add");
    let p0 = g.push(c, param("p0", 0, &[8]));
    let p1 = g.push(c, param("p1", 1, &[8]));
    let add = g.push(
        c,
        Node::new("add", Opcode::Elementwise(ElementwiseOp::Binary(BinaryOp::Add)), DType::Float32, Shape::new([8]), [
            p0, p1,
        ]),
    );
    g.set_roots(c, [add]);
    let graph = g.finish(c).expect("valid graph");

    assert_eq!(graph.entry().num_parameters(), 2);
    assert_eq!(graph.entry().users(p0).collect::<Vec<_>>(), vec![add]);
    assert!(graph.to_string().contains("ROOT"));
}

#[test]
fn operands_must_precede_users() {
    let mut g = GraphBuilder::new("bad");
    let c = g.computation("c");
    let p0 = g.push(c, param("p0", 0, &[8]));
    let mut neg =
        Node::new("neg", Opcode::Elementwise(ElementwiseOp::Unary(UnaryOp::Neg)), DType::Float32, Shape::new([8]), [p0]);
    // Refers to itself, which is never topologically sorted.
    neg.operands[0] = NodeId(1);
    let neg = g.push(c, neg);
    g.set_roots(c, [neg]);

    assert!(matches!(g.finish(c), Err(Error::OperandOrder { .. })));
}

#[test]
fn nested_parameters_need_caller_operands() {
    let mut g = GraphBuilder::new("nested");
    let lhs = g.computation("lhs");
    let lp = g.push(lhs, param("lp", 3, &[16, 16]));
    g.set_roots(lhs, [lp]);
    let rhs = g.computation("rhs");
    let rp = g.push(rhs, param("rp", 1, &[16, 16]));
    g.set_roots(rhs, [rp]);

    let entry = g.computation("entry");
    let p0 = g.push(entry, param("p0", 0, &[16, 16]));
    let p1 = g.push(entry, param("p1", 1, &[16, 16]));
    let a = g.push(entry, Node::new("a", Opcode::Fusion { computation: lhs }, DType::Float32, Shape::new([16, 16]), [p0]));
    let b = g.push(entry, Node::new("b", Opcode::Fusion { computation: rhs }, DType::Float32, Shape::new([16, 16]), [p0, p1]));
    let dot = g.push(entry, Node::new("dot", Opcode::Dot(DotSpec::matmul(1, 0)), DType::Float32, Shape::new([16, 16]), [a, b]));
    g.set_roots(entry, [dot]);

    assert_eq!(g.finish(entry).unwrap_err(), Error::ParameterOutOfRange { computation: "lhs".into(), number: 3 });
}

#[test]
fn tiling_rank_must_match() {
    let mut g = GraphBuilder::new("rank");
    let c = g.computation("c");
    let p = g.push(c, param("p0", 0, &[8, 8]).tiled(TileSpec::new([4], OffsetMap::zeros(1))));
    g.set_roots(c, [p]);
    assert!(matches!(g.finish(c), Err(Error::InvalidNode { .. })));
}

#[test]
fn runtime_variables_must_match_offsets() {
    let mut g = GraphBuilder::new("rt");
    let c = g.computation("c");
    let offsets = OffsetMap::new([AffineExpr::rt(0)]).with_rt_vars([crate::RtVarBounds::new(0, 4)]);
    let p = g.push(c, param("p0", 0, &[8]).tiled(TileSpec::new([4], offsets)));
    g.set_roots(c, [p]);
    assert!(matches!(g.finish(c), Err(Error::RuntimeVariableMismatch { declared: 0, expected: 1, .. })));
}

#[test]
fn unknown_entry_is_rejected() {
    let g = GraphBuilder::new("empty");
    assert!(matches!(g.finish(ComputationId(0)), Err(Error::UnknownComputation { .. })));
}

#[test]
fn oversized_tiles_are_rejected() {
    let mut g = GraphBuilder::new("huge");
    let c = g.computation("c");
    let dims = [crate::MAX_TILE_SIZE * 4];
    let p = g.push(c, param("p0", 0, &dims).tiled(TileSpec::new([crate::MAX_TILE_SIZE + 1], OffsetMap::zeros(1))));
    g.set_roots(c, [p]);
    assert!(matches!(
        g.finish(c),
        Err(Error::TileTooLarge { size, limit, .. }) if size == crate::MAX_TILE_SIZE + 1 && limit == crate::MAX_TILE_SIZE
    ));
}
