//! Bitcasts between arbitrary power-of-two shapes and layouts.

use ndarray::{ArrayD, IxDyn};
use proptest::prelude::*;
use tilegen_dtype::DType;
use tilegen_graph::{GraphBuilder, Node, Opcode, Shape};
use tilegen_ir::Tensor;

use crate::bitcast::inverse_permutation;
use crate::test::helpers::*;

fn layout(rank: usize) -> impl Strategy<Value = Vec<usize>> {
    Just((0..rank).collect::<Vec<_>>()).prop_shuffle()
}

/// Input dims and layout, then output dims with the same element count and their layout.
fn bitcast_pair() -> impl Strategy<Value = (Vec<i64>, Vec<usize>, Vec<i64>, Vec<usize>)> {
    prop::collection::vec(0u32..3, 1..=3).prop_flat_map(|exponents| {
        let total: u32 = exponents.iter().sum();
        let dims: Vec<i64> = exponents.iter().map(|&e| 1i64 << e).collect();
        let rank = dims.len();
        (Just(dims), layout(rank), prop::collection::vec(0..=total, 0..=2)).prop_flat_map(
            move |(dims, input_layout, mut cuts)| {
                cuts.sort_unstable();
                let mut out_dims = Vec::with_capacity(cuts.len() + 1);
                let mut previous = 0;
                for &cut in cuts.iter().chain(std::iter::once(&total)) {
                    out_dims.push(1i64 << (cut - previous));
                    previous = cut;
                }
                let out_rank = out_dims.len();
                (Just(dims), Just(input_layout), Just(out_dims), layout(out_rank))
            },
        )
    })
}

/// Reinterpret `input` (logical, laid out as `from`) as `to` by walking memory in physical order.
fn physical_reshape(input: &Tensor, from: &Shape, to: &Shape) -> Tensor {
    let from_order: Vec<usize> = from.major_to_minor().collect();
    let to_order: Vec<usize> = to.major_to_minor().collect();
    let memory: Vec<f64> = input.view().permuted_axes(from_order).iter().copied().collect();
    let physical: Vec<usize> = to_order.iter().map(|&d| to.dim(d) as usize).collect();
    let output = ArrayD::from_shape_vec(IxDyn(&physical), memory).expect("same element count");
    output.permuted_axes(inverse_permutation(&to_order).to_vec()).as_standard_layout().into_owned()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn bitcast_preserves_physical_order((dims, input_layout, out_dims, out_layout) in bitcast_pair()) {
        let input_shape = Shape::with_layout(dims.clone(), input_layout);
        let output_shape = Shape::with_layout(out_dims, out_layout);

        let mut g = GraphBuilder::new("bitcast");
        let c = g.computation("bitcast");
        let p0 = g.push(c, Node::new("p0", Opcode::Parameter { number: 0 }, DType::Float32, input_shape.clone(), []));
        let there = g.push(c, Node::new("there", Opcode::Bitcast, DType::Float32, output_shape.clone(), [p0]));
        let back = g.push(c, Node::new("back", Opcode::Bitcast, DType::Float32, input_shape.clone(), [there]));
        g.set_roots(c, [there, back]);
        let kernel = emit(&g.finish(c).unwrap()).unwrap();

        let input = iota_tensor(&dims.iter().map(|&d| d as usize).collect::<Vec<_>>());
        let out = run_kernel(&kernel, 1, &[input.clone()], -1.0);
        prop_assert_eq!(&out[0], &physical_reshape(&input, &input_shape, &output_shape));
        prop_assert_eq!(&out[1], &input);
    }
}
