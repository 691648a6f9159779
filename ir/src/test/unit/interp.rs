//! Interpreter semantics.

use ndarray::{ArrayD, IxDyn, array};

use crate::{BinaryOp, Builder, ConstValue, DType, Interpreter, Program, Tensor, Type};

fn tensor(shape: &[usize], data: Vec<f64>) -> Tensor {
    ArrayD::from_shape_vec(IxDyn(shape), data).unwrap()
}

/// Copy kernel over a 1-D tensor of `n` elements in tiles of `tile`.
pub(crate) fn copy_kernel(n: i64, tile: i64) -> Program {
    let ty = Type::tensor([n], DType::Float32);
    let mut b = Builder::new("copy", vec![ty.clone(), ty.clone()], vec![ty]);
    let (src, dst) = (b.args()[0], b.args()[1]);
    let pid = b.program_id(0);
    let pid = b.cast(pid, DType::Index);
    let size = b.index_const(tile);
    let offset = b.mul(pid, size).unwrap();
    let one = b.index_const(1);
    let t = b.extract(src, &[offset], &[one], &[tile], &[0]).unwrap();
    let stored = b.insert(t, dst, &[offset], &[one], &[0]).unwrap();
    b.return_(&[stored]).unwrap();
    b.finish()
}

#[test]
fn grid_copy_drops_out_of_bounds_writes() {
    let program = copy_kernel(40, 16);
    let input = tensor(&[40], (0..40).map(f64::from).collect());
    let out = Interpreter::new()
        .with_oob_fill(-1.0)
        .run_grid(&program, 3, &[input.clone()], vec![ArrayD::zeros(IxDyn(&[40]))])
        .unwrap();
    assert_eq!(out[0], input);
}

#[test]
fn out_of_bounds_reads_use_fill() {
    let ty = Type::tensor([5], DType::Float32);
    let mut b = Builder::new("pad", vec![ty], vec![Type::tensor([8], DType::Float32)]);
    let src = b.args()[0];
    let (zero, one) = (b.index_const(0), b.index_const(1));
    let t = b.extract(src, &[zero], &[one], &[8], &[0]).unwrap();
    b.return_(&[t]).unwrap();

    let input = tensor(&[5], vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    let out = Interpreter::new().with_oob_fill(99.0).run(&b.finish(), 0, &[input]).unwrap();
    assert_eq!(out[0], tensor(&[8], vec![1.0, 2.0, 3.0, 4.0, 5.0, 99.0, 99.0, 99.0]));
}

#[test]
fn loop_carries_values() {
    let mut b = Builder::new("sum", vec![], vec![Type::Scalar(DType::Int64)]);
    let (lo, hi, step) = (b.i64_const(0), b.i64_const(5), b.i64_const(1));
    let init = b.i64_const(0);
    let lp = b.for_loop(lo, hi, step, &[init]).unwrap();
    {
        let mut body = b.enter(lp.body);
        let next = body.add(lp.carried[0], lp.induction_var).unwrap();
        body.yield_(&[next]).unwrap();
    }
    b.return_(&[lp.results[0]]).unwrap();

    let out = Interpreter::new().run(&b.finish(), 0, &[]).unwrap();
    assert_eq!(out[0].iter().next().copied(), Some(10.0));
}

#[test]
fn reduce_applies_combiner_per_lane() {
    let ty = Type::tensor([2, 3], DType::Float32);
    let mut b = Builder::new("rowmax", vec![ty.clone()], vec![Type::tensor([2], DType::Float32)]);
    let src = b.args()[0];
    let (zero, one) = (b.index_const(0), b.index_const(1));
    let t = b.extract(src, &[zero, zero], &[one, one], &[2, 3], &[1, 0]).unwrap();
    let red = b.reduce(t, 1).unwrap();
    {
        let mut body = b.enter(red.body);
        let m = body.binary(BinaryOp::Max, red.lhs, red.rhs).unwrap();
        body.reduce_return(m).unwrap();
    }
    b.return_(&[red.result]).unwrap();

    let input = tensor(&[2, 3], vec![1.0, 7.0, 3.0, -4.0, -2.0, -9.0]);
    let out = Interpreter::new().run(&b.finish(), 0, &[input]).unwrap();
    assert_eq!(out[0], tensor(&[2], vec![7.0, -2.0]));
}

#[test]
fn dot_accumulates() {
    let mut b = Builder::new("mm", vec![Type::tensor([2, 2], DType::Float32); 2], vec![Type::tensor([2, 2], DType::Float32)]);
    let (l, r) = (b.args()[0], b.args()[1]);
    let (zero, one) = (b.index_const(0), b.index_const(1));
    let lt = b.extract(l, &[zero, zero], &[one, one], &[2, 2], &[1, 0]).unwrap();
    let rt = b.extract(r, &[zero, zero], &[one, one], &[2, 2], &[1, 0]).unwrap();
    let acc = b.constant_tile(ConstValue::Float(1.0), DType::Float32, &[2, 2]);
    let d = b.dot(lt, rt, acc).unwrap();
    b.return_(&[d]).unwrap();

    let lhs = array![[1.0, 2.0], [3.0, 4.0]].into_dyn();
    let rhs = array![[5.0, 6.0], [7.0, 8.0]].into_dyn();
    let out = Interpreter::new().run(&b.finish(), 0, &[lhs, rhs]).unwrap();
    assert_eq!(out[0], array![[20.0, 23.0], [44.0, 51.0]].into_dyn());
}

#[test]
fn casts_wrap_to_target_width() {
    let mut b = Builder::new("narrow", vec![], vec![Type::Scalar(DType::Int8), Type::Scalar(DType::Bool)]);
    let x = b.i32_const(300);
    let narrowed = b.cast(x, DType::Int8);
    let flag = b.cast(x, DType::Bool);
    b.return_(&[narrowed, flag]).unwrap();

    let out = Interpreter::new().run(&b.finish(), 0, &[]).unwrap();
    assert_eq!(out[0].iter().next().copied(), Some(44.0));
    assert_eq!(out[1].iter().next().copied(), Some(1.0));
}

#[test]
fn trans_and_reshape_follow_row_major_order() {
    let mut b = Builder::new("perm", vec![Type::tensor([2, 3], DType::Int32)], vec![Type::tensor([6], DType::Int32)]);
    let src = b.args()[0];
    let (zero, one) = (b.index_const(0), b.index_const(1));
    let t = b.extract(src, &[zero, zero], &[one, one], &[2, 3], &[1, 0]).unwrap();
    let t = b.trans(t, &[1, 0]).unwrap();
    let flat = b.reshape(t, &[6], false).unwrap();
    b.return_(&[flat]).unwrap();

    let input = tensor(&[2, 3], vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
    let out = Interpreter::new().run(&b.finish(), 0, &[input]).unwrap();
    assert_eq!(out[0], tensor(&[6], vec![0.0, 3.0, 1.0, 4.0, 2.0, 5.0]));
}

#[test]
fn argument_shapes_are_checked() {
    let program = copy_kernel(8, 8);
    let bad = tensor(&[4], vec![0.0; 4]);
    assert!(Interpreter::new().run(&program, 0, &[bad.clone(), bad]).is_err());
}
