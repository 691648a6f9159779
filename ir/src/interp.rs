//! Reference interpreter for tile programs.
//!
//! Every value is held as an `ArrayD<f64>` (scalars as 0-D arrays) and rounded to its element type
//! after each operation, so integer wraparound and narrowing casts behave like the target. Function
//! arguments are whole tensors in logical (row-major) order; layouts only matter to real memory and
//! are ignored here.
//!
//! Out-of-bounds `xtile.extract` reads produce [`Interpreter::oob_fill`], and out-of-bounds
//! `xtile.insert` writes are dropped. Setting the fill to a value the program never produces makes
//! missing masks visible in test results.

use ndarray::{ArrayD, Axis, IxDyn, Zip};
use snafu::ensure;
use tracing::{debug, trace};

use crate::error::*;
use crate::op::{OpKind, Operation};
use crate::program::Program;
use crate::types::{RegionId, Type, Value};

pub type Tensor = ArrayD<f64>;

#[derive(Debug, Clone, Copy)]
pub struct Interpreter {
    oob_fill: f64,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self { oob_fill: 0.0 }
    }
}

fn fail<T>(reason: impl Into<String>) -> Result<T> {
    EvaluationSnafu { reason: reason.into() }.fail()
}

fn scalar(t: &Tensor) -> f64 {
    t.iter().next().copied().unwrap_or(f64::NAN)
}

fn shape_usize(shape: &[i64]) -> Vec<usize> {
    shape.iter().map(|&d| d as usize).collect()
}

struct Frame<'p> {
    program: &'p Program,
    pid: i64,
    values: Vec<Option<Tensor>>,
    oob_fill: f64,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_oob_fill(mut self, fill: f64) -> Self {
        self.oob_fill = fill;
        self
    }

    pub fn oob_fill(&self) -> f64 {
        self.oob_fill
    }

    /// Run one program instance and return the values passed to `func.return`.
    pub fn run(&self, program: &Program, pid: i64, args: &[Tensor]) -> Result<Vec<Tensor>> {
        ensure!(
            args.len() == program.signature.args.len(),
            EvaluationSnafu {
                reason: format!("expected {} arguments, got {}", program.signature.args.len(), args.len())
            }
        );
        let mut frame = Frame { program, pid, values: vec![None; program.num_values()], oob_fill: self.oob_fill };
        for ((&v, arg), ty) in program.args().iter().zip(args).zip(&program.signature.args) {
            let expected = shape_usize(ty.shape());
            if arg.shape() != expected.as_slice() {
                return fail(format!("argument {v} has shape {:?}, expected {expected:?}", arg.shape()));
            }
            frame.set(v, arg.mapv(|x| ty.element().wrap_f64(x)));
        }
        frame.run_block(program.body())
    }

    /// Run every program instance `0..grid` in order.
    ///
    /// The program's results must correspond one-to-one to the trailing `outputs` arguments; after
    /// each instance they replace the outputs passed to the next one.
    pub fn run_grid(&self, program: &Program, grid: i64, inputs: &[Tensor], outputs: Vec<Tensor>) -> Result<Vec<Tensor>> {
        ensure!(
            outputs.len() == program.signature.results.len(),
            EvaluationSnafu { reason: format!("{} outputs for {} results", outputs.len(), program.signature.results.len()) }
        );
        debug!(program = %program.name, grid, "interpreting grid");
        let mut outputs = outputs;
        for pid in 0..grid {
            let args: Vec<Tensor> = inputs.iter().chain(&outputs).cloned().collect();
            outputs = self.run(program, pid, &args)?;
        }
        Ok(outputs)
    }
}

impl Frame<'_> {
    fn set(&mut self, v: Value, t: Tensor) {
        self.values[v.index()] = Some(t);
    }

    fn get(&self, v: Value) -> Result<&Tensor> {
        match &self.values[v.index()] {
            Some(t) => Ok(t),
            None => fail(format!("{v} read before it was computed")),
        }
    }

    fn ty(&self, v: Value) -> &Type {
        self.program.ty(v)
    }

    /// Execute a block, returning its terminator's operands.
    fn run_block(&mut self, region: RegionId) -> Result<Vec<Tensor>> {
        let program = self.program;
        for &id in &program.block(region).ops {
            let op = program.op(id);
            if op.kind.is_terminator() {
                return op.operands.iter().map(|&v| self.get(v).cloned()).collect();
            }
            trace!(op = op.kind.mnemonic(), "eval");
            let results = self.eval(op)?;
            for (&v, t) in op.results.iter().zip(results) {
                self.set(v, t);
            }
        }
        fail("block has no terminator")
    }

    fn run_region(&mut self, region: RegionId, args: Vec<Tensor>) -> Result<Vec<Tensor>> {
        let block_args = self.program.block(region).args.clone();
        for (v, t) in block_args.into_iter().zip(args) {
            self.set(v, t);
        }
        self.run_block(region)
    }

    fn eval(&mut self, op: &Operation) -> Result<Vec<Tensor>> {
        let result_ty = op.results.first().map(|&v| self.ty(v).clone());
        let element = result_ty.as_ref().map(Type::element);
        let operand = |i: usize| self.get(op.operands[i]);

        let single = match &op.kind {
            OpKind::GetProgramId { .. } => ArrayD::from_elem(IxDyn(&[]), self.pid as f64),
            OpKind::Constant { value, ty } => {
                ArrayD::from_elem(IxDyn(&shape_usize(ty.shape())), ty.element().wrap_f64(value.as_f64()))
            }
            OpKind::MakeRange { start, end } => {
                ArrayD::from_shape_vec(IxDyn(&[(end - start) as usize]), (*start..*end).map(f64::from).collect())
                    .map_err(|e| Error::Evaluation { reason: e.to_string() })?
            }
            OpKind::Splat { shape } => ArrayD::from_elem(IxDyn(&shape_usize(shape)), scalar(operand(0)?)),
            OpKind::Broadcast { shape } => {
                let shape = shape_usize(shape);
                match operand(0)?.broadcast(IxDyn(&shape)) {
                    Some(view) => view.to_owned(),
                    None => return fail(format!("cannot broadcast to {shape:?}")),
                }
            }
            OpKind::ExpandDims { axis } => operand(0)?.clone().insert_axis(Axis(*axis)),
            OpKind::Reshape { shape, .. } => {
                let data: Vec<f64> = operand(0)?.iter().copied().collect();
                ArrayD::from_shape_vec(IxDyn(&shape_usize(shape)), data)
                    .map_err(|e| Error::Evaluation { reason: e.to_string() })?
            }
            OpKind::Trans { order } => {
                operand(0)?.clone().permuted_axes(IxDyn(order)).as_standard_layout().into_owned()
            }
            OpKind::Reduce { axis } => self.reduce(op, *axis)?,
            OpKind::For => return self.for_loop(op),
            OpKind::If { .. } => {
                let region = if scalar(operand(0)?) != 0.0 { op.regions[0] } else { op.regions[1] };
                return self.run_region(region, Vec::new());
            }
            OpKind::Extract { tile, .. } => self.extract(op, tile)?,
            OpKind::Insert { .. } => self.insert(op)?,
            OpKind::TensorExtract => ArrayD::from_elem(IxDyn(&[]), scalar(operand(0)?)),
            OpKind::TensorInsert => ArrayD::from_elem(IxDyn(&[]), scalar(operand(0)?)),
            OpKind::Unary(u) => {
                let dtype = self.ty(op.operands[0]).element();
                operand(0)?.mapv(|x| u.apply(dtype, x))
            }
            OpKind::Binary(b) => {
                let dtype = self.ty(op.operands[0]).element();
                Zip::from(operand(0)?).and(operand(1)?).map_collect(|&x, &y| b.apply(dtype, x, y))
            }
            OpKind::Cmp(pred) => {
                Zip::from(operand(0)?).and(operand(1)?).map_collect(|&x, &y| pred.apply(x, y) as u8 as f64)
            }
            OpKind::Select => Zip::from(operand(0)?)
                .and(operand(1)?)
                .and(operand(2)?)
                .map_collect(|&c, &t, &f| if c != 0.0 { t } else { f }),
            OpKind::Cast { to } => operand(0)?.mapv(|x| to.wrap_f64(x)),
            OpKind::Dot => {
                let as_matrix = |t: &Tensor| {
                    t.clone()
                        .into_dimensionality::<ndarray::Ix2>()
                        .map_err(|e| Error::Evaluation { reason: e.to_string() })
                };
                let (lhs, rhs, acc) = (as_matrix(operand(0)?)?, as_matrix(operand(1)?)?, as_matrix(operand(2)?)?);
                (acc + lhs.dot(&rhs)).into_dyn()
            }
            OpKind::Yield | OpKind::ReduceReturn | OpKind::Return => {
                return fail(format!("{} outside block end", op.kind.mnemonic()));
            }
        };

        let single = match element {
            Some(dtype) => single.mapv(|x| dtype.wrap_f64(x)),
            None => single,
        };
        Ok(vec![single])
    }

    fn reduce(&mut self, op: &Operation, axis: usize) -> Result<Tensor> {
        let input = self.get(op.operands[0])?.clone();
        let mut out_shape = input.shape().to_vec();
        out_shape.remove(axis);

        let mut data = Vec::with_capacity(out_shape.iter().product());
        for lane in input.lanes(Axis(axis)) {
            let mut lane = lane.iter().copied();
            let Some(mut acc) = lane.next() else {
                return fail("reduction over an empty axis");
            };
            for x in lane {
                let combined = self.run_region(
                    op.regions[0],
                    vec![ArrayD::from_elem(IxDyn(&[]), acc), ArrayD::from_elem(IxDyn(&[]), x)],
                )?;
                acc = combined.first().map(scalar).unwrap_or(f64::NAN);
            }
            data.push(acc);
        }
        ArrayD::from_shape_vec(IxDyn(&out_shape), data).map_err(|e| Error::Evaluation { reason: e.to_string() })
    }

    fn for_loop(&mut self, op: &Operation) -> Result<Vec<Tensor>> {
        let bound = |i: usize| self.get(op.operands[i]).map(|t| scalar(t) as i64);
        let (lower, upper, step) = (bound(0)?, bound(1)?, bound(2)?);
        ensure!(step > 0, EvaluationSnafu { reason: format!("non-positive loop step {step}") });

        let mut carried: Vec<Tensor> =
            op.operands[3..].iter().map(|&v| self.get(v).cloned()).collect::<Result<_>>()?;
        let mut iv = lower;
        while iv < upper {
            let mut args = vec![ArrayD::from_elem(IxDyn(&[]), iv as f64)];
            args.extend(carried);
            carried = self.run_region(op.regions[0], args)?;
            iv += step;
        }
        Ok(carried)
    }

    /// Offsets and strides for a memory op whose index operands start at `first`.
    fn indexing(&self, op: &Operation, first: usize, rank: usize) -> Result<(Vec<i64>, Vec<i64>)> {
        let read = |i: usize| self.get(op.operands[i]).map(|t| scalar(t) as i64);
        let offsets = (0..rank).map(|d| read(first + d)).collect::<Result<_>>()?;
        let strides = (0..rank).map(|d| read(first + rank + d)).collect::<Result<_>>()?;
        Ok((offsets, strides))
    }

    fn extract(&self, op: &Operation, tile: &[i64]) -> Result<Tensor> {
        let source = self.get(op.operands[0])?;
        let rank = source.ndim();
        let (offsets, strides) = self.indexing(op, 1, rank)?;
        let fill = self.oob_fill;
        Ok(ArrayD::from_shape_fn(IxDyn(&shape_usize(tile)), |idx| {
            let mut at = Vec::with_capacity(rank);
            for d in 0..rank {
                let i = offsets[d] + idx[d] as i64 * strides[d];
                if i < 0 || i >= source.shape()[d] as i64 {
                    return fill;
                }
                at.push(i as usize);
            }
            source[IxDyn(&at)]
        }))
    }

    fn insert(&self, op: &Operation) -> Result<Tensor> {
        let tile = self.get(op.operands[0])?;
        let mut dest = self.get(op.operands[1])?.clone();
        let rank = dest.ndim();
        let (offsets, strides) = self.indexing(op, 2, rank)?;
        'elements: for (idx, &x) in tile.indexed_iter() {
            let mut at = Vec::with_capacity(rank);
            for d in 0..rank {
                let i = offsets[d] + idx[d] as i64 * strides[d];
                if i < 0 || i >= dest.shape()[d] as i64 {
                    continue 'elements;
                }
                at.push(i as usize);
            }
            dest[IxDyn(&at)] = x;
        }
        Ok(dest)
    }
}
