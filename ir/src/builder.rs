//! Append-only program construction.
//!
//! The insertion point is never moved directly. [`Builder::enter`] returns an [`InsertionGuard`]
//! that appends into the given region and puts the previous insertion point back when dropped,
//! so early returns through `?` cannot leave the builder pointing into a closed region.

use std::ops::{Deref, DerefMut};

use smallvec::SmallVec;
use snafu::ensure;
use tilegen_dtype::{BinaryOp, CmpPredicate, ConstValue, DType, UnaryOp};

use crate::error::*;
use crate::infer::infer_result_types;
use crate::op::{Block, OpKind, Operation};
use crate::program::{Program, Signature, ValueInfo};
use crate::types::{OpId, RegionId, Type, Value, ValueDef};

#[derive(Debug)]
pub struct Builder {
    program: Program,
    insertion: RegionId,
}

/// Scoped insertion point; see [`Builder::enter`].
pub struct InsertionGuard<'b> {
    builder: &'b mut Builder,
    saved: RegionId,
}

impl Deref for InsertionGuard<'_> {
    type Target = Builder;

    fn deref(&self) -> &Builder {
        self.builder
    }
}

impl DerefMut for InsertionGuard<'_> {
    fn deref_mut(&mut self) -> &mut Builder {
        self.builder
    }
}

impl Drop for InsertionGuard<'_> {
    fn drop(&mut self) {
        self.builder.insertion = self.saved;
    }
}

/// Handles of a freshly created `scf.for`.
#[derive(Debug, Clone)]
pub struct ForLoop {
    pub op: OpId,
    pub body: RegionId,
    pub induction_var: Value,
    pub carried: SmallVec<[Value; 1]>,
    pub results: SmallVec<[Value; 1]>,
}

/// Handles of a freshly created `scf.if`.
#[derive(Debug, Clone)]
pub struct IfElse {
    pub op: OpId,
    pub then_region: RegionId,
    pub else_region: RegionId,
    pub results: SmallVec<[Value; 1]>,
}

/// Handles of a freshly created `tt.reduce`.
#[derive(Debug, Clone)]
pub struct Reduction {
    pub op: OpId,
    pub body: RegionId,
    pub lhs: Value,
    pub rhs: Value,
    pub result: Value,
}

impl Builder {
    /// Start a function whose body block takes one argument per `args` entry.
    pub fn new(name: impl Into<String>, args: Vec<Type>, results: Vec<Type>) -> Self {
        let mut program = Program {
            name: name.into(),
            signature: Signature { args: args.clone(), results },
            values: Vec::new(),
            ops: Vec::new(),
            regions: Vec::new(),
            body: RegionId(0),
        };
        let body = Self::alloc_region(&mut program, None, &args);
        program.body = body;
        Self { program, insertion: body }
    }

    pub fn finish(self) -> Program {
        self.program
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn args(&self) -> &[Value] {
        self.program.args()
    }

    pub fn ty(&self, value: Value) -> &Type {
        self.program.ty(value)
    }

    pub fn insertion_point(&self) -> RegionId {
        self.insertion
    }

    /// Append into `region` until the returned guard is dropped.
    pub fn enter(&mut self, region: RegionId) -> InsertionGuard<'_> {
        let saved = std::mem::replace(&mut self.insertion, region);
        InsertionGuard { builder: self, saved }
    }

    fn alloc_value(program: &mut Program, ty: Type, def: ValueDef) -> Value {
        program.values.push(ValueInfo { ty, def });
        Value((program.values.len() - 1) as u32)
    }

    fn alloc_region(program: &mut Program, owner: Option<OpId>, arg_types: &[Type]) -> RegionId {
        let region = RegionId(program.regions.len() as u32);
        program.regions.push(Block { args: SmallVec::new(), ops: Vec::new(), owner });
        for (index, ty) in arg_types.iter().enumerate() {
            let v = Self::alloc_value(program, ty.clone(), ValueDef::BlockArg { region, index });
            program.regions[region.0 as usize].args.push(v);
        }
        region
    }

    /// Append an operation at the insertion point, inferring its result types.
    pub fn create(&mut self, kind: OpKind, operands: &[Value]) -> Result<OpId> {
        let operand_types: SmallVec<[Type; 4]> = operands.iter().map(|&v| self.ty(v).clone()).collect();
        let result_types = infer_result_types(&kind, &operand_types)?;

        let id = OpId(self.program.ops.len() as u32);
        let results = result_types
            .into_iter()
            .enumerate()
            .map(|(index, ty)| Self::alloc_value(&mut self.program, ty, ValueDef::OpResult { op: id, index }))
            .collect();
        self.program.ops.push(Operation {
            kind,
            operands: operands.iter().copied().collect(),
            results,
            regions: SmallVec::new(),
            parent: self.insertion,
        });
        self.program.regions[self.insertion.0 as usize].ops.push(id);
        Ok(id)
    }

    fn create_one(&mut self, kind: OpKind, operands: &[Value]) -> Result<Value> {
        let id = self.create(kind, operands)?;
        Ok(self.program.op(id).results[0])
    }

    fn attach_region(&mut self, op: OpId, arg_types: &[Type]) -> RegionId {
        let region = Self::alloc_region(&mut self.program, Some(op), arg_types);
        self.program.ops[op.0 as usize].regions.push(region);
        region
    }

    // =========================================================================
    // Constants and index arithmetic
    // =========================================================================

    pub fn program_id(&mut self, axis: u8) -> Value {
        self.infallible(OpKind::GetProgramId { axis }, &[])
    }

    /// Scalar constant of `dtype`.
    pub fn constant(&mut self, value: ConstValue, dtype: DType) -> Value {
        let value = value.cast(dtype);
        self.infallible(OpKind::Constant { value, ty: Type::Scalar(dtype) }, &[])
    }

    /// Constant of `dtype` splatted to `shape`, or a scalar if `shape` is empty.
    pub fn constant_tile(&mut self, value: ConstValue, dtype: DType, shape: &[i64]) -> Value {
        let value = value.cast(dtype);
        self.infallible(OpKind::Constant { value, ty: Type::tile(shape, dtype) }, &[])
    }

    pub fn index_const(&mut self, v: i64) -> Value {
        self.constant(ConstValue::Int(v), DType::Index)
    }

    pub fn i32_const(&mut self, v: i64) -> Value {
        self.constant(ConstValue::Int(v), DType::Int32)
    }

    pub fn i64_const(&mut self, v: i64) -> Value {
        self.constant(ConstValue::Int(v), DType::Int64)
    }

    fn infallible(&mut self, kind: OpKind, operands: &[Value]) -> Value {
        // Only used for kinds whose inference cannot fail on these operands.
        match self.create_one(kind, operands) {
            Ok(v) => v,
            Err(e) => unreachable!("infallible op rejected: {e}"),
        }
    }

    // =========================================================================
    // Elementwise
    // =========================================================================

    pub fn unary(&mut self, op: UnaryOp, x: Value) -> Result<Value> {
        self.create_one(OpKind::Unary(op), &[x])
    }

    pub fn binary(&mut self, op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value> {
        self.create_one(OpKind::Binary(op), &[lhs, rhs])
    }

    pub fn add(&mut self, lhs: Value, rhs: Value) -> Result<Value> {
        self.binary(BinaryOp::Add, lhs, rhs)
    }

    pub fn mul(&mut self, lhs: Value, rhs: Value) -> Result<Value> {
        self.binary(BinaryOp::Mul, lhs, rhs)
    }

    pub fn sub(&mut self, lhs: Value, rhs: Value) -> Result<Value> {
        self.binary(BinaryOp::Sub, lhs, rhs)
    }

    pub fn cmp(&mut self, pred: CmpPredicate, lhs: Value, rhs: Value) -> Result<Value> {
        self.create_one(OpKind::Cmp(pred), &[lhs, rhs])
    }

    pub fn select(&mut self, cond: Value, on_true: Value, on_false: Value) -> Result<Value> {
        self.create_one(OpKind::Select, &[cond, on_true, on_false])
    }

    /// Convert to `to`; a no-op when the element type already matches.
    pub fn cast(&mut self, x: Value, to: DType) -> Value {
        if self.ty(x).element() == to {
            return x;
        }
        self.infallible(OpKind::Cast { to }, &[x])
    }

    // =========================================================================
    // Shape manipulation
    // =========================================================================

    /// `tensor<(end - start) x i32>` holding `start..end`.
    pub fn make_range(&mut self, start: i32, end: i32) -> Result<Value> {
        self.create_one(OpKind::MakeRange { start, end }, &[])
    }

    /// Splat a scalar to `shape`; scalars pass through unchanged when `shape` is empty.
    pub fn splat(&mut self, x: Value, shape: &[i64]) -> Result<Value> {
        if shape.is_empty() && self.ty(x).is_scalar() {
            return Ok(x);
        }
        self.create_one(OpKind::Splat { shape: shape.iter().copied().collect() }, &[x])
    }

    pub fn broadcast(&mut self, x: Value, shape: &[i64]) -> Result<Value> {
        if self.ty(x).shape() == shape {
            return Ok(x);
        }
        self.create_one(OpKind::Broadcast { shape: shape.iter().copied().collect() }, &[x])
    }

    pub fn expand_dims(&mut self, x: Value, axis: usize) -> Result<Value> {
        self.create_one(OpKind::ExpandDims { axis }, &[x])
    }

    pub fn reshape(&mut self, x: Value, shape: &[i64], allow_reorder: bool) -> Result<Value> {
        self.create_one(OpKind::Reshape { shape: shape.iter().copied().collect(), allow_reorder }, &[x])
    }

    pub fn trans(&mut self, x: Value, order: &[usize]) -> Result<Value> {
        self.create_one(OpKind::Trans { order: order.iter().copied().collect() }, &[x])
    }

    // =========================================================================
    // Memory
    // =========================================================================

    pub fn extract(
        &mut self,
        source: Value,
        offsets: &[Value],
        strides: &[Value],
        tile: &[i64],
        layout: &[usize],
    ) -> Result<Value> {
        let operands: SmallVec<[Value; 8]> =
            std::iter::once(source).chain(offsets.iter().copied()).chain(strides.iter().copied()).collect();
        let kind = OpKind::Extract { tile: tile.iter().copied().collect(), layout: layout.iter().copied().collect() };
        self.create_one(kind, &operands)
    }

    pub fn insert(
        &mut self,
        tile: Value,
        dest: Value,
        offsets: &[Value],
        strides: &[Value],
        layout: &[usize],
    ) -> Result<Value> {
        let operands: SmallVec<[Value; 8]> =
            [tile, dest].into_iter().chain(offsets.iter().copied()).chain(strides.iter().copied()).collect();
        self.create_one(OpKind::Insert { layout: layout.iter().copied().collect() }, &operands)
    }

    pub fn tensor_extract(&mut self, source: Value) -> Result<Value> {
        self.create_one(OpKind::TensorExtract, &[source])
    }

    pub fn tensor_insert(&mut self, scalar: Value, dest: Value) -> Result<Value> {
        self.create_one(OpKind::TensorInsert, &[scalar, dest])
    }

    pub fn dot(&mut self, lhs: Value, rhs: Value, acc: Value) -> Result<Value> {
        self.create_one(OpKind::Dot, &[lhs, rhs, acc])
    }

    // =========================================================================
    // Structured control flow
    // =========================================================================

    /// `scf.for` over `[lower, upper)` carrying `inits`. The body is empty; fill it through
    /// [`Builder::enter`] and close it with [`Builder::yield_`].
    pub fn for_loop(&mut self, lower: Value, upper: Value, step: Value, inits: &[Value]) -> Result<ForLoop> {
        let operands: SmallVec<[Value; 4]> = [lower, upper, step].into_iter().chain(inits.iter().copied()).collect();
        let op = self.create(OpKind::For, &operands)?;
        let mut arg_types = vec![Type::Scalar(DType::Int64)];
        arg_types.extend(inits.iter().map(|&v| self.ty(v).clone()));
        let body = self.attach_region(op, &arg_types);
        let args = &self.program.block(body).args;
        Ok(ForLoop {
            op,
            body,
            induction_var: args[0],
            carried: args[1..].iter().copied().collect(),
            results: self.program.op(op).results.clone(),
        })
    }

    /// `scf.if` producing `results`; both regions start empty.
    pub fn if_else(&mut self, cond: Value, results: &[Type]) -> Result<IfElse> {
        let op = self.create(OpKind::If { results: results.iter().cloned().collect() }, &[cond])?;
        let then_region = self.attach_region(op, &[]);
        let else_region = self.attach_region(op, &[]);
        Ok(IfElse { op, then_region, else_region, results: self.program.op(op).results.clone() })
    }

    /// `tt.reduce` of `input` along `axis`. The combiner region takes two element scalars and must
    /// end with [`Builder::reduce_return`].
    pub fn reduce(&mut self, input: Value, axis: usize) -> Result<Reduction> {
        let op = self.create(OpKind::Reduce { axis }, &[input])?;
        let element = Type::Scalar(self.ty(input).element());
        let body = self.attach_region(op, &[element.clone(), element]);
        let args = &self.program.block(body).args;
        Ok(Reduction { op, body, lhs: args[0], rhs: args[1], result: self.program.op(op).results[0] })
    }

    pub fn yield_(&mut self, values: &[Value]) -> Result<()> {
        self.terminate(OpKind::Yield, values)
    }

    pub fn reduce_return(&mut self, value: Value) -> Result<()> {
        self.terminate(OpKind::ReduceReturn, &[value])
    }

    pub fn return_(&mut self, values: &[Value]) -> Result<()> {
        self.terminate(OpKind::Return, values)
    }

    fn terminate(&mut self, kind: OpKind, values: &[Value]) -> Result<()> {
        let block = self.program.block(self.insertion);
        if let Some(&last) = block.ops.last() {
            let previous = &self.program.op(last).kind;
            ensure!(!previous.is_terminator(), MisplacedTerminatorSnafu { op: previous.mnemonic() });
        }
        self.create(kind, values)?;
        Ok(())
    }
}

impl From<Builder> for Program {
    fn from(builder: Builder) -> Self {
        builder.finish()
    }
}
