//! The emitted function.

use crate::op::{Block, Operation};
use crate::types::{OpId, RegionId, Type, Value, ValueDef};

/// Function signature: tensor arguments (inputs then outputs) and result types.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    pub args: Vec<Type>,
    pub results: Vec<Type>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ValueInfo {
    pub ty: Type,
    pub def: ValueDef,
}

/// A single tile-level function with arena-allocated values, operations, and regions.
///
/// Programs compare structurally: two programs built by the same sequence of builder calls are
/// equal.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub name: String,
    pub signature: Signature,
    pub(crate) values: Vec<ValueInfo>,
    pub(crate) ops: Vec<Operation>,
    pub(crate) regions: Vec<Block>,
    pub(crate) body: RegionId,
}

impl Program {
    pub fn body(&self) -> RegionId {
        self.body
    }

    pub fn args(&self) -> &[Value] {
        &self.regions[self.body.0 as usize].args
    }

    pub fn ty(&self, value: Value) -> &Type {
        &self.values[value.index()].ty
    }

    pub fn def(&self, value: Value) -> ValueDef {
        self.values[value.index()].def
    }

    pub fn op(&self, id: OpId) -> &Operation {
        &self.ops[id.0 as usize]
    }

    pub fn block(&self, region: RegionId) -> &Block {
        &self.regions[region.0 as usize]
    }

    pub fn num_values(&self) -> usize {
        self.values.len()
    }

    /// All operations in creation order.
    pub fn ops(&self) -> impl Iterator<Item = (OpId, &Operation)> {
        self.ops.iter().enumerate().map(|(i, op)| (OpId(i as u32), op))
    }

    /// Operations of `region` and all nested regions, in program order.
    pub fn walk(&self, region: RegionId, f: &mut impl FnMut(OpId, &Operation)) {
        for &id in &self.block(region).ops {
            let op = self.op(id);
            f(id, op);
            for &nested in &op.regions {
                self.walk(nested, f);
            }
        }
    }
}
