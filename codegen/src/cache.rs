//! Emitted values of one lowering scope.

use std::collections::HashMap;

use snafu::OptionExt;
use tilegen_graph::{Node, NodeId};
use tilegen_ir::Value;

use crate::error::*;

/// Node to emitted value map. Each node is inserted at most once and entries are never replaced.
#[derive(Debug, Default)]
pub struct ValueCache {
    values: HashMap<NodeId, Value>,
}

impl ValueCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: NodeId, node: &Node, value: Value) -> Result<()> {
        if self.values.contains_key(&id) {
            return DuplicateValueSnafu { node: format!("{id} ({})", node.name) }.fail();
        }
        self.values.insert(id, value);
        Ok(())
    }

    pub fn get(&self, id: NodeId, node: &Node) -> Result<Value> {
        self.values.get(&id).copied().with_context(|| MissingValueSnafu { node: format!("{id} ({})", node.name) })
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.values.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
