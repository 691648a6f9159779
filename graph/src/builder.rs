//! Incremental construction of [`FusionGraph`]s.

use crate::error::*;
use crate::{Computation, ComputationId, FusionGraph, Node, NodeId, NodeRef, Opcode};

/// Builds a fusion graph one computation and node at a time.
///
/// Nodes must be pushed in producer-before-consumer order. Callers of nested computations are
/// recorded automatically when a [`Opcode::Fusion`] node is pushed; [`GraphBuilder::finish`]
/// validates the result.
#[derive(Debug)]
pub struct GraphBuilder {
    name: String,
    computations: Vec<Computation>,
}

impl GraphBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), computations: Vec::new() }
    }

    pub fn computation(&mut self, name: impl Into<String>) -> ComputationId {
        self.computations.push(Computation {
            name: name.into(),
            nodes: Vec::new(),
            roots: Default::default(),
            caller: None,
        });
        ComputationId(self.computations.len() - 1)
    }

    pub fn push(&mut self, computation: ComputationId, node: Node) -> NodeId {
        let id = NodeId(self.computations[computation.0].nodes.len());
        if let Opcode::Fusion { computation: callee } = node.opcode
            && let Some(nested) = self.computations.get_mut(callee.0)
        {
            nested.caller = Some(NodeRef { computation, node: id });
        }
        self.computations[computation.0].nodes.push(node);
        id
    }

    pub fn set_roots(&mut self, computation: ComputationId, roots: impl IntoIterator<Item = NodeId>) {
        self.computations[computation.0].roots = roots.into_iter().collect();
    }

    /// Read access while building, e.g. to derive a node's tiling from an operand.
    pub fn node(&self, computation: ComputationId, id: NodeId) -> &Node {
        &self.computations[computation.0].nodes[id.0]
    }

    pub fn finish(self, entry: ComputationId) -> Result<FusionGraph> {
        snafu::ensure!(entry.0 < self.computations.len(), UnknownComputationSnafu { id: entry });
        let graph = FusionGraph { name: self.name, computations: self.computations, entry };
        graph.validate()?;
        Ok(graph)
    }
}
