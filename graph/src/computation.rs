//! Computations and the fusion graph.

use smallvec::SmallVec;
use snafu::{OptionExt, ensure};

use crate::error::*;
use crate::node::MAX_TILE_SIZE;
use crate::{Node, NodeId, Opcode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(derive_more::Display)]
#[display("@{_0}")]
pub struct ComputationId(pub(crate) usize);

impl ComputationId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// A node addressed across computations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeRef {
    pub computation: ComputationId,
    pub node: NodeId,
}

/// Topologically sorted nodes with declared roots.
#[derive(Debug, Clone, PartialEq)]
pub struct Computation {
    pub name: String,
    pub(crate) nodes: Vec<Node>,
    pub(crate) roots: SmallVec<[NodeId; 2]>,
    /// Fusion node calling this computation; `None` for the entry and for reducers.
    pub(crate) caller: Option<NodeRef>,
}

impl Computation {
    pub fn nodes(&self) -> impl ExactSizeIterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn caller(&self) -> Option<NodeRef> {
        self.caller
    }

    /// Parameter node with the given number.
    pub fn parameter(&self, number: usize) -> Option<NodeId> {
        self.nodes().find(|(_, n)| n.opcode == Opcode::Parameter { number }).map(|(id, _)| id)
    }

    pub fn num_parameters(&self) -> usize {
        self.nodes.iter().filter(|n| n.opcode.is_parameter()).count()
    }

    /// Nodes using `id` as an operand.
    pub fn users(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes().filter(move |(_, n)| n.operands.contains(&id)).map(|(u, _)| u)
    }
}

/// The whole tiled fusion: an entry computation plus nested and reducer computations.
#[derive(Debug, Clone, PartialEq)]
pub struct FusionGraph {
    pub name: String,
    pub(crate) computations: Vec<Computation>,
    pub(crate) entry: ComputationId,
}

impl FusionGraph {
    pub fn entry_id(&self) -> ComputationId {
        self.entry
    }

    pub fn entry(&self) -> &Computation {
        &self.computations[self.entry.0]
    }

    pub fn computation(&self, id: ComputationId) -> &Computation {
        &self.computations[id.0]
    }

    pub fn try_computation(&self, id: ComputationId) -> Result<&Computation> {
        self.computations.get(id.0).context(UnknownComputationSnafu { id })
    }

    pub fn computations(&self) -> impl Iterator<Item = (ComputationId, &Computation)> {
        self.computations.iter().enumerate().map(|(i, c)| (ComputationId(i), c))
    }

    pub fn node(&self, r: NodeRef) -> &Node {
        self.computation(r.computation).node(r.node)
    }

    /// Structural checks the emitter relies on.
    ///
    /// Producers precede consumers, every root exists, each nested fusion computation has exactly
    /// one caller whose operands cover its parameters, layouts are permutations, and every node's
    /// tiling is consistent with its rank.
    pub fn validate(&self) -> Result<()> {
        for (cid, comp) in self.computations() {
            ensure!(!comp.is_empty(), EmptyComputationSnafu { computation: comp.name.clone() });
            ensure!(!comp.roots.is_empty(), NoRootsSnafu { computation: comp.name.clone() });

            for (id, node) in comp.nodes() {
                for &operand in &node.operands {
                    ensure!(
                        operand < id,
                        OperandOrderSnafu { computation: comp.name.clone(), node: node.name.clone(), operand }
                    );
                }
                for &rt in &node.tile.runtime_variables {
                    ensure!(
                        rt < id,
                        OperandOrderSnafu { computation: comp.name.clone(), node: node.name.clone(), operand: rt }
                    );
                }
                self.validate_node(cid, node)?;
            }
            for root in &comp.roots {
                ensure!(
                    root.0 < comp.len(),
                    InvalidNodeSnafu { node: format!("{root}"), reason: format!("root outside {}", comp.name) }
                );
            }

            let callers = self.callers_of(cid);
            if let Some(caller) = comp.caller {
                ensure!(callers == 1, CallerCountSnafu { computation: comp.name.clone(), callers });
                let fusion = self.node(caller);
                for (_, node) in comp.nodes() {
                    if let Opcode::Parameter { number } = node.opcode {
                        ensure!(
                            number < fusion.operands.len(),
                            ParameterOutOfRangeSnafu { computation: comp.name.clone(), number }
                        );
                    }
                }
            } else if cid != self.entry {
                // Reducers are referenced by reductions, never by fusion nodes.
                ensure!(callers == 0, CallerCountSnafu { computation: comp.name.clone(), callers });
            }
        }
        Ok(())
    }

    fn validate_node(&self, cid: ComputationId, node: &Node) -> Result<()> {
        let invalid = |reason: String| InvalidNodeSnafu { node: node.name.clone(), reason }.fail();
        if !node.shape.has_valid_layout() {
            return invalid(format!("layout {:?} is not a permutation", node.shape.minor_to_major()));
        }
        if let Some(callee) = node.opcode.called_computation() {
            ensure!(callee.0 < self.computations.len() && callee != cid, UnknownComputationSnafu { id: callee });
        }
        let arity = match &node.opcode {
            Opcode::Parameter { .. } | Opcode::Constant { .. } | Opcode::Iota { .. } => Some(0),
            Opcode::Elementwise(op) => Some(op.arity()),
            Opcode::Broadcast { .. }
            | Opcode::Reshape
            | Opcode::Transpose { .. }
            | Opcode::Bitcast
            | Opcode::Slice { .. } => Some(1),
            Opcode::Reduce { .. } | Opcode::Pad { .. } | Opcode::Dot(_) => Some(2),
            Opcode::DynamicSlice { .. } => Some(1 + node.shape.rank()),
            Opcode::Concatenate { .. } | Opcode::Fusion { .. } => None,
        };
        if let Some(arity) = arity
            && arity != node.operands.len()
        {
            return invalid(format!("{} expects {arity} operands, got {}", node.opcode.name(), node.operands.len()));
        }
        let tile = &node.tile;
        if tile.rank() != node.shape.rank() {
            return invalid(format!("tile rank {} differs from shape rank {}", tile.rank(), node.shape.rank()));
        }
        if tile.tile_strides.len() != tile.rank() {
            return invalid(format!("{} tile sizes but {} strides", tile.rank(), tile.tile_strides.len()));
        }
        for &t in &tile.tile_sizes {
            ensure!(t > 0, NonPositiveSnafu { what: "tile size", value: t });
            ensure!(t <= MAX_TILE_SIZE, TileTooLargeSnafu { node: node.name.clone(), size: t, limit: MAX_TILE_SIZE });
        }
        ensure!(
            tile.offsets.rank() == tile.rank(),
            OffsetRankMismatchSnafu { node: node.name.clone(), expected: tile.rank(), actual: tile.offsets.rank() }
        );
        ensure!(
            tile.runtime_variables.len() == tile.offsets.rt_vars().len(),
            RuntimeVariableMismatchSnafu {
                node: node.name.clone(),
                declared: tile.runtime_variables.len(),
                expected: tile.offsets.rt_vars().len(),
            }
        );
        Ok(())
    }

    fn callers_of(&self, id: ComputationId) -> usize {
        self.computations
            .iter()
            .flat_map(|c| c.nodes.iter())
            .filter(|n| n.opcode == Opcode::Fusion { computation: id })
            .count()
    }
}

impl std::fmt::Display for FusionGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (cid, comp) in self.computations() {
            let marker = if cid == self.entry { "ENTRY " } else { "" };
            writeln!(f, "{marker}{} {{", comp.name)?;
            for (id, node) in comp.nodes() {
                let root = if comp.roots.contains(&id) { " ROOT" } else { "" };
                writeln!(f, "  {id}{root} {node} tile={:?} offsets={}", node.tile.tile_sizes.as_slice(), node.tile.offsets)?;
            }
            writeln!(f, "}}")?;
        }
        Ok(())
    }
}
