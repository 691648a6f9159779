//! Top-level emission driver.
//!
//! [`FusionEmitter`] turns one tiled fusion graph into one verified tile program:
//!
//! 1. validate the graph and collect the entry parameters in order;
//! 2. build the function signature (parameters, then one output buffer per root, all in storage
//!    element types);
//! 3. derive the program index and lower the entry computation;
//! 4. store every root tile into its output buffer and return the updated buffers;
//! 5. verify the program and check its shared memory footprint.
//!
//! Every failure aborts the whole emission; nothing is returned for a partially lowered fusion.

use snafu::{ResultExt, ensure};
use tilegen_dtype::DType;
use tilegen_graph::{FusionGraph, Node, NodeId, Opcode};
use tilegen_ir::{Builder, Type, Value};
use tracing::{debug, info};

use crate::config::EmitterConfig;
use crate::error::*;
use crate::lower::{Emitter, Scope, runtime_values};
use crate::resources::estimate_shared_memory;
use crate::tile_info::TileInfo;
use crate::types::{EmittedKernel, KernelArg};

/// Progress of a [`FusionEmitter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[derive(strum::Display)]
pub enum EmitterState {
    Uninitialized,
    SignatureBuilt,
    Lowered,
    Verified,
}

pub struct FusionEmitter<'g> {
    graph: &'g FusionGraph,
    config: EmitterConfig,
    state: EmitterState,
}

impl<'g> FusionEmitter<'g> {
    pub fn new(graph: &'g FusionGraph, config: EmitterConfig) -> Self {
        Self { graph, config, state: EmitterState::Uninitialized }
    }

    pub fn state(&self) -> EmitterState {
        self.state
    }

    fn advance(&mut self, next: EmitterState) {
        debug!(fusion = %self.graph.name, from = %self.state, to = %next, "emitter state");
        self.state = next;
    }

    #[tracing::instrument(skip_all, fields(fusion = %self.graph.name))]
    pub fn emit(&mut self) -> Result<EmittedKernel> {
        ensure!(
            self.state == EmitterState::Uninitialized,
            InternalSnafu { reason: format!("emitter already ran (state {})", self.state) }
        );
        self.graph.validate().context(GraphSnafu)?;
        let graph = self.graph;
        let entry = graph.entry();
        let parameters = entry_parameters(graph)?;
        let roots: Vec<&Node> = entry.roots().iter().map(|&id| entry.node(id)).collect();

        let mut arg_types: Vec<Type> = parameters.iter().map(|&id| storage_tensor(entry.node(id))).collect();
        let output_types: Vec<Type> = roots.iter().map(|root| storage_tensor(root)).collect();
        arg_types.extend(output_types.iter().cloned());

        let name = self.config.kernel_name.clone().unwrap_or_else(|| graph.name.clone());
        let mut b = Builder::new(name.clone(), arg_types, output_types);
        self.advance(EmitterState::SignatureBuilt);

        let pid = b.program_id(0);
        let pid = b.cast(pid, DType::Int64);
        let pid = b.cast(pid, DType::Index);

        let (inputs, outputs) = b.args().split_at(parameters.len());
        let (inputs, outputs) = (inputs.to_vec(), outputs.to_vec());
        let emitter = Emitter::new(graph, inputs);
        let lowered = emitter.emit_computation(&mut b, Scope { computation: graph.entry_id(), pid, aliases: None })?;

        let mut stored: Vec<Value> = Vec::with_capacity(roots.len());
        for (i, (&root_id, root)) in entry.roots().iter().zip(&roots).enumerate() {
            let value = b.cast(lowered.roots[i], root.dtype.storage_type());
            let destination = outputs[i];
            let updated = if b.ty(value).is_scalar() {
                b.tensor_insert(value, destination).context(IrSnafu)?
            } else {
                let rt = runtime_values(entry, &lowered.cache, root)?;
                let tile = TileInfo::construct(&mut b, pid, &rt, root)?;
                b.insert(value, destination, &tile.offsets, &tile.strides, &tile.minor_to_major).context(IrSnafu)?
            };
            debug!(root = %root.name, id = %root_id, "stored root tile");
            stored.push(updated);
        }
        b.return_(&stored).context(IrSnafu)?;
        self.advance(EmitterState::Lowered);

        let program = b.finish();
        tilegen_ir::verify(&program).context(IrSnafu)?;
        self.advance(EmitterState::Verified);

        let shared_memory_bytes = estimate_shared_memory(&program, self.config.num_stages);
        ensure!(
            shared_memory_bytes <= self.config.shared_memory_bytes,
            ResourceExhaustedSnafu { required: shared_memory_bytes, limit: self.config.shared_memory_bytes }
        );

        let args = parameters
            .iter()
            .map(|&id| (entry.node(id), false))
            .chain(roots.iter().map(|&root| (root, true)))
            .enumerate()
            .map(|(index, (node, is_output))| KernelArg {
                index,
                name: node.name.clone(),
                dtype: node.dtype.storage_type(),
                shape: node.shape.dims().to_vec(),
                is_output,
            })
            .collect();

        let text = program.to_string();
        info!(kernel = %name, ops = program.ops().count(), shared_memory_bytes, "emitted kernel");
        Ok(EmittedKernel { name, program, text, args, shared_memory_bytes })
    }
}

/// Lower one tiled fusion into a verified tile program.
pub fn emit_fusion(graph: &FusionGraph, config: &EmitterConfig) -> Result<EmittedKernel> {
    FusionEmitter::new(graph, config.clone()).emit()
}

/// Entry parameters ordered by number; the numbers must be exactly `0..n`.
fn entry_parameters(graph: &FusionGraph) -> Result<Vec<NodeId>> {
    let mut numbered: Vec<(usize, NodeId)> = graph
        .entry()
        .nodes()
        .filter_map(|(id, node)| match node.opcode {
            Opcode::Parameter { number } => Some((number, id)),
            _ => None,
        })
        .collect();
    numbered.sort_by_key(|&(number, _)| number);

    for (expected, &(number, _)) in numbered.iter().enumerate() {
        ensure!(
            number == expected,
            PreconditionSnafu {
                reason: format!("entry parameters of {} are not numbered 0..{}", graph.name, numbered.len())
            }
        );
    }
    Ok(numbered.into_iter().map(|(_, id)| id).collect())
}

fn storage_tensor(node: &Node) -> Type {
    Type::tensor(node.shape.dims().iter().copied(), node.dtype.storage_type())
}
