//! Graph nodes and per-node tiling.

use smallvec::SmallVec;

use crate::shape::Dims;
use crate::{DType, OffsetMap, Opcode, Shape};

/// Position of a node inside its computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(derive_more::Display)]
#[display("%{_0}")]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Largest accepted tile size. Padded tiles index lanes with `i32` ranges.
pub const MAX_TILE_SIZE: i64 = 1 << 20;

/// Tiling of one node, as computed by the tiling analysis.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct TileSpec {
    /// Un-padded tile size per output dimension.
    pub tile_sizes: Dims,
    /// Element stride between consecutive tile elements per output dimension.
    pub tile_strides: Dims,
    pub offsets: OffsetMap,
    /// Scalar nodes (same computation) whose values feed the offset function's `rt` inputs.
    pub runtime_variables: SmallVec<[NodeId; 2]>,
}

impl TileSpec {
    /// Unit-strided tile with the given sizes and offsets.
    pub fn new(tile_sizes: impl IntoIterator<Item = i64>, offsets: OffsetMap) -> Self {
        let tile_sizes: Dims = tile_sizes.into_iter().collect();
        let tile_strides = smallvec::smallvec![1; tile_sizes.len()];
        Self { tile_sizes, tile_strides, offsets, runtime_variables: SmallVec::new() }
    }

    /// Unit-strided row-major grid tiling of `shape`.
    pub fn grid(shape: &Shape, tile_sizes: impl IntoIterator<Item = i64>) -> Self {
        let tile_sizes: Dims = tile_sizes.into_iter().collect();
        let offsets = OffsetMap::tile_grid(shape.dims(), &tile_sizes);
        Self::new(tile_sizes, offsets)
    }

    /// A single tile covering the whole shape.
    pub fn whole(shape: &Shape) -> Self {
        Self::new(shape.dims().iter().copied(), OffsetMap::zeros(shape.rank()))
    }

    pub fn with_strides(mut self, strides: impl IntoIterator<Item = i64>) -> Self {
        self.tile_strides = strides.into_iter().collect();
        self
    }

    pub fn with_runtime_variables(mut self, vars: impl IntoIterator<Item = NodeId>) -> Self {
        self.runtime_variables = vars.into_iter().collect();
        self
    }

    pub fn rank(&self) -> usize {
        self.tile_sizes.len()
    }
}

/// A tensor operation with its operands and tiling.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub name: String,
    pub opcode: Opcode,
    pub dtype: DType,
    pub shape: Shape,
    pub operands: SmallVec<[NodeId; 4]>,
    pub tile: TileSpec,
}

impl Node {
    /// Node tiled as a single whole-shape tile; refine with [`Node::tiled`].
    pub fn new(
        name: impl Into<String>,
        opcode: Opcode,
        dtype: DType,
        shape: Shape,
        operands: impl IntoIterator<Item = NodeId>,
    ) -> Self {
        let tile = TileSpec::whole(&shape);
        Self { name: name.into(), opcode, dtype, shape, operands: operands.into_iter().collect(), tile }
    }

    pub fn tiled(mut self, tile: TileSpec) -> Self {
        self.tile = tile;
        self
    }

    pub fn operand(&self, i: usize) -> NodeId {
        self.operands[i]
    }
}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use itertools::Itertools;
        write!(
            f,
            "{} = {}{} {}({})",
            self.name,
            self.dtype,
            self.shape,
            self.opcode.name(),
            self.operands.iter().join(", ")
        )
    }
}
