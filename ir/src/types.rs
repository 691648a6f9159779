//! Value types of the tile IR.
//!
//! A value is either a scalar or a statically shaped tensor. Tiles are never 0-D: a rank-0 tile is
//! represented by a scalar. Rank-0 tensors do appear, but only as function arguments holding a
//! single element.

use smallvec::SmallVec;
use tilegen_dtype::DType;

pub type Dims = SmallVec<[i64; 4]>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Scalar(DType),
    Tensor { shape: Dims, dtype: DType },
}

impl Type {
    /// Tensor type, including rank 0.
    pub fn tensor(shape: impl IntoIterator<Item = i64>, dtype: DType) -> Self {
        Self::Tensor { shape: shape.into_iter().collect(), dtype }
    }

    /// Type of a tile: a scalar when `shape` is empty, a tensor otherwise.
    pub fn tile(shape: &[i64], dtype: DType) -> Self {
        if shape.is_empty() { Self::Scalar(dtype) } else { Self::tensor(shape.iter().copied(), dtype) }
    }

    pub fn element(&self) -> DType {
        match self {
            Self::Scalar(d) | Self::Tensor { dtype: d, .. } => *d,
        }
    }

    /// Tensor dimensions; empty for scalars.
    pub fn shape(&self) -> &[i64] {
        match self {
            Self::Scalar(_) => &[],
            Self::Tensor { shape, .. } => shape,
        }
    }

    pub fn rank(&self) -> usize {
        self.shape().len()
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, Self::Scalar(_))
    }

    pub fn is_tensor(&self) -> bool {
        matches!(self, Self::Tensor { .. })
    }

    /// Same shape, different element type.
    pub fn with_element(&self, dtype: DType) -> Self {
        match self {
            Self::Scalar(_) => Self::Scalar(dtype),
            Self::Tensor { shape, .. } => Self::Tensor { shape: shape.clone(), dtype },
        }
    }

    pub fn num_elements(&self) -> i64 {
        self.shape().iter().product()
    }

    /// Storage size in bytes, after storage narrowing of the element type.
    pub fn bytes(&self) -> usize {
        self.num_elements() as usize * self.element().bytes()
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scalar(d) => write!(f, "{d}"),
            Self::Tensor { shape, dtype } => {
                f.write_str("tensor<")?;
                for d in shape {
                    write!(f, "{d}x")?;
                }
                write!(f, "{dtype}>")
            }
        }
    }
}

/// SSA value handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(derive_more::Display)]
#[display("%{_0}")]
pub struct Value(pub(crate) u32);

impl Value {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Operation handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpId(pub(crate) u32);

/// Region handle. Every region holds exactly one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionId(pub(crate) u32);

/// Where a value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueDef {
    BlockArg { region: RegionId, index: usize },
    OpResult { op: OpId, index: usize },
}
