//! Element types for tiled tensor programs.
//!
//! A [`DType`] is the logical element type of a graph node or of a tile-level value. Some logical
//! types cannot be addressed in memory directly (a 1-bit predicate, a 4-bit integer); for those the
//! storage narrowing table in [`DType::storage_type`] names the cell type used by loads and stores.

pub mod cast;
pub mod ops;
pub mod value;


pub use ops::{BinaryOp, CmpPredicate, UnaryOp};
pub use value::ConstValue;

/// Logical element type.
#[derive(Debug, Hash, PartialOrd, Ord)]
#[derive(strum::EnumCount, strum::EnumIter, strum::VariantArray, strum::FromRepr)]
#[derive(enumset::EnumSetType)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[enumset(repr = "u32")]
pub enum DType {
    /// 1-bit predicate, stored as `Int8`.
    Bool = 0,

    /// 4-bit signed integer, stored as `Int8`.
    Int4 = 1,
    Int8 = 2,
    Int16 = 3,
    Int32 = 4,
    Int64 = 5,

    UInt8 = 6,
    UInt16 = 7,
    UInt32 = 8,
    UInt64 = 9,

    Float16 = 10,
    BFloat16 = 11,
    Float32 = 12,
    Float64 = 13,

    /// Target index type for offsets, strides and loop bounds.
    Index = 14,
}

impl DType {
    // =========================================================================
    // Type Properties
    // =========================================================================

    /// Width of a logical element in bits.
    pub const fn bits(&self) -> usize {
        match self {
            Self::Bool => 1,
            Self::Int4 => 4,
            Self::Int8 | Self::UInt8 => 8,
            Self::Int16 | Self::UInt16 | Self::Float16 | Self::BFloat16 => 16,
            Self::Int32 | Self::UInt32 | Self::Float32 => 32,
            Self::Int64 | Self::UInt64 | Self::Float64 => 64,
            Self::Index => 64, // Treat as 64-bit index
        }
    }

    /// Bytes occupied by one element in memory, after storage narrowing.
    pub const fn bytes(&self) -> usize {
        self.storage_type().bits() / 8
    }

    pub const fn is_bool(&self) -> bool {
        matches!(self, Self::Bool)
    }

    pub const fn is_signed(&self) -> bool {
        matches!(self, Self::Int4 | Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64)
    }

    pub const fn is_unsigned(&self) -> bool {
        matches!(self, Self::UInt8 | Self::UInt16 | Self::UInt32 | Self::UInt64)
    }

    /// Integer-like, including `Bool` and `Index`.
    pub const fn is_int(&self) -> bool {
        self.is_signed() || self.is_unsigned() || matches!(self, Self::Bool | Self::Index)
    }

    pub const fn is_float(&self) -> bool {
        matches!(self, Self::Float16 | Self::BFloat16 | Self::Float32 | Self::Float64)
    }

    // =========================================================================
    // Storage Narrowing
    // =========================================================================

    /// The type used to hold this element type in memory.
    ///
    /// Sub-byte types are widened to `Int8`; every other type is stored as itself. The table is
    /// idempotent: `t.storage_type().storage_type() == t.storage_type()`.
    pub const fn storage_type(&self) -> Self {
        match self {
            Self::Bool | Self::Int4 => Self::Int8,
            other => *other,
        }
    }

    /// Whether loads and stores of this type need a conversion to/from [`Self::storage_type`].
    pub const fn needs_storage_conversion(&self) -> bool {
        matches!(self, Self::Bool | Self::Int4)
    }

    /// Textual mnemonic used by the tile IR printer (`i1`, `bf16`, `index`, ...).
    pub const fn mnemonic(&self) -> &'static str {
        match self {
            Self::Bool => "i1",
            Self::Int4 => "i4",
            Self::Int8 => "i8",
            Self::Int16 => "i16",
            Self::Int32 => "i32",
            Self::Int64 => "i64",
            Self::UInt8 => "ui8",
            Self::UInt16 => "ui16",
            Self::UInt32 => "ui32",
            Self::UInt64 => "ui64",
            Self::Float16 => "f16",
            Self::BFloat16 => "bf16",
            Self::Float32 => "f32",
            Self::Float64 => "f64",
            Self::Index => "index",
        }
    }
}

impl std::fmt::Display for DType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mnemonic())
    }
}
