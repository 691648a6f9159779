//! Scalar constants.

use crate::DType;

/// Constant value carried by constant graph nodes and `arith.constant` operations.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConstValue {
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
}

impl ConstValue {
    pub const fn zero(dtype: DType) -> Self {
        use DType::*;
        match dtype {
            Bool => Self::Bool(false),
            Int4 | Int8 | Int16 | Int32 | Int64 | Index => Self::Int(0),
            UInt8 | UInt16 | UInt32 | UInt64 => Self::UInt(0),
            Float16 | BFloat16 | Float32 | Float64 => Self::Float(0.0),
        }
    }

    pub const fn one(dtype: DType) -> Self {
        use DType::*;
        match dtype {
            Bool => Self::Bool(true),
            Int4 | Int8 | Int16 | Int32 | Int64 | Index => Self::Int(1),
            UInt8 | UInt16 | UInt32 | UInt64 => Self::UInt(1),
            Float16 | BFloat16 | Float32 | Float64 => Self::Float(1.0),
        }
    }

    pub fn as_f64(&self) -> f64 {
        match *self {
            Self::Int(v) => v as f64,
            Self::UInt(v) => v as f64,
            Self::Float(v) => v,
            Self::Bool(v) => v as u8 as f64,
        }
    }

    /// Integer view of the constant; floats truncate toward zero.
    pub fn as_i64(&self) -> i64 {
        match *self {
            Self::Int(v) => v,
            Self::UInt(v) => v as i64,
            Self::Float(v) => v as i64,
            Self::Bool(v) => v as i64,
        }
    }

    /// Convert to the representation used for `dtype`, wrapping like a runtime conversion.
    pub fn cast(&self, dtype: DType) -> Self {
        let v = dtype.wrap_f64(self.as_f64());
        match dtype {
            DType::Bool => Self::Bool(v != 0.0),
            d if d.is_float() => Self::Float(v),
            d if d.is_unsigned() => Self::UInt(v as u64),
            _ => Self::Int(self.as_i64_wrapped(dtype)),
        }
    }

    fn as_i64_wrapped(&self, dtype: DType) -> i64 {
        match (*self, dtype) {
            (Self::Int(v), DType::Int64 | DType::Index) => v,
            (Self::UInt(v), DType::Int64 | DType::Index) => v as i64,
            _ => dtype.wrap_f64(self.as_f64()) as i64,
        }
    }
}

impl std::fmt::Display for ConstValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::UInt(v) => write!(f, "{v}"),
            Self::Float(v) if v.is_finite() && v.fract() == 0.0 => write!(f, "{v:.1}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
        }
    }
}
