//! Scalar operator kinds shared by the graph and the tile IR.
//!
//! Each operator also carries its element-level semantics (`apply`), which the reference
//! interpreter uses to evaluate tiles.

use crate::DType;

/// Unary elementwise operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(strum::EnumIter, strum::IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum UnaryOp {
    Neg,
    Abs,
    Exp,
    Log,
    Sqrt,
    Rsqrt,
    Tanh,
    Floor,
    Ceil,
    /// Bitwise not for integers, logical not for `Bool`.
    Not,
}

/// Binary elementwise operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(strum::EnumIter, strum::IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    /// Float division, or integer division truncated toward zero.
    Div,
    /// Remainder with the sign of the dividend.
    Rem,
    Max,
    Min,
    Pow,
    And,
    Or,
    Xor,
}

/// Comparison predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(strum::EnumIter, strum::IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum CmpPredicate {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl UnaryOp {
    pub fn is_valid_for(&self, dtype: DType) -> bool {
        match self {
            Self::Not => dtype.is_int(),
            Self::Neg | Self::Abs => dtype != DType::Bool,
            _ => dtype.is_float(),
        }
    }

    pub fn apply(&self, dtype: DType, x: f64) -> f64 {
        let r = match self {
            Self::Neg => -x,
            Self::Abs => x.abs(),
            Self::Exp => x.exp(),
            Self::Log => x.ln(),
            Self::Sqrt => x.sqrt(),
            Self::Rsqrt => 1.0 / x.sqrt(),
            Self::Tanh => x.tanh(),
            Self::Floor => x.floor(),
            Self::Ceil => x.ceil(),
            Self::Not if dtype == DType::Bool => (x == 0.0) as u8 as f64,
            Self::Not => !(x as i64) as f64,
        };
        dtype.wrap_f64(r)
    }
}

impl BinaryOp {
    pub fn is_valid_for(&self, dtype: DType) -> bool {
        match self {
            Self::And | Self::Or | Self::Xor => dtype.is_int(),
            Self::Pow => dtype.is_float(),
            _ => true,
        }
    }

    pub fn apply(&self, dtype: DType, a: f64, b: f64) -> f64 {
        let r = match self {
            Self::Add => a + b,
            Self::Sub => a - b,
            Self::Mul => a * b,
            Self::Div if dtype.is_float() => a / b,
            Self::Div if b == 0.0 => 0.0,
            Self::Div => (a / b).trunc(),
            Self::Rem if dtype.is_float() => a % b,
            Self::Rem if b == 0.0 => 0.0,
            Self::Rem => ((a as i64) % (b as i64)) as f64,
            Self::Max => a.max(b),
            Self::Min => a.min(b),
            Self::Pow => a.powf(b),
            Self::And => ((a as i64) & (b as i64)) as f64,
            Self::Or => ((a as i64) | (b as i64)) as f64,
            Self::Xor => ((a as i64) ^ (b as i64)) as f64,
        };
        dtype.wrap_f64(r)
    }
}

impl CmpPredicate {
    pub fn apply(&self, a: f64, b: f64) -> bool {
        match self {
            Self::Eq => a == b,
            Self::Ne => a != b,
            Self::Lt => a < b,
            Self::Le => a <= b,
            Self::Gt => a > b,
            Self::Ge => a >= b,
        }
    }
}
