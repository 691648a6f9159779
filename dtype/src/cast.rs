use super::*;

macro_rules! wrap_via {
    ($v:expr, $target:ty) => {
        ($v as i64 as $target) as f64
    };
}

impl DType {
    /// Round a numeric value to what an element of this type can hold.
    ///
    /// Integers truncate toward zero and wrap to their width; `Bool` is `v != 0`. Half-precision
    /// floats are rounded through `f32`.
    pub fn wrap_f64(&self, v: f64) -> f64 {
        if v.is_nan() && self.is_float() {
            return v;
        }
        match self {
            Self::Bool => (v != 0.0) as u8 as f64,
            Self::Int4 => {
                let t = (v as i64) & 0xF;
                (if t >= 8 { t - 16 } else { t }) as f64
            }
            Self::Int8 => wrap_via!(v, i8),
            Self::Int16 => wrap_via!(v, i16),
            Self::Int32 => wrap_via!(v, i32),
            Self::Int64 | Self::Index => v.trunc(),
            Self::UInt8 => wrap_via!(v, u8),
            Self::UInt16 => wrap_via!(v, u16),
            Self::UInt32 => wrap_via!(v, u32),
            Self::UInt64 => (v as u64) as f64,
            Self::Float16 | Self::BFloat16 | Self::Float32 => (v as f32) as f64,
            Self::Float64 => v,
        }
    }

    /// Smallest finite or infinite value, used as the neutral element of `max`.
    pub fn lowest(&self) -> f64 {
        match self {
            Self::Bool | Self::UInt8 | Self::UInt16 | Self::UInt32 | Self::UInt64 => 0.0,
            Self::Int4 => -8.0,
            Self::Int8 => i8::MIN as f64,
            Self::Int16 => i16::MIN as f64,
            Self::Int32 => i32::MIN as f64,
            Self::Int64 | Self::Index => i64::MIN as f64,
            _ => f64::NEG_INFINITY,
        }
    }
}
