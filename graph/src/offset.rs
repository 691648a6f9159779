//! Affine tile offset functions.
//!
//! Every tiled node carries an [`OffsetMap`]: one [`AffineExpr`] per output dimension giving the
//! element offset of the tile processed by a program instance. Inputs are the program id (`pid`)
//! and the node's runtime variables (`rt0`, `rt1`, ...), each with declared inclusive bounds.
//! Symbols (`s0`, ...) are range variables the tiling analysis failed to convert into dimensions;
//! an offset map containing one cannot be lowered.

use std::ops::{Add, Mul};

use smallvec::SmallVec;
use snafu::ensure;

use crate::error::*;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AffineExpr {
    Const(i64),
    Pid,
    RtVar(usize),
    Symbol(usize),
    Add(Box<AffineExpr>, Box<AffineExpr>),
    Mul(Box<AffineExpr>, i64),
    /// Floor division by a positive constant.
    FloorDiv(Box<AffineExpr>, i64),
    /// Euclidean remainder by a positive constant.
    Mod(Box<AffineExpr>, i64),
}

impl AffineExpr {
    pub fn pid() -> Self {
        Self::Pid
    }

    pub fn rt(index: usize) -> Self {
        Self::RtVar(index)
    }

    pub fn sym(index: usize) -> Self {
        Self::Symbol(index)
    }

    pub fn floor_div(self, divisor: i64) -> Self {
        Self::FloorDiv(Box::new(self), divisor)
    }

    pub fn modulo(self, divisor: i64) -> Self {
        Self::Mod(Box::new(self), divisor)
    }

    /// Evaluate with concrete inputs. Runtime values are used as given; clamping is the caller's job.
    pub fn evaluate(&self, pid: i64, rt: &[i64]) -> Result<i64> {
        Ok(match self {
            Self::Const(c) => *c,
            Self::Pid => pid,
            Self::RtVar(i) => {
                ensure!(*i < rt.len(), RuntimeValueCountSnafu { expected: *i + 1, actual: rt.len() });
                rt[*i]
            }
            Self::Symbol(s) => return UnresolvedSymbolSnafu { symbol: *s }.fail(),
            Self::Add(a, b) => a.evaluate(pid, rt)? + b.evaluate(pid, rt)?,
            Self::Mul(a, c) => a.evaluate(pid, rt)? * c,
            Self::FloorDiv(a, c) => a.evaluate(pid, rt)?.div_euclid(*c),
            Self::Mod(a, c) => a.evaluate(pid, rt)?.rem_euclid(*c),
        })
    }

    /// First symbol mentioned by the expression, if any.
    pub fn first_symbol(&self) -> Option<usize> {
        match self {
            Self::Symbol(s) => Some(*s),
            Self::Const(_) | Self::Pid | Self::RtVar(_) => None,
            Self::Add(a, b) => a.first_symbol().or_else(|| b.first_symbol()),
            Self::Mul(a, _) | Self::FloorDiv(a, _) | Self::Mod(a, _) => a.first_symbol(),
        }
    }

    fn check_divisors(&self) -> Result<()> {
        match self {
            Self::FloorDiv(a, c) | Self::Mod(a, c) => {
                ensure!(*c > 0, NonPositiveSnafu { what: "affine divisor", value: *c });
                a.check_divisors()
            }
            Self::Add(a, b) => {
                a.check_divisors()?;
                b.check_divisors()
            }
            Self::Mul(a, _) => a.check_divisors(),
            _ => Ok(()),
        }
    }
}

impl From<i64> for AffineExpr {
    fn from(c: i64) -> Self {
        Self::Const(c)
    }
}

impl Add for AffineExpr {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::Add(Box::new(self), Box::new(rhs))
    }
}

impl Add<i64> for AffineExpr {
    type Output = Self;

    fn add(self, rhs: i64) -> Self {
        self + Self::Const(rhs)
    }
}

impl Mul<i64> for AffineExpr {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self {
        Self::Mul(Box::new(self), rhs)
    }
}

impl std::fmt::Display for AffineExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Const(c) => write!(f, "{c}"),
            Self::Pid => f.write_str("pid"),
            Self::RtVar(i) => write!(f, "rt{i}"),
            Self::Symbol(i) => write!(f, "s{i}"),
            Self::Add(a, b) => write!(f, "{a} + {b}"),
            Self::Mul(a, c) => write!(f, "({a}) * {c}"),
            Self::FloorDiv(a, c) => write!(f, "({a}) floordiv {c}"),
            Self::Mod(a, c) => write!(f, "({a}) mod {c}"),
        }
    }
}

/// Inclusive legal range of a runtime variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RtVarBounds {
    pub lower: i64,
    pub upper: i64,
}

impl RtVarBounds {
    pub fn new(lower: i64, upper: i64) -> Self {
        Self { lower, upper }
    }

    pub fn clamp(&self, v: i64) -> i64 {
        v.max(self.lower).min(self.upper)
    }
}

/// Per-dimension tile offsets as a function of `(pid, rt...)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct OffsetMap {
    exprs: SmallVec<[AffineExpr; 4]>,
    rt_vars: SmallVec<[RtVarBounds; 2]>,
}

impl OffsetMap {
    pub fn new(exprs: impl IntoIterator<Item = AffineExpr>) -> Self {
        Self { exprs: exprs.into_iter().collect(), rt_vars: SmallVec::new() }
    }

    /// Every tile starts at the origin.
    pub fn zeros(rank: usize) -> Self {
        Self::new(std::iter::repeat_n(AffineExpr::Const(0), rank))
    }

    /// Offsets of a row-major grid of tiles: the program id is decomposed over the per-dimension
    /// tile counts with the last dimension varying fastest.
    pub fn tile_grid(dims: &[i64], tile_sizes: &[i64]) -> Self {
        let counts: SmallVec<[i64; 4]> =
            dims.iter().zip(tile_sizes).map(|(&d, &t)| (d + t - 1) / t.max(1)).collect();
        let exprs = (0..dims.len()).map(|i| {
            let stride: i64 = counts[i + 1..].iter().product();
            AffineExpr::Pid.floor_div(stride.max(1)).modulo(counts[i].max(1)) * tile_sizes[i]
        });
        Self::new(exprs)
    }

    pub fn with_rt_vars(mut self, bounds: impl IntoIterator<Item = RtVarBounds>) -> Self {
        self.rt_vars = bounds.into_iter().collect();
        self
    }

    pub fn exprs(&self) -> &[AffineExpr] {
        &self.exprs
    }

    pub fn rank(&self) -> usize {
        self.exprs.len()
    }

    pub fn rt_vars(&self) -> &[RtVarBounds] {
        &self.rt_vars
    }

    /// Fails on the first symbol still present in any result.
    pub fn check_resolved(&self) -> Result<()> {
        for expr in &self.exprs {
            if let Some(symbol) = expr.first_symbol() {
                return UnresolvedSymbolSnafu { symbol }.fail();
            }
            expr.check_divisors()?;
        }
        Ok(())
    }

    /// Concrete offsets for `pid`, clamping each runtime value into its bounds first.
    pub fn evaluate(&self, pid: i64, rt: &[i64]) -> Result<SmallVec<[i64; 4]>> {
        ensure!(rt.len() == self.rt_vars.len(), RuntimeValueCountSnafu { expected: self.rt_vars.len(), actual: rt.len() });
        let clamped: SmallVec<[i64; 2]> = rt.iter().zip(&self.rt_vars).map(|(&v, b)| b.clamp(v)).collect();
        self.exprs.iter().map(|e| e.evaluate(pid, &clamped)).collect()
    }
}

impl std::fmt::Display for OffsetMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use itertools::Itertools;
        write!(f, "(pid")?;
        for i in 0..self.rt_vars.len() {
            write!(f, ", rt{i}")?;
        }
        write!(f, ") -> ({})", self.exprs.iter().join(", "))?;
        for (i, b) in self.rt_vars.iter().enumerate() {
            write!(f, ", rt{i} in [{}, {}]", b.lower, b.upper)?;
        }
        Ok(())
    }
}
