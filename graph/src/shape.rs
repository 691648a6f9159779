//! Logical shapes with physical layouts.

use smallvec::SmallVec;

pub type Dims = SmallVec<[i64; 4]>;

/// Dimensions of a tensor plus its physical layout.
///
/// `minor_to_major[0]` is the fastest-varying logical dimension in memory. An empty `dims`
/// describes a scalar.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Shape {
    dims: Dims,
    minor_to_major: SmallVec<[usize; 4]>,
}

impl Shape {
    /// Row-major shape (the last logical dimension is minor-most).
    pub fn new(dims: impl IntoIterator<Item = i64>) -> Self {
        let dims: Dims = dims.into_iter().collect();
        let minor_to_major = (0..dims.len()).rev().collect();
        Self { dims, minor_to_major }
    }

    pub fn scalar() -> Self {
        Self::new([])
    }

    /// Shape with an explicit minor-to-major layout. The layout must be a permutation of
    /// `0..dims.len()`; anything else is rejected by graph validation.
    pub fn with_layout(dims: impl IntoIterator<Item = i64>, minor_to_major: impl IntoIterator<Item = usize>) -> Self {
        Self { dims: dims.into_iter().collect(), minor_to_major: minor_to_major.into_iter().collect() }
    }

    pub fn dims(&self) -> &[i64] {
        &self.dims
    }

    pub fn dim(&self, i: usize) -> i64 {
        self.dims[i]
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn is_scalar(&self) -> bool {
        self.dims.is_empty()
    }

    /// A shape whose every dimension is 1, including rank 0.
    pub fn is_effective_scalar(&self) -> bool {
        self.dims.iter().all(|&d| d == 1)
    }

    pub fn num_elements(&self) -> i64 {
        self.dims.iter().product()
    }

    pub fn minor_to_major(&self) -> &[usize] {
        &self.minor_to_major
    }

    /// Logical dimensions ordered from major-most to minor-most.
    pub fn major_to_minor(&self) -> impl Iterator<Item = usize> + '_ {
        self.minor_to_major.iter().rev().copied()
    }

    pub fn is_row_major(&self) -> bool {
        self.minor_to_major.iter().rev().copied().eq(0..self.rank())
    }

    pub fn has_valid_layout(&self) -> bool {
        let mut seen: SmallVec<[bool; 4]> = smallvec::smallvec![false; self.rank()];
        self.minor_to_major.len() == self.rank()
            && self.minor_to_major.iter().all(|&d| d < self.rank() && !std::mem::replace(&mut seen[d], true))
    }
}

impl std::fmt::Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use itertools::Itertools;
        write!(f, "[{}]", self.dims.iter().join(","))?;
        if !self.is_row_major() {
            write!(f, "{{{}}}", self.minor_to_major.iter().join(","))?;
        }
        Ok(())
    }
}
