//! Bitcast decomposition.
//!
//! Any bitcast between two shapes with the same number of elements is a transpose into physical
//! (major-to-minor) order, a row-major reshape between the two physical shapes, and a transpose
//! from physical order back to the logical output dimensions.

use smallvec::SmallVec;
use snafu::ensure;
use tilegen_graph::Shape;
use tilegen_ir::Dims;

use crate::error::*;

pub type Permutation = SmallVec<[usize; 4]>;

/// `result[i] = values[perm[i]]`.
pub fn permute(values: &[i64], perm: &[usize]) -> Dims {
    perm.iter().map(|&p| values[p]).collect()
}

/// `result[perm[i]] = values[i]`.
pub fn permute_inverse(values: &[i64], perm: &[usize]) -> Dims {
    let mut result: Dims = smallvec::smallvec![0; values.len()];
    for (i, &p) in perm.iter().enumerate() {
        result[p] = values[i];
    }
    result
}

pub fn inverse_permutation(perm: &[usize]) -> Permutation {
    let mut inverse: Permutation = smallvec::smallvec![0; perm.len()];
    for (i, &p) in perm.iter().enumerate() {
        inverse[p] = i;
    }
    inverse
}

pub fn is_identity(perm: &[usize]) -> bool {
    perm.iter().enumerate().all(|(i, &p)| i == p)
}

/// Transpose, reshape, transpose.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitcastDecomposition {
    /// Order of the first transpose: input dimensions in major-to-minor order.
    pub transpose1: Permutation,
    /// Row-major shape after the first transpose.
    pub transpose1_shape: Dims,
    /// Row-major shape after the reshape: output dimensions in major-to-minor order.
    pub reshape_shape: Dims,
    /// Order of the second transpose, from physical order back to logical output dimensions.
    pub transpose2: Permutation,
}

impl BitcastDecomposition {
    pub fn new(input: &Shape, output: &Shape) -> Result<Self> {
        ensure!(
            input.num_elements() == output.num_elements(),
            PreconditionSnafu { reason: format!("bitcast {input} -> {output} changes the element count") }
        );
        let transpose1: Permutation = input.major_to_minor().collect();
        let output_major_to_minor: Permutation = output.major_to_minor().collect();

        Ok(Self {
            transpose1_shape: permute(input.dims(), &transpose1),
            reshape_shape: permute(output.dims(), &output_major_to_minor),
            transpose2: inverse_permutation(&output_major_to_minor),
            transpose1,
        })
    }

    pub fn is_transpose1_identity(&self) -> bool {
        is_identity(&self.transpose1)
    }

    pub fn is_transpose2_identity(&self) -> bool {
        is_identity(&self.transpose2)
    }

    pub fn needs_reshape(&self) -> bool {
        self.transpose1_shape != self.reshape_shape
    }
}
