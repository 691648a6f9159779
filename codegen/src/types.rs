//! Types for emitted kernels.

use tilegen_dtype::DType;
use tilegen_ir::Program;

/// An emitted, verified kernel.
#[derive(Debug, Clone)]
pub struct EmittedKernel {
    /// Function name.
    pub name: String,

    /// The tile-level program.
    pub program: Program,

    /// Printed form of `program`.
    pub text: String,

    /// One entry per function argument: fusion parameters, then outputs.
    pub args: Vec<KernelArg>,

    /// Estimated shared memory footprint in bytes.
    pub shared_memory_bytes: usize,
}

/// Information about a kernel argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelArg {
    /// Argument index.
    pub index: usize,

    /// Name of the parameter or output node.
    pub name: String,

    /// Storage element type.
    pub dtype: DType,

    /// Full tensor shape.
    pub shape: Vec<i64>,

    /// Whether this is an output buffer.
    pub is_output: bool,
}

impl EmittedKernel {
    pub fn inputs(&self) -> impl Iterator<Item = &KernelArg> {
        self.args.iter().filter(|a| !a.is_output)
    }

    pub fn outputs(&self) -> impl Iterator<Item = &KernelArg> {
        self.args.iter().filter(|a| a.is_output)
    }
}
