//! Binding of buffer slices to kernel arguments.
//!
//! A kernel is launched with one pointer per operand buffer followed by one per output buffer.
//! Several of those may name the same slice of the same allocation; with deduplication enabled
//! they share a single function argument. Each argument also records the alignment its
//! allocation guarantees, whether the kernel writes it, and whether a written buffer partially
//! overlaps another argument.

use std::collections::HashMap;

use snafu::ensure;
use tilegen_dtype::DType;

use crate::config::BufferAlignment;
use crate::error::*;
use crate::types::EmittedKernel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(strum::Display)]
pub enum AllocationKind {
    /// Holds a parameter of the entry computation.
    EntryParameter,
    /// Holds a compile-time constant.
    Constant,
    /// Allocated by the runtime for intermediate or output values.
    Temporary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    pub index: usize,
    pub size: usize,
    pub kind: AllocationKind,
}

/// A byte range within one allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Slice {
    pub allocation: usize,
    pub offset: usize,
    pub size: usize,
}

impl Slice {
    pub fn new(allocation: usize, offset: usize, size: usize) -> Self {
        Self { allocation, offset, size }
    }

    pub fn overlaps(&self, other: &Slice) -> bool {
        self.allocation == other.allocation
            && self.offset < other.offset + other.size
            && other.offset < self.offset + self.size
    }
}

/// A buffer passed to the kernel, before argument indices are assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferArg {
    pub shape: Vec<i64>,
    pub dtype: DType,
    pub slice: Slice,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelArgument {
    pub shape: Vec<i64>,
    pub dtype: DType,
    pub slice: Slice,
    /// Guaranteed alignment in bytes.
    pub alignment: usize,
    pub written: bool,
    /// Written and partially overlapping a different slice.
    pub aliased: bool,
    /// Function argument index; shared by deduplicated arguments.
    pub arg_index: usize,
    /// Earlier argument with the same slice, when deduplicated.
    pub first_with_same_slice: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelArguments {
    args: Vec<KernelArgument>,
}

impl KernelArguments {
    /// Bind `operands` then `outputs` to kernel arguments. Output slices are the written set.
    pub fn build(
        allocations: &[Allocation],
        operands: &[BufferArg],
        outputs: &[BufferArg],
        alignment: BufferAlignment,
        dedup: bool,
    ) -> Result<Self> {
        for buffer in operands.iter().chain(outputs) {
            let slice = buffer.slice;
            let allocation = allocations.iter().find(|a| a.index == slice.allocation);
            ensure!(
                allocation.is_some_and(|a| slice.offset + slice.size <= a.size),
                PreconditionSnafu { reason: format!("{slice:?} is not inside a known allocation") }
            );
        }

        let mut args: Vec<KernelArgument> = operands
            .iter()
            .chain(outputs)
            .map(|buffer| KernelArgument {
                shape: buffer.shape.clone(),
                dtype: buffer.dtype,
                slice: buffer.slice,
                alignment: 0,
                written: false,
                aliased: false,
                arg_index: 0,
                first_with_same_slice: None,
            })
            .collect();

        assign_arg_indices(&mut args, dedup);
        let written: Vec<Slice> = outputs.iter().map(|o| o.slice).collect();
        fill_attributes(&mut args, allocations, &written, alignment);
        Ok(Self { args })
    }

    /// Arguments of an emitted kernel, one allocation per buffer: parameters live in entry
    /// parameter allocations and outputs in runtime-allocated ones.
    pub fn for_kernel(kernel: &EmittedKernel, alignment: BufferAlignment) -> Result<Self> {
        let mut allocations = Vec::with_capacity(kernel.args.len());
        let (mut operands, mut outputs) = (Vec::new(), Vec::new());
        for arg in &kernel.args {
            let size = arg.shape.iter().product::<i64>().max(1) as usize * arg.dtype.bytes();
            let kind = if arg.is_output { AllocationKind::Temporary } else { AllocationKind::EntryParameter };
            allocations.push(Allocation { index: arg.index, size, kind });
            let buffer = BufferArg { shape: arg.shape.clone(), dtype: arg.dtype, slice: Slice::new(arg.index, 0, size) };
            if arg.is_output { outputs.push(buffer) } else { operands.push(buffer) }
        }
        Self::build(&allocations, &operands, &outputs, alignment, false)
    }

    pub fn args(&self) -> &[KernelArgument] {
        &self.args
    }

    /// Number of distinct function arguments.
    pub fn num_function_args(&self) -> usize {
        self.args.iter().filter(|a| a.first_with_same_slice.is_none()).count()
    }
}

fn assign_arg_indices(args: &mut [KernelArgument], dedup: bool) {
    let mut first_for_slice: HashMap<Slice, usize> = HashMap::new();
    let mut next = 0;
    for i in 0..args.len() {
        match first_for_slice.get(&args[i].slice) {
            Some(&first) if dedup => {
                args[i].first_with_same_slice = Some(first);
                args[i].arg_index = args[first].arg_index;
            }
            _ => {
                first_for_slice.insert(args[i].slice, i);
                args[i].arg_index = next;
                next += 1;
            }
        }
    }
}

fn fill_attributes(args: &mut [KernelArgument], allocations: &[Allocation], written: &[Slice], alignment: BufferAlignment) {
    for i in 0..args.len() {
        if let Some(first) = args[i].first_with_same_slice {
            let (alignment, written, aliased) = (args[first].alignment, args[first].written, args[first].aliased);
            let arg = &mut args[i];
            (arg.alignment, arg.written, arg.aliased) = (alignment, written, aliased);
            continue;
        }

        let slice = args[i].slice;
        let kind = allocations.iter().find(|a| a.index == slice.allocation).map(|a| a.kind);
        let is_written = written.contains(&slice);
        let aliased = is_written
            && args.iter().enumerate().any(|(j, other)| j != i && other.slice != slice && slice.overlaps(&other.slice));

        let arg = &mut args[i];
        arg.alignment = match kind {
            Some(AllocationKind::EntryParameter) => alignment.entry_parameter,
            Some(AllocationKind::Constant) => alignment.constant,
            Some(AllocationKind::Temporary) | None => alignment.allocated,
        };
        arg.written = is_written;
        arg.aliased = aliased;
    }
}
