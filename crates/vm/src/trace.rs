//! Defines the [`Trace`] trait and [`TraceEntry`] recorder used to gather information about
//! the execution of a Cairo program within the virtual machine, plus the
//! end-of-run flattening pass that turns segmented addresses into the single linear address
//! space a compiled program's consumers expect.
//!
//! This is a different pass from [`Memory::relocate_memory`](crate::memory::Memory::relocate_memory):
//! that one folds *temporary* segments into their target segment mid-run; this one runs once,
//! at the very end, and additionally flattens every remaining *positive* segment into one
//! address space indexed from 1, with each segment's base
//! equal to one past the end of the previous one.

use std::collections::HashMap;

use starknet_types_core::felt::Felt;

use crate::error::MemoryError;
use crate::memory::Memory;
use crate::relocatable::Relocatable;
use crate::segments::SegmentManager;
use crate::value::MaybeRelocatable;

/// One row of the execution trace: the registers as they stood right before a step executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceEntry {
    pub pc: Relocatable,
    pub ap: Relocatable,
    pub fp: Relocatable,
}

/// A relocated trace entry, expressed as plain felt offsets into the flattened memory
///.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelocatedTraceEntry {
    pub pc: usize,
    pub ap: usize,
    pub fp: usize,
}

/// A collection of callbacks invoked during the execution of a Cairo program.
#[allow(unused_variables)]
pub trait Trace {
    /// Called once per executed step, with the register values as they stood before the step.
    fn push(&mut self, entry: TraceEntry) {}
}

/// An implementation of [`Trace`] that records nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTrace;
impl Trace for NoopTrace {}

/// An implementation of [`Trace`] that records every step into a plain [`Vec`].
#[derive(Debug, Default, Clone)]
pub struct VecTrace {
    entries: Vec<TraceEntry>,
}

impl VecTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }
}

impl Trace for VecTrace {
    fn push(&mut self, entry: TraceEntry) {
        self.entries.push(entry);
    }
}

/// Computes each positive segment's base in the flattened address space: `base_0 = 1`,
/// `base_{s+1} = base_s + effective_size_s`.
///
/// Requires [`SegmentManager::compute_effective_sizes`] to have run first.
pub fn segment_bases(segments: &SegmentManager) -> Result<HashMap<isize, usize>, MemoryError> {
    let sizes = segments
        .effective_sizes()
        .ok_or(MemoryError::MissingSegmentUsedSizes)?;
    let mut bases = HashMap::with_capacity(sizes.len());
    let mut next = 1usize;
    for (index, size) in sizes.iter().enumerate() {
        bases.insert(index as isize, next);
        next += size;
    }
    Ok(bases)
}

/// Flattens a single cell value: felts pass through unchanged, relocatable values are
/// rewritten to their flat address via `bases`.
pub fn relocate_value(value: MaybeRelocatable, bases: &HashMap<isize, usize>) -> Result<Felt, MemoryError> {
    match value {
        MaybeRelocatable::Felt(f) => Ok(f),
        MaybeRelocatable::Relocatable(r) => {
            let base = bases
                .get(&r.segment_index)
                .copied()
                .ok_or(MemoryError::MissingSegmentUsedSizes)?;
            Ok(Felt::from(base + r.offset))
        }
    }
}

/// Flattens every populated cell of every positive segment into `(flat_address, value)` pairs,
/// in increasing address order, skipping memory holes.
pub fn relocate_memory(memory: &Memory, segments: &SegmentManager) -> Result<Vec<(usize, Felt)>, MemoryError> {
    let bases = segment_bases(segments)?;
    let sizes = segments
        .effective_sizes()
        .ok_or(MemoryError::MissingSegmentUsedSizes)?;

    let mut out = Vec::new();
    for (segment_index, &size) in sizes.iter().enumerate() {
        let base = bases[&(segment_index as isize)];
        for offset in 0..size {
            if let Some(cell) = memory.get(&Relocatable::new(segment_index as isize, offset)) {
                out.push((base + offset, relocate_value(*cell, &bases)?));
            }
        }
    }
    Ok(out)
}

/// Flattens every recorded [`TraceEntry`] into a [`RelocatedTraceEntry`] using the same base
/// table produced by [`segment_bases`].
pub fn relocate_trace(
    entries: &[TraceEntry],
    bases: &HashMap<isize, usize>,
) -> Result<Vec<RelocatedTraceEntry>, MemoryError> {
    entries
        .iter()
        .map(|entry| {
            let flat = |r: Relocatable| -> Result<usize, MemoryError> {
                let base = bases
                    .get(&r.segment_index)
                    .copied()
                    .ok_or(MemoryError::MissingSegmentUsedSizes)?;
                Ok(base + r.offset)
            };
            Ok(RelocatedTraceEntry {
                pc: flat(entry.pc)?,
                ap: flat(entry.ap)?,
                fp: flat(entry.fp)?,
            })
        })
        .collect()
}
