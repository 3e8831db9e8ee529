//! The builtin runner framework: a uniform contract that lets the step
//! function treat cryptographic and arithmetic coprocessors as ordinary memory segments.
//!
//! Every concrete builtin below implements the same shape: it owns a segment, knows how many
//! cells make up one "instance" of its computation, can deduce the output cells of an instance
//! from its input cells, and can validate input cells as they are written. [`BuiltinRunner`] is
//! a closed enum rather than a trait object — the set of builtins is fixed and known at compile
//! time, and an enum keeps the concrete per-builtin state (registered signatures, output pages)
//! in one place without `dyn`-safety contortions.

mod bitwise;
mod ec_op;
mod ecdsa;
mod keccak;
mod output;
mod pedersen;
mod poseidon;
mod range_check;
mod segment_arena;

pub use self::bitwise::BitwiseBuiltinRunner;
pub use self::ec_op::EcOpBuiltinRunner;
pub use self::ecdsa::EcdsaBuiltinRunner;
pub use self::keccak::KeccakBuiltinRunner;
pub use self::output::OutputBuiltinRunner;
pub use self::pedersen::PedersenBuiltinRunner;
pub use self::poseidon::PoseidonBuiltinRunner;
pub use self::range_check::RangeCheckBuiltinRunner;
pub use self::segment_arena::SegmentArenaBuiltinRunner;

use crate::error::{MemoryError, RunnerError};
use crate::memory::Memory;
use crate::relocatable::Relocatable;
use crate::value::MaybeRelocatable;

/// The name a builtin is referred to by in a compiled program's `builtins` list.
pub type BuiltinName = &'static str;

/// A builtin runner bound to a segment of memory.
#[derive(Debug, Clone)]
pub enum BuiltinRunner {
    RangeCheck(RangeCheckBuiltinRunner),
    Output(OutputBuiltinRunner),
    Pedersen(PedersenBuiltinRunner),
    Bitwise(BitwiseBuiltinRunner),
    EcOp(EcOpBuiltinRunner),
    Ecdsa(EcdsaBuiltinRunner),
    Keccak(KeccakBuiltinRunner),
    Poseidon(PoseidonBuiltinRunner),
    SegmentArena(SegmentArenaBuiltinRunner),
}

impl BuiltinRunner {
    pub fn name(&self) -> BuiltinName {
        match self {
            Self::RangeCheck(_) => "range_check",
            Self::Output(_) => "output",
            Self::Pedersen(_) => "pedersen",
            Self::Bitwise(_) => "bitwise",
            Self::EcOp(_) => "ec_op",
            Self::Ecdsa(_) => "ecdsa",
            Self::Keccak(_) => "keccak",
            Self::Poseidon(_) => "poseidon",
            Self::SegmentArena(_) => "segment_arena",
        }
    }

    /// The number of cells making up one instance of this builtin's computation.
    pub fn cells_per_instance(&self) -> usize {
        match self {
            Self::RangeCheck(b) => b.cells_per_instance(),
            Self::Output(b) => b.cells_per_instance(),
            Self::Pedersen(b) => b.cells_per_instance(),
            Self::Bitwise(b) => b.cells_per_instance(),
            Self::EcOp(b) => b.cells_per_instance(),
            Self::Ecdsa(b) => b.cells_per_instance(),
            Self::Keccak(b) => b.cells_per_instance(),
            Self::Poseidon(b) => b.cells_per_instance(),
            Self::SegmentArena(b) => b.cells_per_instance(),
        }
    }

    /// Of those cells, how many are inputs (the rest are outputs the builtin deduces).
    pub fn n_input_cells(&self) -> usize {
        match self {
            Self::RangeCheck(b) => b.n_input_cells(),
            Self::Output(b) => b.n_input_cells(),
            Self::Pedersen(b) => b.n_input_cells(),
            Self::Bitwise(b) => b.n_input_cells(),
            Self::EcOp(b) => b.n_input_cells(),
            Self::Ecdsa(b) => b.n_input_cells(),
            Self::Keccak(b) => b.n_input_cells(),
            Self::Poseidon(b) => b.n_input_cells(),
            Self::SegmentArena(b) => b.n_input_cells(),
        }
    }

    /// The builtin's instance ratio as declared by the selected layout, or `None` for a
    /// dynamic-ratio builtin.
    pub fn ratio(&self) -> Option<u32> {
        match self {
            Self::RangeCheck(b) => b.ratio,
            Self::Output(_) => None,
            Self::Pedersen(b) => b.ratio,
            Self::Bitwise(b) => b.ratio,
            Self::EcOp(b) => b.ratio,
            Self::Ecdsa(b) => b.ratio,
            Self::Keccak(b) => b.ratio,
            Self::Poseidon(b) => b.ratio,
            Self::SegmentArena(_) => None,
        }
    }

    pub fn base(&self) -> Relocatable {
        match self {
            Self::RangeCheck(b) => b.base,
            Self::Output(b) => b.base,
            Self::Pedersen(b) => b.base,
            Self::Bitwise(b) => b.base,
            Self::EcOp(b) => b.base,
            Self::Ecdsa(b) => b.base,
            Self::Keccak(b) => b.base,
            Self::Poseidon(b) => b.base,
            Self::SegmentArena(b) => b.base,
        }
    }

    pub fn set_base(&mut self, base: Relocatable) {
        match self {
            Self::RangeCheck(b) => b.base = base,
            Self::Output(b) => b.base = base,
            Self::Pedersen(b) => b.base = base,
            Self::Bitwise(b) => b.base = base,
            Self::EcOp(b) => b.base = base,
            Self::Ecdsa(b) => b.base = base,
            Self::Keccak(b) => b.base = base,
            Self::Poseidon(b) => b.base = base,
            Self::SegmentArena(b) => b.base = base,
        }
    }

    pub fn stop_ptr(&self) -> Option<usize> {
        match self {
            Self::RangeCheck(b) => b.stop_ptr,
            Self::Output(b) => b.stop_ptr,
            Self::Pedersen(b) => b.stop_ptr,
            Self::Bitwise(b) => b.stop_ptr,
            Self::EcOp(b) => b.stop_ptr,
            Self::Ecdsa(b) => b.stop_ptr,
            Self::Keccak(b) => b.stop_ptr,
            Self::Poseidon(b) => b.stop_ptr,
            Self::SegmentArena(b) => b.stop_ptr,
        }
    }

    fn set_stop_ptr(&mut self, stop_ptr: usize) {
        match self {
            Self::RangeCheck(b) => b.stop_ptr = Some(stop_ptr),
            Self::Output(b) => b.stop_ptr = Some(stop_ptr),
            Self::Pedersen(b) => b.stop_ptr = Some(stop_ptr),
            Self::Bitwise(b) => b.stop_ptr = Some(stop_ptr),
            Self::EcOp(b) => b.stop_ptr = Some(stop_ptr),
            Self::Ecdsa(b) => b.stop_ptr = Some(stop_ptr),
            Self::Keccak(b) => b.stop_ptr = Some(stop_ptr),
            Self::Poseidon(b) => b.stop_ptr = Some(stop_ptr),
            Self::SegmentArena(b) => b.stop_ptr = Some(stop_ptr),
        }
    }

    /// The values pushed onto the initial execution stack for this builtin: its own base
    /// pointer.
    pub fn initial_stack(&self) -> Vec<MaybeRelocatable> {
        vec![MaybeRelocatable::from_relocatable(self.base())]
    }

    /// Attempts to deduce the value of `address`'s cell from the other cells of the same
    /// instance. Returns `None` if `address` is an input cell or the inputs aren't known yet.
    pub fn deduce_memory_cell(
        &self,
        address: Relocatable,
        memory: &Memory,
    ) -> Result<Option<MaybeRelocatable>, MemoryError> {
        match self {
            Self::Pedersen(b) => b.deduce_memory_cell(address, memory),
            Self::Bitwise(b) => b.deduce_memory_cell(address, memory),
            Self::EcOp(b) => b.deduce_memory_cell(address, memory),
            Self::Keccak(b) => b.deduce_memory_cell(address, memory),
            Self::Poseidon(b) => b.deduce_memory_cell(address, memory),
            Self::RangeCheck(_) | Self::Output(_) | Self::Ecdsa(_) | Self::SegmentArena(_) => {
                Ok(None)
            }
        }
    }

    /// Installs this builtin's validation rule (if it has one) on its own segment.
    pub fn add_validation_rule(&self, memory: &mut Memory) {
        match self {
            Self::RangeCheck(b) => b.add_validation_rule(memory),
            Self::Ecdsa(b) => b.add_validation_rule(memory),
            _ => {}
        }
    }

    /// The number of cells actually used in this builtin's segment.
    pub fn get_used_cells(&self, memory: &Memory) -> Result<usize, MemoryError> {
        Ok(memory.used_size(self.base().segment_index).unwrap_or(0))
    }

    /// The number of complete instances run, rounding up a partial trailing instance.
    pub fn get_used_instances(&self, memory: &Memory) -> Result<usize, MemoryError> {
        let used = self.get_used_cells(memory)?;
        let per = self.cells_per_instance();
        Ok(used.div_ceil(per))
    }

    /// Reads the stop pointer pushed onto the stack at `stack_ptr`, validates it references
    /// this builtin's own segment at its used-cell count, and returns the stack pointer moved
    /// past it.
    pub fn final_stack(
        &mut self,
        memory: &Memory,
        stack_ptr: Relocatable,
    ) -> Result<Relocatable, RunnerError> {
        let prev = stack_ptr
            .sub_uint(1)
            .map_err(|_| RunnerError::NoStopPointer(self.name().to_owned()))?;
        let stop_ptr = memory
            .get_relocatable(&prev)
            .map_err(|_| RunnerError::NoStopPointer(self.name().to_owned()))?;

        if stop_ptr.segment_index != self.base().segment_index {
            return Err(RunnerError::InvalidStopPointerIndex(self.name().to_owned()));
        }
        let used = self.get_used_cells(memory)?;
        if stop_ptr.offset != used {
            return Err(RunnerError::InvalidStopPointer(self.name().to_owned()));
        }

        self.set_stop_ptr(stop_ptr.offset);
        Ok(prev)
    }
}
