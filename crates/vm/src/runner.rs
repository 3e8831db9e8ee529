//! Defines [`CairoRunner`]: the orchestration layer that turns a parsed
//! program plus a chosen layout into a running [`CairoVM`], drives it to completion, and
//! relocates the result into the final flat trace and memory.

use std::collections::HashMap;

use tracing::debug;

use crate::builtin::{self, BuiltinName, BuiltinRunner};
use crate::cpu::Cpu;
use crate::error::{MemoryError, RunnerError, VirtualMachineError};
use crate::hint::{HintData, HintProcessor};
use crate::layout::LayoutDefinition;
use crate::memory::Memory;
use crate::relocatable::Relocatable;
use crate::segments::SegmentManager;
use crate::trace::Trace;
use crate::value::MaybeRelocatable;
use crate::CairoVM;

/// A parsed compiled program, in the shape the runner needs to set up a run.
///
/// This is deliberately minimal: parsing the on-disk JSON schema into this shape is the
/// loader crate's job, kept out of the deterministic core.
#[derive(Debug, Clone, Default)]
pub struct CairoProgram {
    /// The program's code and embedded constants, loaded verbatim into segment 0.
    pub data: Vec<MaybeRelocatable>,
    /// The builtins this program requires, in declaration order.
    pub builtins: Vec<String>,
    /// Hints attached to each program-relative instruction offset.
    pub hints: HashMap<usize, Vec<HintData>>,
    /// Named entrypoints (e.g. `"main"`), as offsets into `data`.
    pub entrypoints: HashMap<String, usize>,
}

fn build_builtin(name: BuiltinName, base: Relocatable, ratio: Option<u32>) -> BuiltinRunner {
    match name {
        "range_check" => BuiltinRunner::RangeCheck(builtin::RangeCheckBuiltinRunner::new(base, ratio)),
        "output" => BuiltinRunner::Output(builtin::OutputBuiltinRunner::new(base)),
        "pedersen" => BuiltinRunner::Pedersen(builtin::PedersenBuiltinRunner::new(base, ratio)),
        "bitwise" => BuiltinRunner::Bitwise(builtin::BitwiseBuiltinRunner::new(base, ratio)),
        "ec_op" => BuiltinRunner::EcOp(builtin::EcOpBuiltinRunner::new(base, ratio)),
        "ecdsa" => BuiltinRunner::Ecdsa(builtin::EcdsaBuiltinRunner::new(base, ratio)),
        "keccak" => BuiltinRunner::Keccak(builtin::KeccakBuiltinRunner::new(base, ratio)),
        "poseidon" => BuiltinRunner::Poseidon(builtin::PoseidonBuiltinRunner::new(base, ratio)),
        "segment_arena" => BuiltinRunner::SegmentArena(builtin::SegmentArenaBuiltinRunner::new(base)),
        other => unreachable!("unknown builtin name {other:?} should have been rejected earlier"),
    }
}

/// Orchestrates a single run of a [`CairoProgram`] against a chosen [`LayoutDefinition`]
///.
#[derive(Debug)]
pub struct CairoRunner {
    vm: CairoVM,
    program_base: Relocatable,
    execution_base: Relocatable,
    /// The sentinel return address pushed for the entrypoint's implicit caller; the run loop
    /// halts once `pc` reaches it.
    end_pc: Relocatable,
}

impl CairoRunner {
    /// Loads `program` into a fresh [`CairoVM`] under `layout`, starting at `entrypoint`.
    pub fn new(program: &CairoProgram, layout: LayoutDefinition, entrypoint: &str) -> Result<Self, RunnerError> {
        for name in &program.builtins {
            if !layout.has_builtin(name) {
                return Err(RunnerError::BuiltinNotInLayout(name.clone()));
            }
        }

        let mut memory = Memory::new();
        let mut segments = SegmentManager::new();

        let program_base = segments.add_segment();
        memory.load_data(program_base, &program.data)?;
        let end_pc = program_base
            .add_uint(program.data.len())
            .map_err(|_| MemoryError::OffsetExceeded)?;

        let execution_base = segments.add_segment();

        let mut builtins = Vec::new();
        for slot in layout.builtins {
            if !program.builtins.iter().any(|b| b == slot.name) {
                continue;
            }
            let base = segments.add_segment();
            let runner = build_builtin(slot.name, base, slot.ratio);
            runner.add_validation_rule(&mut memory);
            debug!(builtin = slot.name, base = %base, "registered builtin");
            builtins.push(runner);
        }

        let entry_offset = program
            .entrypoints
            .get(entrypoint)
            .copied()
            .ok_or(RunnerError::MissingMain)?;
        let initial_pc = program_base
            .add_uint(entry_offset)
            .map_err(|_| MemoryError::OffsetExceeded)?;

        let mut stack = vec![
            MaybeRelocatable::from_relocatable(program_base),
            MaybeRelocatable::from_relocatable(execution_base),
        ];
        for b in &builtins {
            stack.extend(b.initial_stack());
        }
        stack.push(MaybeRelocatable::from_relocatable(end_pc));

        let stack_top = memory.load_data(execution_base, &stack)?;

        let cpu = Cpu::new(initial_pc, stack_top, stack_top);
        let vm = CairoVM::new(cpu, memory, segments, builtins);

        Ok(Self {
            vm,
            program_base,
            execution_base,
            end_pc,
        })
    }

    pub fn vm(&self) -> &CairoVM {
        &self.vm
    }

    pub fn program_base(&self) -> Relocatable {
        self.program_base
    }

    pub fn execution_base(&self) -> Relocatable {
        self.execution_base
    }

    /// Runs `step` until the program counter reaches the end-of-program sentinel.
    pub fn run<H, T>(
        &mut self,
        hint_processor: &mut H,
        hints: &HashMap<usize, Vec<HintData>>,
        trace: &mut T,
    ) -> Result<(), VirtualMachineError>
    where
        H: HintProcessor,
        T: ?Sized + Trace,
    {
        let mut steps = 0usize;
        while self.vm.cpu().pc != self.end_pc {
            let offset = (self.vm.cpu().pc.sub(&self.program_base)).unwrap_or(-1);
            let step_hints: &[HintData] = if offset >= 0 {
                hints.get(&(offset as usize)).map(Vec::as_slice).unwrap_or(&[])
            } else {
                &[]
            };
            self.vm.step(hint_processor, step_hints, trace)?;
            steps += 1;
            if steps > program_step_guard(&self.vm) {
                return Err(RunnerError::EndOfProgram.into());
            }
        }
        debug!(steps, "run halted at end-of-program sentinel");
        Ok(())
    }

    /// Ends the run: freezes segment sizes and validates every builtin's stop
    /// pointer in reverse registration order.
    pub fn end_run(&mut self) -> Result<(), RunnerError> {
        let (segments, memory) = self.vm.segments_and_memory_mut();
        segments.compute_effective_sizes(memory);

        let stack_ptr = self.vm.cpu().ap;
        self.vm.finalize_builtins(stack_ptr)?;
        Ok(())
    }

    /// Relocates memory and, transitively, every trace entry recorded during the run.
    pub fn relocate(&mut self) -> Result<(), MemoryError> {
        self.vm.memory_mut().relocate_memory()
    }
}

/// An upper bound on executed steps before a run is considered stuck (no halt reached).
///
/// The bound scales with the program's own size plus a fixed allowance for builtin
/// bookkeeping steps, comfortably above any of the end-to-end scenarios this crate runs.
fn program_step_guard(vm: &CairoVM) -> usize {
    vm.memory().used_size(0).unwrap_or(0) * 64 + 4096
}
