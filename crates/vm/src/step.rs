//! The step function: the single-instruction execution pipeline run once
//! per CPU cycle.
//!
//! Pipeline, in order: run any hints attached to the current PC, fetch and decode the
//! instruction, resolve the three operand addresses, read or deduce their values (consulting
//! registered builtins and, for `assert_eq`, the other two operands), enforce the opcode's
//! constraints, write back any newly-deduced cell, append a trace row, and advance PC/AP/FP.

use tracing::trace;

use crate::builtin::BuiltinRunner;
use crate::cpu::Cpu;
use crate::error::{InstructionError, VirtualMachineError};
use crate::felt_ext::FeltExt;
use crate::hint::HintProcessor;
use crate::instr::{ApUpdate, Instruction, OpCode, PcUpdate, ResultLogic};
use crate::memory::Memory;
use crate::relocatable::Relocatable;
use crate::scopes::ExecutionScopes;
use crate::trace::{Trace, TraceEntry};
use crate::value::MaybeRelocatable;

/// Attempts to deduce the value at `address` using whichever builtin owns its segment, if any.
fn deduce_with_builtin(
    builtins: &[BuiltinRunner],
    address: Relocatable,
    memory: &Memory,
) -> Result<Option<MaybeRelocatable>, VirtualMachineError> {
    for builtin in builtins {
        if builtin.base().segment_index == address.segment_index {
            return Ok(builtin.deduce_memory_cell(address, memory)?);
        }
    }
    Ok(None)
}

/// Deduces `op1` from `res = f(op0, op1)` and a known `dst`, when the result logic allows it.
fn deduce_op1_from_dst(
    res_logic: ResultLogic,
    op0: Option<MaybeRelocatable>,
    dst: MaybeRelocatable,
) -> Result<Option<MaybeRelocatable>, InstructionError> {
    match res_logic {
        ResultLogic::Op1 => Ok(Some(dst)),
        ResultLogic::Add => match op0 {
            Some(op0) => Ok(Some(dst.sub(&op0)?)),
            None => Ok(None),
        },
        ResultLogic::Mul => match op0 {
            Some(MaybeRelocatable::Felt(op0)) if !op0.is_zero_felt() => {
                let inv = op0.inverse().ok_or(crate::error::MathError::DivisionByZero)?;
                Ok(Some(dst.mul(&MaybeRelocatable::from_felt(inv))?))
            }
            _ => Ok(None),
        },
        ResultLogic::Unconstrained => Ok(None),
    }
}

/// Deduces `op0` from `res = f(op0, op1)` and a known `dst`, when the result logic allows it.
fn deduce_op0_from_dst(
    res_logic: ResultLogic,
    op1: MaybeRelocatable,
    dst: MaybeRelocatable,
) -> Result<Option<MaybeRelocatable>, InstructionError> {
    match res_logic {
        ResultLogic::Op1 => Ok(None),
        ResultLogic::Add => Ok(Some(dst.sub(&op1)?)),
        ResultLogic::Mul => match op1 {
            MaybeRelocatable::Felt(op1) if !op1.is_zero_felt() => {
                let inv = op1.inverse().ok_or(crate::error::MathError::DivisionByZero)?;
                Ok(Some(dst.mul(&MaybeRelocatable::from_felt(inv))?))
            }
            _ => Ok(None),
        },
        ResultLogic::Unconstrained => Ok(None),
    }
}

/// Executes one instruction, advancing `cpu`, `memory`, and `trace` in place.
#[allow(clippy::too_many_arguments)]
pub fn step<H, T>(
    cpu: &mut Cpu,
    memory: &mut Memory,
    builtins: &mut [BuiltinRunner],
    scopes: &mut ExecutionScopes,
    hint_processor: &mut H,
    hints: &[crate::hint::HintData],
    trace: &mut T,
) -> Result<(), VirtualMachineError>
where
    H: HintProcessor,
    T: ?Sized + Trace,
{
    if !hints.is_empty() {
        hint_processor.execute_hints(hints, cpu, memory, scopes)?;
    }

    let instruction_felt = memory.get_felt(&cpu.pc)?;
    let bytes = instruction_felt.to_bytes_le();
    let raw = u64::from_le_bytes(bytes[0..8].try_into().expect("8 bytes"));
    let instruction = Instruction(raw);

    instruction.check_validity()?;
    trace!(pc = %cpu.pc, raw = format!("{raw:#x}"), "decoded instruction");

    let dst_addr = cpu.dst_addr(instruction.dst_register(), instruction.dst_offset())?;
    let op0_addr = cpu.op0_addr(instruction.op0_register(), instruction.op0_offset())?;

    let mut dst = memory.get(&dst_addr).copied();
    let mut op0 = memory.get(&op0_addr).copied();

    if op0.is_none() {
        op0 = deduce_with_builtin(builtins, op0_addr, memory)?;
    }

    let op1_source = instruction.op1_source()?;
    let op1_addr = cpu.op1_addr(op1_source, instruction.op1_offset(), op0)?;
    let mut op1 = memory.get(&op1_addr).copied();

    if op1.is_none() {
        op1 = deduce_with_builtin(builtins, op1_addr, memory)?;
    }

    let res_logic = instruction.result_logic()?;
    let op_code = instruction.op_code()?;

    if op_code == OpCode::Call {
        let size = instruction.size()? as isize;
        let expected_op0 = MaybeRelocatable::from_relocatable(cpu.pc.add_int(size)?);
        match op0 {
            Some(value) if value == expected_op0 => {}
            Some(_) => return Err(InstructionError::DiffAssertValues.into()),
            None => op0 = Some(expected_op0),
        }
        let expected_dst = MaybeRelocatable::from_relocatable(cpu.fp);
        match dst {
            Some(value) if value == expected_dst => {}
            Some(_) => return Err(InstructionError::DiffAssertValues.into()),
            None => dst = Some(expected_dst),
        }
    }

    if op_code == OpCode::AssertEq {
        if let Some(dst_value) = dst {
            if op1.is_none() {
                op1 = deduce_op1_from_dst(res_logic, op0, dst_value)?;
            }
            if op0.is_none() {
                if let Some(op1_value) = op1 {
                    op0 = deduce_op0_from_dst(res_logic, op1_value, dst_value)?;
                }
            }
        }
    }

    let res = match res_logic {
        ResultLogic::Op1 => op1,
        ResultLogic::Add => match (op0, op1) {
            (Some(a), Some(b)) => Some(a.add(&b)?),
            _ => None,
        },
        ResultLogic::Mul => match (op0, op1) {
            (Some(a), Some(b)) => Some(a.mul(&b)?),
            _ => None,
        },
        ResultLogic::Unconstrained => None,
    };

    if op_code == OpCode::AssertEq && dst.is_none() {
        dst = res;
    }

    let op0 = op0.ok_or(InstructionError::FailedToComputeOp0)?;
    let op1 = op1.ok_or(InstructionError::FailedToComputeOp1)?;
    let dst = dst.ok_or(InstructionError::NoDst)?;

    if memory.get(&op0_addr).is_none() {
        memory.set(op0_addr, op0)?;
    }
    if memory.get(&op1_addr).is_none() {
        memory.set(op1_addr, op1)?;
    }
    if memory.get(&dst_addr).is_none() {
        memory.set(dst_addr, dst)?;
    }

    if op_code == OpCode::AssertEq {
        let res = res.ok_or(InstructionError::FailedToComputeOp0)?;
        if res != dst {
            return Err(InstructionError::DiffAssertValues.into());
        }
    }
    if op_code == OpCode::Ret {
        let pc_update = instruction.pc_update()?;
        if pc_update != PcUpdate::AbsoluteJump {
            return Err(InstructionError::InstructionEncoding.into());
        }
    }

    trace.push(TraceEntry {
        pc: cpu.pc,
        ap: cpu.ap,
        fp: cpu.fp,
    });

    let size = instruction.size()? as isize;
    let next_pc = match instruction.pc_update()? {
        PcUpdate::Regular => cpu.pc.add_int(size)?,
        PcUpdate::AbsoluteJump => res
            .ok_or(InstructionError::FailedToComputeOp0)?
            .into_relocatable()?,
        PcUpdate::RelativeJump => {
            let offset = res.ok_or(InstructionError::FailedToComputeOp0)?.into_felt()?;
            cpu.pc.add_felt(&offset)?
        }
        PcUpdate::ConditionalJump => {
            let dst_is_zero = matches!(dst, MaybeRelocatable::Felt(f) if f.is_zero_felt());
            if dst_is_zero {
                cpu.pc.add_int(size)?
            } else {
                match op1 {
                    MaybeRelocatable::Felt(f) => cpu.pc.add_felt(&f)?,
                    MaybeRelocatable::Relocatable(_) => {
                        return Err(InstructionError::InstructionEncoding.into())
                    }
                }
            }
        }
    };

    let next_fp = match op_code {
        OpCode::Call => cpu.ap.add_uint(2)?,
        OpCode::Ret => dst.into_relocatable()?,
        _ => cpu.fp,
    };

    let next_ap = if op_code == OpCode::Call {
        cpu.ap.add_uint(2)?
    } else {
        match instruction.ap_update()? {
            ApUpdate::None => cpu.ap,
            ApUpdate::Increment => cpu.ap.add_uint(1)?,
            ApUpdate::AddResult => {
                let res = res.ok_or(InstructionError::FailedToComputeOp0)?;
                match res {
                    MaybeRelocatable::Felt(f) => cpu.ap.add_felt(&f)?,
                    MaybeRelocatable::Relocatable(_) => {
                        return Err(InstructionError::InstructionEncoding.into())
                    }
                }
            }
        }
    };

    cpu.pc = next_pc;
    cpu.ap = next_ap;
    cpu.fp = next_fp;

    Ok(())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::hint::NoopHintProcessor;
    use crate::instr::{DstRegister, Op0Register, Op1Source};
    use crate::segments::SegmentManager;
    use crate::trace::NoopTrace;
    use starknet_types_core::felt::Felt;

    #[allow(clippy::too_many_arguments)]
    fn encode(
        dst_offset: i16,
        op0_offset: i16,
        op1_offset: i16,
        dst_reg: DstRegister,
        op0_reg: Op0Register,
        op1_src: Op1Source,
        res: ResultLogic,
        ap_update: ApUpdate,
    ) -> u64 {
        let bias = |v: i16| (v as u16) ^ 0x8000;
        (bias(dst_offset) as u64)
            | (bias(op0_offset) as u64) << 16
            | (bias(op1_offset) as u64) << 32
            | ((dst_reg as u64) << 48)
            | ((op0_reg as u64) << 49)
            | ((op1_src as u64) << 50)
            | ((res as u64) << 53)
            | ((ap_update as u64) << 58)
            | ((OpCode::AssertEq as u64) << 60)
    }

    /// Lays out an `assert_eq` instruction reading `op0` from `[fp - 2]`, `op1` from `[fp - 1]`,
    /// and `dst` from `[ap]`: whichever of the three is passed as `None` starts as a memory hole,
    /// left for the step function to deduce from the other two.
    ///
    /// Returns the felt the step function ended up writing to each of the three addresses.
    fn run_assert_eq(
        res: ResultLogic,
        op0: Option<u64>,
        op1: Option<u64>,
        dst: Option<u64>,
    ) -> Result<(Felt, Felt, Felt), VirtualMachineError> {
        let mut memory = Memory::new();
        let mut segments = SegmentManager::new();
        let base = segments.add_segment();

        let fp = base.add_uint(10).unwrap();
        let ap = base.add_uint(20).unwrap();
        let op0_addr = fp.sub_uint(2).unwrap();
        let op1_addr = fp.sub_uint(1).unwrap();

        if let Some(op0) = op0 {
            memory.set(op0_addr, MaybeRelocatable::from_felt(Felt::from(op0))).unwrap();
        }
        if let Some(op1) = op1 {
            memory.set(op1_addr, MaybeRelocatable::from_felt(Felt::from(op1))).unwrap();
        }
        if let Some(dst) = dst {
            memory.set(ap, MaybeRelocatable::from_felt(Felt::from(dst))).unwrap();
        }

        let instr = encode(
            0,
            -2,
            -1,
            DstRegister::AP,
            Op0Register::FP,
            Op1Source::FP,
            res,
            ApUpdate::None,
        );
        let pc = base.add_uint(0).unwrap();
        memory.set(pc, MaybeRelocatable::from_felt(Felt::from(instr))).unwrap();

        let mut cpu = Cpu::new(pc, ap, fp);
        let mut builtins: Vec<BuiltinRunner> = Vec::new();
        let mut scopes = ExecutionScopes::new();
        let mut hint_processor = NoopHintProcessor;
        let mut trace = NoopTrace;

        step(
            &mut cpu,
            &mut memory,
            &mut builtins,
            &mut scopes,
            &mut hint_processor,
            &[],
            &mut trace,
        )?;

        Ok((
            memory.get_felt(&op0_addr).unwrap(),
            memory.get_felt(&op1_addr).unwrap(),
            memory.get_felt(&ap).unwrap(),
        ))
    }

    #[rstest]
    // All three already agree: nothing to deduce, just a pass-through check.
    #[case::add_fully_known(ResultLogic::Add, Some(3), Some(4), Some(7), 3, 4, 7)]
    #[case::mul_fully_known(ResultLogic::Mul, Some(3), Some(4), Some(12), 3, 4, 12)]
    // `dst` missing: computed forward from `res = f(op0, op1)`.
    #[case::add_deduces_dst(ResultLogic::Add, Some(3), Some(4), None, 3, 4, 7)]
    #[case::mul_deduces_dst(ResultLogic::Mul, Some(3), Some(4), None, 3, 4, 12)]
    // `op1` missing, `dst` known: deduced as `dst - op0` (Add) or `dst / op0` (Mul).
    #[case::add_deduces_op1_from_dst(ResultLogic::Add, Some(3), None, Some(7), 3, 4, 7)]
    #[case::mul_deduces_op1_from_dst(ResultLogic::Mul, Some(3), None, Some(12), 3, 4, 12)]
    // `op0` missing, `dst` known: deduced as `dst - op1` (Add) or `dst / op1` (Mul).
    #[case::add_deduces_op0_from_dst(ResultLogic::Add, None, Some(4), Some(7), 3, 4, 7)]
    #[case::mul_deduces_op0_from_dst(ResultLogic::Mul, None, Some(4), Some(12), 3, 4, 12)]
    fn assert_eq_deduces_whichever_operand_starts_as_a_memory_hole(
        #[case] res: ResultLogic,
        #[case] op0: Option<u64>,
        #[case] op1: Option<u64>,
        #[case] dst: Option<u64>,
        #[case] expected_op0: u64,
        #[case] expected_op1: u64,
        #[case] expected_dst: u64,
    ) {
        let (got_op0, got_op1, got_dst) = run_assert_eq(res, op0, op1, dst).unwrap();
        assert_eq!(got_op0, Felt::from(expected_op0));
        assert_eq!(got_op1, Felt::from(expected_op1));
        assert_eq!(got_dst, Felt::from(expected_dst));
    }

    #[test]
    fn assert_eq_rejects_a_dst_that_disagrees_with_res() {
        let err = run_assert_eq(ResultLogic::Add, Some(3), Some(4), Some(999)).unwrap_err();
        assert!(matches!(
            err,
            VirtualMachineError::Instruction(InstructionError::DiffAssertValues)
        ));
    }

    #[test]
    fn assert_eq_errors_when_nothing_can_determine_a_missing_operand() {
        let mut memory = Memory::new();
        let mut segments = SegmentManager::new();
        let base = segments.add_segment();
        let fp = base.add_uint(10).unwrap();
        let ap = base.add_uint(20).unwrap();

        // Neither `op0` nor `dst` is ever written: `op1` has nothing to deduce it from.
        memory
            .set(fp.sub_uint(1).unwrap(), MaybeRelocatable::from_felt(Felt::from(4u8)))
            .unwrap();
        let instr = encode(
            0,
            -2,
            -1,
            DstRegister::AP,
            Op0Register::FP,
            Op1Source::FP,
            ResultLogic::Add,
            ApUpdate::None,
        );
        let pc = base.add_uint(0).unwrap();
        memory.set(pc, MaybeRelocatable::from_felt(Felt::from(instr))).unwrap();

        let mut cpu = Cpu::new(pc, ap, fp);
        let mut builtins: Vec<BuiltinRunner> = Vec::new();
        let mut scopes = ExecutionScopes::new();
        let mut hint_processor = NoopHintProcessor;
        let mut trace = NoopTrace;

        let err = step(
            &mut cpu,
            &mut memory,
            &mut builtins,
            &mut scopes,
            &mut hint_processor,
            &[],
            &mut trace,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            VirtualMachineError::Instruction(InstructionError::FailedToComputeOp0)
        ));
    }

    #[allow(clippy::too_many_arguments)]
    fn encode_raw(
        dst_offset: i16,
        op0_offset: i16,
        op1_offset: i16,
        dst_reg: DstRegister,
        op0_reg: Op0Register,
        op1_src: Op1Source,
        res: ResultLogic,
        pc_update: PcUpdate,
        op_code: OpCode,
    ) -> u64 {
        let bias = |v: i16| (v as u16) ^ 0x8000;
        (bias(dst_offset) as u64)
            | (bias(op0_offset) as u64) << 16
            | (bias(op1_offset) as u64) << 32
            | ((dst_reg as u64) << 48)
            | ((op0_reg as u64) << 49)
            | ((op1_src as u64) << 50)
            | ((res as u64) << 53)
            | ((pc_update as u64) << 55)
            | ((op_code as u64) << 60)
    }

    /// A `call` followed by a `ret` must round-trip the caller's frame: `call` pushes the old
    /// `fp` and the return address onto the new frame (at `[ap]` and `[ap + 1]`) and moves `fp`
    /// two cells past the pushed pair, while `ret` reads that same pair back out and restores
    /// `pc`/`fp` to what they were before the call.
    #[test]
    fn call_then_ret_round_trips_through_the_callee_frame() {
        let mut memory = Memory::new();
        let mut segments = SegmentManager::new();
        let base = segments.add_segment();

        let caller_pc = base.add_uint(0).unwrap();
        let callee_pc = base.add_uint(5).unwrap();
        let initial_fp = base.add_uint(20).unwrap();

        // `call abs <callee_pc>`: op1 is the immediate in the next cell, dst/op0 are left as
        // memory holes for the step function to fill in from `fp` and `pc + size`.
        let call_instr = encode_raw(
            0,
            1,
            1,
            DstRegister::AP,
            Op0Register::AP,
            Op1Source::PC,
            ResultLogic::Op1,
            PcUpdate::AbsoluteJump,
            OpCode::Call,
        );
        memory.set(caller_pc, MaybeRelocatable::from_felt(Felt::from(call_instr))).unwrap();
        memory
            .set(caller_pc.add_uint(1).unwrap(), MaybeRelocatable::from_relocatable(callee_pc))
            .unwrap();

        // `ret`: dst = [fp - 2] (old fp), op1 = [fp - 1] (return address) doubling as `res`
        // under `ResultLogic::Op1`, op0 reuses the same cell as op1.
        let ret_instr = encode_raw(
            -2,
            -1,
            -1,
            DstRegister::FP,
            Op0Register::FP,
            Op1Source::FP,
            ResultLogic::Op1,
            PcUpdate::AbsoluteJump,
            OpCode::Ret,
        );
        memory.set(callee_pc, MaybeRelocatable::from_felt(Felt::from(ret_instr))).unwrap();

        let mut cpu = Cpu::new(caller_pc, initial_fp, initial_fp);
        let mut builtins: Vec<BuiltinRunner> = Vec::new();
        let mut scopes = ExecutionScopes::new();
        let mut hint_processor = NoopHintProcessor;
        let mut trace = NoopTrace;

        step(
            &mut cpu,
            &mut memory,
            &mut builtins,
            &mut scopes,
            &mut hint_processor,
            &[],
            &mut trace,
        )
        .unwrap();

        let new_fp = initial_fp.add_uint(2).unwrap();
        assert_eq!(cpu.pc, callee_pc, "call should jump to the immediate target");
        assert_eq!(cpu.ap, new_fp, "call always advances ap by 2");
        assert_eq!(cpu.fp, new_fp, "call must set fp to ap + 2, not the old ap");
        assert_eq!(
            memory.get(&initial_fp).unwrap(),
            &MaybeRelocatable::from_relocatable(initial_fp),
            "[ap] should hold the caller's old fp"
        );
        assert_eq!(
            memory.get(&initial_fp.add_uint(1).unwrap()).unwrap(),
            &MaybeRelocatable::from_relocatable(caller_pc.add_uint(2).unwrap()),
            "[ap + 1] should hold the return address"
        );

        step(
            &mut cpu,
            &mut memory,
            &mut builtins,
            &mut scopes,
            &mut hint_processor,
            &[],
            &mut trace,
        )
        .unwrap();

        assert_eq!(cpu.pc, caller_pc.add_uint(2).unwrap(), "ret should resume right after the call");
        assert_eq!(cpu.fp, initial_fp, "ret should restore the caller's fp");
    }
}
