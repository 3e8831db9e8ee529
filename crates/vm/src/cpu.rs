//! Defines [`Cpu`], the run context holding the three Cairo registers.

use crate::error::{InstructionError, MathError};
use crate::relocatable::Relocatable;
use crate::value::MaybeRelocatable;

/// The registers driving execution: **Program Counter**, **Allocation Pointer**, and
/// **Frame Pointer**.
///
/// Every displacement is checked: an offset that would carry past a segment boundary is a
/// hard [`MathError`](crate::error::MathError), never silent wraparound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cpu {
    /// The Program Counter, pointing to the next instruction to fetch.
    ///
    /// Absolute jumps may move **PC** to a different segment, so it is not safe to assume
    /// it stays within the program segment.
    pub pc: Relocatable,
    /// The Allocation Pointer, incremented by most instructions that write to memory.
    pub ap: Relocatable,
    /// The Frame Pointer, the base of the current stack frame.
    pub fp: Relocatable,
}

impl Cpu {
    pub const fn new(pc: Relocatable, ap: Relocatable, fp: Relocatable) -> Self {
        Self { pc, ap, fp }
    }

    /// Resolves the address of the destination operand given its offset and register.
    pub fn dst_addr(&self, register: crate::instr::DstRegister, offset: i16) -> Result<Relocatable, MathError> {
        let base = match register {
            crate::instr::DstRegister::AP => self.ap,
            crate::instr::DstRegister::FP => self.fp,
        };
        base.add_int(offset as isize)
    }

    /// Resolves the address of the first operand given its offset and register.
    pub fn op0_addr(&self, register: crate::instr::Op0Register, offset: i16) -> Result<Relocatable, MathError> {
        let base = match register {
            crate::instr::Op0Register::AP => self.ap,
            crate::instr::Op0Register::FP => self.fp,
        };
        base.add_int(offset as isize)
    }

    /// Resolves the address of the second operand given its source, offset, and the
    /// already-read value of `op0` (needed only when `source` is [`Op1Source::Op0`], which
    /// bases `op1` on `op0`'s value treated as a relocatable address, not on `op0`'s own
    /// address).
    pub fn op1_addr(
        &self,
        source: crate::instr::Op1Source,
        offset: i16,
        op0: Option<MaybeRelocatable>,
    ) -> Result<Relocatable, InstructionError> {
        let base = match source {
            crate::instr::Op1Source::Op0 => op0
                .ok_or(InstructionError::UnknownOp0)?
                .into_relocatable()
                .map_err(|_| InstructionError::UnknownOp0)?,
            crate::instr::Op1Source::PC => self.pc,
            crate::instr::Op1Source::FP => self.fp,
            crate::instr::Op1Source::AP => self.ap,
        };
        Ok(base.add_int(offset as isize)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instr::{DstRegister, Op1Source};

    #[test]
    fn dst_addr_is_relative_to_the_selected_register() {
        let cpu = Cpu::new(Relocatable::new(0, 0), Relocatable::new(1, 10), Relocatable::new(1, 20));
        assert_eq!(cpu.dst_addr(DstRegister::AP, 3).unwrap(), Relocatable::new(1, 13));
        assert_eq!(cpu.dst_addr(DstRegister::FP, -2).unwrap(), Relocatable::new(1, 18));
    }

    #[test]
    fn op1_addr_dereferences_op0s_value_when_relative_to_op0() {
        let cpu = Cpu::new(Relocatable::new(0, 5), Relocatable::new(1, 10), Relocatable::new(1, 20));
        let op0_value = MaybeRelocatable::from_relocatable(Relocatable::new(2, 7));
        assert_eq!(
            cpu.op1_addr(Op1Source::Op0, 1, Some(op0_value)).unwrap(),
            Relocatable::new(2, 8)
        );
        assert_eq!(cpu.op1_addr(Op1Source::PC, 1, None).unwrap(), Relocatable::new(0, 6));
    }

    #[test]
    fn op1_addr_rejects_an_op0_source_with_no_op0_value() {
        let cpu = Cpu::new(Relocatable::new(0, 5), Relocatable::new(1, 10), Relocatable::new(1, 20));
        assert_eq!(cpu.op1_addr(Op1Source::Op0, 0, None).unwrap_err(), InstructionError::UnknownOp0);
    }

    #[test]
    fn op1_addr_rejects_an_op0_source_whose_value_is_not_relocatable() {
        let cpu = Cpu::new(Relocatable::new(0, 5), Relocatable::new(1, 10), Relocatable::new(1, 20));
        let op0_value = MaybeRelocatable::from_felt(starknet_types_core::felt::Felt::from(7u8));
        assert_eq!(
            cpu.op1_addr(Op1Source::Op0, 0, Some(op0_value)).unwrap_err(),
            InstructionError::UnknownOp0
        );
    }
}
