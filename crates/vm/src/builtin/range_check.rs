//! The range-check builtin: certifies that a felt lies in `[0, 2^128)`.

use std::rc::Rc;

use num_bigint::BigUint;

use crate::error::MemoryError;
use crate::memory::Memory;
use crate::relocatable::Relocatable;

/// Number of 16-bit limbs the range-check builtin splits a value into.
const N_PARTS: u32 = 8;

fn bound() -> BigUint {
    BigUint::from(1u8) << (N_PARTS * 16)
}

#[derive(Debug, Clone)]
pub struct RangeCheckBuiltinRunner {
    pub base: Relocatable,
    pub ratio: Option<u32>,
    pub(super) stop_ptr: Option<usize>,
}

impl RangeCheckBuiltinRunner {
    pub fn new(base: Relocatable, ratio: Option<u32>) -> Self {
        Self {
            base,
            ratio,
            stop_ptr: None,
        }
    }

    pub const fn cells_per_instance(&self) -> usize {
        1
    }

    pub const fn n_input_cells(&self) -> usize {
        1
    }

    pub fn add_validation_rule(&self, memory: &mut Memory) {
        let segment_index = self.base.segment_index as usize;
        let rule: crate::memory::ValidationRule = Rc::new(|memory, address| {
            let felt = memory.get_felt(address).map_err(|_| MemoryError::RangecheckNonInt)?;
            if felt.to_biguint() >= bound() {
                return Err(MemoryError::RangeCheckNumberOutOfBounds);
            }
            Ok(vec![*address])
        });
        memory.add_validation_rule(segment_index, rule);
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::value::MaybeRelocatable;
    use starknet_types_core::felt::Felt;

    #[rstest]
    #[case::zero(BigUint::from(0u8), true)]
    #[case::small(BigUint::from(42u8), true)]
    #[case::one_below_bound(bound() - 1u8, true)]
    #[case::exactly_bound(bound(), false)]
    #[case::one_past_bound(bound() + 1u8, false)]
    #[case::far_past_bound(bound() * 2u8, false)]
    fn validation_rule_enforces_the_n_parts_bound(#[case] value: BigUint, #[case] should_accept: bool) {
        let mut memory = Memory::new();
        let runner = RangeCheckBuiltinRunner::new(Relocatable::new(3, 0), Some(8));
        runner.add_validation_rule(&mut memory);

        let result = memory.set(Relocatable::new(3, 0), MaybeRelocatable::from_felt(Felt::from(value)));
        assert_eq!(result.is_ok(), should_accept, "result was {result:?}");
        if !should_accept {
            assert_eq!(result.unwrap_err(), MemoryError::RangeCheckNumberOutOfBounds);
        }
    }

    #[test]
    fn rejects_a_relocatable_value() {
        let mut memory = Memory::new();
        let runner = RangeCheckBuiltinRunner::new(Relocatable::new(3, 0), Some(8));
        runner.add_validation_rule(&mut memory);
        let result = memory.set(
            Relocatable::new(3, 0),
            MaybeRelocatable::from_relocatable(Relocatable::new(0, 0)),
        );
        assert_eq!(result, Err(MemoryError::RangecheckNonInt));
    }
}
